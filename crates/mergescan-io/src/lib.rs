#![forbid(unsafe_code)]
//! mergescan-io: columnar file decoders and batch sinks.
//!
//! The merge core only sees the `ColumnDecoder` / `DecoderFactory` traits.
//! Two implementations ship here: an in-memory decoder used by tests and
//! benches, and a Parquet decoder (enabled with `--features parquet`).

pub mod decoder;
pub mod error;
pub mod readers;
pub mod writers;

pub use decoder::{ColumnDecoder, DecoderFactory, LeafColumn};
pub use readers::memory::{MemoryDecoderFactory, MemoryFile};
pub use writers::{BatchSink, CollectSink, CsvWriter, JsonlWriter};

#[cfg(feature = "parquet")]
pub use readers::parquet::ParquetDecoderFactory;
