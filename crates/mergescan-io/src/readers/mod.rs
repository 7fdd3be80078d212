//! Decoders that produce `RowBatch` chunks from columnar sources.

pub mod memory;

#[cfg(feature = "parquet")]
pub mod parquet;
