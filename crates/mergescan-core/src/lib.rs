#![forbid(unsafe_code)]
//! mergescan-core: shared types for the ordered multi-file merge scan.
//!
//! Everything here is pure data: schemas, scalar values, row batches, scan
//! configuration, stable hashing and the scan manifest. Decoders live in
//! `mergescan-io`; the merge itself lives in `mergescan-operators`.

pub mod config;
pub mod error;
pub mod hash;
pub mod manifest;
pub mod prelude;
pub mod schema;
pub mod types;

/// Engine version recorded in scan manifests.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
