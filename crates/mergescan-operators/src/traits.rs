//! Error type and the pull-based stream contract.
//!
//! The exec runtime drives any `BatchStream` by calling `next_batch` until it
//! returns a zero-row batch.

use mergescan_core::prelude::{DataType, Schema};
use mergescan_core::types::RowBatch;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum OpError {
    #[error("no input files given")]
    NoInputs,

    #[error("incompatible schema: column '{column}' is {existing} in an earlier file but {found} in '{path}'")]
    IncompatibleSchema {
        column: String,
        existing: DataType,
        found: DataType,
        path: String,
    },

    #[error("ordering column '{column}' not found in '{path}'")]
    OrderColumnMissing { column: String, path: String },

    #[error("ordering column '{column}' has unsupported type {data_type}")]
    UnsupportedOrderType { column: String, data_type: DataType },

    #[error("'{path}' is not sorted on the ordering column at row {row} (nulls must sort first)")]
    Unsorted { path: String, row: u64 },

    #[error("schema error: {0}")]
    Schema(String),

    #[error("decoder error: {0}")]
    Decode(#[from] mergescan_io::error::Error),

    #[error("execution error: {0}")]
    Exec(String),
}

/// Pull-based producer of output batches.
///
/// Invariants:
/// - Every batch carries the columns of `schema()`, in order.
/// - A zero-row batch signals end-of-stream; later calls keep returning one.
pub trait BatchStream {
    fn schema(&self) -> &Schema;

    fn next_batch(&mut self) -> Result<RowBatch, OpError>;
}
