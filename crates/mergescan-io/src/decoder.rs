//! Decoder contract consumed by the merge scan.
//!
//! A decoder is opened per file, reports the file's leaf columns, is bound to
//! a set of row groups with `init_scan`, and then yields decoded batches until
//! it returns an empty batch.

use serde::{Deserialize, Serialize};

use mergescan_core::schema::PhysicalType;
use mergescan_core::types::RowBatch;

use crate::error::Result;

/// One non-nested column of a source file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeafColumn {
    pub name: String,
    pub physical_type: PhysicalType,
}

impl LeafColumn {
    pub fn new(name: impl Into<String>, physical_type: PhysicalType) -> Self {
        Self {
            name: name.into(),
            physical_type,
        }
    }
}

/// Pull-based decoder over a single columnar file.
///
/// Invariants:
/// - `leaf_schema` is fixed for the lifetime of the decoder.
/// - Every batch returned by `next_batch` has exactly one column per leaf,
///   in leaf order.
/// - A zero-row batch means the selected row groups are exhausted.
///
/// The merge scan also expects the ordering column to be non-decreasing
/// under `Scalar::order_cmp` across all batches, with nulls first. A source
/// that breaks this is rejected when the offending batch is loaded.
pub trait ColumnDecoder: Send {
    fn leaf_schema(&self) -> &[LeafColumn];

    fn num_row_groups(&self) -> usize;

    /// Bind the decoder to `row_groups`. Must be called before `next_batch`.
    fn init_scan(&mut self, row_groups: Vec<usize>) -> Result<()>;

    /// Decode the next batch; empty on exhaustion.
    fn next_batch(&mut self) -> Result<RowBatch>;

    /// Bind the decoder to every row group of the file.
    fn init_full_scan(&mut self) -> Result<()> {
        let all = (0..self.num_row_groups()).collect();
        self.init_scan(all)
    }
}

/// Opens decoders by path. Shared across bind and every scan execution.
pub trait DecoderFactory: Send + Sync {
    fn open(&self, path: &str) -> Result<Box<dyn ColumnDecoder>>;
}
