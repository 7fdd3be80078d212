//! Streaming batch sinks.

pub mod csv;
pub mod jsonl;

use mergescan_core::types::RowBatch;

use crate::error::Result;

pub use self::csv::CsvWriter;
pub use self::jsonl::JsonlWriter;

/// Destination for merged output batches.
pub trait BatchSink {
    fn write_batch(&mut self, batch: &RowBatch) -> Result<()>;

    /// Flush buffered output. Called once after the last batch.
    fn finish(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Sink that keeps every batch in memory.
#[derive(Debug, Default)]
pub struct CollectSink {
    pub batches: Vec<RowBatch>,
}

impl CollectSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn num_rows(&self) -> usize {
        self.batches.iter().map(|b| b.num_rows()).sum()
    }
}

impl BatchSink for CollectSink {
    fn write_batch(&mut self, batch: &RowBatch) -> Result<()> {
        self.batches.push(batch.clone());
        Ok(())
    }
}
