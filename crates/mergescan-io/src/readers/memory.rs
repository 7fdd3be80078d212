//! In-memory decoder for tests and benches.
//!
//! Files are registered by path in a shared map. Each file is a list of row
//! groups; the decoder re-chunks the selected row groups into batches of at
//! most `batch_size` rows, the same way a file decoder never returns a batch
//! spanning two row groups.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use mergescan_core::types::{Column, RowBatch};

use crate::decoder::{ColumnDecoder, DecoderFactory, LeafColumn};
use crate::error::{Error, Result};

/// Contents of one in-memory source file.
#[derive(Debug, Clone, Default)]
pub struct MemoryFile {
    pub leaves: Vec<LeafColumn>,
    pub row_groups: Vec<RowBatch>,
    /// Fail-point: return a decode error once this many batches were served.
    pub fail_after_batches: Option<usize>,
}

impl MemoryFile {
    pub fn new(leaves: Vec<LeafColumn>) -> Self {
        Self {
            leaves,
            row_groups: Vec::new(),
            fail_after_batches: None,
        }
    }

    pub fn with_row_group(mut self, batch: RowBatch) -> Self {
        self.row_groups.push(batch);
        self
    }

    /// Split `batch` into row groups of `rows_per_group` rows.
    pub fn with_rows(mut self, batch: &RowBatch, rows_per_group: usize) -> Self {
        let step = rows_per_group.max(1);
        let total = batch.num_rows();
        let mut start = 0;
        while start < total {
            let end = (start + step).min(total);
            self.row_groups.push(batch.slice(start, end));
            start = end;
        }
        self
    }

    pub fn fail_after(mut self, batches: usize) -> Self {
        self.fail_after_batches = Some(batches);
        self
    }

    pub fn num_rows(&self) -> usize {
        self.row_groups.iter().map(|g| g.num_rows()).sum()
    }
}

/// Thread-safe registry of in-memory files.
#[derive(Clone)]
pub struct MemoryDecoderFactory {
    files: Arc<Mutex<HashMap<String, Arc<MemoryFile>>>>,
    batch_size: usize,
}

impl MemoryDecoderFactory {
    pub fn new(batch_size: usize) -> Self {
        Self {
            files: Arc::new(Mutex::new(HashMap::new())),
            batch_size: batch_size.max(1),
        }
    }

    pub fn insert(&self, path: impl Into<String>, file: MemoryFile) {
        let mut files = self.files.lock().unwrap_or_else(|e| e.into_inner());
        files.insert(path.into(), Arc::new(file));
    }
}

impl Default for MemoryDecoderFactory {
    fn default() -> Self {
        Self::new(2048)
    }
}

impl DecoderFactory for MemoryDecoderFactory {
    fn open(&self, path: &str) -> Result<Box<dyn ColumnDecoder>> {
        let file = {
            let files = self.files.lock().unwrap_or_else(|e| e.into_inner());
            files
                .get(path)
                .cloned()
                .ok_or_else(|| Error::NotFound(path.to_string()))?
        };
        Ok(Box::new(MemoryDecoder::new(file, self.batch_size)))
    }
}

pub struct MemoryDecoder {
    file: Arc<MemoryFile>,
    batch_size: usize,
    selected: Option<Vec<usize>>,
    group_pos: usize,
    row_offset: usize,
    served: usize,
}

impl MemoryDecoder {
    fn new(file: Arc<MemoryFile>, batch_size: usize) -> Self {
        Self {
            file,
            batch_size,
            selected: None,
            group_pos: 0,
            row_offset: 0,
            served: 0,
        }
    }

    fn empty_batch(&self) -> RowBatch {
        RowBatch::new(
            self.file
                .leaves
                .iter()
                .map(|l| Column::new(l.name.clone(), Vec::new()))
                .collect(),
        )
    }
}

impl ColumnDecoder for MemoryDecoder {
    fn leaf_schema(&self) -> &[LeafColumn] {
        &self.file.leaves
    }

    fn num_row_groups(&self) -> usize {
        self.file.row_groups.len()
    }

    fn init_scan(&mut self, row_groups: Vec<usize>) -> Result<()> {
        if let Some(bad) = row_groups.iter().find(|&&g| g >= self.file.row_groups.len()) {
            return Err(Error::Decode(format!(
                "row group {} out of range ({} row groups)",
                bad,
                self.file.row_groups.len()
            )));
        }
        self.selected = Some(row_groups);
        self.group_pos = 0;
        self.row_offset = 0;
        Ok(())
    }

    fn next_batch(&mut self) -> Result<RowBatch> {
        let selected = self
            .selected
            .as_ref()
            .ok_or_else(|| Error::State("next_batch called before init_scan".into()))?;

        if let Some(limit) = self.file.fail_after_batches {
            if self.served >= limit {
                #[cfg(feature = "tracing")]
                tracing::warn!(batches = limit, "injected decode failure");
                return Err(Error::Decode(format!(
                    "injected failure after {} batches",
                    limit
                )));
            }
        }

        while let Some(&group_idx) = selected.get(self.group_pos) {
            let group = &self.file.row_groups[group_idx];
            if group.num_columns() != self.file.leaves.len() {
                return Err(Error::Decode(format!(
                    "row group {} has {} columns, schema has {}",
                    group_idx,
                    group.num_columns(),
                    self.file.leaves.len()
                )));
            }
            group.validate().map_err(Error::Decode)?;

            let rows = group.num_rows();
            if self.row_offset >= rows {
                self.group_pos += 1;
                self.row_offset = 0;
                continue;
            }
            let end = (self.row_offset + self.batch_size).min(rows);
            let batch = group.slice(self.row_offset, end);
            self.row_offset = end;
            self.served += 1;
            return Ok(batch);
        }

        Ok(self.empty_batch())
    }
}
