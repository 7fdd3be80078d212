//! Output batch under construction for one driver call.
//!
//! Rows arrive in source-local column order and are scattered into the global
//! schema through a reader set's inverse projection; global columns the
//! source does not have are filled with nulls.

use mergescan_core::schema::Schema;
use mergescan_core::types::{Column, RowBatch, Scalar};

pub struct OutputBuilder {
    columns: Vec<Column>,
    len: usize,
    capacity: usize,
    hard_cap: usize,
}

impl OutputBuilder {
    pub fn new(schema: &Schema, base_capacity: usize, hard_cap: usize) -> Self {
        let capacity = base_capacity.max(1);
        Self {
            columns: schema
                .fields
                .iter()
                .map(|f| Column::new(f.name.clone(), Vec::with_capacity(capacity)))
                .collect(),
            len: 0,
            capacity,
            hard_cap: hard_cap.max(1),
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// True once the row-wise path must stop for this call.
    pub fn is_full(&self) -> bool {
        self.len >= self.hard_cap
    }

    /// Append row `row` of `batch`. `inverse[global] = Some(local)`.
    pub fn push_row(&mut self, batch: &RowBatch, row: usize, inverse: &[Option<usize>]) {
        self.reserve_rows(self.len + 1);
        for (global, col) in self.columns.iter_mut().enumerate() {
            let value = match inverse.get(global).copied().flatten() {
                Some(local) => batch.value(local, row).clone(),
                None => Scalar::Null,
            };
            col.values.push(value);
        }
        self.len += 1;
    }

    /// Append rows `start..end` of `batch` column by column.
    pub fn extend_rows(
        &mut self,
        batch: &RowBatch,
        start: usize,
        end: usize,
        inverse: &[Option<usize>],
    ) {
        if end <= start {
            return;
        }
        let n = end - start;
        self.reserve_rows(self.len + n);
        for (global, col) in self.columns.iter_mut().enumerate() {
            match inverse.get(global).copied().flatten() {
                Some(local) => col
                    .values
                    .extend_from_slice(&batch.columns[local].values[start..end]),
                None => col.values.resize(col.values.len() + n, Scalar::Null),
            }
        }
        self.len += n;
    }

    pub fn finish(self) -> RowBatch {
        RowBatch::new(self.columns)
    }

    /// Double capacity until `needed` rows fit. Row-wise growth never goes
    /// past the hard cap; a bulk copy larger than the cap gets what it needs.
    fn reserve_rows(&mut self, needed: usize) {
        if needed <= self.capacity {
            return;
        }
        let mut cap = self.capacity;
        while cap < needed {
            cap = cap.saturating_mul(2);
        }
        if needed <= self.hard_cap {
            cap = cap.min(self.hard_cap);
        }
        for col in &mut self.columns {
            col.values.reserve(cap - col.values.len());
        }
        self.capacity = cap;
    }
}
