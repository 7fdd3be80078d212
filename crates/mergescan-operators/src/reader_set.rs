//! Per-source runtime state: decoder, current batch, cursor, projection.
//!
//! A reader set exclusively owns its decoder and batch buffer. The batch keeps
//! the file's own column layout; mapping into the global schema happens only
//! when rows are copied to the output.
//!
//! Every batch is checked against the source's sort order: ordering keys may
//! never decrease under `Scalar::order_cmp`, within a batch or across batch
//! boundaries. Nulls therefore have to come first in a nullable key.

use mergescan_core::schema::DataType;
use mergescan_core::types::{RowBatch, Scalar};
use mergescan_io::error::Error as IoError;
use mergescan_io::{ColumnDecoder, DecoderFactory};

use crate::output::OutputBuilder;
use crate::reconcile::SourceBinding;
use crate::traits::OpError;

pub struct ReaderSet {
    source_id: usize,
    path: String,
    decoder: Box<dyn ColumnDecoder>,
    batch: RowBatch,
    cursor: usize,
    order_index: usize,
    order_type: DataType,
    leaf_count: usize,
    /// Last ordering key of the previous batch.
    prev_key: Option<Scalar>,
    rows_read: u64,
    /// `inverse[global] = Some(local)` for columns this file has.
    inverse: Vec<Option<usize>>,
}

impl ReaderSet {
    /// Open the source, bind it to every row group and decode the first batch.
    pub fn open(
        source_id: usize,
        binding: &SourceBinding,
        global_width: usize,
        factory: &dyn DecoderFactory,
    ) -> Result<Self, OpError> {
        let mut decoder = factory.open(&binding.path)?;
        if decoder.leaf_schema() != binding.leaves.as_slice() {
            return Err(OpError::Schema(format!(
                "schema of '{}' changed since bind",
                binding.path
            )));
        }

        let mut inverse = vec![None; global_width];
        for (local, &global) in binding.projection.iter().enumerate() {
            let slot = inverse.get_mut(global).ok_or_else(|| {
                OpError::Schema(format!(
                    "projection of '{}' maps column {} outside the global schema",
                    binding.path, local
                ))
            })?;
            *slot = Some(local);
        }

        let order_type = binding
            .local_types()
            .get(binding.order_index)
            .copied()
            .ok_or_else(|| {
                OpError::Schema(format!(
                    "ordering column index {} out of range for '{}'",
                    binding.order_index, binding.path
                ))
            })?;

        decoder.init_full_scan()?;

        let mut set = Self {
            source_id,
            path: binding.path.clone(),
            decoder,
            batch: RowBatch::default(),
            cursor: 0,
            order_index: binding.order_index,
            order_type,
            leaf_count: binding.leaves.len(),
            prev_key: None,
            rows_read: 0,
            inverse,
        };
        set.load_next()?;
        Ok(set)
    }

    /// Replace the current batch with the next one from the decoder.
    ///
    /// Returns `false` when the source is exhausted.
    pub fn refill(&mut self) -> Result<bool, OpError> {
        self.load_next()?;

        #[cfg(feature = "tracing")]
        tracing::trace!(
            source = self.source_id,
            path = %self.path,
            rows = self.batch.num_rows(),
            "refilled reader set"
        );

        Ok(!self.batch.is_empty())
    }

    fn load_next(&mut self) -> Result<(), OpError> {
        let batch = self.decoder.next_batch()?;
        if batch.num_columns() != self.leaf_count {
            return Err(IoError::Decode(format!(
                "'{}' returned {} columns, expected {}",
                self.path,
                batch.num_columns(),
                self.leaf_count
            ))
            .into());
        }
        batch
            .validate()
            .map_err(|e| IoError::Decode(format!("'{}': {}", self.path, e)))?;
        // A mistyped key would order by variant instead of by value.
        if let Some(bad) = batch
            .columns
            .get(self.order_index)
            .into_iter()
            .flat_map(|c| c.values.iter())
            .find(|v| !v.is_null() && v.data_type() != self.order_type)
        {
            return Err(IoError::Decode(format!(
                "'{}': ordering value {:?} is not {}",
                self.path, bad, self.order_type
            ))
            .into());
        }

        let keys = batch
            .columns
            .get(self.order_index)
            .map(|c| c.values.as_slice())
            .unwrap_or_default();
        if let Some(row) = first_decrease(self.prev_key.as_ref(), keys) {
            return Err(OpError::Unsorted {
                path: self.path.clone(),
                row: self.rows_read + row as u64,
            });
        }
        if let Some(last) = keys.last() {
            self.prev_key = Some(last.clone());
        }

        self.rows_read += batch.num_rows() as u64;
        self.batch = batch;
        self.cursor = 0;
        Ok(())
    }

    pub fn source_id(&self) -> usize {
        self.source_id
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn len(&self) -> usize {
        self.batch.num_rows()
    }

    pub fn is_empty(&self) -> bool {
        self.batch.is_empty()
    }

    /// Every buffered row has been consumed.
    pub fn is_drained(&self) -> bool {
        self.cursor >= self.len()
    }

    /// Ordering value at the cursor.
    pub fn head(&self) -> Option<&Scalar> {
        self.key_at(self.cursor)
    }

    /// Ordering value of the last buffered row.
    pub fn last(&self) -> Option<&Scalar> {
        self.len().checked_sub(1).and_then(|row| self.key_at(row))
    }

    fn key_at(&self, row: usize) -> Option<&Scalar> {
        self.batch.columns.get(self.order_index)?.values.get(row)
    }

    /// Copy the row at the cursor into `out` and advance.
    pub fn emit_row(&mut self, out: &mut OutputBuilder) {
        out.push_row(&self.batch, self.cursor, &self.inverse);
        self.cursor += 1;
    }

    /// Copy every remaining buffered row into `out`.
    pub fn drain_into(&mut self, out: &mut OutputBuilder) -> usize {
        let end = self.len();
        let n = end.saturating_sub(self.cursor);
        out.extend_rows(&self.batch, self.cursor, end, &self.inverse);
        self.cursor = end;
        n
    }
}

/// Index of the first key that sorts before its predecessor.
fn first_decrease<'a>(mut prev: Option<&'a Scalar>, keys: &'a [Scalar]) -> Option<usize> {
    for (i, key) in keys.iter().enumerate() {
        if prev.is_some_and(|p| key.order_cmp(p).is_lt()) {
            return Some(i);
        }
        prev = Some(key);
    }
    None
}
