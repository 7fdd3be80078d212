//! Ordered k-way merge scan over pre-sorted sources.
//!
//! Each call to `next_batch` produces one output batch:
//! 1. Refill every drained reader set; drop the exhausted ones.
//! 2. Recompute the winner group if anything was refilled or dropped.
//! 3. With a single winner, bulk-copy its whole remaining batch.
//!    Otherwise run a row tournament among the group until the winning set
//!    drains its batch or the output reaches the per-call cap.
//!
//! The concatenation of all batches is ordered by the ordering column; a
//! zero-row batch means every source is exhausted.

use std::sync::Arc;

use serde::Serialize;

use mergescan_core::config::ScanConfig;
use mergescan_core::schema::Schema;
use mergescan_core::types::RowBatch;
use mergescan_io::DecoderFactory;

use crate::active::ActiveSets;
use crate::output::OutputBuilder;
use crate::reader_set::ReaderSet;
use crate::reconcile::BindData;
use crate::traits::{BatchStream, OpError};
use crate::winner::{precedes, WinnerGroup};

/// Counters kept by one merge scan.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MergeStats {
    /// Non-terminal batches returned.
    pub batches: u64,
    pub rows: u64,
    pub fast_path_batches: u64,
    pub tournament_batches: u64,
    pub refills: u64,
    pub exhausted_sources: u64,
}

/// Ordered merge over every bound source.
///
/// Each source must already be sorted on the ordering column with nulls
/// first; a decreasing key fails the scan with `OpError::Unsorted`.
pub struct MergeScan {
    bind: Arc<BindData>,
    config: ScanConfig,
    active: ActiveSets,
    /// `None` when invalidated by a refill or removal.
    winners: Option<WinnerGroup>,
    stats: MergeStats,
}

impl MergeScan {
    /// Open one reader set per bound source and prime each with a batch.
    pub fn open(
        bind: Arc<BindData>,
        factory: &dyn DecoderFactory,
        config: ScanConfig,
    ) -> Result<Self, OpError> {
        config
            .validate()
            .map_err(|e| OpError::Exec(e.to_string()))?;

        let width = bind.schema.len();
        let sets = bind
            .sources
            .iter()
            .enumerate()
            .map(|(source_id, binding)| ReaderSet::open(source_id, binding, width, factory))
            .collect::<Result<Vec<_>, _>>()?;
        let active = ActiveSets::new(sets);
        let winners = Some(WinnerGroup::compute(&active));

        #[cfg(feature = "tracing")]
        tracing::debug!(
            sources = active.len(),
            order_by = %bind.order_by,
            "merge scan opened"
        );

        Ok(Self {
            bind,
            config,
            active,
            winners,
            stats: MergeStats::default(),
        })
    }

    pub fn stats(&self) -> MergeStats {
        self.stats
    }

    /// Sources that may still produce rows.
    pub fn active_sources(&self) -> usize {
        self.active.len()
    }

    /// Produce the next output batch; zero rows means end-of-stream.
    pub fn next_batch(&mut self) -> Result<RowBatch, OpError> {
        let outcome = self.active.refill_drained()?;
        self.stats.refills += outcome.refills as u64;
        self.stats.exhausted_sources += outcome.exhausted as u64;
        if outcome.changed() {
            self.winners = None;
        }

        if self.active.is_empty() {
            return Ok(RowBatch::empty(&self.bind.schema));
        }

        let group = match self.winners.take() {
            Some(group) => group,
            None => WinnerGroup::compute(&self.active),
        };
        let Some(primary) = group.primary() else {
            return Err(OpError::Exec(
                "active sources without a buffered row".into(),
            ));
        };

        let mut out = OutputBuilder::new(
            &self.bind.schema,
            self.config.base_output_capacity,
            self.config.max_rows_per_call,
        );

        let fast_path = group.is_single();
        if fast_path {
            // Nothing else can beat the primary's last buffered key.
            self.active.get_mut(primary).drain_into(&mut out);
            self.stats.fast_path_batches += 1;
        } else {
            self.tournament(&group, &mut out);
            self.stats.tournament_batches += 1;
        }
        self.winners = Some(group);

        let batch = out.finish();
        self.stats.batches += 1;
        self.stats.rows += batch.num_rows() as u64;

        #[cfg(feature = "tracing")]
        tracing::trace!(
            rows = batch.num_rows(),
            fast_path,
            active = self.active.len(),
            "merge batch"
        );

        Ok(batch)
    }

    /// Emit the smallest head among the group, one row at a time.
    ///
    /// Stops once the winning set drains its batch (its bound is stale until
    /// refilled) or the output reaches the per-call cap.
    fn tournament(&mut self, group: &WinnerGroup, out: &mut OutputBuilder) {
        loop {
            let mut winner: Option<usize> = None;
            for &idx in group.members() {
                let cand = self.active.get(idx);
                let Some(key) = cand.head() else { continue };
                let better = match winner {
                    None => true,
                    Some(best_idx) => {
                        let best = self.active.get(best_idx);
                        match best.head() {
                            Some(best_key) => {
                                precedes(key, cand.source_id(), best_key, best.source_id())
                            }
                            None => true,
                        }
                    }
                };
                if better {
                    winner = Some(idx);
                }
            }

            let Some(winner) = winner else { break };
            let set = self.active.get_mut(winner);
            set.emit_row(out);
            if set.is_drained() || out.is_full() {
                break;
            }
        }
    }

    /// Drain the scan into a single batch. Intended for tests and small inputs.
    pub fn collect_all(&mut self) -> Result<RowBatch, OpError> {
        let mut all = RowBatch::empty(&self.bind.schema);
        loop {
            let batch = self.next_batch()?;
            if batch.is_empty() {
                return Ok(all);
            }
            all.extend_from(&batch).map_err(OpError::Exec)?;
        }
    }
}

impl BatchStream for MergeScan {
    fn schema(&self) -> &Schema {
        &self.bind.schema
    }

    fn next_batch(&mut self) -> Result<RowBatch, OpError> {
        MergeScan::next_batch(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reconcile::reconcile;
    use mergescan_core::schema::PhysicalType;
    use mergescan_core::types::{Column, Scalar};
    use mergescan_io::{LeafColumn, MemoryDecoderFactory, MemoryFile};

    fn keys(batch: &RowBatch) -> Vec<i64> {
        batch.columns[0]
            .values
            .iter()
            .map(|v| match v {
                Scalar::I64(k) => *k,
                other => panic!("unexpected key {other:?}"),
            })
            .collect()
    }

    fn file(ks: &[i64], rows_per_group: usize) -> MemoryFile {
        let batch = RowBatch::new(vec![Column::new(
            "k",
            ks.iter().copied().map(Scalar::I64).collect(),
        )]);
        MemoryFile::new(vec![LeafColumn::new("k", PhysicalType::Int64)])
            .with_rows(&batch, rows_per_group)
    }

    fn open(factory: &MemoryDecoderFactory, paths: &[&str], cfg: ScanConfig) -> MergeScan {
        let files: Vec<String> = paths.iter().map(|p| p.to_string()).collect();
        let bind = Arc::new(reconcile(&files, "k", factory).unwrap());
        MergeScan::open(bind, factory, cfg).unwrap()
    }

    #[test]
    fn interleaves_two_sources() {
        let factory = MemoryDecoderFactory::new(3);
        factory.insert("a", file(&[1, 3, 5, 7, 9], 5));
        factory.insert("b", file(&[2, 4, 6, 8], 4));
        let mut scan = open(&factory, &["a", "b"], ScanConfig::default());

        let all = scan.collect_all().unwrap();
        assert_eq!(keys(&all), (1..=9).collect::<Vec<_>>());
        assert_eq!(scan.active_sources(), 0);
        assert!(scan.stats().tournament_batches > 0);
    }

    #[test]
    fn fast_path_copies_whole_batch() {
        let factory = MemoryDecoderFactory::new(4);
        factory.insert("a", file(&[1, 2, 3, 4], 4));
        factory.insert("b", file(&[10, 11], 2));
        let mut scan = open(&factory, &["a", "b"], ScanConfig::default());

        let first = scan.next_batch().unwrap();
        assert_eq!(keys(&first), vec![1, 2, 3, 4]);
        assert_eq!(scan.stats().fast_path_batches, 1);
        let second = scan.next_batch().unwrap();
        assert_eq!(keys(&second), vec![10, 11]);
        assert!(scan.next_batch().unwrap().is_empty());
        // Terminal batch repeats.
        assert!(scan.next_batch().unwrap().is_empty());
    }

    #[test]
    fn tournament_respects_row_cap() {
        let factory = MemoryDecoderFactory::new(100);
        let evens: Vec<i64> = (0..100).map(|i| i * 2).collect();
        let odds: Vec<i64> = (0..100).map(|i| i * 2 + 1).collect();
        factory.insert("a", file(&evens, 100));
        factory.insert("b", file(&odds, 100));
        let cfg = ScanConfig {
            batch_size: 100,
            base_output_capacity: 4,
            max_rows_per_call: 16,
        };
        let mut scan = open(&factory, &["a", "b"], cfg);

        let mut seen = Vec::new();
        loop {
            let batch = scan.next_batch().unwrap();
            if batch.is_empty() {
                break;
            }
            assert!(batch.num_rows() <= 16);
            seen.extend(keys(&batch));
        }
        assert_eq!(seen, (0..200).collect::<Vec<_>>());
    }

    #[test]
    fn equal_keys_follow_source_order() {
        let factory = MemoryDecoderFactory::new(2);
        factory.insert("a", file(&[1, 1, 2, 2], 4));
        factory.insert("b", file(&[1, 2, 2], 3));
        let files: Vec<String> = vec!["b".into(), "a".into()];
        let bind = Arc::new(reconcile(&files, "k", &factory).unwrap());
        let mut scan = MergeScan::open(bind, &factory, ScanConfig::default()).unwrap();

        let all = scan.collect_all().unwrap();
        assert_eq!(keys(&all), vec![1, 1, 1, 2, 2, 2, 2]);
        assert_eq!(scan.stats().rows, 7);
    }

    #[test]
    fn empty_source_is_dropped() {
        let factory = MemoryDecoderFactory::new(2);
        factory.insert("a", file(&[], 4));
        factory.insert("b", file(&[5, 6, 7], 4));
        let mut scan = open(&factory, &["a", "b"], ScanConfig::default());
        let all = scan.collect_all().unwrap();
        assert_eq!(keys(&all), vec![5, 6, 7]);
        assert_eq!(scan.stats().exhausted_sources, 2);
    }

    #[test]
    fn rejects_invalid_config() {
        let factory = MemoryDecoderFactory::new(2);
        factory.insert("a", file(&[1], 1));
        let files = vec!["a".to_string()];
        let bind = Arc::new(reconcile(&files, "k", &factory).unwrap());
        let cfg = ScanConfig {
            max_rows_per_call: 0,
            ..Default::default()
        };
        assert!(matches!(
            MergeScan::open(bind, &factory, cfg),
            Err(OpError::Exec(_))
        ));
    }
}
