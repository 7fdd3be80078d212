//! Runtime: the table-function contract over the ordered merge scan.
//!
//! - `bind` runs the schema reconciler once; its output is immutable and
//!   shared through an `Arc`.
//! - `scan` opens one `MergeScan` per execution. Scans never share decoders,
//!   batches or cursors, so any number of them may run concurrently on
//!   different threads against the same bind.
//! - `run` drains a scan into a `BatchSink` and emits a `ScanManifest`.

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use thiserror::Error;

use mergescan_core::config::ScanConfig;
use mergescan_core::manifest::ScanManifest;
use mergescan_io::writers::BatchSink;
use mergescan_io::DecoderFactory;
use mergescan_operators::{reconcile, BindData, MergeScan, OpError};

use crate::metrics::{record_batch, record_scan};
use crate::replay::hash_bind;

#[derive(Debug, Error)]
pub enum ExecError {
    #[error("invalid configuration: {0}")]
    Config(String),
    #[error("operator: {0}")]
    Operator(#[from] OpError),
    #[error("sink: {0}")]
    Sink(mergescan_io::error::Error),
    #[error("hashing error: {0}")]
    Hash(String),
}

/// Engine owns the scan configuration and the decoder factory.
pub struct Engine {
    cfg: ScanConfig,
    factory: Arc<dyn DecoderFactory>,
}

impl Engine {
    pub fn new(cfg: ScanConfig, factory: Arc<dyn DecoderFactory>) -> Result<Self, ExecError> {
        cfg.validate().map_err(|e| ExecError::Config(e.to_string()))?;
        Ok(Self { cfg, factory })
    }

    /// Engine reading Parquet files from the local filesystem.
    #[cfg(feature = "parquet")]
    pub fn parquet(cfg: ScanConfig) -> Result<Self, ExecError> {
        let factory = Arc::new(mergescan_io::ParquetDecoderFactory::new(cfg.batch_size));
        Self::new(cfg, factory)
    }

    /// Bind phase: reconcile the schemas of `files` around `order_by`.
    pub fn bind(&self, files: &[String], order_by: &str) -> Result<Arc<BindData>, ExecError> {
        let bind = reconcile(files, order_by, self.factory.as_ref())?;

        #[cfg(feature = "tracing")]
        tracing::info!(
            files = bind.files.len(),
            columns = bind.schema.len(),
            order_by = %bind.order_by,
            "bound ordered scan"
        );

        Ok(Arc::new(bind))
    }

    /// Init phase: open every source of `bind` for a fresh execution.
    pub fn scan(&self, bind: &Arc<BindData>) -> Result<MergeScan, ExecError> {
        Ok(MergeScan::open(
            Arc::clone(bind),
            self.factory.as_ref(),
            self.cfg.clone(),
        )?)
    }

    /// Execute a scan to completion, writing every non-terminal batch to `sink`.
    ///
    /// A decoder failure aborts the run; batches already written stay written.
    pub fn run(
        &self,
        bind: &Arc<BindData>,
        sink: &mut dyn BatchSink,
    ) -> Result<ScanManifest, ExecError> {
        let started = now_ms();
        let mut manifest = ScanManifest::new(
            hash_bind(bind)?,
            bind.files.clone(),
            bind.order_by.clone(),
            started,
        );

        let mut scan = self.scan(bind)?;
        let mut fast_path_seen = 0;
        loop {
            let batch = scan.next_batch()?;
            if batch.is_empty() {
                break;
            }
            sink.write_batch(&batch).map_err(ExecError::Sink)?;

            let fast_path = scan.stats().fast_path_batches > fast_path_seen;
            fast_path_seen = scan.stats().fast_path_batches;
            record_batch(batch.num_rows(), scan.active_sources(), fast_path);
        }
        sink.finish().map_err(ExecError::Sink)?;

        let stats = scan.stats();
        manifest.rows = stats.rows;
        manifest.batches = stats.batches;
        manifest.fast_path_batches = stats.fast_path_batches;
        let manifest = manifest.finish(now_ms());
        record_scan(&stats, manifest.duration_ms());

        Ok(manifest)
    }
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
