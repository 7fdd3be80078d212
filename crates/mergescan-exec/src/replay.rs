//! Deterministic replay & provenance helpers.
//!
//! The bind hash covers the file list, the ordering column and the reconciled
//! schema. With identical inputs the merge emits identical rows in identical
//! order, so a manifest can be checked against a fresh bind and a fresh run.

use serde::Serialize;

use mergescan_core::hash::Hash256;
use mergescan_core::manifest::ScanManifest;
use mergescan_core::types::RowBatch;
use mergescan_io::BatchSink;
use mergescan_operators::BindData;

use crate::{Engine, ExecError};

pub fn hash_bind(bind: &BindData) -> Result<Hash256, ExecError> {
    bind.fingerprint()
        .map_err(|e| ExecError::Hash(e.to_string()))
}

/// True when `manifest` was produced from a bind identical to `bind`.
pub fn matches_bind(manifest: &ScanManifest, bind: &BindData) -> Result<bool, ExecError> {
    Ok(manifest.files == bind.files
        && manifest.order_by == bind.order_by
        && manifest.bind_hash == hash_bind(bind)?)
}

/// Outcome of re-running the scan recorded in a manifest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReplayReport {
    pub expected_hash: Hash256,
    pub actual_hash: Hash256,
    pub expected_rows: u64,
    pub actual_rows: u64,
}

impl ReplayReport {
    pub fn is_match(&self) -> bool {
        self.expected_hash == self.actual_hash && self.expected_rows == self.actual_rows
    }
}

/// Counts rows without keeping them.
#[derive(Default)]
struct RowCounter {
    rows: u64,
}

impl BatchSink for RowCounter {
    fn write_batch(&mut self, batch: &RowBatch) -> mergescan_io::error::Result<()> {
        self.rows += batch.num_rows() as u64;
        Ok(())
    }
}

/// Bind the manifest's files again and rerun the scan.
///
/// The rerun is skipped when the bind hash already differs.
pub fn replay(engine: &Engine, manifest: &ScanManifest) -> Result<ReplayReport, ExecError> {
    let bind = engine.bind(&manifest.files, &manifest.order_by)?;
    let actual_hash = hash_bind(&bind)?;

    let actual_rows = if actual_hash == manifest.bind_hash {
        let mut counter = RowCounter::default();
        engine.run(&bind, &mut counter)?;
        counter.rows
    } else {
        0
    };

    Ok(ReplayReport {
        expected_hash: manifest.bind_hash,
        actual_hash,
        expected_rows: manifest.rows,
        actual_rows,
    })
}
