//! Scan manifest for audit/replay.
//!
//! The engine emits a manifest after draining a scan; rerunning the same bind
//! (same files, same ordering column) must reproduce the same `bind_hash` and
//! the same row count.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::Result;
use crate::hash::Hash256;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ManifestId(pub Uuid);

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanManifest {
    pub id: ManifestId,

    /// Stable hash of the bind output (files, ordering column, schema).
    pub bind_hash: Hash256,

    /// Engine version string for provenance.
    pub engine_version: String,

    pub files: Vec<String>,
    pub order_by: String,

    /// Rows emitted across all non-terminal batches.
    pub rows: u64,
    /// Non-terminal batches emitted.
    pub batches: u64,
    /// Batches produced by bulk copy rather than the row tournament.
    pub fast_path_batches: u64,

    /// Milliseconds since Unix epoch (UTC).
    pub started_ms: u64,
    pub finished_ms: u64,
}

impl ScanManifest {
    pub fn new(bind_hash: Hash256, files: Vec<String>, order_by: String, started_ms: u64) -> Self {
        Self {
            id: ManifestId(Uuid::new_v4()),
            bind_hash,
            engine_version: crate::VERSION.to_string(),
            files,
            order_by,
            rows: 0,
            batches: 0,
            fast_path_batches: 0,
            started_ms,
            finished_ms: started_ms,
        }
    }

    pub fn finish(mut self, finished_ms: u64) -> Self {
        self.finished_ms = finished_ms;
        self
    }

    pub fn duration_ms(&self) -> u64 {
        self.finished_ms.saturating_sub(self.started_ms)
    }

    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(s: &str) -> Result<Self> {
        Ok(serde_json::from_str(s)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::hash::hash_bytes;

    fn manifest() -> ScanManifest {
        let mut m = ScanManifest::new(
            hash_bytes(b"bind"),
            vec!["a.parquet".into(), "b.parquet".into()],
            "ts".into(),
            1_000,
        );
        m.rows = 42;
        m.batches = 3;
        m.finish(1_250)
    }

    #[test]
    fn json_roundtrip_keeps_provenance() {
        let m = manifest();
        let json = m.to_json_pretty().unwrap();
        assert!(json.contains(&m.bind_hash.to_hex()));

        let back = ScanManifest::from_json(&json).unwrap();
        assert_eq!(back.id, m.id);
        assert_eq!(back.bind_hash, m.bind_hash);
        assert_eq!(back.files, m.files);
        assert_eq!(back.rows, 42);
        assert_eq!(back.duration_ms(), 250);
        assert_eq!(back.engine_version, crate::VERSION);
    }

    #[test]
    fn rejects_truncated_json() {
        assert!(matches!(
            ScanManifest::from_json("{\"rows\": 1"),
            Err(Error::Manifest(_))
        ));
    }
}
