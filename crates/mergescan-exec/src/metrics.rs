//! Scan metrics, reported as `tracing` events under the
//! `mergescan::metrics` target. Without the `tracing` feature these compile
//! to nothing.

use mergescan_operators::MergeStats;

/// One non-terminal batch left the scan.
#[cfg(feature = "tracing")]
pub fn record_batch(rows: usize, active_sources: usize, fast_path: bool) {
    tracing::trace!(
        target: "mergescan::metrics",
        rows,
        active_sources,
        fast_path,
        "batch"
    );
}

#[cfg(not(feature = "tracing"))]
pub fn record_batch(_rows: usize, _active_sources: usize, _fast_path: bool) {}

/// Final counters of a completed scan.
#[cfg(feature = "tracing")]
pub fn record_scan(stats: &MergeStats, duration_ms: u64) {
    let span = tracing::info_span!(target: "mergescan::metrics", "scan", duration_ms);
    let _entered = span.enter();
    tracing::info!(
        target: "mergescan::metrics",
        rows = stats.rows,
        batches = stats.batches,
        fast_path_batches = stats.fast_path_batches,
        tournament_batches = stats.tournament_batches,
        refills = stats.refills,
        exhausted_sources = stats.exhausted_sources,
        rows_per_sec = rows_per_sec(stats.rows, duration_ms),
        "ordered scan finished"
    );
}

#[cfg(not(feature = "tracing"))]
pub fn record_scan(_stats: &MergeStats, _duration_ms: u64) {}

pub fn rows_per_sec(rows: u64, duration_ms: u64) -> u64 {
    rows.saturating_mul(1000) / duration_ms.max(1)
}
