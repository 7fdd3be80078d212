//! Scan configuration that downstream crates can serialize/deserialize.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    /// Rows per decoded batch requested from each source file.
    pub batch_size: usize,

    /// Initial row capacity of an output batch; doubles as rows are appended.
    pub base_output_capacity: usize,

    /// Hard cap on rows produced by one tournament-path call.
    pub max_rows_per_call: usize,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            batch_size: 2048,
            base_output_capacity: 1024,
            max_rows_per_call: 2048,
        }
    }
}

impl ScanConfig {
    /// Create a config from environment variables, falling back to defaults.
    ///
    /// Environment variables:
    /// - `MERGESCAN_BATCH_SIZE`: rows per decoded source batch
    /// - `MERGESCAN_BASE_OUTPUT_CAPACITY`: initial output capacity
    /// - `MERGESCAN_MAX_ROWS_PER_CALL`: per-call output row cap
    pub fn from_env() -> Self {
        let mut cfg = Self::default();

        if let Ok(s) = std::env::var("MERGESCAN_BATCH_SIZE") {
            if let Ok(v) = s.parse::<usize>() {
                cfg.batch_size = v;
            }
        }

        if let Ok(s) = std::env::var("MERGESCAN_BASE_OUTPUT_CAPACITY") {
            if let Ok(v) = s.parse::<usize>() {
                cfg.base_output_capacity = v;
            }
        }

        if let Ok(s) = std::env::var("MERGESCAN_MAX_ROWS_PER_CALL") {
            if let Ok(v) = s.parse::<usize>() {
                cfg.max_rows_per_call = v;
            }
        }

        cfg
    }

    pub fn validate(&self) -> Result<()> {
        if self.batch_size == 0 {
            return Err(Error::Config("batch_size must be greater than zero".into()));
        }
        if self.base_output_capacity == 0 {
            return Err(Error::Config(
                "base_output_capacity must be greater than zero".into(),
            ));
        }
        if self.max_rows_per_call == 0 {
            return Err(Error::Config(
                "max_rows_per_call must be greater than zero".into(),
            ));
        }
        if self.base_output_capacity > self.max_rows_per_call {
            return Err(Error::Config(format!(
                "base_output_capacity ({}) exceeds max_rows_per_call ({})",
                self.base_output_capacity, self.max_rows_per_call
            )));
        }
        Ok(())
    }
}
