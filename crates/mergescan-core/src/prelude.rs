//! Convenient re-exports for downstream crates.

pub use crate::config::ScanConfig;
pub use crate::error::{Error, Result};
pub use crate::hash::Hash256;
pub use crate::manifest::{ManifestId, ScanManifest};
pub use crate::schema::{DataType, Field, PhysicalType, Schema};
pub use crate::types::{Column, RowBatch, Scalar};
