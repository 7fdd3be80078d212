#![forbid(unsafe_code)]
//! mergescan-exec: the table-function surface over the merge scan.
//!
//! `Engine::bind` reconciles schemas once, `Engine::scan` creates one
//! independent merge scan per execution, and `Engine::run` drains a scan into
//! a sink and returns a `ScanManifest`.

pub mod metrics;
pub mod replay;
pub mod runtime;

pub use runtime::{Engine, ExecError};
