#![forbid(unsafe_code)]
//! mergescan-operators: bind-time schema reconciliation and the ordered
//! multi-source merge scan.
//!
//! Design intent:
//! - `reconcile` runs once per query and produces an immutable `BindData`.
//! - `MergeScan` is created per execution from that bind output and owns
//!   every decoder, batch and cursor it touches. It is driven by one thread.
//! - The merge never materializes more than one decoded batch per source.

pub mod active;
pub mod merge;
pub mod output;
pub mod reader_set;
pub mod reconcile;
pub mod traits;
pub mod winner;

pub use merge::{MergeScan, MergeStats};
pub use reconcile::{reconcile, BindData, SourceBinding};
pub use traits::{BatchStream, OpError};
