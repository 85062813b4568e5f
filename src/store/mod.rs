//! Run-to-run state.
//!
//! - snapshot: the flat URL list of the last successful run
//! - diff: added/removed sets between two snapshots

pub mod diff;
pub mod snapshot;

pub use diff::{diff, UrlDiff};
pub use snapshot::SnapshotStore;
