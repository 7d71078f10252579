//! Persistence Layer
//!
//! Crash-tolerant storage for the single world snapshot.

pub mod snapshot;

use std::path::PathBuf;

use thiserror::Error;

pub use snapshot::{SnapshotStore, SnapshotSource, SaveReport};

/// Storage errors.
///
/// Only saving can fail; loading always yields a usable world.
#[derive(Debug, Error)]
pub enum StoreError {
    /// World could not be encoded.
    #[error("serialize failed: {0}")]
    Serialize(#[from] serde_json::Error),

    /// File-system operation failed.
    #[error("{op} {} failed: {source}", .path.display())]
    Io {
        /// What was being attempted
        op: &'static str,
        /// File involved
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },
}
