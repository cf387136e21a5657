//! Typed errors for snapshot loading.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Failure to load a snapshot document for comparison.
///
/// Comparator inputs are all-or-nothing: any read or parse problem aborts
/// the diff instead of producing a partial result.
#[derive(Debug, Error)]
pub enum SnapshotLoadError {
    #[error("failed to read snapshot {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("invalid JSON in snapshot {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("snapshot {} is not a top-level mapping", path.display())]
    NotAMapping { path: PathBuf },
}

impl SnapshotLoadError {
    /// The snapshot path the error refers to.
    pub fn path(&self) -> &PathBuf {
        match self {
            SnapshotLoadError::Read { path, .. }
            | SnapshotLoadError::Parse { path, .. }
            | SnapshotLoadError::NotAMapping { path } => path,
        }
    }
}
