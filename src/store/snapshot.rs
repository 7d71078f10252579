//! Snapshot File Store
//!
//! Keeps the world in one JSON document with two siblings:
//!
//! ```text
//! state.json         current snapshot
//! state.json.backup  last snapshot that parsed before the current one
//! state.json.new     exists only while a save is in flight
//! ```
//!
//! A save writes and syncs `.new`, moves the current primary to `.backup`
//! only if it still parses, then renames `.new` over the primary. A corrupt
//! primary is therefore never rotated over a good backup.

use std::ffi::OsString;
use std::fs::{self, File};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::core::hash::{hash_bytes, short_hex, StateHash};
use crate::core::time::Timestamp;
use crate::game::state::WorldState;
use crate::store::StoreError;

/// Suffix of the last-known-good copy.
pub const BACKUP_SUFFIX: &str = ".backup";

/// Suffix of the in-flight write.
pub const TEMP_SUFFIX: &str = ".new";

/// Where a loaded world came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SnapshotSource {
    /// The primary document parsed
    Primary,
    /// Primary missing or corrupt; the backup parsed
    Backup,
    /// Nothing usable on disk; a new default world
    Fresh,
}

/// Summary of a completed save.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SaveReport {
    /// Digest of the bytes now in the primary
    pub hash: StateHash,
    /// Bytes written
    pub bytes: usize,
    /// Whether the previous primary was moved to the backup slot
    pub rotated_backup: bool,
}

/// Why a snapshot file could not be used.
#[derive(Debug, Error)]
enum ReadFailure {
    #[error("missing")]
    Missing,
    #[error("read failed: {0}")]
    Io(std::io::Error),
    #[error("parse failed: {0}")]
    Parse(serde_json::Error),
}

/// File-backed world storage.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SnapshotStore {
    path: PathBuf,
    backup_path: PathBuf,
    temp_path: PathBuf,
}

impl SnapshotStore {
    /// Store rooted at `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        Self {
            backup_path: with_suffix(&path, BACKUP_SUFFIX),
            temp_path: with_suffix(&path, TEMP_SUFFIX),
            path,
        }
    }

    /// Primary document path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Backup document path.
    pub fn backup_path(&self) -> &Path {
        &self.backup_path
    }

    /// In-flight write path.
    pub fn temp_path(&self) -> &Path {
        &self.temp_path
    }

    /// Load the world. Never fails.
    ///
    /// Falls back to the backup, then to a fresh world created at `now`.
    /// A fresh world is not written until the next save.
    pub fn load(&self, now: Timestamp) -> WorldState {
        self.load_with_source(now).0
    }

    /// Load the world and report which file (if any) supplied it.
    pub fn load_with_source(&self, now: Timestamp) -> (WorldState, SnapshotSource) {
        match read_snapshot(&self.path) {
            Ok(state) => return (state, SnapshotSource::Primary),
            Err(ReadFailure::Missing) => {
                debug!("No primary snapshot at {}", self.path.display());
            }
            Err(failure) => {
                warn!("Primary snapshot {} unusable: {}", self.path.display(), failure);
            }
        }

        match read_snapshot(&self.backup_path) {
            Ok(state) => {
                warn!("Restored world from backup {}", self.backup_path.display());
                return (state, SnapshotSource::Backup);
            }
            Err(ReadFailure::Missing) => {}
            Err(failure) => {
                warn!("Backup snapshot {} unusable: {}", self.backup_path.display(), failure);
            }
        }

        info!("Starting a fresh world for {}", self.path.display());
        (WorldState::new(now), SnapshotSource::Fresh)
    }

    /// Persist `state` as the new primary.
    ///
    /// On error the previous primary is left where it was and the
    /// in-flight file is removed.
    pub fn save(&self, state: &WorldState) -> Result<SaveReport, StoreError> {
        let bytes = serde_json::to_vec_pretty(state)?;
        let hash = hash_bytes(&bytes);

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|source| StoreError::Io {
                op: "create dir",
                path: parent.to_path_buf(),
                source,
            })?;
        }

        if let Err(err) = self.write_temp(&bytes) {
            self.discard_temp();
            return Err(err);
        }

        let rotated_backup = read_snapshot(&self.path).is_ok();
        if rotated_backup {
            if let Err(source) = fs::rename(&self.path, &self.backup_path) {
                self.discard_temp();
                return Err(StoreError::Io {
                    op: "rotate backup",
                    path: self.path.clone(),
                    source,
                });
            }
        } else if self.path.exists() {
            warn!(
                "Primary snapshot {} is corrupt; keeping existing backup",
                self.path.display()
            );
        }

        if let Err(source) = fs::rename(&self.temp_path, &self.path) {
            self.discard_temp();
            return Err(StoreError::Io {
                op: "rename snapshot",
                path: self.temp_path.clone(),
                source,
            });
        }

        debug!(
            "Saved snapshot {} ({} bytes, hash {}, rotated={})",
            self.path.display(),
            bytes.len(),
            short_hex(&hash),
            rotated_backup
        );

        Ok(SaveReport {
            hash,
            bytes: bytes.len(),
            rotated_backup,
        })
    }

    fn write_temp(&self, bytes: &[u8]) -> Result<(), StoreError> {
        let mut file = File::create(&self.temp_path).map_err(|source| self.temp_error("create temp", source))?;
        file.write_all(bytes).map_err(|source| self.temp_error("write temp", source))?;
        file.sync_all().map_err(|source| self.temp_error("sync temp", source))?;
        Ok(())
    }

    fn temp_error(&self, op: &'static str, source: std::io::Error) -> StoreError {
        StoreError::Io {
            op,
            path: self.temp_path.clone(),
            source,
        }
    }

    fn discard_temp(&self) {
        if let Err(err) = fs::remove_file(&self.temp_path) {
            if err.kind() != ErrorKind::NotFound {
                warn!("Could not remove {}: {}", self.temp_path.display(), err);
            }
        }
    }
}

/// Read and parse one snapshot file.
fn read_snapshot(path: &Path) -> Result<WorldState, ReadFailure> {
    let bytes = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(err) if err.kind() == ErrorKind::NotFound => return Err(ReadFailure::Missing),
        Err(err) => return Err(ReadFailure::Io(err)),
    };
    serde_json::from_slice(&bytes).map_err(ReadFailure::Parse)
}

/// `state.json` + `.backup` -> `state.json.backup`
fn with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(suffix);
    PathBuf::from(name)
}
