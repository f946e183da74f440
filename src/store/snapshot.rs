//! Snapshot persistence for the in-process store.
//!
//! Snapshots are written atomically using a write-to-temp-then-rename pattern:
//! 1. Write to `<path>.tmp`
//! 2. fsync the file
//! 3. Rename to `<path>`
//! 4. fsync the directory
//!
//! Readers therefore see either the old or the new snapshot, never a
//! partial write.

use std::collections::{BTreeMap, BTreeSet};
use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use super::{Result, StoreError};
use crate::types::{PrNumber, QueueItem};

/// Current schema version. Increment when making breaking changes.
pub const SCHEMA_VERSION: u32 = 1;

/// On-disk form of the store's lists and membership sets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreSnapshot {
    pub schema_version: u32,

    pub saved_at: DateTime<Utc>,

    /// Ordered queues keyed by `owner:repo:branch`.
    pub lists: BTreeMap<String, Vec<QueueItem>>,

    /// Membership sets keyed by `owner:repo`.
    pub sets: BTreeMap<String, BTreeSet<PrNumber>>,
}

impl StoreSnapshot {
    pub fn new(
        lists: BTreeMap<String, Vec<QueueItem>>,
        sets: BTreeMap<String, BTreeSet<PrNumber>>,
    ) -> Self {
        StoreSnapshot {
            schema_version: SCHEMA_VERSION,
            saved_at: Utc::now(),
            lists,
            sets,
        }
    }
}

/// Saves a snapshot atomically to disk.
pub fn save_snapshot_atomic(path: &Path, snapshot: &StoreSnapshot) -> Result<()> {
    write_json_atomic(path, snapshot)
}

/// Loads a snapshot, returning `None` if the file doesn't exist.
///
/// Malformed JSON and schema mismatches are propagated.
pub fn try_load_snapshot(path: &Path) -> Result<Option<StoreSnapshot>> {
    let Some(snapshot) = try_read_json::<StoreSnapshot>(path)? else {
        return Ok(None);
    };
    check_schema(snapshot.schema_version)?;
    Ok(Some(snapshot))
}

pub fn check_schema(got: u32) -> Result<()> {
    if got != SCHEMA_VERSION {
        return Err(StoreError::SchemaMismatch {
            expected: SCHEMA_VERSION,
            got,
        });
    }
    Ok(())
}

/// Writes `value` as JSON to `path`: temp file, fsync, rename, fsync dir.
pub fn write_json_atomic<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let tmp_path = path.with_extension("json.tmp");
    let bytes = serde_json::to_vec_pretty(value)?;

    {
        let mut file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&tmp_path)?;
        file.write_all(&bytes)?;
        file.sync_all()?;
    }

    std::fs::rename(&tmp_path, path)?;

    if let Some(parent) = path.parent() {
        fsync_dir(parent)?;
    }

    Ok(())
}

/// Reads JSON from `path`, returning `None` if the file doesn't exist.
pub fn try_read_json<T: DeserializeOwned>(path: &Path) -> Result<Option<T>> {
    let bytes = match std::fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    Ok(Some(serde_json::from_slice(&bytes)?))
}

/// Syncs a directory so a rename inside it survives power loss.
fn fsync_dir(dir_path: &Path) -> io::Result<()> {
    let dir = File::open(dir_path)?;
    dir.sync_all()
}
