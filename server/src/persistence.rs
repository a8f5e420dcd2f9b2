//! Snapshot persistence with atomic replace and corruption quarantine.
//!
//! A save writes the full snapshot to `<file>.tmp`, syncs it, then renames it
//! over the canonical file, so the previous snapshot survives any failure
//! before the rename. A canonical file that fails to parse is moved aside as
//! `<file>.corrupted_<millis>` and treated as absent.

use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use log::{error, info, warn};
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};

use crate::entity::{MonsterRecord, PlayerRecord, WorldObject};
use crate::error::PersistenceError;
use crate::utils::get_timestamp;

pub const SNAPSHOT_VERSION: u32 = 1;

/// Durable world aggregate. Missing fields default and unknown fields are
/// ignored, so older and newer files both load. A list entry that cannot be
/// read is dropped on its own.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Snapshot {
    pub version: u32,
    pub saved_at: u64,
    pub next_monster_id: u64,
    #[serde(deserialize_with = "skip_unreadable")]
    pub objects: Vec<WorldObject>,
    #[serde(deserialize_with = "skip_unreadable")]
    pub players: Vec<PlayerRecord>,
    #[serde(deserialize_with = "skip_unreadable")]
    pub monsters: Vec<MonsterRecord>,
}

fn skip_unreadable<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let entries = Vec::<serde_json::Value>::deserialize(deserializer)?;
    Ok(entries
        .into_iter()
        .filter_map(|entry| match serde_json::from_value(entry) {
            Ok(item) => Some(item),
            Err(e) => {
                warn!("Skipping unreadable snapshot entry: {}", e);
                None
            }
        })
        .collect())
}

pub struct SnapshotStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl SnapshotStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn sibling(&self, suffix: &str) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "world_save.json".into());
        name.push(suffix);
        self.path.with_file_name(name)
    }

    pub fn temp_path(&self) -> PathBuf {
        self.sibling(".tmp")
    }

    /// Writes the snapshot atomically. Concurrent callers are serialised.
    pub fn save(&self, snapshot: &Snapshot) -> Result<(), PersistenceError> {
        let _guard = self.write_lock.lock();
        let bytes = serde_json::to_vec_pretty(snapshot)?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| io_error(parent, e))?;
        }

        let tmp = self.temp_path();
        write_synced(&tmp, &bytes).map_err(|e| io_error(&tmp, e))?;
        fs::rename(&tmp, &self.path).map_err(|e| io_error(&self.path, e))?;

        info!(
            "Saved {} objects, {} players, {} monsters to {}",
            snapshot.objects.len(),
            snapshot.players.len(),
            snapshot.monsters.len(),
            self.path.display()
        );
        Ok(())
    }

    /// Reads the canonical snapshot. Absent, empty, unreadable and corrupt
    /// files all yield `None`; corrupt ones are quarantined first.
    pub fn load(&self) -> Option<Snapshot> {
        let bytes = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                info!("No snapshot at {}", self.path.display());
                return None;
            }
            Err(e) => {
                error!("Failed to read snapshot {}: {}", self.path.display(), e);
                return None;
            }
        };

        if bytes.iter().all(u8::is_ascii_whitespace) {
            info!("Snapshot {} is empty", self.path.display());
            return None;
        }

        match serde_json::from_slice::<Snapshot>(&bytes) {
            Ok(snapshot) => Some(snapshot),
            Err(e) => {
                warn!("Snapshot {} is corrupt: {}", self.path.display(), e);
                match self.quarantine() {
                    Ok(moved) => warn!("Moved corrupt snapshot to {}", moved.display()),
                    Err(e) => error!("{}", e),
                }
                None
            }
        }
    }

    /// Renames the canonical file aside with a timestamp suffix.
    pub fn quarantine(&self) -> Result<PathBuf, PersistenceError> {
        let target = self.sibling(&format!(".corrupted_{}", get_timestamp()));
        fs::rename(&self.path, &target).map_err(|e| io_error(&self.path, e))?;
        Ok(target)
    }
}

fn write_synced(path: &Path, bytes: &[u8]) -> io::Result<()> {
    let mut file = File::create(path)?;
    file.write_all(bytes)?;
    file.sync_all()
}

fn io_error(path: &Path, source: io::Error) -> PersistenceError {
    PersistenceError::Io {
        path: path.to_path_buf(),
        source,
    }
}
