//! Write-ahead log for atomic vault updates (§4.9).
//!
//! Every [`crate::vault::Vault::update`] writes the new vault content to a
//! staged sidecar file, records a WAL entry describing that staging, then
//! only once the staged file is durably on disk does it flip the WAL status
//! to `Ready` and rename the staged file into place. If the process dies
//! mid-update, [`recover`] replays the WAL on the next vault open and
//! either finishes the rename (roll-forward) or discards the staged file
//! (roll-back), so a reader never observes a half-written vault.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::error::Result;

/// Where a WAL record sits in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WalStatus {
    /// The staged file is being written; it may not yet reflect a
    /// consistent vault.
    Start,
    /// The staged file is complete and hashed; the rename into place has
    /// not yet been observed to finish.
    Ready,
    /// The rename succeeded. A `Complete` record lingering on disk means
    /// only that cleanup itself was interrupted.
    Complete,
}

/// A write-ahead-log record for one in-flight vault update.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WalRecord {
    pub id: Uuid,
    pub vault_path: PathBuf,
    pub staged_path: PathBuf,
    pub backup_path: PathBuf,
    pub status: WalStatus,
    /// SHA-256 of the staged file's content, recorded once staging
    /// completes. `None` while `status == Start`.
    pub staged_hash: Option<String>,
    pub created_at: DateTime<Utc>,
    pub pid: u32,
}

impl WalRecord {
    fn wal_file_path(&self) -> PathBuf {
        wal_file_path_for(&self.vault_path, self.id)
    }

    fn persist(&self) -> Result<()> {
        let bytes = serde_json::to_vec_pretty(self).expect("WalRecord is always serializable");
        fs::write(self.wal_file_path(), bytes)?;
        Ok(())
    }
}

fn wal_file_path_for(vault_path: &Path, id: Uuid) -> PathBuf {
    let mut os_string = vault_path.as_os_str().to_owned();
    os_string.push(format!(".wal-{id}.json"));
    PathBuf::from(os_string)
}

fn backup_path_for(vault_path: &Path) -> PathBuf {
    let mut os_string = vault_path.as_os_str().to_owned();
    os_string.push(".bak");
    PathBuf::from(os_string)
}

fn staged_path_for(vault_path: &Path, id: Uuid) -> PathBuf {
    let mut os_string = vault_path.as_os_str().to_owned();
    os_string.push(format!(".staged-{id}"));
    PathBuf::from(os_string)
}

/// Begins a new update: writes `new_content` to a staged sidecar, records a
/// `Start` WAL entry, then advances it to `Ready` once the staged file's
/// hash is recorded.
pub fn begin(vault_path: &Path, new_content: &[u8]) -> Result<WalRecord> {
    let id = Uuid::new_v4();
    let staged_path = staged_path_for(vault_path, id);
    let backup_path = backup_path_for(vault_path);

    let mut record = WalRecord {
        id,
        vault_path: vault_path.to_path_buf(),
        staged_path: staged_path.clone(),
        backup_path,
        status: WalStatus::Start,
        staged_hash: None,
        created_at: Utc::now(),
        pid: std::process::id(),
    };
    record.persist()?;

    fs::write(&staged_path, new_content)?;
    let hash = hex_sha256(new_content);

    record.staged_hash = Some(hash);
    record.status = WalStatus::Ready;
    record.persist()?;

    Ok(record)
}

/// Commits a `Ready` record: backs up the existing vault file (if any),
/// renames the staged file into place, marks the record `Complete`, and
/// removes both the WAL record and the backup.
pub fn commit(mut record: WalRecord) -> Result<()> {
    if record.vault_path.exists() {
        fs::rename(&record.vault_path, &record.backup_path)?;
    }
    fs::rename(&record.staged_path, &record.vault_path)?;

    record.status = WalStatus::Complete;
    record.persist()?;

    let _ = fs::remove_file(&record.backup_path);
    let _ = fs::remove_file(record.wal_file_path());
    Ok(())
}

/// Scans `dir` for WAL records belonging to `vault_path` and replays any
/// that were left incomplete by a prior crash.
///
/// - `Start`: the staged file was never confirmed complete. Discarded; the
///   vault file (and its backup, if the crash happened mid-rename-back) are
///   left untouched.
/// - `Ready`: if the staged file exists and its hash matches the recorded
///   hash, the update is finished by rolling forward (renaming the staged
///   file into place), even if a `.bak` also exists from a prior attempt —
///   a verified-intact staged file is stronger evidence of the intended
///   final state than an old backup. Otherwise, the vault is rolled back to
///   its backup if one exists.
/// - `Complete`: the update already finished; only cleanup remained. The
///   record and any leftover backup/staged files are removed.
pub fn recover(dir: &Path, vault_path: &Path, stale_after: Duration) -> Result<()> {
    let Ok(entries) = fs::read_dir(dir) else {
        return Ok(());
    };

    for entry in entries.flatten() {
        let path = entry.path();
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        if !name.contains(".wal-") || !name.ends_with(".json") {
            continue;
        }

        let Ok(bytes) = fs::read(&path) else {
            continue;
        };
        let Ok(record) = serde_json::from_slice::<WalRecord>(&bytes) else {
            let _ = fs::remove_file(&path);
            continue;
        };
        if record.vault_path != vault_path {
            continue;
        }

        replay(&record, stale_after)?;
    }

    Ok(())
}

fn replay(record: &WalRecord, stale_after: Duration) -> Result<()> {
    match record.status {
        WalStatus::Complete => {
            let _ = fs::remove_file(&record.backup_path);
            let _ = fs::remove_file(&record.staged_path);
            let _ = fs::remove_file(record.wal_file_path());
        }
        WalStatus::Ready => {
            let staged_intact = record
                .staged_hash
                .as_deref()
                .is_some_and(|expected| staged_file_matches(&record.staged_path, expected));

            if staged_intact {
                if record.vault_path.exists() {
                    let _ = fs::rename(&record.vault_path, &record.backup_path);
                }
                fs::rename(&record.staged_path, &record.vault_path)?;
                let _ = fs::remove_file(&record.backup_path);
            } else if record.backup_path.exists() {
                let _ = fs::rename(&record.backup_path, &record.vault_path);
            }
            let _ = fs::remove_file(&record.staged_path);
            let _ = fs::remove_file(record.wal_file_path());
        }
        WalStatus::Start => {
            if !is_stale(record, stale_after) {
                // A still-live writer owns this record; leave it alone.
                return Ok(());
            }
            let _ = fs::remove_file(&record.staged_path);
            let _ = fs::remove_file(record.wal_file_path());
        }
    }
    Ok(())
}

fn is_stale(record: &WalRecord, stale_after: Duration) -> bool {
    let age = Utc::now().signed_duration_since(record.created_at);
    let age_secs = age.num_seconds().max(0) as u64;
    age_secs > stale_after.as_secs() && !process_is_alive(record.pid)
}

#[cfg(target_os = "linux")]
fn process_is_alive(pid: u32) -> bool {
    Path::new(&format!("/proc/{pid}")).exists()
}

#[cfg(not(target_os = "linux"))]
fn process_is_alive(pid: u32) -> bool {
    // Without a portable process-liveness check, treat the writer as alive
    // and rely on `stale_after` alone.
    let _ = pid;
    true
}

fn staged_file_matches(path: &Path, expected_hash: &str) -> bool {
    match fs::read(path) {
        Ok(bytes) => hex_sha256(&bytes) == expected_hash,
        Err(_) => false,
    }
}

fn hex_sha256(bytes: &[u8]) -> String {
    let digest = Sha256::digest(bytes);
    digest.iter().map(|b| format!("{b:02x}")).collect()
}
