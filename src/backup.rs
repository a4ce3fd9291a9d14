//! Snapshot uploads to a backup target with count-based retention.

use crate::models::AppData;
use chrono::{DateTime, Local, NaiveDateTime};
use std::path::PathBuf;
use std::sync::Arc;
use std::{fs, io};
use tracing::{info, warn};

const PREFIX: &str = "habit-tracker-backup-";
const SUFFIX: &str = ".json";
const STAMP: &str = "%Y-%m-%dT%H-%M-%S%.3f";
const SECONDS_STAMP: &str = "%Y-%m-%dT%H-%M-%S";

#[derive(Debug, thiserror::Error)]
pub enum BackupError {
    #[error("backup is not configured")]
    NotConfigured,
    #[error("backup io error: {0}")]
    Io(#[from] io::Error),
    #[error("failed to serialize snapshot: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("backup task failed: {0}")]
    Task(String),
}

/// Remote file storage holding backup snapshots.
pub trait BackupTarget: Send + Sync {
    fn list_backup_files(&self) -> Result<Vec<String>, BackupError>;
    fn upload_snapshot(&self, name: &str, payload: &str) -> Result<(), BackupError>;
    fn delete_file(&self, name: &str) -> Result<(), BackupError>;
}

/// Backup target over a plain directory, e.g. a mounted WebDAV share.
pub struct DirectoryBackup {
    dir: PathBuf,
}

impl DirectoryBackup {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

impl BackupTarget for DirectoryBackup {
    fn list_backup_files(&self) -> Result<Vec<String>, BackupError> {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(err.into()),
        };
        let mut names = Vec::new();
        for entry in entries {
            let entry = entry?;
            if entry.file_type()?.is_file() {
                names.push(entry.file_name().to_string_lossy().into_owned());
            }
        }
        Ok(names)
    }

    fn upload_snapshot(&self, name: &str, payload: &str) -> Result<(), BackupError> {
        fs::create_dir_all(&self.dir)?;
        fs::write(self.dir.join(name), payload)?;
        Ok(())
    }

    fn delete_file(&self, name: &str) -> Result<(), BackupError> {
        fs::remove_file(self.dir.join(name))?;
        Ok(())
    }
}

pub fn backup_file_name(at: DateTime<Local>) -> String {
    format!("{PREFIX}{}{SUFFIX}", at.format(STAMP))
}

/// The timestamp embedded in a backup file name, if the name matches.
pub fn backup_timestamp(name: &str) -> Option<NaiveDateTime> {
    let stamp = name.strip_prefix(PREFIX)?.strip_suffix(SUFFIX)?;
    NaiveDateTime::parse_from_str(stamp, STAMP)
        .or_else(|_| NaiveDateTime::parse_from_str(stamp, SECONDS_STAMP))
        .ok()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackupReport {
    pub file: String,
    pub deleted: usize,
    pub failed_deletes: usize,
}

/// Uploads a snapshot, then deletes all but the `keep` newest backups.
/// Rotation problems are logged and never fail the backup.
pub fn run_backup(
    target: &dyn BackupTarget,
    data: &AppData,
    keep: usize,
    at: DateTime<Local>,
) -> Result<BackupReport, BackupError> {
    let file = backup_file_name(at);
    let payload = serde_json::to_string_pretty(data)?;
    target.upload_snapshot(&file, &payload)?;
    info!("uploaded backup {file}");

    let mut report = BackupReport {
        file,
        deleted: 0,
        failed_deletes: 0,
    };

    let names = match target.list_backup_files() {
        Ok(names) => names,
        Err(err) => {
            warn!("failed to list backups for rotation: {err}");
            return Ok(report);
        }
    };

    let mut backups: Vec<(NaiveDateTime, String)> = names
        .into_iter()
        .filter_map(|name| backup_timestamp(&name).map(|stamp| (stamp, name)))
        .collect();
    backups.sort_by(|a, b| b.cmp(a));

    for (_, name) in backups.into_iter().skip(keep.max(1)) {
        match target.delete_file(&name) {
            Ok(()) => report.deleted += 1,
            Err(err) => {
                warn!("failed to delete old backup {name}: {err}");
                report.failed_deletes += 1;
            }
        }
    }

    Ok(report)
}

/// Runs [`run_backup`] on the blocking pool.
pub async fn spawn_backup(
    target: Arc<dyn BackupTarget>,
    data: AppData,
    keep: usize,
) -> Result<BackupReport, BackupError> {
    tokio::task::spawn_blocking(move || run_backup(target.as_ref(), &data, keep, Local::now()))
        .await
        .map_err(|err| BackupError::Task(err.to_string()))?
}
