use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::path::Path;

/// One backup job's status file, written by the panel's backup runner.
#[derive(Debug, Deserialize)]
pub struct BackupStatus {
    pub status: String,
    pub finished_at: DateTime<Utc>,
}

/// Number of jobs under `dir` that failed at or after `since`.
///
/// A missing directory means the backup subsystem is not set up, so
/// there is no reading. Malformed status files are logged and skipped.
pub fn failed_count(dir: &Path, since: DateTime<Utc>) -> Result<Option<f64>> {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };

    let mut failed = 0u64;
    for entry in entries.flatten() {
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) != Some("json") {
            continue;
        }
        let status: BackupStatus = match std::fs::read_to_string(&path)
            .map_err(anyhow::Error::from)
            .and_then(|text| serde_json::from_str(&text).map_err(anyhow::Error::from))
        {
            Ok(status) => status,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Malformed backup status file");
                continue;
            }
        };
        if status.status == "failed" && status.finished_at >= since {
            failed += 1;
        }
    }
    Ok(Some(failed as f64))
}
