use anyhow::Result;
use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};
use x509_parser::pem::Pem;

/// Days until the soonest-expiring certificate under `dirs`, fractional.
///
/// Scans recursively for `.pem`/`.crt` files; an unparseable file is
/// logged and skipped, never fatal. `None` when no certificate is
/// found at all. An already expired certificate yields a negative
/// reading, which still compares correctly against any bound.
pub fn min_expiry_days(dirs: &[PathBuf], now: DateTime<Utc>) -> Result<Option<f64>> {
    let mut min: Option<f64> = None;
    for dir in dirs {
        for path in pem_files(dir) {
            match file_expiry(&path, now) {
                Ok(Some(days)) => {
                    min = Some(min.map_or(days, |m: f64| m.min(days)));
                }
                Ok(None) => {}
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "Unreadable certificate");
                }
            }
        }
    }
    Ok(min)
}

fn pem_files(dir: &Path) -> Vec<PathBuf> {
    let mut files = Vec::new();
    let Ok(entries) = std::fs::read_dir(dir) else {
        return files;
    };
    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            files.extend(pem_files(&path));
        } else if matches!(
            path.extension().and_then(|e| e.to_str()),
            Some("pem" | "crt")
        ) {
            files.push(path);
        }
    }
    files
}

/// Smallest days-to-expiry across every certificate in one PEM file.
fn file_expiry(path: &Path, now: DateTime<Utc>) -> Result<Option<f64>> {
    let data = std::fs::read(path)?;
    let mut min: Option<f64> = None;
    for pem in Pem::iter_from_buffer(&data) {
        let pem = pem?;
        // Private keys share the .pem extension; skip non-certificate blocks.
        if pem.label != "CERTIFICATE" {
            continue;
        }
        let cert = pem.parse_x509()?;
        let not_after = cert.validity().not_after.timestamp();
        let days = (not_after - now.timestamp()) as f64 / 86_400.0;
        min = Some(min.map_or(days, |m: f64| m.min(days)));
    }
    Ok(min)
}
