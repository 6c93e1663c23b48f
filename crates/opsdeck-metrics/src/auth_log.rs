use anyhow::Result;
use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveTime, TimeZone, Utc};
use serde::Deserialize;
use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::Path;

/// Peak failed SSH login count from a single source at or after
/// `since`, parsed from a syslog-format auth log.
///
/// `Ok(None)` when the log file does not exist. Lines that do not
/// parse are skipped; auth logs routinely interleave unrelated
/// daemons.
pub fn max_failures_per_source(path: &Path, since: DateTime<Utc>) -> Result<Option<f64>> {
    let text = match std::fs::read_to_string(path) {
        Ok(text) => text,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };

    let now = Utc::now();
    let mut per_source: HashMap<&str, u64> = HashMap::new();
    for line in text.lines() {
        let Some((at, source)) = parse_failed_password(line, now) else {
            continue;
        };
        if at >= since {
            *per_source.entry(source).or_default() += 1;
        }
    }
    Ok(per_source.values().max().map(|&n| n as f64))
}

/// One line of the panel's login audit log.
#[derive(Debug, Deserialize)]
struct PanelLoginRecord {
    timestamp: DateTime<Utc>,
    ip: String,
    success: bool,
}

/// Peak failed panel login count from a single IP at or after `since`,
/// from the JSON-lines audit log the panel's auth layer appends to.
pub fn max_panel_failures_per_ip(path: &Path, since: DateTime<Utc>) -> Result<Option<f64>> {
    let text = match std::fs::read_to_string(path) {
        Ok(text) => text,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };

    let mut per_ip: HashMap<String, u64> = HashMap::new();
    for line in text.lines() {
        if line.trim().is_empty() {
            continue;
        }
        let record: PanelLoginRecord = match serde_json::from_str(line) {
            Ok(record) => record,
            Err(e) => {
                tracing::warn!(error = %e, "Malformed panel audit record");
                continue;
            }
        };
        if !record.success && record.timestamp >= since {
            *per_ip.entry(record.ip).or_default() += 1;
        }
    }
    Ok(per_ip.values().max().map(|&n| n as f64))
}

/// Extracts `(timestamp, source)` from an sshd "Failed password" line,
/// e.g. `Aug 25 14:03:11 web1 sshd[912]: Failed password for invalid
/// user admin from 203.0.113.7 port 41952 ssh2`.
fn parse_failed_password(line: &str, now: DateTime<Utc>) -> Option<(DateTime<Utc>, &str)> {
    if !line.contains("sshd") || !line.contains("Failed password") {
        return None;
    }
    let at = parse_syslog_timestamp(line, now)?;
    let rest = line.split(" from ").nth(1)?;
    let source = rest.split_whitespace().next()?;
    Some((at, source))
}

/// Syslog timestamps carry no year; assume the current one and roll
/// back a year for entries that would otherwise sit in the future
/// (December logs read in January).
fn parse_syslog_timestamp(line: &str, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
    let mut fields = line.split_whitespace();
    let month = match fields.next()? {
        "Jan" => 1,
        "Feb" => 2,
        "Mar" => 3,
        "Apr" => 4,
        "May" => 5,
        "Jun" => 6,
        "Jul" => 7,
        "Aug" => 8,
        "Sep" => 9,
        "Oct" => 10,
        "Nov" => 11,
        "Dec" => 12,
        _ => return None,
    };
    let day: u32 = fields.next()?.parse().ok()?;
    let time = NaiveTime::parse_from_str(fields.next()?, "%H:%M:%S").ok()?;

    let date = NaiveDate::from_ymd_opt(now.year(), month, day)?;
    let at = Utc.from_utc_datetime(&date.and_time(time));
    if at > now + Duration::days(1) {
        let date = NaiveDate::from_ymd_opt(now.year() - 1, month, day)?;
        return Some(Utc.from_utc_datetime(&date.and_time(time)));
    }
    Some(at)
}
