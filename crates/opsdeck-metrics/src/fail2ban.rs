use crate::services::wait_with_timeout;
use anyhow::{Context, Result};
use std::io::ErrorKind;
use std::io::Read;
use std::process::{Command, Stdio};
use std::time::Duration;

/// Currently banned source count for one fail2ban jail.
///
/// `Ok(None)` when fail2ban is not installed, its daemon is not
/// running, or the jail does not exist; callers then fall back to raw
/// log parsing.
pub fn banned_count(jail: &str, timeout_secs: u64) -> Result<Option<f64>> {
    let spawned = Command::new("fail2ban-client")
        .arg("status")
        .arg(jail)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn();

    let mut child = match spawned {
        Ok(child) => child,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e).context("failed to spawn fail2ban-client"),
    };

    let status = wait_with_timeout(&mut child, Duration::from_secs(timeout_secs))
        .context("fail2ban probe failed")?;
    match status {
        Some(status) if status.success() => {}
        Some(_) => return Ok(None),
        None => {
            tracing::warn!(jail, "fail2ban probe timed out");
            return Ok(None);
        }
    }

    let mut output = String::new();
    if let Some(stdout) = child.stdout.as_mut() {
        stdout.read_to_string(&mut output)?;
    }
    Ok(parse_banned_count(&output))
}

/// Pulls the "Currently banned" figure out of `fail2ban-client status`
/// output.
pub(crate) fn parse_banned_count(output: &str) -> Option<f64> {
    for line in output.lines() {
        let Some((label, value)) = line.rsplit_once(':') else {
            continue;
        };
        if label.contains("Currently banned") {
            return value.trim().parse::<f64>().ok();
        }
    }
    None
}
