use anyhow::{Context, Result};
use std::io::ErrorKind;
use std::process::{Command, Stdio};
use std::time::{Duration, Instant};

/// Asks systemd whether `service` is currently active.
///
/// `Ok(None)` when systemd is not present on the host. The child is
/// polled against `timeout_secs` and killed if it overruns, so a hung
/// probe cannot stall an evaluation pass.
pub fn is_active(service: &str, timeout_secs: u64) -> Result<Option<bool>> {
    let spawned = Command::new("systemctl")
        .arg("is-active")
        .arg("--quiet")
        .arg(service)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn();

    let mut child = match spawned {
        Ok(child) => child,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e).context("failed to spawn systemctl"),
    };

    let status = wait_with_timeout(&mut child, Duration::from_secs(timeout_secs))
        .context("systemctl probe failed")?;
    match status {
        Some(status) => Ok(Some(status.success())),
        None => {
            tracing::warn!(service, "systemctl probe timed out");
            Ok(None)
        }
    }
}

/// Polls the child until it exits or `timeout` elapses; kills it on
/// timeout and returns `None`.
pub(crate) fn wait_with_timeout(
    child: &mut std::process::Child,
    timeout: Duration,
) -> Result<Option<std::process::ExitStatus>> {
    let deadline = Instant::now() + timeout;
    loop {
        if let Some(status) = child.try_wait()? {
            return Ok(Some(status));
        }
        if Instant::now() >= deadline {
            let _ = child.kill();
            let _ = child.wait();
            return Ok(None);
        }
        std::thread::sleep(Duration::from_millis(20));
    }
}
