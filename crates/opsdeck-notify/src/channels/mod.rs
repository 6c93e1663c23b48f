pub mod discord;
pub mod email;
pub mod slack;
pub mod telegram;

use anyhow::{anyhow, Result};
use std::time::Duration;

/// Request timeout applied to every webhook-style channel client.
pub(crate) const HTTP_TIMEOUT: Duration = Duration::from_secs(10);

pub(crate) fn http_client() -> Result<reqwest::Client> {
    Ok(reqwest::Client::builder().timeout(HTTP_TIMEOUT).build()?)
}

/// POST a JSON body, retrying up to 3 times with exponential backoff.
pub(crate) async fn post_json(
    client: &reqwest::Client,
    url: &str,
    body: &serde_json::Value,
) -> Result<()> {
    let mut last_err = None;
    for attempt in 0..3u32 {
        match client.post(url).json(body).send().await {
            Ok(resp) if resp.status().is_success() => return Ok(()),
            Ok(resp) => {
                let status = resp.status();
                tracing::warn!(
                    attempt = attempt + 1,
                    status = %status,
                    "Webhook returned non-success status, retrying"
                );
                last_err = Some(anyhow!("HTTP {status}"));
            }
            Err(e) => {
                tracing::warn!(attempt = attempt + 1, error = %e, "Webhook send failed, retrying");
                last_err = Some(e.into());
            }
        }
        if attempt < 2 {
            tokio::time::sleep(Duration::from_millis(100 * 2u64.pow(attempt))).await;
        }
    }
    Err(last_err.unwrap_or_else(|| anyhow!("webhook send failed")))
}
