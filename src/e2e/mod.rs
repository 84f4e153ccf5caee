//! End-to-end tunnel checks.
//!
//! Each invocation leases a local port, starts a tunnel client that exposes a
//! SOCKS5 proxy on it with the candidate as upstream resolver, and fetches a
//! test URL through that proxy.

use crate::utils::{Result, ScanError};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::{Child, Command};
use tokio::time::{sleep, timeout};

pub mod dnstt;
pub mod slipstream;

pub use dnstt::*;
pub use slipstream::*;

pub const DEFAULT_TEST_URL: &str = "https://httpbin.org/ip";

/// Time a freshly started client gets to open its listener.
pub const STARTUP_GRACE: Duration = Duration::from_secs(2);

/// Starts `command`, waits for it to come up and fetches `test_url` through
/// its SOCKS listener on `port`. The client is killed and reaped on every
/// path, including timeout.
pub async fn probe_through_tunnel(
    mut command: Command,
    port: u16,
    test_url: &str,
    limit: Duration,
) -> Result<()> {
    command
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .kill_on_drop(true);

    let mut child = command
        .spawn()
        .map_err(|e| ScanError::Process(format!("failed to start tunnel client: {e}")))?;

    let probe = async {
        sleep(STARTUP_GRACE).await;
        if let Ok(Some(status)) = child.try_wait() {
            return Err(ScanError::Process(format!(
                "tunnel client exited early with {status}"
            )));
        }
        verify_socks(port, test_url, limit).await
    };
    let result = match timeout(limit, probe).await {
        Ok(result) => result,
        Err(_) => Err(ScanError::Timeout),
    };

    shutdown(&mut child).await;
    result
}

async fn shutdown(child: &mut Child) {
    if let Err(e) = child.kill().await {
        log::debug!("tunnel client shutdown: {}", e);
    }
}

/// Fetches `test_url` through `socks5h://127.0.0.1:port`, so name resolution
/// also goes through the tunnel. Anything but 200 fails.
pub async fn verify_socks(port: u16, test_url: &str, limit: Duration) -> Result<()> {
    let proxy = reqwest::Proxy::all(format!("socks5h://127.0.0.1:{port}"))
        .map_err(|e| ScanError::Http(e.to_string()))?;
    let client = reqwest::Client::builder()
        .proxy(proxy)
        .timeout(limit)
        .build()
        .map_err(|e| ScanError::Http(e.to_string()))?;

    let response = client
        .get(test_url)
        .send()
        .await
        .map_err(|e| ScanError::Http(e.to_string()))?;

    match response.status() {
        reqwest::StatusCode::OK => Ok(()),
        status => Err(ScanError::Http(format!("{test_url} returned {status}"))),
    }
}
