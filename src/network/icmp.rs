//! ICMP reachability check.
//!
//! Shells out to the system `ping`, which needs no raw-socket privileges,
//! and reads the average round trip from its summary line:
//!
//! ```text
//! rtt min/avg/max/mdev = 11.840/12.233/12.627/0.393 ms
//! ```

use super::IpVersion;
use crate::scanner::{Check, CheckOutcome};
use async_trait::async_trait;
use std::time::Duration;
use tokio::process::Command;

/// Extra time granted on top of ping's own deadline before the process is
/// abandoned.
const DEADLINE_SLACK_SECS: u64 = 2;

/// Passes targets that answer `count` echo requests before ping's deadline.
/// Reports the average round trip as `ping_ms`.
#[derive(Debug, Clone)]
pub struct PingCheck {
    pub count: u32,
    pub program: String,
}

impl PingCheck {
    pub fn new(count: u32) -> Self {
        Self {
            count,
            program: "ping".to_string(),
        }
    }

    pub fn with_program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }

    fn command(&self, target: &str, timeout: Duration) -> (Command, Duration) {
        let wait_secs = timeout.as_secs().max(1);
        let deadline = u64::from(self.count) + wait_secs;

        let mut cmd = Command::new(&self.program);
        if IpVersion::of(target) == Some(IpVersion::V6) {
            cmd.arg("-6");
        }
        cmd.args(["-c", &self.count.to_string()])
            .args(["-W", &wait_secs.to_string()])
            .args(["-w", &deadline.to_string()])
            .arg(target)
            .kill_on_drop(true);

        (cmd, Duration::from_secs(deadline + DEADLINE_SLACK_SECS))
    }
}

#[async_trait]
impl Check for PingCheck {
    async fn check(&self, target: &str, timeout: Duration) -> CheckOutcome {
        let (mut cmd, limit) = self.command(target, timeout);

        let output = match tokio::time::timeout(limit, cmd.output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => {
                log::debug!("ping {}: {}", target, e);
                return CheckOutcome::fail();
            }
            Err(_) => {
                log::debug!("ping {}: no exit after {:?}", target, limit);
                return CheckOutcome::fail();
            }
        };

        if !output.status.success() {
            return CheckOutcome::fail();
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        CheckOutcome::pass_with("ping_ms", parse_ping_avg(&stdout).unwrap_or(0.0))
    }
}

/// Average round trip from ping's `min/avg/max` summary.
pub fn parse_ping_avg(output: &str) -> Option<f64> {
    output
        .lines()
        .find(|line| line.contains("min/avg/max"))
        .and_then(|line| line.split_once("= "))
        .and_then(|(_, values)| values.split('/').nth(1))
        .and_then(|avg| avg.trim().parse().ok())
}
