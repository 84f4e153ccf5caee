use super::{probe_through_tunnel, DEFAULT_TEST_URL};
use crate::dns::DNS_PORT;
use crate::scanner::{Check, CheckOutcome, PortPool};
use crate::utils::{latency_ms, round_ms};
use async_trait::async_trait;
use std::time::{Duration, Instant};
use tokio::process::Command;

/// Brings up a `dnstt-client` tunnel through the candidate resolver and
/// reports the setup-plus-fetch time as `e2e_ms`.
#[derive(Debug, Clone)]
pub struct DnsttCheck {
    pub domain: String,
    pub pubkey: String,
    pub test_url: String,
    pub program: String,
    ports: PortPool,
}

impl DnsttCheck {
    pub fn new(domain: impl Into<String>, pubkey: impl Into<String>, ports: PortPool) -> Self {
        Self {
            domain: domain.into(),
            pubkey: pubkey.into(),
            test_url: DEFAULT_TEST_URL.to_string(),
            program: "dnstt-client".to_string(),
            ports,
        }
    }

    pub fn with_test_url(mut self, url: impl Into<String>) -> Self {
        self.test_url = url.into();
        self
    }

    pub fn with_program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }

    fn command(&self, resolver: &str, port: u16) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(["-udp", &format!("{resolver}:{DNS_PORT}")])
            .args(["-pubkey", &self.pubkey])
            .arg(&self.domain)
            .arg(format!("127.0.0.1:{port}"));
        cmd
    }
}

#[async_trait]
impl Check for DnsttCheck {
    async fn check(&self, target: &str, timeout: Duration) -> CheckOutcome {
        let lease = self.ports.acquire().await;

        let start = Instant::now();
        let command = self.command(target, lease.port());
        match probe_through_tunnel(command, lease.port(), &self.test_url, timeout).await {
            Ok(()) => CheckOutcome::pass_with("e2e_ms", round_ms(latency_ms(start.elapsed()))),
            Err(e) => {
                log::debug!("dnstt {}: {}", target, e);
                CheckOutcome::fail()
            }
        }
    }
}
