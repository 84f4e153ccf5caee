use super::{probe_through_tunnel, DEFAULT_TEST_URL};
use crate::dns::DNS_PORT;
use crate::scanner::{Check, CheckOutcome, PortPool};
use crate::utils::{latency_ms, round_ms};
use async_trait::async_trait;
use std::time::{Duration, Instant};
use tokio::process::Command;

/// Same flow as [`super::DnsttCheck`] with `slipstream-client`.
#[derive(Debug, Clone)]
pub struct SlipstreamCheck {
    pub domain: String,
    pub cert: Option<String>,
    pub test_url: String,
    pub program: String,
    ports: PortPool,
}

impl SlipstreamCheck {
    pub fn new(domain: impl Into<String>, ports: PortPool) -> Self {
        Self {
            domain: domain.into(),
            cert: None,
            test_url: DEFAULT_TEST_URL.to_string(),
            program: "slipstream-client".to_string(),
            ports,
        }
    }

    pub fn with_cert(mut self, cert: impl Into<String>) -> Self {
        self.cert = Some(cert.into());
        self
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
        cmd.args(["-d", &self.domain])
            .args(["-r", &format!("{resolver}:{DNS_PORT}")])
            .args(["-l", &port.to_string()]);
        if let Some(cert) = &self.cert {
            cmd.args(["--cert", cert]);
        }
        cmd
    }
}

#[async_trait]
impl Check for SlipstreamCheck {
    async fn check(&self, target: &str, timeout: Duration) -> CheckOutcome {
        let lease = self.ports.acquire().await;

        let start = Instant::now();
        let command = self.command(target, lease.port());
        match probe_through_tunnel(command, lease.port(), &self.test_url, timeout).await {
            Ok(()) => CheckOutcome::pass_with("e2e_ms", round_ms(latency_ms(start.elapsed()))),
            Err(e) => {
                log::debug!("slipstream {}: {}", target, e);
                CheckOutcome::fail()
            }
        }
    }
}
