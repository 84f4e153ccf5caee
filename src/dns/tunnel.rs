use super::{query_a, query_ns, Attempts, DnsOptions};
use crate::scanner::{Check, CheckOutcome};
use crate::utils::{Result, ScanError};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Verifies that a resolver follows the delegation of a tunnel domain: the NS
/// query must answer, and the first name server's own A record must resolve
/// through the same resolver.
#[derive(Debug, Clone)]
pub struct TunnelCheck {
    pub domain: String,
    pub count: u32,
    pub options: Arc<DnsOptions>,
}

impl TunnelCheck {
    pub fn new(domain: String, count: u32, options: Arc<DnsOptions>) -> Self {
        Self {
            domain,
            count,
            options,
        }
    }

    async fn delegation(&self, resolver: &str, timeout: Duration) -> Result<()> {
        let hosts = query_ns(resolver, &self.domain, timeout, &self.options).await?;
        let ns_host = hosts
            .first()
            .map(|h| h.trim_end_matches('.').to_string())
            .ok_or_else(|| ScanError::DnsQuery(format!("no NS for {}", self.domain)))?;
        query_a(resolver, &ns_host, timeout, &self.options).await?;
        Ok(())
    }
}

#[async_trait]
impl Check for TunnelCheck {
    async fn check(&self, target: &str, timeout: Duration) -> CheckOutcome {
        let mut attempts = Attempts::default();

        for _ in 0..self.count {
            let start = Instant::now();
            match self.delegation(target, timeout).await {
                Ok(()) => attempts.success(start.elapsed()),
                Err(e) => {
                    log::debug!("delegation of {} via {}: {}", self.domain, target, e);
                    if attempts.failure() {
                        return CheckOutcome::fail();
                    }
                }
            }
        }

        attempts.outcome("resolve_ms")
    }
}
