use super::{query_a, Attempts, DnsOptions};
use crate::scanner::{Check, CheckOutcome};
use crate::utils::measure_time;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

/// Passes resolvers that answer A queries for `domain` with a public address.
///
/// Runs `count` attempts and reports the mean latency of the successful ones
/// as `resolve_ms`.
#[derive(Debug, Clone)]
pub struct ResolveCheck {
    pub domain: String,
    pub count: u32,
    pub options: Arc<DnsOptions>,
}

impl ResolveCheck {
    pub fn new(domain: String, count: u32, options: Arc<DnsOptions>) -> Self {
        Self {
            domain,
            count,
            options,
        }
    }
}

#[async_trait]
impl Check for ResolveCheck {
    async fn check(&self, target: &str, timeout: Duration) -> CheckOutcome {
        let mut attempts = Attempts::default();

        for _ in 0..self.count {
            let (elapsed, result) =
                measure_time(|| query_a(target, &self.domain, timeout, &self.options)).await;
            match result {
                Ok(_) => attempts.success(elapsed),
                Err(e) => {
                    log::debug!("resolve {} via {}: {}", self.domain, target, e);
                    if attempts.failure() {
                        return CheckOutcome::fail();
                    }
                }
            }
        }

        attempts.outcome("resolve_ms")
    }
}
