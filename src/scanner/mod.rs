//! Concurrent probe engine.
//!
//! A [`Check`] probes one target. [`run_pool`] fans a target list out over a
//! fixed number of workers, [`sort_by_metric`] ranks the results, and
//! [`run_chain`] threads the survivors of each [`Stage`] into the next one.
//! Checks that need an exclusive local port borrow it from a [`PortPool`].

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::future::Future;
use std::time::Duration;

pub mod chain;
pub mod pool;
pub mod ports;
pub mod sort;

pub use chain::*;
pub use pool::*;
pub use ports::*;
pub use sort::*;

/// Named measurements produced by a check, e.g. `ping_ms`.
pub type Metrics = BTreeMap<String, f64>;

/// What a single check invocation reports back.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CheckOutcome {
    pub passed: bool,
    pub metrics: Metrics,
}

impl CheckOutcome {
    pub fn pass(metrics: Metrics) -> Self {
        Self {
            passed: true,
            metrics,
        }
    }

    pub fn fail() -> Self {
        Self::default()
    }

    /// Passing outcome carrying one measurement.
    pub fn pass_with(key: &str, value: f64) -> Self {
        let mut metrics = Metrics::new();
        metrics.insert(key.to_string(), value);
        Self::pass(metrics)
    }
}

/// Result of probing one target in one run.
#[derive(Debug, Clone, PartialEq)]
pub struct ProbeResult {
    pub target: String,
    pub passed: bool,
    pub metrics: Metrics,
}

impl ProbeResult {
    pub fn new(target: String, outcome: CheckOutcome) -> Self {
        Self {
            target,
            passed: outcome.passed,
            metrics: outcome.metrics,
        }
    }
}

/// A target as it appears in a written report.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IpRecord {
    pub ip: String,
    #[serde(default, skip_serializing_if = "Metrics::is_empty")]
    pub metrics: Metrics,
}

impl IpRecord {
    pub fn new(ip: impl Into<String>) -> Self {
        Self {
            ip: ip.into(),
            metrics: Metrics::new(),
        }
    }

    pub fn with_metrics(ip: impl Into<String>, metrics: Metrics) -> Self {
        Self {
            ip: ip.into(),
            metrics,
        }
    }
}

/// A probe that can be run against many targets concurrently.
///
/// Implementations bound their own blocking work by `timeout`; the pool only
/// passes the value through. A failed outcome may carry no metrics.
#[async_trait]
pub trait Check: Send + Sync {
    async fn check(&self, target: &str, timeout: Duration) -> CheckOutcome;
}

/// Adapts an async closure into a [`Check`].
pub struct FnCheck<F> {
    f: F,
}

pub fn check_fn<F, Fut>(f: F) -> FnCheck<F>
where
    F: Fn(String, Duration) -> Fut + Send + Sync,
    Fut: Future<Output = CheckOutcome> + Send,
{
    FnCheck { f }
}

#[async_trait]
impl<F, Fut> Check for FnCheck<F>
where
    F: Fn(String, Duration) -> Fut + Send + Sync,
    Fut: Future<Output = CheckOutcome> + Send,
{
    async fn check(&self, target: &str, timeout: Duration) -> CheckOutcome {
        (self.f)(target.to_string(), timeout).await
    }
}
