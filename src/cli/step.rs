//! `--step "type:key=val,key=val"` parsing for the chain command.

use crate::dns::{DnsOptions, ResolveCheck, TunnelCheck};
use crate::e2e::{DnsttCheck, SlipstreamCheck};
use crate::network::PingCheck;
use crate::scanner::{Check, PortPool, Stage};
use crate::utils::{Result, ScanError};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

/// Timeout and attempt count a step uses unless it overrides them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StepDefaults {
    pub timeout: Duration,
    pub count: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepConfig {
    pub kind: String,
    pub params: BTreeMap<String, String>,
}

impl StepConfig {
    pub fn parse(raw: &str) -> Result<Self> {
        let raw = raw.trim();
        let (kind, params_str) = match raw.split_once(':') {
            Some((kind, params)) => (kind, params),
            None => (raw, ""),
        };
        if kind.is_empty() {
            return Err(ScanError::Config("empty step type".to_string()));
        }

        let mut params = BTreeMap::new();
        if !params_str.is_empty() {
            for pair in params_str.split(',') {
                match pair.split_once('=') {
                    Some((key, value)) if !key.is_empty() => {
                        params.insert(key.to_string(), value.to_string());
                    }
                    _ => {
                        return Err(ScanError::Config(format!(
                            "invalid param {pair:?} in step {kind:?}"
                        )))
                    }
                }
            }
        }

        Ok(Self {
            kind: kind.to_string(),
            params,
        })
    }

    /// Turns the step into a runnable stage. e2e steps share `ports`.
    pub fn build(
        &self,
        defaults: StepDefaults,
        ports: &PortPool,
        dns: &Arc<DnsOptions>,
    ) -> Result<Stage> {
        let timeout = match self.params.get("timeout") {
            Some(v) => Duration::from_secs(self.positive("timeout", v)?),
            None => defaults.timeout,
        };
        let count = match self.params.get("count") {
            Some(v) => u32::try_from(self.positive("count", v)?)
                .map_err(|_| self.invalid("count", v))?,
            None => defaults.count,
        };

        let (check, sort_by): (Arc<dyn Check>, &str) = match self.kind.as_str() {
            "ping" => (Arc::new(PingCheck::new(count)), "ping_ms"),
            "resolve" => {
                let domain = self.required("domain")?;
                (
                    Arc::new(ResolveCheck::new(domain, count, Arc::clone(dns))),
                    "resolve_ms",
                )
            }
            "resolve/tunnel" => {
                let domain = self.required("domain")?;
                (
                    Arc::new(TunnelCheck::new(domain, count, Arc::clone(dns))),
                    "resolve_ms",
                )
            }
            "e2e/dnstt" => {
                let mut check = DnsttCheck::new(
                    self.required("domain")?,
                    self.required("pubkey")?,
                    ports.clone(),
                );
                if let Some(url) = self.params.get("test-url") {
                    check = check.with_test_url(url.clone());
                }
                (Arc::new(check), "e2e_ms")
            }
            "e2e/slipstream" => {
                let mut check = SlipstreamCheck::new(self.required("domain")?, ports.clone());
                if let Some(cert) = self.params.get("cert").filter(|c| !c.is_empty()) {
                    check = check.with_cert(cert.clone());
                }
                if let Some(url) = self.params.get("test-url") {
                    check = check.with_test_url(url.clone());
                }
                (Arc::new(check), "e2e_ms")
            }
            other => {
                return Err(ScanError::Config(format!("unknown step type {other:?}")));
            }
        };

        Ok(Stage::new(self.kind.clone(), timeout, check).with_sort_by(sort_by))
    }

    fn required(&self, key: &str) -> Result<String> {
        match self.params.get(key) {
            Some(value) if !value.is_empty() => Ok(value.clone()),
            _ => Err(ScanError::Config(format!(
                "step {:?}: missing required param '{key}'",
                self.kind
            ))),
        }
    }

    fn positive(&self, key: &str, value: &str) -> Result<u64> {
        match value.parse::<u64>() {
            Ok(n) if n > 0 => Ok(n),
            _ => Err(self.invalid(key, value)),
        }
    }

    fn invalid(&self, key: &str, value: &str) -> ScanError {
        ScanError::Config(format!("step {:?}: invalid {key} {value:?}", self.kind))
    }
}

/// Parses and builds every step before anything runs, so a typo in the last
/// step fails fast.
pub fn build_stages(
    raw_steps: &[String],
    defaults: StepDefaults,
    ports: &PortPool,
    dns: &Arc<DnsOptions>,
) -> Result<Vec<Stage>> {
    let configs = raw_steps
        .iter()
        .map(|raw| StepConfig::parse(raw))
        .collect::<Result<Vec<_>>>()?;
    configs
        .iter()
        .map(|config| config.build(defaults, ports, dns))
        .collect()
}
