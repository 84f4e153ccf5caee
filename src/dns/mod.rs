//! Raw DNS queries against a candidate resolver, and the checks built on them.
//!
//! Queries go straight to `resolver:53` over UDP instead of through a stub
//! resolver, so the answer reflects exactly what the candidate returns.

use crate::scanner::CheckOutcome;
use crate::utils::{latency_ms, round_ms, Result, ScanError};
use hickory_client::op::{Message, MessageType, OpCode, Query, ResponseCode};
use hickory_client::rr::{Name, RData, RecordType};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::str::FromStr;
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::time::timeout;

pub mod resolve;
pub mod tunnel;

pub use resolve::*;
pub use tunnel::*;

pub const DNS_PORT: u16 = 53;

/// Consecutive failed attempts after which a multi-attempt check gives up.
pub const MAX_CONSECUTIVE_FAILURES: u32 = 3;

/// Address ranges that a real public answer never points into. Resolvers
/// that answer with them are hijacking or filtering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BogusFilter {
    ranges: Vec<(Ipv4Addr, u8)>,
}

impl Default for BogusFilter {
    fn default() -> Self {
        Self::new(vec![
            (Ipv4Addr::new(0, 0, 0, 0), 8),
            (Ipv4Addr::new(10, 0, 0, 0), 8),
            (Ipv4Addr::new(127, 0, 0, 0), 8),
            (Ipv4Addr::new(169, 254, 0, 0), 16),
            (Ipv4Addr::new(172, 16, 0, 0), 12),
            (Ipv4Addr::new(192, 168, 0, 0), 16),
        ])
    }
}

impl BogusFilter {
    pub fn new(ranges: Vec<(Ipv4Addr, u8)>) -> Self {
        Self {
            ranges: ranges
                .into_iter()
                .map(|(net, prefix)| (net, prefix.min(32)))
                .collect(),
        }
    }

    pub fn empty() -> Self {
        Self { ranges: Vec::new() }
    }

    pub fn contains(&self, ip: Ipv4Addr) -> bool {
        let addr = u32::from(ip);
        self.ranges.iter().any(|(net, prefix)| {
            let mask = if *prefix == 0 {
                0
            } else {
                u32::MAX << (32 - u32::from(*prefix))
            };
            addr & mask == u32::from(*net) & mask
        })
    }
}

/// Query behaviour shared by every DNS-based check.
#[derive(Debug, Clone)]
pub struct DnsOptions {
    /// Responses with these rcodes are dropped and the query keeps waiting
    /// for another response until it times out.
    pub ignore_rcodes: Vec<ResponseCode>,
    pub bogus: BogusFilter,
    pub port: u16,
}

impl Default for DnsOptions {
    fn default() -> Self {
        Self {
            ignore_rcodes: Vec::new(),
            bogus: BogusFilter::default(),
            port: DNS_PORT,
        }
    }
}

impl DnsOptions {
    pub fn with_ignore_rcodes(mut self, rcodes: Vec<ResponseCode>) -> Self {
        self.ignore_rcodes = rcodes;
        self
    }

    pub fn with_bogus(mut self, bogus: BogusFilter) -> Self {
        self.bogus = bogus;
        self
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }
}

/// Parses a human rcode name: nxdomain, servfail, refused or formerr.
pub fn parse_rcode(name: &str) -> Result<ResponseCode> {
    match name.trim().to_lowercase().as_str() {
        "nxdomain" => Ok(ResponseCode::NXDomain),
        "servfail" => Ok(ResponseCode::ServFail),
        "refused" => Ok(ResponseCode::Refused),
        "formerr" => Ok(ResponseCode::FormErr),
        _ => Err(ScanError::Config(format!(
            "unknown rcode {name:?} (supported: nxdomain, servfail, refused, formerr)"
        ))),
    }
}

pub fn parse_rcodes<S: AsRef<str>>(names: &[S]) -> Result<Vec<ResponseCode>> {
    names.iter().map(|n| parse_rcode(n.as_ref())).collect()
}

fn fqdn(domain: &str) -> Result<Name> {
    let absolute = format!("{}.", domain.trim().trim_end_matches('.'));
    Name::from_str(&absolute)
        .map_err(|e| ScanError::DnsQuery(format!("Invalid domain {domain}: {e}")))
}

/// Sends one recursive query to `resolver` and waits for a NOERROR answer.
pub async fn query(
    resolver: &str,
    domain: &str,
    record_type: RecordType,
    wait: Duration,
    options: &DnsOptions,
) -> Result<Message> {
    let ip: IpAddr = resolver
        .parse()
        .map_err(|e| ScanError::DnsQuery(format!("Invalid resolver {resolver}: {e}")))?;
    let server = SocketAddr::new(ip, options.port);

    let id: u16 = rand::random();
    let mut message = Message::new();
    message
        .set_id(id)
        .set_message_type(MessageType::Query)
        .set_op_code(OpCode::Query)
        .set_recursion_desired(true)
        .add_query(Query::query(fqdn(domain)?, record_type));
    let packet = message
        .to_vec()
        .map_err(|e| ScanError::DnsQuery(format!("Failed to serialize DNS query: {e}")))?;

    timeout(wait, exchange(server, &packet, id, resolver, domain, options))
        .await
        .map_err(|_| ScanError::Timeout)?
}

async fn exchange(
    server: SocketAddr,
    packet: &[u8],
    id: u16,
    resolver: &str,
    domain: &str,
    options: &DnsOptions,
) -> Result<Message> {
    let bind_addr = match server {
        SocketAddr::V4(_) => "0.0.0.0:0",
        SocketAddr::V6(_) => "[::]:0",
    };
    let socket = UdpSocket::bind(bind_addr).await?;
    socket.connect(server).await?;
    socket.send(packet).await?;

    let mut buf = [0u8; 4096];
    loop {
        let len = socket.recv(&mut buf).await?;
        let response = match Message::from_vec(&buf[..len]) {
            Ok(response) => response,
            Err(e) => {
                log::debug!("{}: undecodable response: {}", resolver, e);
                continue;
            }
        };
        if response.id() != id || response.message_type() != MessageType::Response {
            continue;
        }

        let rcode = response.response_code();
        if options.ignore_rcodes.contains(&rcode) {
            log::debug!("{}: ignoring {:?} for {}", resolver, rcode, domain);
            continue;
        }
        if rcode != ResponseCode::NoError {
            return Err(ScanError::DnsQuery(format!(
                "{resolver} answered {rcode:?} for {domain}"
            )));
        }
        return Ok(response);
    }
}

/// Resolves an A record and rejects empty or bogus answers.
pub async fn query_a(
    resolver: &str,
    domain: &str,
    wait: Duration,
    options: &DnsOptions,
) -> Result<Vec<Ipv4Addr>> {
    let response = query(resolver, domain, RecordType::A, wait, options).await?;
    if response.answers().is_empty() {
        return Err(ScanError::DnsQuery(format!(
            "{resolver} returned no answer for {domain}"
        )));
    }

    let mut addrs = Vec::new();
    for answer in response.answers() {
        if let Some(RData::A(a)) = answer.data() {
            if options.bogus.contains(a.0) {
                return Err(ScanError::DnsQuery(format!(
                    "{resolver} returned bogus address {} for {domain}",
                    a.0
                )));
            }
            addrs.push(a.0);
        }
    }
    Ok(addrs)
}

/// Returns the NS host names a resolver reports for `domain`.
pub async fn query_ns(
    resolver: &str,
    domain: &str,
    wait: Duration,
    options: &DnsOptions,
) -> Result<Vec<String>> {
    let response = query(resolver, domain, RecordType::NS, wait, options).await?;
    let hosts: Vec<String> = response
        .answers()
        .iter()
        .filter_map(|answer| match answer.data() {
            Some(RData::NS(ns)) => Some(ns.0.to_utf8()),
            _ => None,
        })
        .collect();

    if hosts.is_empty() {
        return Err(ScanError::DnsQuery(format!(
            "{resolver} returned no NS records for {domain}"
        )));
    }
    Ok(hosts)
}

/// Latency bookkeeping for checks that retry a query several times.
#[derive(Debug, Default)]
pub(crate) struct Attempts {
    successes: Vec<f64>,
    consecutive_failures: u32,
}

impl Attempts {
    pub(crate) fn success(&mut self, elapsed: Duration) {
        self.successes.push(latency_ms(elapsed));
        self.consecutive_failures = 0;
    }

    /// Records a failure; true once the check should give up.
    pub(crate) fn failure(&mut self) -> bool {
        self.consecutive_failures += 1;
        self.consecutive_failures >= MAX_CONSECUTIVE_FAILURES
    }

    pub(crate) fn outcome(&self, key: &str) -> CheckOutcome {
        if self.successes.is_empty() {
            return CheckOutcome::fail();
        }
        let mean = self.successes.iter().sum::<f64>() / self.successes.len() as f64;
        CheckOutcome::pass_with(key, round_ms(mean))
    }
}
