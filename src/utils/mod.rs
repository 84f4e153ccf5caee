use std::time::{Duration, Instant};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ScanError {
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("Invalid input: {0}")]
    Input(String),
    #[error("Timeout")]
    Timeout,
    #[error("DNS query failed: {0}")]
    DnsQuery(String),
    #[error("Process error: {0}")]
    Process(String),
    #[error("HTTP error: {0}")]
    Http(String),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ScanError>;

/// Milliseconds with microsecond resolution, as stored in metrics.
pub fn latency_ms(duration: Duration) -> f64 {
    duration.as_micros() as f64 / 1000.0
}

/// Rounds a millisecond value to three decimals.
pub fn round_ms(value: f64) -> f64 {
    (value * 1000.0).round() / 1000.0
}

pub async fn measure_time<F, Fut, T>(f: F) -> (Duration, T)
where
    F: FnOnce() -> Fut,
    Fut: std::future::Future<Output = T>,
{
    let start = Instant::now();
    let result = f().await;
    let duration = start.elapsed();
    (duration, result)
}
