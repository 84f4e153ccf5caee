use super::ProbeResult;
use std::cmp::Ordering;
use std::collections::HashMap;

/// Stable ascending sort by the named metric. Results without the metric go
/// last and keep their relative order.
pub fn sort_by_metric(results: &mut [ProbeResult], key: &str) {
    results.sort_by(|a, b| compare_metric(a.metrics.get(key), b.metrics.get(key)));
}

fn compare_metric(a: Option<&f64>, b: Option<&f64>) -> Ordering {
    match (a, b) {
        (Some(x), Some(y)) => x.total_cmp(y),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

/// First index of each target in `targets`; later duplicates keep the first.
pub fn input_positions(targets: &[String]) -> HashMap<&str, usize> {
    let mut positions = HashMap::with_capacity(targets.len());
    for (i, target) in targets.iter().enumerate() {
        positions.entry(target.as_str()).or_insert(i);
    }
    positions
}
