//! Target list loading: plain text, one resolver per line, or a previous
//! JSON report so scans can be chained across runs.

use crate::report::Report;
use crate::utils::{Result, ScanError};
use std::net::{IpAddr, SocketAddr};
use std::path::Path;

pub fn load_input(path: impl AsRef<Path>, include_failed: bool) -> Result<Vec<String>> {
    let path = path.as_ref();
    let is_json = path
        .extension()
        .map(|ext| ext.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    let content = std::fs::read_to_string(path)?;
    if is_json {
        parse_report(&content, include_failed)
            .map_err(|e| ScanError::Input(format!("{}: {}", path.display(), e)))
    } else {
        Ok(parse_text(&content))
    }
}

/// Reads resolvers from a prior report: every `passed` ip, plus the `failed`
/// ones when asked.
pub fn parse_report(content: &str, include_failed: bool) -> Result<Vec<String>> {
    let report: Report = serde_json::from_str(content)?;
    let failed = if include_failed { report.failed } else { Vec::new() };
    Ok(report
        .passed
        .into_iter()
        .chain(failed)
        .map(|record| record.ip)
        .collect())
}

pub fn parse_text(content: &str) -> Vec<String> {
    let mut ips = Vec::new();
    let mut skipped = 0usize;

    for line in content.lines().map(str::trim) {
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        match parse_entry(line) {
            Some(ip) => ips.push(ip.to_string()),
            None => skipped += 1,
        }
    }

    if skipped > 0 {
        log::warn!("input: skipped {} invalid entries", skipped);
    }
    ips
}

/// An IP address, optionally written with a port (`1.1.1.1:53`, `[::1]:53`).
fn parse_entry(entry: &str) -> Option<IpAddr> {
    if let Ok(addr) = entry.parse::<SocketAddr>() {
        return Some(addr.ip());
    }
    entry.parse::<IpAddr>().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_parse_text_skips_comments_and_blanks() {
        let ips = parse_text("# resolvers\n\n1.1.1.1\n  8.8.8.8  \n#9.9.9.9\n");
        assert_eq!(ips, vec!["1.1.1.1", "8.8.8.8"]);
    }

    #[test]
    fn test_parse_text_strips_ports() {
        let ips = parse_text("1.1.1.1:53\n[2606:4700:4700::1111]:53\n2001:db8::1\n");
        assert_eq!(ips, vec!["1.1.1.1", "2606:4700:4700::1111", "2001:db8::1"]);
    }

    #[test]
    fn test_parse_text_skips_invalid() {
        let ips = parse_text("dns.google\n1.1.1\n300.1.1.1\n9.9.9.9\n");
        assert_eq!(ips, vec!["9.9.9.9"]);
    }

    #[test]
    fn test_parse_text_keeps_duplicates_in_order() {
        let ips = parse_text("8.8.8.8\n1.1.1.1\n8.8.8.8\n");
        assert_eq!(ips, vec!["8.8.8.8", "1.1.1.1", "8.8.8.8"]);
    }

    #[test]
    fn test_parse_report() {
        let json = r#"{
            "passed": [{"ip": "1.1.1.1", "metrics": {"ping_ms": 4.2}}, {"ip": "8.8.8.8"}],
            "failed": [{"ip": "9.9.9.9"}]
        }"#;
        assert_eq!(parse_report(json, false).unwrap(), vec!["1.1.1.1", "8.8.8.8"]);
        assert_eq!(
            parse_report(json, true).unwrap(),
            vec!["1.1.1.1", "8.8.8.8", "9.9.9.9"]
        );
    }

    #[test]
    fn test_parse_report_missing_lists() {
        assert!(parse_report(r#"{"passed": [{"ip": "1.1.1.1"}]}"#, true).is_ok());
        assert!(parse_report("{}", true).unwrap().is_empty());
    }

    #[test]
    fn test_load_text_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "1.1.1.1\n8.8.4.4:5353").unwrap();

        let ips = load_input(file.path(), false).unwrap();
        assert_eq!(ips, vec!["1.1.1.1", "8.8.4.4"]);
    }

    #[test]
    fn test_load_json_file_by_extension() {
        let mut file = tempfile::Builder::new().suffix(".JSON").tempfile().unwrap();
        write!(file, r#"{{"passed": [{{"ip": "1.0.0.1"}}], "failed": []}}"#).unwrap();

        let ips = load_input(file.path(), false).unwrap();
        assert_eq!(ips, vec!["1.0.0.1"]);
    }

    #[test]
    fn test_load_malformed_json() {
        let mut file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
        write!(file, "not json").unwrap();

        let err = load_input(file.path(), false).unwrap_err();
        assert!(matches!(err, ScanError::Input(_)));
    }

    #[test]
    fn test_load_missing_file() {
        let err = load_input("/nonexistent/resolvers.txt", false).unwrap_err();
        assert!(matches!(err, ScanError::Io(_)));
    }
}
