use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;

pub mod progress;
pub mod step;

pub use progress::*;
pub use step::*;

pub const DEFAULT_TIMEOUT_SECS: u64 = 3;
pub const DEFAULT_E2E_TIMEOUT_SECS: u64 = 5;
pub const DEFAULT_PORT_BASE: u16 = 30000;

#[derive(Parser)]
#[command(name = "dnst-scanner")]
#[command(about = "DNS tunnel scanner - test resolvers for tunneling viability")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    #[command(flatten)]
    pub global: GlobalArgs,
}

#[derive(Args, Debug, Clone)]
pub struct GlobalArgs {
    #[arg(short, long, global = true, help = "Input file (text or JSON report)")]
    pub input: Option<PathBuf>,

    #[arg(short, long, global = true, help = "Output JSON report")]
    pub output: Option<PathBuf>,

    #[arg(long, global = true, help = "Also scan failed IPs from a JSON input")]
    pub include_failed: bool,

    #[arg(long, global = true, default_value = "50")]
    pub workers: usize,

    #[arg(
        short,
        long,
        global = true,
        help = "Timeout per attempt in seconds [default: 3, e2e: 5]"
    )]
    pub timeout: Option<u64>,

    #[arg(
        short,
        long,
        global = true,
        default_value = "3",
        help = "Attempts per IP for ping/resolve checks"
    )]
    pub count: u32,

    #[arg(
        long,
        global = true,
        value_delimiter = ',',
        help = "DNS rcodes to ignore: nxdomain, servfail, refused, formerr (repeatable)"
    )]
    pub ignore_rcode: Vec<String>,

    #[arg(short, long, global = true)]
    pub verbose: bool,
}

impl GlobalArgs {
    pub fn timeout_or(&self, default_secs: u64) -> Duration {
        Duration::from_secs(self.timeout.unwrap_or(default_secs))
    }
}

#[derive(Subcommand)]
pub enum Commands {
    #[command(about = "Check IP reachability via ICMP ping")]
    Ping,
    #[command(about = "Check that resolvers answer A queries for a domain")]
    Resolve {
        #[arg(long)]
        domain: Option<String>,
        #[command(subcommand)]
        command: Option<ResolveCommands>,
    },
    #[command(about = "Verify tunnels end to end through each resolver")]
    E2e {
        #[command(subcommand)]
        command: E2eCommands,
    },
    #[command(about = "Run multiple scan steps in sequence, passing results in-memory")]
    Chain {
        #[arg(long = "step", required = true, help = r#"Scan step in "type:key=val,key=val" format"#)]
        steps: Vec<String>,
        #[arg(long, default_value_t = DEFAULT_PORT_BASE, help = "Base port for e2e SOCKS proxies")]
        port_base: u16,
    },
}

#[derive(Subcommand)]
pub enum ResolveCommands {
    #[command(about = "Check NS delegation and glue for a tunnel domain")]
    Tunnel {
        #[arg(long)]
        domain: String,
    },
}

#[derive(Subcommand)]
pub enum E2eCommands {
    #[command(about = "Tunnel through dnstt-client")]
    Dnstt {
        #[arg(long)]
        domain: String,
        #[arg(long)]
        pubkey: String,
        #[arg(long, default_value = crate::e2e::DEFAULT_TEST_URL)]
        test_url: String,
    },
    #[command(about = "Tunnel through slipstream-client")]
    Slipstream {
        #[arg(long)]
        domain: String,
        #[arg(long)]
        cert: Option<String>,
        #[arg(long, default_value = crate::e2e::DEFAULT_TEST_URL)]
        test_url: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("dnst-scanner").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn test_global_defaults() {
        let cli = parse(&["ping", "-i", "in.txt", "-o", "out.json"]);
        assert_eq!(cli.global.workers, 50);
        assert_eq!(cli.global.count, 3);
        assert_eq!(cli.global.timeout, None);
        assert_eq!(cli.global.timeout_or(DEFAULT_TIMEOUT_SECS), Duration::from_secs(3));
        assert!(!cli.global.include_failed);
        assert!(matches!(cli.command, Commands::Ping));
    }

    #[test]
    fn test_ignore_rcode_repeat_and_comma() {
        let cli = parse(&[
            "resolve",
            "--domain",
            "example.com",
            "--ignore-rcode",
            "nxdomain,servfail",
            "--ignore-rcode",
            "refused",
        ]);
        assert_eq!(cli.global.ignore_rcode, vec!["nxdomain", "servfail", "refused"]);
    }

    #[test]
    fn test_resolve_tunnel_subcommand() {
        let cli = parse(&["resolve", "tunnel", "--domain", "t.example.com", "-t", "2"]);
        match cli.command {
            Commands::Resolve {
                domain: None,
                command: Some(ResolveCommands::Tunnel { domain }),
            } => assert_eq!(domain, "t.example.com"),
            _ => panic!("expected resolve tunnel"),
        }
        assert_eq!(cli.global.timeout, Some(2));
    }

    #[test]
    fn test_e2e_defaults() {
        let cli = parse(&["e2e", "slipstream", "--domain", "s.example.com"]);
        match cli.command {
            Commands::E2e {
                command: E2eCommands::Slipstream { cert, test_url, .. },
            } => {
                assert_eq!(cert, None);
                assert_eq!(test_url, crate::e2e::DEFAULT_TEST_URL);
            }
            _ => panic!("expected e2e slipstream"),
        }
    }

    #[test]
    fn test_chain_steps() {
        let cli = parse(&[
            "chain",
            "--step",
            "ping",
            "--step",
            "resolve:domain=example.com,count=2",
            "--port-base",
            "40000",
        ]);
        match cli.command {
            Commands::Chain { steps, port_base } => {
                assert_eq!(steps.len(), 2);
                assert_eq!(port_base, 40000);
            }
            _ => panic!("expected chain"),
        }
    }

    #[test]
    fn test_chain_requires_step() {
        assert!(Cli::try_parse_from(["dnst-scanner", "chain"]).is_err());
    }
}
