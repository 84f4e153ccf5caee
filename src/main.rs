use clap::Parser;
use colored::*;
use dnst_scanner::cli::{self, Commands, E2eCommands, GlobalArgs, ResolveCommands};
use dnst_scanner::*;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

#[tokio::main]
async fn main() {
    let cli = cli::Cli::parse();

    env_logger::Builder::from_default_env()
        .filter_level(if cli.global.verbose {
            log::LevelFilter::Info
        } else {
            log::LevelFilter::Warn
        })
        .init();

    if let Err(e) = run(cli).await {
        eprintln!("{} {}", "error:".red().bold(), e);
        std::process::exit(1);
    }
}

async fn run(cli: cli::Cli) -> Result<()> {
    let global = cli.global;
    let output = required_path(&global.output, "--output")?;
    validate_workers(global.workers)?;
    let ignore_rcodes = parse_rcodes(&global.ignore_rcode)?;
    let dns = Arc::new(DnsOptions::default().with_ignore_rcodes(ignore_rcodes));

    match cli.command {
        Commands::Ping => {
            let timeout = global.timeout_or(cli::DEFAULT_TIMEOUT_SECS);
            let check = PingCheck::new(global.count);
            run_direct("ping", &global, &output, timeout, Arc::new(check), "ping_ms").await
        }
        Commands::Resolve { domain, command } => {
            let timeout = global.timeout_or(cli::DEFAULT_TIMEOUT_SECS);
            match command {
                Some(ResolveCommands::Tunnel { domain }) => {
                    let check = TunnelCheck::new(domain, global.count, dns);
                    let check = Arc::new(check);
                    run_direct("resolve/tunnel", &global, &output, timeout, check, "resolve_ms").await
                }
                None => {
                    let domain = domain.ok_or_else(|| {
                        ScanError::Config("resolve needs --domain".to_string())
                    })?;
                    let check = ResolveCheck::new(domain, global.count, dns);
                    run_direct("resolve", &global, &output, timeout, Arc::new(check), "resolve_ms").await
                }
            }
        }
        Commands::E2e { command } => {
            let timeout = global.timeout_or(cli::DEFAULT_E2E_TIMEOUT_SECS);
            let ports = PortPool::new(cli::DEFAULT_PORT_BASE, global.workers)?;
            match command {
                E2eCommands::Dnstt {
                    domain,
                    pubkey,
                    test_url,
                } => {
                    let check = DnsttCheck::new(domain, pubkey, ports).with_test_url(test_url);
                    run_direct("e2e/dnstt", &global, &output, timeout, Arc::new(check), "e2e_ms").await
                }
                E2eCommands::Slipstream {
                    domain,
                    cert,
                    test_url,
                } => {
                    let mut check = SlipstreamCheck::new(domain, ports).with_test_url(test_url);
                    if let Some(cert) = cert {
                        check = check.with_cert(cert);
                    }
                    let check = Arc::new(check);
                    run_direct("e2e/slipstream", &global, &output, timeout, check, "e2e_ms").await
                }
            }
        }
        Commands::Chain { steps, port_base } => {
            let defaults = cli::StepDefaults {
                timeout: global.timeout_or(cli::DEFAULT_TIMEOUT_SECS),
                count: global.count,
            };
            let ports = PortPool::new(port_base, global.workers)?;
            let stages = cli::build_stages(&steps, defaults, &ports, &dns)?;

            let targets = load_targets(&global)?;
            let progress: ProgressFactory<'_> = &cli::progress_bar;
            let report = run_chain(&targets, global.workers, &stages, Some(progress)).await?;

            print_chain_summary(&report);
            write_chain_report(&report, &output)
        }
    }
}

async fn run_direct(
    mode: &str,
    global: &GlobalArgs,
    output: &Path,
    timeout: std::time::Duration,
    check: Arc<dyn Check>,
    sort_by: &str,
) -> Result<()> {
    let targets = load_targets(global)?;

    let start = Instant::now();
    let progress = cli::progress_bar(mode);
    let results = run_pool(&targets, global.workers, timeout, check, progress).await?;
    let elapsed = start.elapsed();

    let report = Report::from_results(&targets, &results, Some(sort_by));
    print_stats(mode, &results, elapsed);
    write_report(&report, output)
}

fn load_targets(global: &GlobalArgs) -> Result<Vec<String>> {
    let input = required_path(&global.input, "--input")?;
    let targets = load_input(&input, global.include_failed)?;
    if targets.is_empty() {
        return Err(ScanError::Config(format!(
            "no resolvers found in {}",
            input.display()
        )));
    }
    log::info!("loaded {} targets from {}", targets.len(), input.display());
    Ok(targets)
}

fn required_path(path: &Option<PathBuf>, flag: &str) -> Result<PathBuf> {
    path.clone()
        .ok_or_else(|| ScanError::Config(format!("{flag} is required")))
}
