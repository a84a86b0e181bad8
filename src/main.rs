//! Main application entry point (CLI binary).
//!
//! This is a thin wrapper around the `domain_diagnostics` library that handles:
//! - Command-line argument parsing
//! - Logger initialization
//! - JSON output of reports and category failures
//!
//! All core functionality is implemented in the library crate.

use std::process;

use anyhow::{Context, Result};
use serde::Serialize;
use structopt::StructOpt;

use domain_diagnostics::config::HTTPS_PORT;
use domain_diagnostics::diagnostics::CategoryFailure;
use domain_diagnostics::initialization::init_logger_with;
use domain_diagnostics::{
    DiagnosticEngine, DiagnosticError, DiagnosticsConfig, LogFormat, LogLevel, ProbeTarget,
};

#[derive(Debug, StructOpt)]
#[structopt(
    name = "domain_diagnostics",
    about = "Live DNS, SMTP, TLS and DNSBL diagnostics for a domain or IP address"
)]
struct Cli {
    /// Log level: error, warn, info, debug, trace
    #[structopt(long, default_value = "info")]
    log_level: LogLevel,

    /// Log format: plain or json
    #[structopt(long, default_value = "plain")]
    log_format: LogFormat,

    /// Per-probe timeout in seconds; group budgets grow to fit it
    #[structopt(long)]
    timeout_secs: Option<u64>,

    /// Print single-line JSON instead of pretty-printed output
    #[structopt(long)]
    compact: bool,

    #[structopt(subcommand)]
    command: Command,
}

#[derive(Debug, StructOpt)]
enum Command {
    /// DNS records, nameservers, propagation, DNSSEC, SPF and DMARC
    Dns {
        /// Domain name or IP address
        target: String,
    },
    /// SMTP handshake and port checks for every MX host
    Smtp {
        /// Domain name or IP address
        target: String,
    },
    /// Certificate, protocol and cipher inspection
    Ssl {
        /// Domain name or IP address
        target: String,
        /// Port to inspect
        #[structopt(long, default_value = "443")]
        port: u16,
    },
    /// DNSBL listings and risk level
    Blacklist {
        /// Domain name or IP address
        target: String,
    },
    /// Every category concurrently
    Full {
        /// Domain name or IP address
        target: String,
        /// Port for the TLS category
        #[structopt(long)]
        ssl_port: Option<u16>,
    },
}

impl Command {
    fn target(&self) -> &str {
        match self {
            Command::Dns { target }
            | Command::Smtp { target }
            | Command::Ssl { target, .. }
            | Command::Blacklist { target }
            | Command::Full { target, .. } => target,
        }
    }
}

fn print_json<T: Serialize>(value: &T, compact: bool) -> Result<()> {
    let rendered = if compact {
        serde_json::to_string(value)
    } else {
        serde_json::to_string_pretty(value)
    }
    .context("Failed to serialize report")?;
    println!("{rendered}");
    Ok(())
}

async fn run(engine: &DiagnosticEngine, command: &Command, compact: bool) -> Result<(), DiagnosticError> {
    let target = ProbeTarget::parse(command.target())?;
    let printed = match command {
        Command::Dns { .. } => print_json(&engine.dns_report(&target).await?, compact),
        Command::Smtp { .. } => print_json(&engine.smtp_report(&target).await?, compact),
        Command::Ssl { port, .. } => print_json(&engine.ssl_report(&target, *port).await?, compact),
        Command::Blacklist { .. } => {
            print_json(&engine.blacklist_report(&target).await?, compact)
        }
        Command::Full { ssl_port, .. } => print_json(
            &engine
                .full_report(&target, ssl_port.unwrap_or(HTTPS_PORT))
                .await,
            compact,
        ),
    };
    printed.map_err(|e| DiagnosticError::Internal(format!("{e:#}")))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::from_args();

    init_logger_with(cli.log_level.clone().into(), cli.log_format.clone())
        .context("Failed to initialize logger")?;

    let mut config = DiagnosticsConfig::default();
    if let Some(secs) = cli.timeout_secs {
        config = config.with_probe_timeout(secs);
    }
    let engine = DiagnosticEngine::new(config).context("Failed to initialize diagnostics engine")?;

    if let Err(e) = run(&engine, &cli.command, cli.compact).await {
        log::error!("{} failed: {e}", cli.command.target());
        print_json(&CategoryFailure::from(&e), cli.compact)?;
        process::exit(1);
    }
    Ok(())
}
