//! Principal resolution diagnostic tool.
//!
//! Resolves each principal given on the command line to its local user name
//! and prints one `"<input> to <short-name>"` line per argument. Exits
//! non-zero if any principal fails to parse or resolve.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use principalmap_core::config::AppConfig;
use principalmap_core::resolver::{set_global_config, PrincipalResolver};

/// Resolve principal names to local user names.
#[derive(Parser, Debug)]
#[command(
    name = "principalmap",
    version,
    about = "Resolve Kerberos-style principal names to local user names"
)]
struct Cli {
    /// Path to the TOML configuration file. Without it, built-in defaults
    /// apply (simple authentication, realm/instance stripping rules, no
    /// providers).
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Principal names to resolve, e.g. `hdfs/namenode@EXAMPLE.COM`.
    #[arg(required = true)]
    principals: Vec<String>,
}

fn main() -> ExitCode {
    // Minimal logging for CLI; RUST_LOG raises it for diagnostics.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_target(false)
        .without_time()
        .init();

    let cli = Cli::parse();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    let config = match &cli.config {
        Some(path) => AppConfig::load_from_file(path)
            .with_context(|| format!("failed to load configuration from {}", path.display()))?,
        None => AppConfig::default(),
    };
    set_global_config(&config).context("failed to apply configuration")?;

    for raw in &cli.principals {
        let resolver = PrincipalResolver::new(raw)
            .with_context(|| format!("cannot parse principal '{raw}'"))?;
        let short_name = resolver
            .short_name()
            .with_context(|| format!("cannot resolve principal '{raw}'"))?;
        println!("{raw} to {short_name}");
    }
    Ok(())
}
