//! burrow server binary
//!
//! ## Usage
//!
//! ```bash
//! # Serve, finding config.{yaml,yml,toml} in ./config, ~/.swd, ~/.dave or .
//! burrow
//!
//! # Serve with an explicit config file
//! burrow --config /etc/burrow/config.yaml
//!
//! # Hash a password for the users section
//! burrow passwd
//! ```

use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, bail};
use burrow_kernel::config::{self, Config};
use burrow_kernel::{ConfigStore, credentials};
use burrow_server::AppState;
use clap::{Parser, Subcommand};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(author, version, about = "Jailed multi-user file server", long_about = None)]
struct Args {
    /// Config file (YAML or TOML); searched for when omitted
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Read a password twice from stdin and print its hash
    Passwd,
}

#[tokio::main]
async fn main() -> ExitCode {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();

    let args = Args::parse();

    let result = match args.command {
        Some(Command::Passwd) => cmd_passwd(),
        None => run_server(args.config).await,
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run_server(config_path: Option<PathBuf>) -> anyhow::Result<()> {
    let path = match config_path {
        Some(path) => path,
        None => Config::discover()?,
    };
    let config = Config::load(&path).with_context(|| format!("loading {}", path.display()))?;
    if config.users.is_empty() {
        tracing::warn!("No users configured, authentication is disabled");
    }

    let store = Arc::new(ConfigStore::new(config));
    let watcher = config::watch(Arc::clone(&store), &path).context("starting config watcher")?;

    let result = burrow_server::run(AppState::new(store), shutdown_signal()).await;
    watcher.stop();
    result.context("server failed")
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "can't listen for ctrl-c");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutting down");
}

fn cmd_passwd() -> anyhow::Result<()> {
    let stdin = io::stdin();
    let mut lines = stdin.lock().lines();
    let mut prompt = |label: &str| -> anyhow::Result<String> {
        eprint!("{label}: ");
        io::stderr().flush()?;
        lines
            .next()
            .transpose()?
            .context("no input")
    };

    let password = prompt("Enter password")?;
    let confirm = prompt("Confirm password")?;
    if password != confirm {
        bail!("passwords don't match");
    }
    if password.is_empty() {
        bail!("password is empty");
    }

    let hash = credentials::hash(password.as_bytes())?;
    println!("{hash}");
    Ok(())
}
