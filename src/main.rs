//! scanhive-agent — entry point.
//!
//! Tracing logs go to stderr; the default level comes from the config's
//! `log_verbosity` and `RUST_LOG` overrides it.

use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use scanhive_agent::client::MasterClient;
use scanhive_agent::config::AgentConfig;
use scanhive_agent::poller::Poller;
use scanhive_agent::registry::PidRegistry;
use scanhive_agent::worker;

#[derive(Debug, Parser)]
#[command(name = "scanhive-agent")]
#[command(about = "Distributed scan agent", long_about = None)]
struct Cli {
    /// Configuration file.
    #[arg(short = 'c', value_name = "PATH", default_value = "agent_config.json")]
    config: PathBuf,
}

fn main() {
    let cli = Cli::parse();

    // Log verbosity lives in the config, so the config is loaded before the
    // subscriber comes up; a load failure goes straight to stderr.
    let config = match AgentConfig::load(&cli.config) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("scanhive-agent: {e:#}");
            std::process::exit(1);
        }
    };

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.default_log_level()));
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(filter)
        .init();

    if let Err(e) = run(config) {
        tracing::error!("agent failed: {e:#}");
        std::process::exit(1);
    }
}

fn run(config: AgentConfig) -> Result<()> {
    let config = Arc::new(config);
    let client = Arc::new(MasterClient::new(&config)?);
    let registry = Arc::new(PidRegistry::new());
    let (jobs_tx, jobs_rx) = crossbeam_channel::unbounded();

    worker::spawn_workers(
        config.number_of_threads,
        jobs_rx,
        Arc::clone(&config),
        Arc::clone(&client),
        Arc::clone(&registry),
    );

    let poller = Poller::new(config, client, registry, jobs_tx)?;
    poller.run()
}
