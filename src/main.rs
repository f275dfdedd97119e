mod cleanup;
mod config;
mod domain;
mod environment;
mod error;
mod output;
mod preview;
mod railway;
mod readiness;
mod redeploy;
mod variables;

#[cfg(test)]
mod testing;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use crate::config::{Inputs, Mode, RunConfig};
use crate::railway::RailwayClient;

#[derive(Parser, Debug)]
#[command(name = "railship", version, about = "Railway pull request preview environments", long_about = None)]
struct Cli {
    /// Config file with defaults [default: .railship.toml if present]
    #[arg(global = true, long)]
    config: Option<PathBuf>,

    #[command(flatten)]
    inputs: Inputs,

    /// Mode to run in; without one, `--cleanup` decides
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Create or reuse the preview environment, redeploy it and report its domain
    Deploy,
    /// Delete the preview environment
    Cleanup,
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    let result = run(cli).await;
    if let Err(err) = &result {
        output::annotate_failure(err);
    }
    result
}

fn init_tracing() {
    let filter = EnvFilter::try_from_env("RAILSHIP_LOG").unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

async fn run(cli: Cli) -> Result<()> {
    let file = config::load_file_config(cli.config.as_deref()).await?;
    let forced_mode = cli.command.map(|c| match c {
        Commands::Deploy => Mode::Deploy,
        Commands::Cleanup => Mode::Cleanup,
    });
    let cfg = RunConfig::build(cli.inputs, file, forced_mode)?;

    let client =
        RailwayClient::new(&cfg.token, &cfg.api_url).context("failed to build Railway client")?;
    tracing::debug!(api_url = %client.api_url(), mode = ?cfg.mode, "railship: start");

    match cfg.mode {
        Mode::Deploy => {
            let report = preview::run_deploy(&client, &cfg)
                .await
                .with_context(|| format!("deploy of preview {} failed", cfg.preview_name))?;
            tracing::info!(
                environment = %report.environment.id(),
                triggered = report.triggered.len(),
                failed = report.failed.len(),
                "deploy: done"
            );
            let mut outputs = vec![("environment_id", report.environment.id())];
            if let Some(domain) = report.domain.as_deref() {
                outputs.push(("service_domain", domain));
            }
            output::publish(&outputs).await?;
        }
        Mode::Cleanup => {
            let deleted = preview::run_cleanup(&client, &cfg)
                .await
                .with_context(|| format!("cleanup of preview {} failed", cfg.preview_name))?;
            if let Some(id) = deleted.as_deref() {
                output::publish(&[("environment_id", id)]).await?;
            }
        }
    }

    Ok(())
}
