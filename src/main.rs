// ABOUTME: Command line entry point
// ABOUTME: Dispatches `start` and `stop` to the orchestrator and maps failures to the exit code

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{error, info};

use cloud_hibernate::actions::ProgressBars;
use cloud_hibernate::cloud::CloudClient;
use cloud_hibernate::dns::DnsClient;
use cloud_hibernate::{Config, Orchestrator};

#[derive(Parser)]
#[command(name = "cloud-hibernate")]
#[command(
    about = "Snapshot idle cloud servers away and bring them back on demand",
    long_about = None
)]
#[command(version)]
struct Cli {
    /// Optional TOML file with settings; environment variables take precedence
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Rebuild servers from their snapshots, resize them and publish DNS records
    Start,
    /// Snapshot and delete every server, then remove the previous snapshots
    Stop,
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("cloud_hibernate=info")),
        )
        .with_target(false)
        .init();

    let cli = Cli::parse();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("{:#}", err);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = Config::load(cli.config.as_deref())?;

    let cloud = CloudClient::new(config.cloud_api_url.clone(), config.cloud_api_token.clone())?;
    let dns = DnsClient::new(config.dns.api_url.clone(), config.dns.api_token.clone())?;
    let progress = ProgressBars::for_stdout();

    let mut orchestrator = Orchestrator::new(&cloud, &dns, &config, progress.as_ref());

    match cli.command {
        Commands::Stop => {
            let report = orchestrator.shutdown().await?;
            info!(
                servers = report.stopped_servers.len(),
                "Servers backed up and deleted. You are saving costs"
            );
        }
        Commands::Start => {
            let report = orchestrator.startup().await?;
            if report.dns.as_ref().map_or(true, |dns| !dns.is_complete()) {
                error!("Servers are running but their DNS records may be stale");
            }
            info!(servers = report.servers.len(), "You can work now");
        }
    }

    Ok(())
}
