use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio::net::TcpListener;
use tracing::info;

use gpt_researcher::agents::{ReportType, ResearchServices, Researcher};
use gpt_researcher::output::{emit, ConsoleSink, OutputEvent};
use gpt_researcher::utils::init_logger;
use gpt_researcher::{create_router, AppState, Config};

#[derive(Parser)]
#[command(name = "gpt-researcher")]
#[command(about = "Autonomous research assistant", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP and WebSocket server
    Serve {
        /// Overrides PORT
        #[arg(short, long)]
        port: Option<u16>,
    },
    /// Research a task from the terminal and print the report
    Research {
        task: String,
        #[arg(short, long, default_value = "research_report")]
        report_type: ReportType,
        /// Write the finished report to this file
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = Config::from_env().context("Failed to load configuration")?;
    let _log_guard = init_logger(&config);

    match cli.command {
        Commands::Serve { port } => serve(config, port).await,
        Commands::Research {
            task,
            report_type,
            output,
        } => research(config, task, report_type, output).await,
    }
}

async fn serve(config: Config, port: Option<u16>) -> Result<()> {
    let host: std::net::IpAddr = config
        .server
        .host
        .parse()
        .with_context(|| format!("Invalid HOST {}", config.server.host))?;
    let addr = SocketAddr::new(host, port.unwrap_or(config.server.port));

    let services = ResearchServices::from_config(config)?;
    let app = create_router(AppState::new(services));

    info!("Server listening on {}", addr);
    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .await
        .map_err(|e| anyhow::anyhow!("Server error: {}", e))?;

    Ok(())
}

async fn research(config: Config, task: String, report_type: ReportType, output: Option<PathBuf>) -> Result<()> {
    let services = Arc::new(ResearchServices::from_config(config)?);
    let outcome = Researcher::new(services, task, report_type, Arc::new(ConsoleSink))
        .run()
        .await?;
    println!();

    if let Some(path) = output {
        tokio::fs::write(&path, &outcome.report)
            .await
            .with_context(|| format!("Failed to write report to {}", path.display()))?;
        emit(&ConsoleSink, OutputEvent::Path(path.display().to_string())).await;
    }
    info!(sources = outcome.sources.len(), "Research complete");
    Ok(())
}
