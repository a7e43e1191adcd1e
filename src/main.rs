use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use dlq::client::{ActionDispatcher, AddOutcome, Engine, RpcEngine};
use dlq::config::AppConfig;
use dlq::core::JobStatus;
use dlq::daemon::{Daemon, QueueManager, SimulatedFetcher};
use dlq::logging::{self, LogConfig};
use dlq::rpc::{RpcClient, method};
use dlq::{cli, context, db};
use serde::Serialize;

#[derive(Parser)]
#[command(name = "dlq")]
#[command(about = "Download queue engine and operator console", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[command(flatten)]
    global: GlobalArgs,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the engine daemon
    Daemon(DaemonArgs),
    /// Open the interactive queue console
    Tui,
    /// Queue a download
    Add {
        /// Content id or Steam Workshop URL
        content_id: String,
        #[arg(long)]
        name: Option<String>,
    },
    /// Print the current queue
    Queue,
    /// Print the download history
    History,
    /// Show daemon status
    Status,
}

#[derive(Args, Serialize)]
struct GlobalArgs {
    #[serde(skip_serializing_if = "Option::is_none")]
    #[arg(long, global = true)]
    rpc_bind: Option<SocketAddr>,

    #[serde(skip_serializing_if = "Option::is_none")]
    #[arg(long, global = true)]
    verbose: Option<bool>,

    #[serde(skip_serializing_if = "Option::is_none")]
    #[arg(long, global = true)]
    json_logs: Option<bool>,

    #[serde(skip_serializing_if = "Option::is_none")]
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,
}

#[derive(Args, Serialize)]
struct DaemonArgs {
    #[serde(skip_serializing_if = "Option::is_none")]
    #[arg(long)]
    download_directory: Option<PathBuf>,

    #[serde(skip_serializing_if = "Option::is_none")]
    #[arg(long)]
    database_path: Option<PathBuf>,

    #[serde(skip_serializing_if = "Option::is_none")]
    #[arg(long)]
    keep_finished: Option<usize>,

    #[serde(skip_serializing_if = "Option::is_none")]
    #[arg(long)]
    fetch_step_ms: Option<u64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    #[arg(long)]
    delete_files_on_remove: Option<bool>,
}

#[derive(Serialize)]
struct Overrides<'a> {
    #[serde(flatten)]
    global: &'a GlobalArgs,
    #[serde(flatten, skip_serializing_if = "Option::is_none")]
    daemon: Option<&'a DaemonArgs>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let overrides = Overrides {
        global: &cli.global,
        daemon: match &cli.command {
            Commands::Daemon(args) => Some(args),
            _ => None,
        },
    };
    let config = AppConfig::new(Some(&overrides))?;

    // The TUI owns the terminal, so it only logs when given a file
    if !matches!(cli.command, Commands::Tui) || config.log_file.is_some() {
        logging::init(LogConfig {
            json: config.json_logs,
            verbose: config.verbose,
            file: config.log_file.clone(),
        })?;
    }

    match cli.command {
        Commands::Daemon(_) => run_daemon(config).await.context("Daemon failed")?,
        Commands::Tui => cli::tui::run(config.rpc_bind).await?,
        Commands::Add { content_id, name } => {
            run_add(config.rpc_bind, &content_id, name.as_deref()).await?
        }
        Commands::Queue => run_queue(config.rpc_bind).await?,
        Commands::History => run_history(config.rpc_bind).await?,
        Commands::Status => run_status(config.rpc_bind)
            .await
            .context("Failed to check status of daemon")?,
    }

    Ok(())
}

async fn run_daemon(config: AppConfig) -> Result<()> {
    let db_conn = db::init(&config.database_path).await?;
    let fetcher = SimulatedFetcher::new(Duration::from_millis(config.fetch_step_ms));
    let queue = QueueManager::new(config.keep_finished);
    let ctx = context::AppContext::new(config, db_conn, queue);

    let handle = Daemon::new(ctx, Arc::new(fetcher)).start().await?;

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for ctrl-c")?;
    handle.shutdown().await;
    Ok(())
}

async fn run_add(addr: SocketAddr, content_id: &str, name: Option<&str>) -> Result<()> {
    let dispatcher = ActionDispatcher::new(Arc::new(RpcEngine::new(addr)));
    match dispatcher.add(content_id, name).await? {
        AddOutcome::Submitted { display_name, .. } => println!("Queued {}", display_name),
        AddOutcome::Ignored => println!("Nothing to add: content id is empty"),
    }
    Ok(())
}

async fn run_queue(addr: SocketAddr) -> Result<()> {
    let jobs = RpcEngine::new(addr).get_queue().await?;
    if jobs.is_empty() {
        println!("Queue is empty");
    }
    for job in jobs {
        println!(
            "{:<36}  {:<16}  {} ({})",
            job.id,
            job.status.label(),
            job.display_name,
            job.content_id
        );
        if let JobStatus::Failed(log) = &job.status {
            for line in log.lines() {
                println!("    {}", line);
            }
        }
    }
    Ok(())
}

async fn run_history(addr: SocketAddr) -> Result<()> {
    let records = RpcEngine::new(addr).get_history().await?;
    if records.is_empty() {
        println!("No history");
    }
    for record in records {
        println!(
            "{}  {} ({})  {}",
            record.timestamp.format("%Y-%m-%d %H:%M:%S"),
            record.display_name,
            record.content_id,
            if record.install_path.is_empty() {
                "-"
            } else {
                &record.install_path
            }
        );
    }
    Ok(())
}

async fn run_status(addr: SocketAddr) -> Result<()> {
    let status: serde_json::Value = RpcClient::new(addr)
        .call_no_params(method::DAEMON_STATUS)
        .await?;
    println!("{}", serde_json::to_string_pretty(&status)?);
    Ok(())
}
