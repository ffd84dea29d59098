use std::net::SocketAddr;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use load_manager::config::{SchedulerConfig, ServerConfig};
use load_manager::scheduler::SchedulingPolicy;
use load_manager::server::Server;
use load_manager::shutdown::install_shutdown_handler;

#[derive(Parser, Debug)]
#[command(name = "load-manager")]
#[command(version)]
#[command(about = "Simulated multi-worker task backend with pluggable scheduling policies")]
struct Args {
    /// Port for the HTTP API
    #[arg(long, default_value = "3001")]
    port: u16,

    /// Number of workers in the pool
    #[arg(long, default_value = "4")]
    workers: usize,

    /// Scheduling policy: FCFS, PRIORITY or ROUND_ROBIN
    #[arg(long, default_value = "PRIORITY")]
    policy: SchedulingPolicy,

    /// Round-robin quantum in milliseconds
    #[arg(long, default_value = "200")]
    quantum_ms: u64,

    /// Maximum queued tasks before single submissions are dropped
    #[arg(long, default_value = "1000")]
    max_queue: usize,

    /// Completed tasks kept in the ledger
    #[arg(long, default_value = "10000")]
    retention: usize,

    /// Recent completions reported by /status
    #[arg(long, default_value = "1000")]
    recent: usize,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    let listen_addr: SocketAddr = format!("0.0.0.0:{}", args.port).parse()?;
    let scheduler = SchedulerConfig {
        policy: args.policy,
        worker_count: args.workers,
        rr_quantum_ms: args.quantum_ms,
        max_queue: args.max_queue,
        completed_retention: args.retention,
        recent_completed_max: args.recent,
    };
    let config = ServerConfig::new(listen_addr, scheduler);

    let shutdown = install_shutdown_handler()?;
    Server::new(config).run(shutdown).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
