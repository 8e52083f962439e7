//! ModelRoute Server
//!
//! Routing engine exposed over gRPC, with health, metrics and registry
//! admin endpoints over HTTP.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tokio::net::TcpListener;
use tonic::transport::Server;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use modelroute_core::BackendId;
use modelroute_server::{
    http, AppState, CapabilityRegistry, Config, InMemoryStore, MockRuntime,
    ModelRouterServiceImpl, RegistryTable, ThresholdMode,
};

/// ModelRoute routing engine.
#[derive(Parser, Debug)]
#[command(name = "modelroute-server", about = "ModelRoute task routing engine")]
struct Args {
    /// gRPC server address
    #[arg(long, default_value = "[::1]:50051")]
    grpc_addr: String,

    /// HTTP server address
    #[arg(long, default_value = "[::1]:50052")]
    http_addr: String,

    /// Capability registry file (JSON); the built-in table is used if unset
    #[arg(long)]
    registry: Option<PathBuf>,

    /// Memory budget for resident backends, in MB
    #[arg(long, default_value = "16000")]
    memory_budget_mb: u64,

    /// Seconds an attempt waits for a pool slot
    #[arg(long, default_value = "30")]
    acquire_timeout_secs: u64,

    /// Seconds allowed for one backend call
    #[arg(long, default_value = "120")]
    invoke_timeout_secs: u64,

    /// Seconds a task may wait for its dependencies
    #[arg(long, default_value = "600")]
    pending_timeout_secs: u64,

    /// Tasks routed at the same time
    #[arg(long, default_value = "4")]
    max_concurrent_tasks: usize,

    /// Confidence threshold mode (hard or advisory)
    #[arg(long, default_value = "hard")]
    threshold_mode: ThresholdMode,

    /// Weight of the prior confidence when folding results into a session
    #[arg(long, default_value = "0.7")]
    context_decay: f64,

    /// Memory documents retrieved per prompt
    #[arg(long, default_value = "3")]
    max_documents: usize,

    /// Backends to load at startup and never evict (repeatable)
    #[arg(long = "pin")]
    pinned: Vec<BackendId>,
}

impl From<Args> for Config {
    fn from(args: Args) -> Self {
        Self {
            grpc_addr: args.grpc_addr,
            http_addr: args.http_addr,
            memory_budget_mb: args.memory_budget_mb,
            acquire_timeout: Duration::from_secs(args.acquire_timeout_secs),
            invoke_timeout: Duration::from_secs(args.invoke_timeout_secs),
            pending_timeout: Duration::from_secs(args.pending_timeout_secs),
            max_concurrent_tasks: args.max_concurrent_tasks,
            context_decay: args.context_decay.clamp(0.0, 1.0),
            max_documents: args.max_documents,
            threshold_mode: args.threshold_mode,
            pinned: args.pinned,
            registry_path: args.registry,
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env().add_directive("modelroute=info".parse()?),
        )
        .init();

    let config = Config::from(args);
    let grpc_addr: SocketAddr = config.grpc_addr.parse()?;
    let http_addr: SocketAddr = config.http_addr.parse()?;

    let registry = match &config.registry_path {
        Some(path) => {
            let registry = CapabilityRegistry::from_file(path)?;
            info!(path = %path.display(), backends = registry.table().len(), "Registry loaded");
            registry
        }
        None => {
            info!("Using built-in capability registry");
            CapabilityRegistry::new(RegistryTable::builtin())
        }
    };

    info!(
        budget_mb = config.memory_budget_mb,
        threshold_mode = %config.threshold_mode,
        max_concurrent_tasks = config.max_concurrent_tasks,
        "Starting ModelRoute"
    );

    let state = AppState::init(
        config,
        Arc::new(registry),
        Arc::new(MockRuntime::new()),
        Arc::new(InMemoryStore::new()),
    )
    .await;

    let router_service = ModelRouterServiceImpl::new(state.clone()).into_server();
    let http_router = http::create_router(state.clone());

    let grpc_server = Server::builder()
        .add_service(router_service)
        .serve(grpc_addr);

    let http_listener = TcpListener::bind(http_addr).await?;
    let http_server = axum::serve(http_listener, http_router);

    info!("gRPC server listening on {}", grpc_addr);
    info!("HTTP server listening on {}", http_addr);

    tokio::select! {
        result = grpc_server => {
            if let Err(e) = result {
                error!(error = %e, "gRPC server error");
            }
        }
        result = http_server => {
            if let Err(e) = result {
                error!(error = %e, "HTTP server error");
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Shutdown requested");
        }
    }

    state.shutdown().await;
    info!("ModelRoute stopped");

    Ok(())
}
