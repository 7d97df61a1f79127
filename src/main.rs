//! modelplane - multi-tenant training and serving control plane for Kubernetes

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tracing::info;

use modelplane_api::{start_server, AppState};
use modelplane_common::kube_utils::create_client_with_timeout;
use modelplane_common::telemetry::{init_telemetry, shutdown_telemetry, TelemetryConfig};
use modelplane_common::WorkloadConfig;
use modelplane_lifecycle::{KubeOrchestrator, LifecycleController};

/// modelplane - per-tenant training runs and serving deployments on Kubernetes
#[derive(Parser, Debug)]
#[command(name = "modelplane", version, about, long_about = None)]
struct Cli {
    /// Container image run by training Jobs
    #[arg(long, env = "TRAINING_IMAGE")]
    training_image: String,

    /// Container image run by serving Deployments
    #[arg(long, env = "SERVING_IMAGE")]
    serving_image: String,

    /// Port the serving container listens on
    #[arg(long, env = "SERVING_PORT")]
    serving_port: u16,

    /// Address of the persistence service, passed to every workload
    #[arg(long, env = "PERSISTENCE_SERVICE_URI")]
    persistence_uri: String,

    /// Public host serving endpoints are published under
    #[arg(long, env = "DOMAIN")]
    domain: String,

    /// Secret holding the TLS certificate for the domain
    #[arg(long, env = "TLS_SECRET_NAME")]
    tls_secret_name: String,

    /// Address the HTTP API binds to
    #[arg(long, env = "LISTEN_ADDR", default_value = "0.0.0.0:8080")]
    listen_addr: SocketAddr,

    /// Explicit kubeconfig file; in-cluster or $KUBECONFIG when unset
    #[arg(long)]
    kubeconfig: Option<PathBuf>,

    /// Kubernetes API connect timeout in seconds
    #[arg(long, default_value = "5")]
    connect_timeout_secs: u64,

    /// Kubernetes API read timeout in seconds
    #[arg(long, default_value = "30")]
    read_timeout_secs: u64,
}

impl Cli {
    fn workload_config(&self) -> WorkloadConfig {
        WorkloadConfig {
            training_image: self.training_image.clone(),
            serving_image: self.serving_image.clone(),
            serving_port: self.serving_port,
            persistence_uri: self.persistence_uri.clone(),
            domain: self.domain.clone(),
            tls_secret_name: self.tls_secret_name.clone(),
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Must happen before any TLS client is built
    if let Err(e) = rustls::crypto::aws_lc_rs::default_provider().install_default() {
        eprintln!("CRITICAL: failed to install aws-lc-rs crypto provider: {:?}", e);
        std::process::exit(1);
    }

    let cli = Cli::parse();

    init_telemetry(TelemetryConfig::default())
        .map_err(|e| anyhow::anyhow!("Failed to initialize telemetry: {}", e))?;

    let result = run(cli).await;
    shutdown_telemetry();
    result
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = cli.workload_config();
    config
        .validate()
        .map_err(|e| anyhow::anyhow!("Invalid configuration: {}", e))?;

    let client = create_client_with_timeout(
        cli.kubeconfig.as_deref(),
        Duration::from_secs(cli.connect_timeout_secs),
        Duration::from_secs(cli.read_timeout_secs),
    )
    .await
    .map_err(|e| anyhow::anyhow!("Failed to create Kubernetes client: {}", e))?;

    info!(
        domain = %config.domain,
        training_image = %config.training_image,
        serving_image = %config.serving_image,
        "modelplane starting"
    );

    let orchestrator = Arc::new(KubeOrchestrator::new(client));
    let state = AppState {
        controller: Arc::new(LifecycleController::new(orchestrator, config)),
    };

    start_server(cli.listen_addr, state)
        .await
        .map_err(|e| anyhow::anyhow!("API server failed: {}", e))
}
