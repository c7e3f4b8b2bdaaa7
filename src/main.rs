//! Cluster Inspector - workload metrics annotations and route TLS reporting

use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use cluster_inspector::api::{api_router, AppState};
use cluster_inspector::k8s::create_client;
use cluster_inspector::k8s::workloads::{KubeWorkloadLister, WorkloadRetriever};
use cluster_inspector::openshift::{KubeRouteLister, RouteRetriever};
use cluster_inspector::DEFAULT_API_PORT;

/// Cluster Inspector - reports Prometheus scrape annotations on workloads
/// and TLS consistency of OpenShift routes
#[derive(Parser, Debug)]
#[command(name = "cluster-inspector", version, about, long_about = None)]
struct Cli {
    /// Port to serve the HTTP API on
    #[arg(long, env = "INSPECTOR_PORT", default_value_t = DEFAULT_API_PORT)]
    port: u16,

    /// Address to bind
    #[arg(long, env = "INSPECTOR_BIND", default_value = "0.0.0.0")]
    bind: IpAddr,

    /// Path to a kubeconfig file; cluster config is inferred when omitted
    #[arg(long, env = "KUBECONFIG")]
    kubeconfig: Option<std::path::PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Install crypto provider - aws-lc-rs backs every TLS client connection
    // and MUST be in place before any kube client is built.
    if let Err(e) = rustls::crypto::aws_lc_rs::default_provider().install_default() {
        eprintln!(
            "CRITICAL: Failed to install crypto provider: {:?}. \
             The inspector cannot talk to the cluster without a working TLS \
             implementation.",
            e
        );
        std::process::exit(1);
    }

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    let client = create_client(cli.kubeconfig.as_deref()).await?;

    let state = Arc::new(AppState {
        workloads: WorkloadRetriever::new(KubeWorkloadLister::new(client.clone())),
        routes: RouteRetriever::new(KubeRouteLister::new(client)),
    });

    let addr = SocketAddr::new(cli.bind, cli.port);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(addr = %addr, "inspector API listening");

    axum::serve(listener, api_router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("inspector shutting down");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
    }
}
