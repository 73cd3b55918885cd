use anyhow::Context;
use clap::Parser;
use clusterflow_controlplane::{ControlPlane, ProviderFactory};
use clusterflowd::config;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "clusterflowd")]
#[command(about = "ClusterFlow Control Plane daemon", version)]
struct Cli {
    /// 設定ファイル (clusterflowd.kdl)
    #[arg(long, short = 'c', env = "CLUSTERFLOW_CONFIG")]
    config: Option<PathBuf>,

    /// Listen address (overrides `listen` in the config file)
    #[arg(long, env = "CLUSTERFLOW_LISTEN")]
    listen: Option<SocketAddr>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();

    let (mut daemon_config, source) =
        config::load(cli.config.as_deref()).context("設定の読み込みに失敗しました")?;
    if let Some(listen) = cli.listen {
        daemon_config.listen = listen;
    }

    match &source {
        Some(path) => tracing::info!(path = %path.display(), "Loaded config"),
        None => tracing::info!("No config file found, using defaults"),
    }
    tracing::info!(
        aws = daemon_config.providers.aws,
        sakura = daemon_config.providers.sakura,
        docker = daemon_config.providers.docker,
        "Providers"
    );

    let factory = Arc::new(ProviderFactory::new(daemon_config.providers));
    let (plane, reconciler) = ControlPlane::start(factory, daemon_config.reconciler.clone());

    let listener = tokio::net::TcpListener::bind(daemon_config.listen)
        .await
        .with_context(|| format!("{} で待ち受けできません", daemon_config.listen))?;
    tracing::info!(listen = %daemon_config.listen, "clusterflowd listening");

    axum::serve(listener, clusterflowd::router(plane.clone()))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Waiting for in-flight teardowns");
    plane.reconciler().shutdown();
    reconciler.await?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
