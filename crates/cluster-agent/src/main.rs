use clap::Parser;
use cluster_agent::AgentConfig;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "cluster-agent")]
#[command(about = "Run a workload and report its status to clusterflowd", version)]
struct Cli {
    /// Orchestrator base URL
    #[arg(long, env = "CLUSTERFLOW_ORCHESTRATOR")]
    orchestrator: String,

    /// ID of the cluster this agent runs in
    #[arg(long, env = "CLUSTERFLOW_CLUSTER_ID")]
    cluster_id: String,

    /// ハートビート間隔（秒）
    #[arg(long, default_value_t = 30, value_parser = clap::value_parser!(u64).range(1..))]
    interval_secs: u64,

    /// Workload command, given after `--`
    #[arg(last = true, required = true)]
    command: Vec<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = AgentConfig {
        orchestrator: cli.orchestrator,
        cluster_id: cli.cluster_id,
        interval: Duration::from_secs(cli.interval_secs),
    };

    let code = cluster_agent::run(&config, &cli.command).await?;
    std::process::exit(code);
}
