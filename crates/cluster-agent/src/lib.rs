//! ClusterFlow heartbeat agent
//!
//! Runs a workload inside a cluster, posts `running` check-ins while it is
//! alive and a final `success` / `failure` check-in when it exits. Delivery
//! failures are logged and never affect the workload.

use clusterflow_cloud::CheckIn;
use std::process::ExitStatus;
use std::time::Duration;
use thiserror::Error;
use tokio::process::Command;
use tokio::time::MissedTickBehavior;

#[derive(Error, Debug)]
pub enum AgentError {
    #[error("No command given")]
    EmptyCommand,

    #[error("Failed to start '{command}': {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to wait for workload: {0}")]
    Wait(std::io::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Orchestrator rejected check-in with status {0}")]
    Rejected(u16),
}

pub type Result<T> = std::result::Result<T, AgentError>;

#[derive(Debug, Clone)]
pub struct AgentConfig {
    /// Orchestrator base URL, e.g. `http://10.0.0.1:32418`
    pub orchestrator: String,
    pub cluster_id: String,
    pub interval: Duration,
}

/// Posts check-ins to `<orchestrator>/check-in`
#[derive(Clone)]
pub struct CheckInClient {
    http: reqwest::Client,
    endpoint: String,
}

impl CheckInClient {
    pub fn new(orchestrator: &str) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()?;
        Ok(Self {
            http,
            endpoint: format!("{}/check-in", orchestrator.trim_end_matches('/')),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub async fn send(&self, check_in: &CheckIn) -> Result<()> {
        let response = self.http.post(&self.endpoint).json(check_in).send().await?;
        if !response.status().is_success() {
            return Err(AgentError::Rejected(response.status().as_u16()));
        }
        Ok(())
    }

    /// Send and log failures instead of returning them
    pub async fn send_logged(&self, check_in: &CheckIn) {
        if let Err(e) = self.send(check_in).await {
            tracing::warn!(
                cluster_id = %check_in.cluster_id,
                app_exit_status = %check_in.app_exit_status,
                error = %e,
                "Check-in failed"
            );
        }
    }
}

/// Exit code to propagate; signals map to 128 + signal like a shell
pub fn exit_code(status: &ExitStatus) -> i32 {
    if let Some(code) = status.code() {
        return code;
    }
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return 128 + signal;
        }
    }
    1
}

/// Run `command` to completion while reporting heartbeats; returns its exit code
pub async fn run(config: &AgentConfig, command: &[String]) -> Result<i32> {
    let (program, args) = command.split_first().ok_or(AgentError::EmptyCommand)?;
    let client = CheckInClient::new(&config.orchestrator)?;

    let mut child = Command::new(program)
        .args(args)
        .kill_on_drop(true)
        .spawn()
        .map_err(|source| AgentError::Spawn {
            command: program.clone(),
            source,
        })?;

    tracing::info!(
        cluster_id = %config.cluster_id,
        command = %command.join(" "),
        pid = child.id().unwrap_or_default(),
        endpoint = %client.endpoint(),
        "Workload started"
    );

    let mut ticker = tokio::time::interval(config.interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    let status = loop {
        tokio::select! {
            status = child.wait() => break status.map_err(AgentError::Wait)?,
            _ = ticker.tick() => {
                // The workload keeps running while a check-in is in flight
                let client = client.clone();
                let check_in = CheckIn::running(&config.cluster_id, "running");
                tokio::spawn(async move { client.send_logged(&check_in).await });
            }
        }
    };

    let code = exit_code(&status);
    let success = status.success();
    tracing::info!(cluster_id = %config.cluster_id, exit_code = code, success, "Workload exited");

    let summary = format!("exit code {}", code);
    client
        .send_logged(&CheckIn::finished(&config.cluster_id, success, summary))
        .await;

    Ok(code)
}
