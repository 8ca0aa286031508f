//! Vigil Agent Host - endpoint agent for the Vigil coordinator
//!
//! This agent reports system state to the coordinator over the line
//! protocol and answers consent-gated directives:
//! - One status report (CPU, RAM, processes) per heartbeat cycle
//! - Reconnect with backoff after any I/O failure
//! - CMD:REQUEST_MONITORING answered with an APPROVAL line before the
//!   next report

mod config;
mod metrics;

use anyhow::{bail, Context, Result};
use chrono::Utc;
use config::AgentConfig;
use metrics::Sampler;
use serde::Serialize;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::{info, warn};

/// Status report wire shape (one JSON object per line)
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct StatusReport<'a> {
    client_id: &'a str,
    ts: i64,
    cpu_load: f64,
    ram_used_mb: i64,
    ram_total_mb: i64,
    processes: &'a [metrics::ProcessEntry],
}

/// Main agent state
struct Agent {
    config: AgentConfig,
    sampler: Sampler,
    monitoring_approved: bool,
}

impl Agent {
    fn new(config: AgentConfig) -> Self {
        Self {
            config,
            sampler: Sampler::new(),
            monitoring_approved: false,
        }
    }

    /// Drive one connection until the server closes it or I/O fails.
    /// The caller owns the reconnect loop.
    async fn run_connection(&mut self) -> Result<()> {
        let addr = format!("{}:{}", self.config.server_host, self.config.server_port);
        let socket = TcpStream::connect(&addr)
            .await
            .with_context(|| format!("connect to coordinator at {addr}"))?;
        info!("Connected to {} as {}", addr, self.config.client_id);

        let (read_half, write_half) = socket.into_split();
        let mut reader = BufReader::new(read_half);
        let mut writer = write_half;

        loop {
            let report = self.build_report().await?;
            let reply = self.send_line(&mut writer, &mut reader, &report).await?;

            if let Some(command) = reply.strip_prefix("CMD:") {
                self.handle_command(command.trim(), &mut writer, &mut reader)
                    .await?;
            }

            tokio::time::sleep(Duration::from_secs(self.config.heartbeat_secs)).await;
        }
    }

    async fn build_report(&mut self) -> Result<String> {
        let sample = self.sampler.sample(self.config.max_processes).await;
        let report = StatusReport {
            client_id: &self.config.client_id,
            ts: Utc::now().timestamp_millis(),
            cpu_load: sample.cpu_load,
            ram_used_mb: sample.ram_used_mb,
            ram_total_mb: sample.ram_total_mb,
            processes: &sample.processes,
        };
        serde_json::to_string(&report).context("serialize status report")
    }

    /// Write one line and await the coordinator's reply (read timeout
    /// bounds a stalled server; a closed stream is an error so the main
    /// loop reconnects).
    async fn send_line(
        &self,
        writer: &mut OwnedWriteHalf,
        reader: &mut BufReader<OwnedReadHalf>,
        line: &str,
    ) -> Result<String> {
        writer.write_all(line.as_bytes()).await?;
        writer.write_all(b"\n").await?;

        let mut reply = String::new();
        let read = timeout(
            Duration::from_secs(self.config.read_timeout_secs),
            reader.read_line(&mut reply),
        )
        .await
        .context("timed out waiting for coordinator reply")??;
        if read == 0 {
            bail!("server closed connection");
        }
        Ok(reply.trim_end().to_string())
    }

    async fn handle_command(
        &mut self,
        command: &str,
        writer: &mut OwnedWriteHalf,
        reader: &mut BufReader<OwnedReadHalf>,
    ) -> Result<()> {
        if command.eq_ignore_ascii_case("REQUEST_MONITORING") {
            info!("Received REQUEST_MONITORING");
            let granted = self.config.auto_grant_monitoring;
            self.monitoring_approved = granted;
            info!("Monitoring approval: {granted}");

            let approval = build_approval_line(&self.config.client_id, granted);
            self.send_line(writer, reader, &approval).await?;

            if granted {
                // the screenshot follows on the agent's own initiative,
                // shortly after a granted approval
                tokio::time::sleep(Duration::from_secs(2)).await;
                let shot = build_screenshot_line(&self.config.client_id, true);
                self.send_line(writer, reader, &shot).await?;
            }
        } else if command.eq_ignore_ascii_case("REQUEST_SCREENSHOT") {
            info!("Received REQUEST_SCREENSHOT");
            let shot = build_screenshot_line(&self.config.client_id, self.monitoring_approved);
            self.send_line(writer, reader, &shot).await?;
        } else {
            warn!("Unknown command from coordinator: {command}");
        }
        Ok(())
    }
}

fn build_approval_line(client_id: &str, granted: bool) -> String {
    format!("APPROVAL clientId={client_id} action=monitoring granted={granted}")
}

/// Screen capture is not available on a headless agent: a granted request
/// still answers with a denial carrying the reason.
fn build_screenshot_line(client_id: &str, allowed: bool) -> String {
    if !allowed {
        return format!("SCREENSHOT clientId={client_id} granted=false");
    }
    format!("SCREENSHOT clientId={client_id} granted=false reason=headless")
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt().init();

    let config = AgentConfig::load(std::env::args().skip(1));
    info!(
        "Vigil Agent Host starting (id: {}, coordinator: {}:{})",
        config.client_id, config.server_host, config.server_port
    );

    let backoff = Duration::from_secs(config.heartbeat_secs);
    let mut agent = Agent::new(config);
    loop {
        if let Err(e) = agent.run_connection().await {
            warn!("Connection error: {e:#}");
        }
        // reconnection is always the agent's responsibility
        tokio::time::sleep(backoff).await;
    }
}
