/*!
Faux agent pour tester le coordinateur

Client TCP scripté parlant le protocole ligne : envoie des rapports ou des
lignes arbitraires et lit la réponse du coordinateur avec un timeout.
*/

use anyhow::{Context, Result};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::time::timeout;

const REPLY_TIMEOUT: Duration = Duration::from_secs(2);

/// Agent scripté connecté au coordinateur
pub struct FakeAgent {
    reader: BufReader<OwnedReadHalf>,
    writer: OwnedWriteHalf,
}

impl FakeAgent {
    pub async fn connect(addr: SocketAddr) -> Result<Self> {
        env_logger::try_init().ok(); // Init logging pour tests
        let socket = TcpStream::connect(addr)
            .await
            .with_context(|| format!("connect to coordinator at {addr}"))?;
        let (read_half, write_half) = socket.into_split();
        log::debug!("fake agent connected to {addr}");
        Ok(Self {
            reader: BufReader::new(read_half),
            writer: write_half,
        })
    }

    /// Envoie une ligne (le '\n' est ajouté)
    pub async fn send_line(&mut self, line: &str) -> Result<()> {
        self.writer.write_all(line.as_bytes()).await?;
        self.writer.write_all(b"\n").await?;
        Ok(())
    }

    /// Lit une ligne de réponse, avec timeout
    pub async fn recv_line(&mut self) -> Result<String> {
        let mut line = String::new();
        let read = timeout(REPLY_TIMEOUT, self.reader.read_line(&mut line))
            .await
            .context("timed out waiting for coordinator reply")??;
        anyhow::ensure!(read > 0, "coordinator closed the connection");
        Ok(line.trim_end().to_string())
    }

    /// Cycle complet : envoie une ligne et retourne la réponse
    pub async fn send_recv(&mut self, line: &str) -> Result<String> {
        self.send_line(line).await?;
        self.recv_line().await
    }

    /// Ligne de rapport de statut bien formée, avec `process_count`
    /// entrées factices dans l'array processes
    pub fn report_line(
        client_id: &str,
        cpu_load: f64,
        ram_used_mb: i64,
        ram_total_mb: i64,
        process_count: usize,
    ) -> String {
        let processes: Vec<serde_json::Value> = (0..process_count)
            .map(|i| serde_json::json!({ "pid": i + 1, "cmd": format!("proc-{}", i + 1) }))
            .collect();
        serde_json::json!({
            "clientId": client_id,
            "ts": 1_000,
            "cpuLoad": cpu_load,
            "ramUsedMb": ram_used_mb,
            "ramTotalMb": ram_total_mb,
            "processes": processes,
        })
        .to_string()
    }

    /// Ligne d'approbation monitoring
    pub fn approval_line(client_id: &str, granted: bool) -> String {
        format!("APPROVAL clientId={client_id} action=monitoring granted={granted}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn report_line_is_valid_json() {
        let line = FakeAgent::report_line("a1", 0.25, 512, 1024, 2);
        let parsed: serde_json::Value = serde_json::from_str(&line).unwrap();
        assert_eq!(parsed["clientId"], "a1");
        assert_eq!(parsed["processes"].as_array().unwrap().len(), 2);
    }

    #[test]
    fn approval_line_shape() {
        assert_eq!(
            FakeAgent::approval_line("a1", true),
            "APPROVAL clientId=a1 action=monitoring granted=true"
        );
    }
}
