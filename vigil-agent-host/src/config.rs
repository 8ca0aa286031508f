//! Agent configuration
//!
//! Resolution order: built-in defaults, then `VIGIL_AGENT_*` environment
//! variables, then positional CLI arguments `<host> [port] [client_id]`
//! (highest precedence). An unparseable port falls back to the default.

use uuid::Uuid;

pub const DEFAULT_PORT: u16 = 5050;
pub const HEARTBEAT_SECONDS: u64 = 5;
pub const READ_TIMEOUT_SECONDS: u64 = 15;
pub const MAX_PROCESSES: usize = 50;

#[derive(Debug, Clone)]
pub struct AgentConfig {
    pub server_host: String,
    pub server_port: u16,
    pub client_id: String,
    pub heartbeat_secs: u64,
    pub read_timeout_secs: u64,
    /// Consent decision for monitoring requests. The agent is headless, so
    /// the answer comes from configuration instead of a dialog; unset
    /// means denied.
    pub auto_grant_monitoring: bool,
    pub max_processes: usize,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            server_host: "127.0.0.1".to_string(),
            server_port: DEFAULT_PORT,
            client_id: default_client_id(),
            heartbeat_secs: HEARTBEAT_SECONDS,
            read_timeout_secs: READ_TIMEOUT_SECONDS,
            auto_grant_monitoring: false,
            max_processes: MAX_PROCESSES,
        }
    }
}

impl AgentConfig {
    /// Load configuration from environment and CLI arguments
    pub fn load<I>(args: I) -> Self
    where
        I: Iterator<Item = String>,
    {
        let mut config = Self::default();

        if let Ok(host) = std::env::var("VIGIL_AGENT_SERVER") {
            config.server_host = host;
        }
        if let Ok(port) = std::env::var("VIGIL_AGENT_PORT") {
            config.server_port = port.parse().unwrap_or(DEFAULT_PORT);
        }
        if let Ok(id) = std::env::var("VIGIL_AGENT_ID") {
            config.client_id = id;
        }
        if let Ok(grant) = std::env::var("VIGIL_AGENT_AUTO_GRANT") {
            config.auto_grant_monitoring = grant.eq_ignore_ascii_case("true");
        }

        let args: Vec<String> = args.collect();
        if let Some(host) = args.first() {
            config.server_host = host.clone();
        }
        if let Some(port) = args.get(1) {
            config.server_port = port.parse().unwrap_or(DEFAULT_PORT);
        }
        if let Some(id) = args.get(2) {
            config.client_id = id.clone();
        }

        config
    }
}

/// Hostname-based client id, with a random fallback
fn default_client_id() -> String {
    let hostname = gethostname::gethostname().to_string_lossy().to_string();
    if hostname.is_empty() {
        format!("client-{}", Uuid::new_v4())
    } else {
        hostname
    }
}
