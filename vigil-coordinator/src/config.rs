use serde::{Deserialize, Serialize};
use std::path::Path;
use tokio::fs;

pub const DEFAULT_AGENT_PORT: u16 = 5050;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct CoordinatorConfig {
    /// Port d'écoute du protocole ligne agents
    pub agent_port: u16,
    /// Port de la façade HTTP ; défaut: agent_port + 1
    pub http_port: Option<u16>,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            agent_port: DEFAULT_AGENT_PORT,
            http_port: None,
        }
    }
}

impl CoordinatorConfig {
    pub fn http_port(&self) -> u16 {
        self.http_port.unwrap_or(self.agent_port + 1)
    }
}

pub async fn load_config() -> CoordinatorConfig {
    let path = std::env::var("VIGIL_CONFIG").unwrap_or_else(|_| "coordinator.yaml".into());
    if Path::new(&path).exists() {
        let txt = fs::read_to_string(&path).await.unwrap_or_default();
        if txt.trim().is_empty() {
            return CoordinatorConfig::default();
        }
        serde_yaml::from_str(&txt).unwrap_or_else(|e| {
            eprintln!("[coordinator] config invalide: {e}");
            CoordinatorConfig::default()
        })
    } else {
        CoordinatorConfig::default()
    }
}

/// Surcharge par arguments positionnels: <port_agents> [port_http].
/// Un port illisible retombe sur le défaut (avec un log), jamais une erreur.
pub fn apply_args<I>(mut cfg: CoordinatorConfig, mut args: I) -> CoordinatorConfig
where
    I: Iterator<Item = String>,
{
    if let Some(raw) = args.next() {
        match raw.parse::<u16>() {
            Ok(port) => cfg.agent_port = port,
            Err(_) => println!("[coordinator] invalid port, using default: {}", cfg.agent_port),
        }
    }
    if let Some(raw) = args.next() {
        // second argument illisible : on retombe sur agent_port + 1
        cfg.http_port = raw.parse::<u16>().ok();
    }
    cfg
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let cfg = CoordinatorConfig::default();
        assert_eq!(cfg.agent_port, 5050);
        assert_eq!(cfg.http_port(), 5051);
    }

    #[test]
    fn args_override_ports() {
        let cfg = apply_args(
            CoordinatorConfig::default(),
            ["6000".to_string(), "7000".to_string()].into_iter(),
        );
        assert_eq!(cfg.agent_port, 6000);
        assert_eq!(cfg.http_port(), 7000);
    }

    #[test]
    fn invalid_args_fall_back() {
        let cfg = apply_args(
            CoordinatorConfig::default(),
            ["nope".to_string(), "nope".to_string()].into_iter(),
        );
        assert_eq!(cfg.agent_port, 5050);
        assert_eq!(cfg.http_port(), 5051);

        let cfg = apply_args(CoordinatorConfig::default(), ["6000".to_string()].into_iter());
        assert_eq!(cfg.http_port(), 6001);
    }

    #[test]
    fn yaml_roundtrip() {
        let cfg: CoordinatorConfig = serde_yaml::from_str("agent_port: 9000\n").unwrap();
        assert_eq!(cfg.agent_port, 9000);
        assert_eq!(cfg.http_port(), 9001);
    }
}
