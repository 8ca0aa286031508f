use serde::Serialize;
use time::OffsetDateTime;

/// Rapport de statut décodé depuis une ligne agent.
/// Chaque champ métrique peut être inconnu indépendamment (None) :
/// inconnu et zéro restent distinguables en aval.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StatusReport {
    pub client_id: String,
    pub ts: Option<i64>,
    pub cpu_load: Option<f64>,
    pub ram_used_mb: Option<i64>,
    pub ram_total_mb: Option<i64>,
    pub process_count: u32,
}

impl StatusReport {
    /// Résumé une-ligne pour les logs du coordinateur
    pub fn summary(&self) -> String {
        let cpu = match self.cpu_load {
            Some(load) => format!("{:.1}%", load * 100.0),
            None => "n/a".to_string(),
        };
        let ram = match (self.ram_used_mb, self.ram_total_mb) {
            (Some(used), Some(total)) => format!("{used}/{total}MB"),
            _ => "n/a".to_string(),
        };
        format!(
            "clientId={} cpu={} ram={} processes={}",
            self.client_id, cpu, ram, self.process_count
        )
    }
}

/// État autoritaire d'un agent dans le registre.
/// Créé paresseusement au premier rapport, jamais supprimé.
#[derive(Debug, Clone, Serialize)]
pub struct AgentRecord {
    pub client_id: String,
    pub ts: Option<i64>,
    pub cpu_load: Option<f64>,
    pub ram_used_mb: Option<i64>,
    pub ram_total_mb: Option<i64>,
    pub process_count: u32,
    /// Dernier message reçu avec succès, epoch ms
    pub last_seen_ms: i64,
    /// Dérivé de last_seen_ms vs seuil de silence, recalculé au snapshot
    pub online: bool,
    /// Dernière transition online↔offline, epoch ms
    pub last_change_ms: i64,
    /// Consentement monitoring, persistant jusqu'au prochain cycle de demande
    pub monitoring_granted: bool,
}

impl AgentRecord {
    pub fn new(client_id: &str, now_ms: i64) -> Self {
        Self {
            client_id: client_id.to_string(),
            ts: None,
            cpu_load: None,
            ram_used_mb: None,
            ram_total_mb: None,
            process_count: 0,
            last_seen_ms: 0,
            online: true,
            last_change_ms: now_ms,
            monitoring_granted: false,
        }
    }
}

/// Horloge murale en epoch millisecondes (format des timestamps du protocole)
pub fn now_ms() -> i64 {
    (OffsetDateTime::now_utc().unix_timestamp_nanos() / 1_000_000) as i64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn summary_with_full_metrics() {
        let report = StatusReport {
            client_id: "a1".into(),
            ts: Some(1000),
            cpu_load: Some(0.25),
            ram_used_mb: Some(512),
            ram_total_mb: Some(1024),
            process_count: 1,
        };
        assert_eq!(report.summary(), "clientId=a1 cpu=25.0% ram=512/1024MB processes=1");
    }

    #[test]
    fn summary_with_unknown_fields() {
        let report = StatusReport {
            client_id: "a1".into(),
            ram_total_mb: Some(1024),
            ..Default::default()
        };
        // RAM partielle = inconnue, pas zéro
        assert_eq!(report.summary(), "clientId=a1 cpu=n/a ram=n/a processes=0");
    }
}
