/**
 * CLIENT REGISTRY - État autoritaire des agents suivis par le coordinateur
 *
 * RÔLE :
 * Source de vérité unique pour les métriques, la vivacité et le
 * consentement monitoring de chaque agent. Partagé entre tous les
 * handlers de connexion et la façade HTTP.
 *
 * FONCTIONNEMENT :
 * - Un AgentRecord par clientId, créé au premier rapport, jamais supprimé
 * - Verrouillage fin : un Mutex par record derrière un RwLock d'index,
 *   deux agents distincts ne se contendent jamais
 * - online est dérivé : balayage de vivacité (seuil 15s) exécuté au moment
 *   du snapshot, pas par une tâche de fond
 *
 * GARANTIES :
 * - upsert linéarisable par id (pas d'écritures partielles entrelacées)
 * - last_seen_ms monotone croissant
 * - snapshot_all : au plus un record par id, flag online cohérent avec
 *   now - last_seen au moment de l'appel
 */

use crate::models::{AgentRecord, StatusReport};
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::Arc;

/// Silence au-delà duquel un agent est considéré offline
pub const OFFLINE_THRESHOLD_MS: i64 = 15_000;

pub struct ClientRegistry {
    records: RwLock<HashMap<String, Arc<Mutex<AgentRecord>>>>,
}

pub type SharedClientRegistry = Arc<ClientRegistry>;

impl ClientRegistry {
    pub fn new() -> Self {
        Self {
            records: RwLock::new(HashMap::new()),
        }
    }

    fn slot(&self, client_id: &str) -> Option<Arc<Mutex<AgentRecord>>> {
        self.records.read().get(client_id).cloned()
    }

    /// Create-or-update atomique par id. À la création : online, transition
    /// horodatée. À la mise à jour : écrase les métriques, rafraîchit
    /// last_seen, rebascule online si nécessaire.
    pub fn upsert(&self, report: &StatusReport, now_ms: i64) {
        let slot = match self.slot(&report.client_id) {
            Some(existing) => existing,
            None => {
                let mut map = self.records.write();
                map.entry(report.client_id.clone())
                    .or_insert_with(|| Arc::new(Mutex::new(AgentRecord::new(&report.client_id, now_ms))))
                    .clone()
            }
        };

        let mut record = slot.lock();
        record.ts = report.ts;
        record.cpu_load = report.cpu_load;
        record.ram_used_mb = report.ram_used_mb;
        record.ram_total_mb = report.ram_total_mb;
        record.process_count = report.process_count;
        // monotone même si deux rapports concurrents se croisent
        record.last_seen_ms = record.last_seen_ms.max(now_ms);
        if !record.online {
            record.online = true;
            record.last_change_ms = now_ms;
        }
    }

    /// Bascule offline avec horodatage de transition ; idempotent
    pub fn mark_offline(&self, client_id: &str, now_ms: i64) {
        if let Some(slot) = self.slot(client_id) {
            let mut record = slot.lock();
            if record.online {
                record.online = false;
                record.last_change_ms = now_ms;
            }
        }
    }

    /// Écrase le consentement monitoring. Ne crée jamais de record : un
    /// agent n'existe qu'après au moins un rapport.
    pub fn set_monitoring_granted(&self, client_id: &str, granted: bool) {
        if let Some(slot) = self.slot(client_id) {
            slot.lock().monitoring_granted = granted;
        }
    }

    /// Balayage de vivacité puis copie immuable de tous les records.
    /// Le balayage est un effet de bord de chaque lecture : pas de timer.
    pub fn snapshot_all(&self, now_ms: i64) -> Vec<AgentRecord> {
        let slots: Vec<Arc<Mutex<AgentRecord>>> = self.records.read().values().cloned().collect();
        let mut out = Vec::with_capacity(slots.len());
        for slot in slots {
            let mut record = slot.lock();
            if record.online
                && record.last_seen_ms > 0
                && now_ms - record.last_seen_ms > OFFLINE_THRESHOLD_MS
            {
                record.online = false;
                record.last_change_ms = now_ms;
            }
            out.push(record.clone());
        }
        out
    }
}

impl Default for ClientRegistry {
    fn default() -> Self {
        Self::new()
    }
}
