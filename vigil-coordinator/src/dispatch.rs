use parking_lot::Mutex;
use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

const SHARD_COUNT: usize = 16;

/// File de commandes en attente : au plus UNE commande par agent, écrasée
/// (pas enfilée) par une nouvelle demande. Écrit par la façade HTTP,
/// drainé par les handlers de connexion au rapport suivant.
///
/// Le map est shardé par hash d'id : atomicité lecture-modification-écriture
/// par clé, sans mutex global entre agents sans rapport.
pub struct CommandDispatcher {
    shards: Vec<Mutex<HashMap<String, String>>>,
}

pub type SharedCommandDispatcher = Arc<CommandDispatcher>;

impl CommandDispatcher {
    pub fn new() -> Self {
        Self {
            shards: (0..SHARD_COUNT).map(|_| Mutex::new(HashMap::new())).collect(),
        }
    }

    fn shard(&self, client_id: &str) -> &Mutex<HashMap<String, String>> {
        let mut hasher = DefaultHasher::new();
        client_id.hash(&mut hasher);
        &self.shards[(hasher.finish() as usize) % SHARD_COUNT]
    }

    /// Dépose une commande pour l'agent ; dernière écriture gagnante
    pub fn enqueue(&self, client_id: &str, command: &str) {
        self.shard(client_id)
            .lock()
            .insert(client_id.to_string(), command.to_string());
    }

    /// Get-and-clear atomique : la commande est livrée au plus une fois
    pub fn drain(&self, client_id: &str) -> Option<String> {
        self.shard(client_id).lock().remove(client_id)
    }

    /// Retire sans livrer (arrivée d'une réponse d'approbation)
    pub fn clear(&self, client_id: &str) {
        self.shard(client_id).lock().remove(client_id);
    }

    /// Lecture sans retrait, pour la vue /status
    pub fn peek(&self, client_id: &str) -> Option<String> {
        self.shard(client_id).lock().get(client_id).cloned()
    }
}

impl Default for CommandDispatcher {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drain_delivers_exactly_once() {
        let dispatcher = CommandDispatcher::new();
        dispatcher.enqueue("a1", "REQUEST_MONITORING");
        assert_eq!(dispatcher.drain("a1").as_deref(), Some("REQUEST_MONITORING"));
        assert_eq!(dispatcher.drain("a1"), None);
    }

    #[test]
    fn enqueue_overwrites_pending_command() {
        let dispatcher = CommandDispatcher::new();
        dispatcher.enqueue("a1", "FIRST");
        dispatcher.enqueue("a1", "SECOND");
        assert_eq!(dispatcher.drain("a1").as_deref(), Some("SECOND"));
        assert_eq!(dispatcher.drain("a1"), None);
    }

    #[test]
    fn clear_drops_without_delivery() {
        let dispatcher = CommandDispatcher::new();
        dispatcher.enqueue("a1", "REQUEST_MONITORING");
        dispatcher.clear("a1");
        assert_eq!(dispatcher.drain("a1"), None);
        // clear d'un id sans commande : no-op
        dispatcher.clear("a1");
    }

    #[test]
    fn peek_leaves_command_pending() {
        let dispatcher = CommandDispatcher::new();
        dispatcher.enqueue("a1", "REQUEST_MONITORING");
        assert_eq!(dispatcher.peek("a1").as_deref(), Some("REQUEST_MONITORING"));
        assert_eq!(dispatcher.drain("a1").as_deref(), Some("REQUEST_MONITORING"));
        assert_eq!(dispatcher.peek("a1"), None);
    }

    #[test]
    fn ids_are_independent() {
        let dispatcher = CommandDispatcher::new();
        dispatcher.enqueue("a1", "ONE");
        dispatcher.enqueue("a2", "TWO");
        assert_eq!(dispatcher.drain("a1").as_deref(), Some("ONE"));
        assert_eq!(dispatcher.drain("a2").as_deref(), Some("TWO"));
    }

    #[test]
    fn enqueue_racing_drain_never_duplicates_nor_drops() {
        let dispatcher = Arc::new(CommandDispatcher::new());
        for _ in 0..200 {
            let d1 = dispatcher.clone();
            let enqueuer = std::thread::spawn(move || d1.enqueue("a1", "REQUEST_MONITORING"));
            let d2 = dispatcher.clone();
            let drainer = std::thread::spawn(move || d2.drain("a1"));

            enqueuer.join().unwrap();
            let raced = drainer.join().unwrap();
            let leftover = dispatcher.drain("a1");
            // exactement l'un des deux : livrée pendant la course, ou
            // restée en attente pour le rapport suivant
            assert_eq!(raced.is_some() as u8 + leftover.is_some() as u8, 1);
        }
    }
}
