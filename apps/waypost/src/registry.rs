use std::collections::HashMap;
use std::time::{Duration, Instant};

use tokio::sync::mpsc;
use tracing::debug;

use crate::protocol::{ClientRole, ServerMessage};

/// One connected peer. Owns the sending half of its transport; the handle
/// is dropped with the record on removal.
pub struct Client {
    pub id: String,
    pub role: ClientRole,
    pub device_info: serde_json::Value,
    pub registered_at: Instant,
    pub last_seen: Instant,
    pub tx: mpsc::UnboundedSender<ServerMessage>,
}

impl Client {
    pub fn new(
        id: String,
        role: ClientRole,
        device_info: serde_json::Value,
        tx: mpsc::UnboundedSender<ServerMessage>,
    ) -> Self {
        let now = Instant::now();
        Self {
            id,
            role,
            device_info,
            registered_at: now,
            last_seen: now,
            tx,
        }
    }

    /// Push a message onto the peer's outbound channel. A closed channel
    /// means the transport is going away; the disconnect path will reap
    /// the record.
    pub fn send(&self, message: ServerMessage) {
        if self.tx.send(message).is_err() {
            debug!("dropping message for client {}: channel closed", self.id);
        }
    }

    pub fn touch(&mut self) {
        self.last_seen = Instant::now();
    }

    pub fn silent_for(&self) -> Duration {
        self.last_seen.elapsed()
    }
}

/// Table of currently registered peers. Exclusively owns all Client
/// records; callers mutate it only through the broker's lock.
#[derive(Default)]
pub struct ClientRegistry {
    clients: HashMap<String, Client>,
}

impl ClientRegistry {
    pub fn insert(&mut self, client: Client) {
        self.clients.insert(client.id.clone(), client);
    }

    pub fn get(&self, id: &str) -> Option<&Client> {
        self.clients.get(id)
    }

    pub fn get_mut(&mut self, id: &str) -> Option<&mut Client> {
        self.clients.get_mut(id)
    }

    pub fn remove(&mut self, id: &str) -> Option<Client> {
        self.clients.remove(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.clients.contains_key(id)
    }

    pub fn touch(&mut self, id: &str) {
        if let Some(client) = self.clients.get_mut(id) {
            client.touch();
        }
    }

    pub fn is_reachable(&self, id: &str, threshold: Duration) -> bool {
        self.clients
            .get(id)
            .map(|client| client.silent_for() <= threshold)
            .unwrap_or(false)
    }

    /// Ids of clients silent for longer than `threshold`.
    pub fn stale_ids(&self, threshold: Duration) -> Vec<String> {
        self.clients
            .values()
            .filter(|client| client.silent_for() > threshold)
            .map(|client| client.id.clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.clients.len()
    }

    pub fn online_count(&self, threshold: Duration) -> usize {
        self.clients
            .values()
            .filter(|client| client.silent_for() <= threshold)
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample(id: &str) -> Client {
        let (tx, _rx) = mpsc::unbounded_channel();
        Client::new(id.to_string(), ClientRole::Host, json!({}), tx)
    }

    #[test]
    fn insert_lookup_remove() {
        let mut registry = ClientRegistry::default();
        registry.insert(sample("111111111"));
        assert!(registry.contains("111111111"));
        assert_eq!(registry.len(), 1);
        assert!(registry.remove("111111111").is_some());
        assert!(!registry.contains("111111111"));
        assert!(registry.remove("111111111").is_none());
    }

    #[test]
    fn staleness_is_derived_from_last_seen() {
        let mut registry = ClientRegistry::default();
        let mut old = sample("111111111");
        old.last_seen = Instant::now() - Duration::from_secs(121);
        registry.insert(old);
        registry.insert(sample("222222222"));

        let threshold = Duration::from_secs(120);
        let stale = registry.stale_ids(threshold);
        assert_eq!(stale, vec!["111111111".to_string()]);
        assert_eq!(registry.online_count(threshold), 1);
        assert!(!registry.is_reachable("111111111", Duration::from_secs(30)));
        assert!(registry.is_reachable("222222222", Duration::from_secs(30)));
    }

    #[test]
    fn touch_refreshes_the_staleness_clock() {
        let mut registry = ClientRegistry::default();
        let mut client = sample("333333333");
        client.last_seen = Instant::now() - Duration::from_secs(200);
        registry.insert(client);

        registry.touch("333333333");
        assert!(registry.stale_ids(Duration::from_secs(120)).is_empty());
    }

    #[test]
    fn unknown_ids_are_never_reachable() {
        let registry = ClientRegistry::default();
        assert!(!registry.is_reachable("999999999", Duration::from_secs(30)));
    }
}
