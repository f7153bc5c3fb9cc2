use std::collections::HashMap;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    Pending,
    Active,
}

/// One negotiated pairing. Holds participant ids only, never client
/// records; every operation resolves the ids against the registry and
/// self-terminates when they no longer resolve.
#[derive(Debug, Clone)]
pub struct Session {
    pub id: String,
    pub requester_id: String,
    pub target_id: String,
    pub kind: String,
    pub status: SessionStatus,
    pub created_at: Instant,
    pub connected_at: Option<Instant>,
}

impl Session {
    pub fn pending(id: String, requester_id: String, target_id: String, kind: String) -> Self {
        Self {
            id,
            requester_id,
            target_id,
            kind,
            status: SessionStatus::Pending,
            created_at: Instant::now(),
            connected_at: None,
        }
    }

    pub fn involves(&self, client_id: &str) -> bool {
        self.requester_id == client_id || self.target_id == client_id
    }

    /// The other participant, or None when `client_id` is not one of the two.
    pub fn counterpart(&self, client_id: &str) -> Option<&str> {
        if self.requester_id == client_id {
            Some(&self.target_id)
        } else if self.target_id == client_id {
            Some(&self.requester_id)
        } else {
            None
        }
    }

    pub fn expired(&self, pending_ttl: Duration, active_ttl: Duration) -> bool {
        let max_age = match self.status {
            SessionStatus::Pending => pending_ttl,
            SessionStatus::Active => active_ttl,
        };
        self.created_at.elapsed() > max_age
    }
}

/// Table of in-flight and active sessions, keyed by session id. Ids are
/// UUIDs minted by the broker and never reused.
#[derive(Default)]
pub struct SessionTable {
    sessions: HashMap<String, Session>,
}

impl SessionTable {
    pub fn insert(&mut self, session: Session) {
        self.sessions.insert(session.id.clone(), session);
    }

    pub fn get(&self, id: &str) -> Option<&Session> {
        self.sessions.get(id)
    }

    pub fn get_mut(&mut self, id: &str) -> Option<&mut Session> {
        self.sessions.get_mut(id)
    }

    pub fn remove(&mut self, id: &str) -> Option<Session> {
        self.sessions.remove(id)
    }

    pub fn ids_involving(&self, client_id: &str) -> Vec<String> {
        self.sessions
            .values()
            .filter(|session| session.involves(client_id))
            .map(|session| session.id.clone())
            .collect()
    }

    /// Whether `client_id` already participates in an active session.
    pub fn has_active_involving(&self, client_id: &str) -> bool {
        self.sessions.values().any(|session| {
            session.status == SessionStatus::Active && session.involves(client_id)
        })
    }

    pub fn expired_ids(&self, pending_ttl: Duration, active_ttl: Duration) -> Vec<String> {
        self.sessions
            .values()
            .filter(|session| session.expired(pending_ttl, active_ttl))
            .map(|session| session.id.clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn active_count(&self) -> usize {
        self.sessions
            .values()
            .filter(|session| session.status == SessionStatus::Active)
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session(id: &str, requester: &str, target: &str) -> Session {
        Session::pending(
            id.to_string(),
            requester.to_string(),
            target.to_string(),
            "control".to_string(),
        )
    }

    #[test]
    fn counterpart_resolution() {
        let s = session("s-1", "111111111", "222222222");
        assert_eq!(s.counterpart("111111111"), Some("222222222"));
        assert_eq!(s.counterpart("222222222"), Some("111111111"));
        assert_eq!(s.counterpart("333333333"), None);
        assert!(s.involves("111111111"));
        assert!(!s.involves("333333333"));
    }

    #[test]
    fn pending_ttl_boundary() {
        let pending_ttl = Duration::from_secs(300);
        let active_ttl = Duration::from_secs(3600);

        let mut table = SessionTable::default();
        let mut fresh = session("fresh", "1", "2");
        fresh.created_at = Instant::now() - Duration::from_secs(299);
        let mut expired = session("expired", "3", "4");
        expired.created_at = Instant::now() - Duration::from_secs(301);
        table.insert(fresh);
        table.insert(expired);

        let ids = table.expired_ids(pending_ttl, active_ttl);
        assert_eq!(ids, vec!["expired".to_string()]);
    }

    #[test]
    fn active_ttl_boundary() {
        let pending_ttl = Duration::from_secs(300);
        let active_ttl = Duration::from_secs(3600);

        let mut table = SessionTable::default();
        let mut surviving = session("surviving", "1", "2");
        surviving.status = SessionStatus::Active;
        surviving.created_at = Instant::now() - Duration::from_secs(3540);
        let mut leaked = session("leaked", "3", "4");
        leaked.status = SessionStatus::Active;
        leaked.created_at = Instant::now() - Duration::from_secs(3660);
        table.insert(surviving);
        table.insert(leaked);

        let ids = table.expired_ids(pending_ttl, active_ttl);
        assert_eq!(ids, vec!["leaked".to_string()]);
    }

    #[test]
    fn active_participation_lookup() {
        let mut table = SessionTable::default();
        let mut active = session("a", "111111111", "222222222");
        active.status = SessionStatus::Active;
        table.insert(active);
        table.insert(session("p", "222222222", "333333333"));

        assert!(table.has_active_involving("111111111"));
        assert!(table.has_active_involving("222222222"));
        // A pending session does not count as participation
        assert!(!table.has_active_involving("333333333"));
        assert_eq!(table.active_count(), 1);
        assert_eq!(table.ids_involving("222222222").len(), 2);
    }
}
