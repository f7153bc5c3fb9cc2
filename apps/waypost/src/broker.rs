use std::sync::Arc;
use std::time::Instant;

use tokio::sync::{mpsc, Mutex};
use tracing::{info, warn};

use crate::access_code::{AccessCode, AccessCodeTable, AccessCodeView};
use crate::config::Config;
use crate::error::RelayError;
use crate::protocol::{self, ClientRole, ServerMessage};
use crate::registry::{Client, ClientRegistry};
use crate::sessions::{Session, SessionStatus, SessionTable};

pub type SharedRelay = Arc<Relay>;

/// Counts served by the HTTP side-channel.
pub struct RelaySnapshot {
    pub clients: usize,
    pub online_clients: usize,
    pub sessions: usize,
    pub active_sessions: usize,
    pub uptime_secs: u64,
}

/// The combined mutable state. Accept/reject and teardown touch clients
/// and sessions in one transaction, so both tables sit behind a single
/// lock rather than one lock each.
struct Tables {
    clients: ClientRegistry,
    sessions: SessionTable,
    codes: AccessCodeTable,
}

/// Connection broker and relay router. Every mutation of the shared
/// tables goes through these methods; the WebSocket layer and the sweeper
/// hold no state of their own.
pub struct Relay {
    config: Config,
    started_at: Instant,
    tables: Mutex<Tables>,
}

impl Relay {
    pub fn new(config: Config) -> SharedRelay {
        let codes = AccessCodeTable::new(config.access_code_ttl_secs);
        Arc::new(Self {
            config,
            started_at: Instant::now(),
            tables: Mutex::new(Tables {
                clients: ClientRegistry::default(),
                sessions: SessionTable::default(),
                codes,
            }),
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Allocate an id, insert the client, and confirm over its transport.
    pub async fn register_client(
        &self,
        role: ClientRole,
        device_info: serde_json::Value,
        tx: mpsc::UnboundedSender<ServerMessage>,
    ) -> Result<String, RelayError> {
        let mut tables = self.tables.lock().await;
        let client_id =
            crate::ids::allocate_client_id(|candidate| tables.clients.contains(candidate))?;
        let client = Client::new(client_id.clone(), role, device_info, tx);
        client.send(ServerMessage::ClientRegistered {
            client_id: client_id.clone(),
            message: format!("your id: {}", client_id),
        });
        info!("client registered: {} ({:?})", client.id, client.role);
        tables.clients.insert(client);
        Ok(client_id)
    }

    /// Open a pending session and notify both parties. The target must be
    /// registered, recently heard from, and not already mid-session.
    pub async fn request_connection(
        &self,
        requester_id: &str,
        target_id: &str,
        kind: &str,
    ) -> Result<String, RelayError> {
        let mut tables = self.tables.lock().await;

        if !tables.clients.contains(requester_id) {
            return Err(RelayError::NotRegistered);
        }
        if requester_id == target_id {
            return Err(RelayError::InvalidTarget);
        }
        if !tables.clients.contains(target_id) {
            return Err(RelayError::TargetNotFound);
        }
        if !tables
            .clients
            .is_reachable(target_id, self.config.online_threshold())
        {
            return Err(RelayError::TargetUnreachable);
        }
        if tables.sessions.has_active_involving(target_id) {
            return Err(RelayError::TargetBusy);
        }

        let session_id = protocol::generate_session_id();
        tables.sessions.insert(Session::pending(
            session_id.clone(),
            requester_id.to_string(),
            target_id.to_string(),
            kind.to_string(),
        ));

        let requester_info = tables
            .clients
            .get(requester_id)
            .map(|client| client.device_info.clone())
            .unwrap_or(serde_json::Value::Null);
        if let Some(target) = tables.clients.get(target_id) {
            target.send(ServerMessage::ConnectionRequest {
                session_id: session_id.clone(),
                requester_id: requester_id.to_string(),
                requester_info,
                request_type: kind.to_string(),
                message: format!("{} request from {}", kind, requester_id),
            });
        }
        if let Some(requester) = tables.clients.get(requester_id) {
            requester.send(ServerMessage::ConnectionRequested {
                session_id: session_id.clone(),
                target_id: target_id.to_string(),
                message: "request sent, waiting for approval".to_string(),
            });
        }

        info!(
            "connection requested: {} -> {} ({})",
            requester_id, target_id, kind
        );
        Ok(session_id)
    }

    /// Target's answer to a pending request. Accept promotes the session
    /// to active; reject removes it. A session that already left pending
    /// reads as gone, so a second answer fails with SessionNotFound.
    pub async fn respond_to_connection(
        &self,
        session_id: &str,
        by_client: &str,
        accepted: bool,
    ) -> Result<(), RelayError> {
        let mut tables = self.tables.lock().await;

        let requester_id = {
            let Some(session) = tables.sessions.get(session_id) else {
                return Err(RelayError::SessionNotFound);
            };
            if session.status != SessionStatus::Pending {
                return Err(RelayError::SessionNotFound);
            }
            if session.target_id != by_client {
                return Err(RelayError::NotAuthorized);
            }
            session.requester_id.clone()
        };

        if !tables.clients.contains(&requester_id) {
            tables.sessions.remove(session_id);
            return Err(RelayError::RequesterGone);
        }

        if !accepted {
            tables.sessions.remove(session_id);
            if let Some(requester) = tables.clients.get(&requester_id) {
                requester.send(ServerMessage::ConnectionRejected {
                    target_id: by_client.to_string(),
                    message: "connection rejected by the user".to_string(),
                });
            }
            info!("connection rejected: session {}", session_id);
            return Ok(());
        }

        // One active session per participant. A pending request that
        // lost the race is discarded and the requester hears a reject.
        if tables.sessions.has_active_involving(&requester_id)
            || tables.sessions.has_active_involving(by_client)
        {
            tables.sessions.remove(session_id);
            if let Some(requester) = tables.clients.get(&requester_id) {
                requester.send(ServerMessage::ConnectionRejected {
                    target_id: by_client.to_string(),
                    message: "participant is busy in another session".to_string(),
                });
            }
            return Err(RelayError::TargetBusy);
        }

        if let Some(session) = tables.sessions.get_mut(session_id) {
            session.status = SessionStatus::Active;
            session.connected_at = Some(Instant::now());
        }
        if let Some(requester) = tables.clients.get(&requester_id) {
            requester.send(ServerMessage::ConnectionAccepted {
                session_id: session_id.to_string(),
                target_id: by_client.to_string(),
                message: "connection accepted, starting session".to_string(),
            });
        }
        if let Some(target) = tables.clients.get(by_client) {
            target.send(ServerMessage::ConnectionEstablished {
                session_id: session_id.to_string(),
                requester_id: requester_id.clone(),
                message: "session started".to_string(),
            });
        }
        info!("connection established: session {}", session_id);
        Ok(())
    }

    /// Forward an opaque payload to the sender's counterpart. The payload
    /// is never inspected or rewritten. A vanished counterpart is a
    /// transient failure and leaves the session running.
    pub async fn relay(
        &self,
        session_id: &str,
        from_client: &str,
        data_type: &str,
        data: serde_json::Value,
    ) -> Result<(), RelayError> {
        let tables = self.tables.lock().await;

        let counterpart = {
            let Some(session) = tables.sessions.get(session_id) else {
                return Err(RelayError::SessionNotActive);
            };
            if session.status != SessionStatus::Active {
                return Err(RelayError::SessionNotActive);
            }
            let Some(counterpart) = session.counterpart(from_client) else {
                return Err(RelayError::NotAuthorized);
            };
            counterpart.to_string()
        };

        let Some(peer) = tables.clients.get(&counterpart) else {
            warn!(
                "relay dropped for session {}: counterpart {} is gone",
                session_id, counterpart
            );
            return Err(RelayError::PeerGone);
        };
        peer.send(ServerMessage::RelayData {
            session_id: session_id.to_string(),
            sender_id: from_client.to_string(),
            data_type: data_type.to_string(),
            data,
        });
        Ok(())
    }

    /// Refresh a client's liveness clock and acknowledge. A heartbeat for
    /// an unknown or already-evicted id is ignored; it must not resurrect
    /// the record.
    pub async fn heartbeat(&self, client_id: &str) {
        let mut tables = self.tables.lock().await;
        if let Some(client) = tables.clients.get_mut(client_id) {
            client.touch();
            client.send(ServerMessage::HeartbeatAck);
        }
    }

    /// Any inbound message counts as a liveness signal.
    pub async fn touch(&self, client_id: &str) {
        self.tables.lock().await.clients.touch(client_id);
    }

    /// Peer-requested teardown. Validated against the session's
    /// participants; cleanup paths use the internal teardown instead and
    /// never see these errors.
    pub async fn end_session(&self, session_id: &str, by_client: &str) -> Result<(), RelayError> {
        let mut tables = self.tables.lock().await;
        {
            let Some(session) = tables.sessions.get(session_id) else {
                return Err(RelayError::SessionNotFound);
            };
            if !session.involves(by_client) {
                return Err(RelayError::NotAuthorized);
            }
        }
        Self::terminate_session(&mut tables, session_id, "session ended");
        Ok(())
    }

    /// Transport-close teardown. Ends every session the client
    /// participates in, then drops the client. Safe on unknown ids.
    pub async fn handle_disconnect(&self, client_id: &str) {
        let mut tables = self.tables.lock().await;
        Self::teardown_client(&mut tables, client_id, "peer disconnected");
    }

    /// One sweeper tick: evict silent clients through the same teardown
    /// path as a disconnect, expire sessions by status-dependent TTL, and
    /// drop expired access codes. Each pass is idempotent.
    pub async fn sweep_once(&self) {
        let mut tables = self.tables.lock().await;

        let stale = tables.clients.stale_ids(self.config.offline_threshold());
        if !stale.is_empty() {
            info!("evicting {} offline clients", stale.len());
        }
        for client_id in stale {
            Self::teardown_client(&mut tables, &client_id, "peer went offline");
        }

        let expired = tables.sessions.expired_ids(
            self.config.pending_session_ttl(),
            self.config.active_session_ttl(),
        );
        if !expired.is_empty() {
            info!("expiring {} sessions", expired.len());
        }
        for session_id in expired {
            Self::terminate_session(&mut tables, &session_id, "session expired");
        }

        let dropped = tables.codes.sweep();
        if dropped > 0 {
            let stats = tables.codes.stats();
            info!(
                "removed {} expired access codes, {} still active",
                dropped, stats.active
            );
        }
    }

    pub async fn generate_access_code(&self) -> Result<AccessCode, RelayError> {
        self.tables.lock().await.codes.generate()
    }

    pub async fn validate_access_code(&self, code: &str) -> bool {
        self.tables.lock().await.codes.validate(code)
    }

    pub async fn revoke_access_code(&self, code: &str) -> bool {
        self.tables.lock().await.codes.revoke(code)
    }

    pub async fn active_access_codes(&self) -> Vec<AccessCodeView> {
        self.tables.lock().await.codes.active()
    }

    pub async fn snapshot(&self) -> RelaySnapshot {
        let tables = self.tables.lock().await;
        RelaySnapshot {
            clients: tables.clients.len(),
            online_clients: tables
                .clients
                .online_count(self.config.online_threshold()),
            sessions: tables.sessions.len(),
            active_sessions: tables.sessions.active_count(),
            uptime_secs: self.started_at.elapsed().as_secs(),
        }
    }

    fn teardown_client(tables: &mut Tables, client_id: &str, reason: &str) {
        for session_id in tables.sessions.ids_involving(client_id) {
            Self::terminate_session(tables, &session_id, reason);
        }
        if let Some(client) = tables.clients.remove(client_id) {
            info!(
                "client removed: {} (was registered {:?})",
                client.id,
                client.registered_at.elapsed()
            );
        }
    }

    /// Remove the session and notify whichever participants still
    /// resolve. Removal happens first, so racing callers find nothing and
    /// nobody is notified twice.
    fn terminate_session(tables: &mut Tables, session_id: &str, reason: &str) {
        let Some(session) = tables.sessions.remove(session_id) else {
            return;
        };
        for participant in [&session.requester_id, &session.target_id] {
            if let Some(client) = tables.clients.get(participant) {
                client.send(ServerMessage::SessionEnded {
                    session_id: session_id.to_string(),
                    reason: reason.to_string(),
                });
            }
        }
        match session.connected_at {
            Some(connected_at) => info!(
                "session ended: {} ({}) after {:?} active ({})",
                session_id,
                session.kind,
                connected_at.elapsed(),
                reason
            ),
            None => info!(
                "session ended: {} ({}) while pending ({})",
                session_id, session.kind, reason
            ),
        }
    }
}

#[cfg(test)]
impl Relay {
    async fn backdate_client(&self, client_id: &str, age: std::time::Duration) {
        let mut tables = self.tables.lock().await;
        if let Some(client) = tables.clients.get_mut(client_id) {
            client.last_seen = Instant::now() - age;
        }
    }

    async fn backdate_session(&self, session_id: &str, age: std::time::Duration) {
        let mut tables = self.tables.lock().await;
        if let Some(session) = tables.sessions.get_mut(session_id) {
            session.created_at = Instant::now() - age;
        }
    }

    /// Drop a client record without touching its sessions, simulating a
    /// counterpart that vanished mid-relay.
    async fn evict_client_silently(&self, client_id: &str) {
        self.tables.lock().await.clients.remove(client_id);
    }
}
