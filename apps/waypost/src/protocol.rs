use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Role a peer declares at registration. Immutable for the lifetime of the
/// connection.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ClientRole {
    Host,
    Viewer,
}

/// Messages sent from a peer to the relay.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Register and receive a relay-assigned client id
    #[serde(rename_all = "camelCase")]
    RegisterClient {
        client_type: ClientRole,
        #[serde(default)]
        device_info: serde_json::Value,
    },
    /// Ask another client for a session
    #[serde(rename_all = "camelCase")]
    RequestConnection {
        target_client_id: String,
        request_type: String,
    },
    /// Answer a pending connection request
    #[serde(rename_all = "camelCase")]
    AcceptConnection { session_id: String, accepted: bool },
    /// Forward an opaque payload to the session counterpart
    #[serde(rename_all = "camelCase")]
    RelayData {
        session_id: String,
        data_type: String,
        data: serde_json::Value,
    },
    /// Liveness refresh
    Heartbeat,
    /// Tear down a session this peer participates in
    #[serde(rename_all = "camelCase")]
    DisconnectSession { session_id: String },
}

/// Messages sent from the relay to a peer.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Greeting sent immediately on connect
    ServerHello { message: String },
    #[serde(rename_all = "camelCase")]
    ClientRegistered { client_id: String, message: String },
    /// Delivered to the target of a connection request
    #[serde(rename_all = "camelCase")]
    ConnectionRequest {
        session_id: String,
        requester_id: String,
        requester_info: serde_json::Value,
        request_type: String,
        message: String,
    },
    /// Acknowledgment echoed to the requester
    #[serde(rename_all = "camelCase")]
    ConnectionRequested {
        session_id: String,
        target_id: String,
        message: String,
    },
    #[serde(rename_all = "camelCase")]
    ConnectionAccepted {
        session_id: String,
        target_id: String,
        message: String,
    },
    #[serde(rename_all = "camelCase")]
    ConnectionEstablished {
        session_id: String,
        requester_id: String,
        message: String,
    },
    #[serde(rename_all = "camelCase")]
    ConnectionRejected { target_id: String, message: String },
    #[serde(rename_all = "camelCase")]
    RelayData {
        session_id: String,
        sender_id: String,
        data_type: String,
        data: serde_json::Value,
    },
    HeartbeatAck,
    #[serde(rename_all = "camelCase")]
    SessionEnded { session_id: String, reason: String },
    Error { message: String },
}

/// Generate a unique session id
pub fn generate_session_id() -> String {
    Uuid::new_v4().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn register_client_wire_format() {
        let raw = r#"{"type":"register_client","clientType":"host","deviceInfo":{"os":"linux"}}"#;
        let msg: ClientMessage = serde_json::from_str(raw).unwrap();
        match msg {
            ClientMessage::RegisterClient {
                client_type,
                device_info,
            } => {
                assert_eq!(client_type, ClientRole::Host);
                assert_eq!(device_info["os"], "linux");
            }
            other => panic!("unexpected message: {:?}", other),
        }
    }

    #[test]
    fn register_client_device_info_defaults_to_null() {
        let raw = r#"{"type":"register_client","clientType":"viewer"}"#;
        let msg: ClientMessage = serde_json::from_str(raw).unwrap();
        assert!(matches!(
            msg,
            ClientMessage::RegisterClient {
                client_type: ClientRole::Viewer,
                ..
            }
        ));
    }

    #[test]
    fn relay_data_round_trip_preserves_payload() {
        let payload = json!({"x": 10, "y": 20, "button": "left"});
        let msg = ServerMessage::RelayData {
            session_id: "s-1".into(),
            sender_id: "123456789".into(),
            data_type: "input".into(),
            data: payload.clone(),
        };
        let encoded = serde_json::to_value(&msg).unwrap();
        assert_eq!(encoded["type"], "relay_data");
        assert_eq!(encoded["sessionId"], "s-1");
        assert_eq!(encoded["senderId"], "123456789");
        assert_eq!(encoded["dataType"], "input");
        assert_eq!(encoded["data"], payload);
    }

    #[test]
    fn session_ids_are_unique() {
        let id1 = generate_session_id();
        let id2 = generate_session_id();
        assert_ne!(id1, id2);
        assert_eq!(id1.len(), 36); // UUID v4 format
    }
}
