use axum::{
    extract::{
        ws::{Message, WebSocket},
        State, WebSocketUpgrade,
    },
    response::Response,
};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::broker::SharedRelay;
use crate::error::RelayError;
use crate::protocol::{ClientMessage, ServerMessage};

/// WebSocket upgrade handler
pub async fn websocket_handler(ws: WebSocketUpgrade, State(relay): State<SharedRelay>) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, relay))
}

/// One connected peer: an outbound channel drained by a writer task, and
/// a receive loop feeding the broker. The connection learns its client id
/// from a successful register_client and keeps it until close.
async fn handle_socket(socket: WebSocket, relay: SharedRelay) {
    let (mut sender, mut receiver) = socket.split();

    let (tx, mut rx) = mpsc::unbounded_channel::<ServerMessage>();
    tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            if let Ok(json) = serde_json::to_string(&msg) {
                if sender.send(Message::Text(json)).await.is_err() {
                    break;
                }
            }
        }
        debug!("writer task ended");
    });

    let _ = tx.send(ServerMessage::ServerHello {
        message: "connected to the waypost relay".to_string(),
    });

    let mut client_id: Option<String> = None;

    while let Some(msg_result) = receiver.next().await {
        let msg = match msg_result {
            Ok(m) => m,
            Err(e) => {
                debug!("websocket error: {}", e);
                break;
            }
        };

        match msg {
            Message::Text(text) => {
                handle_frame(&text, &mut client_id, &relay, &tx).await;
            }
            Message::Binary(data) => {
                // Some clients ship JSON in binary frames; anything else
                // is not relay traffic and is dropped.
                match String::from_utf8(data) {
                    Ok(text) => handle_frame(&text, &mut client_id, &relay, &tx).await,
                    Err(_) => debug!("ignoring non-UTF8 binary frame"),
                }
            }
            Message::Close(_) => {
                debug!("close frame from client {:?}", client_id);
                break;
            }
            _ => {}
        }
    }

    // Transport close is the one hard cancellation signal; it fires the
    // full teardown exactly once per connection.
    if let Some(id) = client_id {
        relay.handle_disconnect(&id).await;
        debug!("websocket disconnected: client={}", id);
    }
}

async fn handle_frame(
    text: &str,
    client_id: &mut Option<String>,
    relay: &SharedRelay,
    tx: &mpsc::UnboundedSender<ServerMessage>,
) {
    match serde_json::from_str::<ClientMessage>(text) {
        Ok(message) => {
            if let Err(e) = dispatch(message, client_id, relay, tx).await {
                let _ = tx.send(ServerMessage::Error {
                    message: e.to_string(),
                });
            }
        }
        Err(e) => {
            warn!("unparseable client message: {}", e);
            let _ = tx.send(ServerMessage::Error {
                message: format!("invalid message format: {}", e),
            });
        }
    }
}

async fn dispatch(
    message: ClientMessage,
    client_id: &mut Option<String>,
    relay: &SharedRelay,
    tx: &mpsc::UnboundedSender<ServerMessage>,
) -> Result<(), RelayError> {
    // Every inbound frame refreshes the sender's liveness clock
    if let Some(id) = client_id.as_deref() {
        relay.touch(id).await;
    }

    match message {
        ClientMessage::RegisterClient {
            client_type,
            device_info,
        } => {
            let id = relay
                .register_client(client_type, device_info, tx.clone())
                .await?;
            *client_id = Some(id);
            Ok(())
        }
        ClientMessage::RequestConnection {
            target_client_id,
            request_type,
        } => {
            let requester = client_id.as_deref().ok_or(RelayError::NotRegistered)?;
            relay
                .request_connection(requester, &target_client_id, &request_type)
                .await?;
            Ok(())
        }
        ClientMessage::AcceptConnection {
            session_id,
            accepted,
        } => {
            let by_client = client_id.as_deref().ok_or(RelayError::NotRegistered)?;
            relay
                .respond_to_connection(&session_id, by_client, accepted)
                .await
        }
        ClientMessage::RelayData {
            session_id,
            data_type,
            data,
        } => {
            let from_client = client_id.as_deref().ok_or(RelayError::NotRegistered)?;
            relay.relay(&session_id, from_client, &data_type, data).await
        }
        ClientMessage::Heartbeat => {
            // A heartbeat from an unregistered connection is noise, not
            // an error, and must not mint a record
            if let Some(id) = client_id.as_deref() {
                relay.heartbeat(id).await;
            }
            Ok(())
        }
        ClientMessage::DisconnectSession { session_id } => {
            let by_client = client_id.as_deref().ok_or(RelayError::NotRegistered)?;
            relay.end_session(&session_id, by_client).await
        }
    }
}
