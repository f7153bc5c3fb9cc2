use anyhow::Result;
use clap::{Parser, Subcommand};
use futures_util::{SinkExt, StreamExt};
use tokio::time::{interval, timeout, Duration};
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::debug;

use crate::protocol::{ClientMessage, ClientRole, ServerMessage};

#[derive(Parser, Debug)]
#[command(name = "waypost")]
#[command(about = "Waypost relay server and debug client")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Run the relay server (default when no subcommand is given)
    #[arg(long)]
    pub server: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Probe a running relay over its WebSocket endpoint
    Debug {
        /// Relay URL (e.g., ws://localhost:8080)
        #[arg(short, long, default_value = "ws://localhost:8080")]
        url: String,

        #[command(subcommand)]
        command: DebugCommands,
    },
}

#[derive(Subcommand, Debug)]
pub enum DebugCommands {
    /// Register as a host, print the assigned id, and answer incoming
    /// requests with an accept
    Host,
    /// Register as a viewer and request a connection to a host id
    Connect {
        /// Target client id (9 digits)
        #[arg(short, long)]
        target: String,

        /// Request kind forwarded to the target
        #[arg(short, long, default_value = "control")]
        kind: String,
    },
}

pub async fn run_debug_client(url: String, command: DebugCommands) -> Result<()> {
    let ws_url = format!("{}/ws", url.trim_end_matches('/'));
    debug!("connecting to {}", ws_url);

    let (ws_stream, _) = match timeout(Duration::from_secs(5), connect_async(&ws_url)).await {
        Ok(Ok(result)) => result,
        Ok(Err(e)) => return Err(anyhow::anyhow!("connection failed: {}", e)),
        Err(_) => {
            return Err(anyhow::anyhow!(
                "connection timeout - is the relay running?"
            ))
        }
    };
    let (mut write, mut read) = ws_stream.split();

    let role = match command {
        DebugCommands::Host => ClientRole::Host,
        DebugCommands::Connect { .. } => ClientRole::Viewer,
    };
    let register = ClientMessage::RegisterClient {
        client_type: role,
        device_info: serde_json::json!({ "agent": "waypost-debug" }),
    };
    write
        .send(Message::Text(serde_json::to_string(&register)?.into()))
        .await?;

    let mut heartbeat = interval(Duration::from_secs(20));
    heartbeat.tick().await; // immediate first tick

    loop {
        tokio::select! {
            _ = heartbeat.tick() => {
                let ping = serde_json::to_string(&ClientMessage::Heartbeat)?;
                write.send(Message::Text(ping.into())).await?;
            }
            frame = read.next() => {
                let Some(frame) = frame else { break };
                let Message::Text(text) = frame? else { continue };
                let server_msg: ServerMessage = serde_json::from_str(&text)?;
                match &server_msg {
                    ServerMessage::ServerHello { message } => println!("{}", message),
                    ServerMessage::ClientRegistered { client_id, .. } => {
                        println!("registered as {}", client_id);
                        if let DebugCommands::Connect { target, kind } = &command {
                            let request = ClientMessage::RequestConnection {
                                target_client_id: target.clone(),
                                request_type: kind.clone(),
                            };
                            write
                                .send(Message::Text(serde_json::to_string(&request)?.into()))
                                .await?;
                        }
                    }
                    ServerMessage::ConnectionRequest {
                        session_id,
                        requester_id,
                        request_type,
                        ..
                    } => {
                        println!(
                            "incoming {} request from {}, accepting",
                            request_type, requester_id
                        );
                        let answer = ClientMessage::AcceptConnection {
                            session_id: session_id.clone(),
                            accepted: true,
                        };
                        write
                            .send(Message::Text(serde_json::to_string(&answer)?.into()))
                            .await?;
                    }
                    ServerMessage::HeartbeatAck => debug!("heartbeat acked"),
                    ServerMessage::Error { message } => println!("error: {}", message),
                    other => println!("{:?}", other),
                }
            }
        }
    }

    Ok(())
}
