mod access_code;
mod broker;
mod cli;
mod config;
mod error;
mod handlers;
mod ids;
mod protocol;
mod registry;
mod sessions;
mod sweeper;
mod websocket;

use axum::{
    routing::{delete, get, post},
    Router,
};
use clap::Parser;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use crate::{
    broker::Relay,
    cli::{Cli, Commands},
    config::Config,
    handlers::{
        generate_code, get_stats, health_check, list_access_codes, revoke_code, validate_code,
    },
    websocket::websocket_handler,
};

#[tokio::main]
async fn main() {
    // Fall back to WARN when RUST_LOG is unset
    if std::env::var("RUST_LOG").is_err() {
        std::env::set_var("RUST_LOG", "warn");
    }
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    if let Some(Commands::Debug { url, command }) = cli.command {
        if let Err(e) = cli::run_debug_client(url, command).await {
            error!("debug client error: {}", e);
            std::process::exit(1);
        }
        return;
    }

    let config = Config::from_env();
    info!("starting waypost relay on port {}", config.port);

    let relay = Relay::new(config.clone());

    let _sweeper = sweeper::spawn(relay.clone());

    let app = Router::new()
        .route("/health", get(health_check))
        .route("/stats", get(get_stats))
        .route("/generate-code", post(generate_code))
        .route("/validate-code", post(validate_code))
        .route("/access-codes", get(list_access_codes))
        .route("/access-codes/:code", delete(revoke_code))
        .route("/ws", get(websocket_handler))
        .with_state(relay)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("failed to bind to address");

    info!("waypost listening on {}", addr);

    axum::serve(listener, app)
        .await
        .expect("failed to start server");
}
