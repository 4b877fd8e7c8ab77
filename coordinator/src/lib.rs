pub mod args;
mod pacing;
mod session;
mod state;

use std::net::SocketAddr;

use axum::extract::ws::WebSocketUpgrade;
use axum::extract::State;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use tower_http::trace::TraceLayer;

use args::Args;
use dcnet_common::config::Config;
pub use state::{AppState, SharedState};

/// Build the axum Router. A single `/ws` upgrade endpoint carries the whole
/// protocol; there is no REST surface because every coordinator->client
/// message (`round_open`, `generate_secrets`, relayed peer messages, ...) is
/// a server push, not a response to a poll.
pub fn router(shared_state: SharedState) -> Router {
    Router::new()
        .route("/ws", get(ws_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(shared_state)
}

async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<SharedState>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| session::handle_socket(socket, state))
}

pub async fn run(args: &Args) -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::load(&args.config)?;
    let shared_state = AppState::new(config);
    pacing::spawn_pacing_tasks(shared_state.clone());

    let app = router(shared_state);
    let addr: SocketAddr = args.addr().parse()?;
    tracing::info!(%addr, "coordinator listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}
