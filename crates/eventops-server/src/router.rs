//! Axum router construction for the API server.
//!
//! Assembles all routes (REST + `WebSocket`) into a single [`Router`]
//! with CORS middleware enabled so display pages on other origins can
//! poll it.

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::handlers;
use crate::state::AppState;
use crate::ws;

/// Build the complete Axum router for the API server.
///
/// The router includes:
/// - `GET /timer` -- current timer, all timers, or messages
/// - `POST /timer/control` -- timer control operations
/// - `GET|POST|DELETE /timer/message` -- message CRUD
/// - `GET|POST|PUT|DELETE /timer/actions` -- action CRUD
/// - `POST /timer/actions/execute`, `POST /timer/actions/reset`
/// - `GET|POST /status` -- status label and visitor counter
/// - `GET /time` -- authoritative server time
/// - `GET /health` -- store reachability
/// - `GET /ws/events` -- `WebSocket` change-event stream
pub fn build_router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // Timers
        .route("/timer", get(handlers::get_timer))
        .route("/timer/control", post(handlers::control_timer))
        .route(
            "/timer/message",
            get(handlers::get_messages)
                .post(handlers::send_message)
                .delete(handlers::delete_message),
        )
        .route(
            "/timer/actions",
            get(handlers::list_actions)
                .post(handlers::create_action)
                .put(handlers::update_action)
                .delete(handlers::delete_action),
        )
        .route("/timer/actions/execute", post(handlers::execute_action))
        .route("/timer/actions/reset", post(handlers::reset_actions))
        // Status
        .route(
            "/status",
            get(handlers::get_status).post(handlers::update_status),
        )
        // Clock and health
        .route("/time", get(handlers::get_time))
        .route("/health", get(handlers::health))
        // WebSocket
        .route("/ws/events", get(ws::ws_events))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
