//! API server for the EventOps dashboard.
//!
//! This crate provides an Axum HTTP server that exposes:
//!
//! - **Timer endpoints** (`/timer`, `/timer/control`, `/timer/message`,
//!   `/timer/actions`) for polling and controlling countdown timers
//! - **Status endpoints** (`/status`) for the event status label and the
//!   visitor counter
//! - **`GET /time`**, the authoritative clock displays synchronize against
//! - **`WebSocket` endpoint** (`/ws/events`) streaming change events via
//!   [`tokio::sync::broadcast`]
//! - **`GET /health`** for load balancers
//!
//! # Architecture
//!
//! Handlers hold no state of their own. Every request goes through the
//! engines in [`AppState`], which read and write the configured store.
//! Displays poll; the `WebSocket` stream is an optimization on top.
//!
//! Mutating endpoints are gated by a bearer-token [`Session`] whose role
//! comes from configuration.
//!
//! [`Session`]: auth::Session

pub mod auth;
pub mod error;
pub mod handlers;
pub mod router;
pub mod server;
pub mod startup;
pub mod state;
pub mod ws;

// Re-export primary types for convenience.
pub use router::build_router;
pub use server::{ServerError, start_server};
pub use state::AppState;
