//! Shared state store for the EventOps dashboard (`PostgreSQL` + `Dragonfly`).
//!
//! Every server instance talks to the same store, which is the single
//! source of truth. This crate implements the store traits from
//! `eventops_core::store` on top of it.
//!
//! # Architecture
//!
//! ```text
//! TimerEngine / MessageBoard / TimerActions
//!     |
//!     +-- StoreBackend --> PostgreSQL (PostgresPool) or memory
//!         |-- TimerTable    (timers + current_timer pointer)
//!         |-- MessageTable  (timer_messages)
//!         +-- ActionTable   (timer_actions)
//!
//! StatusService
//!     |
//!     +-- StatusBackend --> PostgreSQL (StatusTable), Dragonfly, or memory
//! ```
//!
//! # Modules
//!
//! - [`postgres`] -- `PostgreSQL` connection pool and configuration
//! - [`timer_store`] -- Timer rows and the current-timer pointer
//! - [`message_store`] -- Broadcast message rows
//! - [`action_store`] -- Timer action rows
//! - [`status_store`] -- Status singleton and per-day visitor counters
//! - [`dragonfly`] -- `Dragonfly` (Redis-compatible) status and counter
//! - [`backend`] -- Store trait impls and configured backend selection
//! - [`error`] -- Shared error types

pub mod action_store;
pub mod backend;
pub mod dragonfly;
pub mod error;
pub mod message_store;
pub mod postgres;
pub mod status_store;
pub mod timer_store;

// Re-export primary types for convenience.
pub use action_store::{ActionRow, ActionTable};
pub use backend::{Backends, StatusBackend, StoreBackend};
pub use dragonfly::DragonflyPool;
pub use error::DbError;
pub use message_store::{MessageRow, MessageTable};
pub use postgres::{PostgresConfig, PostgresPool};
pub use status_store::{CounterRow, StatusRow, StatusTable};
pub use timer_store::{TimerRow, TimerTable};
