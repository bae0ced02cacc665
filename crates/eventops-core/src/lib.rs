//! Timer engine and shared-state services for the EventOps dashboard.
//!
//! The engine and services are stateless coordinators over a shared state
//! store: they hold the transition logic, the store holds the data. Any
//! number of server instances can run against the same store.
//!
//! # Modules
//!
//! - [`clock`] -- [`Clock`] trait, system clock, and a manual test clock.
//! - [`config`] -- Configuration loading from `eventops-config.yaml` into
//!   strongly-typed structs.
//! - [`error`] -- [`StoreError`] and [`EngineError`].
//! - [`store`] -- Store traits for timers, messages, actions, and status.
//! - [`memory`] -- In-memory implementation of every store trait.
//! - [`timer`] -- [`TimerEngine`] and the pure remaining-time derivation.
//! - [`messages`] -- [`MessageBoard`] for broadcast messages.
//! - [`actions`] -- [`TimerActions`] fired at remaining-time thresholds.
//! - [`scheduler`] -- Background task that fires due actions.
//! - [`status`] -- [`StatusService`] for the status label and visitor count.
//! - [`events`] -- [`EventBus`] of change notifications.
//! - [`clock_sync`] -- Display-side clock offset estimation and resync task.
//!
//! [`Clock`]: clock::Clock
//! [`StoreError`]: error::StoreError
//! [`EngineError`]: error::EngineError
//! [`TimerEngine`]: timer::TimerEngine
//! [`MessageBoard`]: messages::MessageBoard
//! [`TimerActions`]: actions::TimerActions
//! [`StatusService`]: status::StatusService
//! [`EventBus`]: events::EventBus

pub mod actions;
pub mod clock;
pub mod clock_sync;
pub mod config;
pub mod error;
pub mod events;
pub mod memory;
pub mod messages;
pub mod scheduler;
pub mod status;
pub mod store;
pub mod timer;
