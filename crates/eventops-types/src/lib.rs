//! Shared type definitions for the EventOps dashboard.
//!
//! This crate is the single source of truth for all types used across the
//! EventOps workspace. Types defined here flow downstream to `TypeScript`
//! via `ts-rs` for the display front end.
//!
//! # Modules
//!
//! - [`ids`] -- Type-safe UUID wrappers for entity identifiers
//! - [`enums`] -- Timer state, timer kind, action kind, session role
//! - [`structs`] -- Timers, readings, messages, actions, status singletons
//! - [`events`] -- Change notifications streamed to displays

pub mod enums;
pub mod events;
pub mod ids;
pub mod structs;

// Re-export all public types at crate root for convenience.
pub use enums::{SessionRole, TimerActionKind, TimerKind, TimerState};
pub use events::DisplayEvent;
pub use ids::{ActionId, MessageId, TimerId};
pub use structs::{
    EventStatus, NewTimerAction, NewTimerMessage, Timer, TimerAction, TimerActionPatch,
    TimerMessage, TimerReading, TimerSettings, VisitorCounter,
};
