//! Type-safe identifier wrappers around [`Uuid`].
//!
//! Every stored entity has a strongly-typed ID so a timer id can never be
//! passed where a message id is expected. All IDs use UUID v7
//! (time-ordered) so `PostgreSQL` primary-key indexes stay append-friendly.

use serde::{Deserialize, Serialize};
use ts_rs::TS;
use uuid::Uuid;

/// Generates a newtype wrapper around [`Uuid`] with standard derives.
macro_rules! define_id {
    (
        $(#[$meta:meta])*
        $name:ident
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
        #[ts(export, export_to = "bindings/")]
        pub struct $name(pub Uuid);

        impl $name {
            /// Create a new identifier using UUID v7 (time-ordered).
            pub fn new() -> Self {
                Self(Uuid::now_v7())
            }

            /// Return the inner [`Uuid`] value.
            pub const fn into_inner(self) -> Uuid {
                self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl core::fmt::Display for $name {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl core::str::FromStr for $name {
            type Err = uuid::Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                s.parse::<Uuid>().map(Self)
            }
        }

        impl From<Uuid> for $name {
            fn from(id: Uuid) -> Self {
                Self(id)
            }
        }

        impl From<$name> for Uuid {
            fn from(id: $name) -> Self {
                id.0
            }
        }
    };
}

define_id! {
    /// Unique identifier for a countdown/count-up timer.
    TimerId
}

define_id! {
    /// Unique identifier for a message broadcast to the display.
    MessageId
}

define_id! {
    /// Unique identifier for a timer action (a trigger bound to a timer).
    ActionId
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_distinct_types() {
        let timer = TimerId::new();
        let message = MessageId::new();
        assert_ne!(timer.into_inner(), Uuid::nil());
        assert_ne!(message.into_inner(), Uuid::nil());
    }

    #[test]
    fn id_parses_from_its_display_form() {
        let id = TimerId::new();
        let parsed: Result<TimerId, _> = id.to_string().parse();
        assert_eq!(parsed.ok(), Some(id));
    }

    #[test]
    fn id_rejects_garbage() {
        let parsed: Result<ActionId, _> = "timer_123".parse();
        assert!(parsed.is_err());
    }

    #[test]
    fn id_serializes_as_bare_uuid() {
        let id = MessageId::new();
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, format!("\"{}\"", id.into_inner()));
    }
}
