//! Message broadcast: short texts shown on every display.
//!
//! Messages are independent of timers. Sending always creates a new row,
//! so several messages may coexist. Flash is stored and passed through;
//! timing it is up to the display.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use eventops_types::{DisplayEvent, MessageId, NewTimerMessage, TimerMessage};
use tracing::{debug, info, warn};

use crate::clock::Clock;
use crate::error::EngineError;
use crate::events::EventBus;
use crate::store::MessageStore;

/// Text color used when a message does not specify one.
pub const DEFAULT_MESSAGE_COLOR: &str = "#ffffff";

/// How long an expired message stays fetchable by id before a later send
/// purges it.
pub const EXPIRED_MESSAGE_RETENTION: Duration = Duration::hours(1);

/// Coordinator for broadcast messages.
#[derive(Clone)]
pub struct MessageBoard<S> {
    store: S,
    clock: Arc<dyn Clock>,
    events: EventBus,
}

impl<S> std::fmt::Debug for MessageBoard<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MessageBoard").finish_non_exhaustive()
    }
}

impl<S: MessageStore> MessageBoard<S> {
    /// Create a board over `store`.
    pub fn new(store: S, clock: Arc<dyn Clock>, events: EventBus) -> Self {
        Self {
            store,
            clock,
            events,
        }
    }

    /// Store a new message and announce it.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::InvalidInput`] if the text is blank, or
    /// [`EngineError::Store`] if the write fails.
    pub async fn send(&self, new: NewTimerMessage) -> Result<TimerMessage, EngineError> {
        let text = new.text.trim();
        if text.is_empty() {
            return Err(EngineError::InvalidInput(
                "message text must not be empty".to_owned(),
            ));
        }

        let now = self.clock.now();
        let expires_at = new
            .ttl_secs
            .and_then(|secs| now.checked_add_signed(Duration::seconds(i64::from(secs))));
        let message = TimerMessage {
            id: MessageId::new(),
            text: text.to_owned(),
            color: Some(
                new.color
                    .filter(|c| !c.trim().is_empty())
                    .unwrap_or_else(|| DEFAULT_MESSAGE_COLOR.to_owned()),
            ),
            flash: new.flash,
            timer_id: new.timer_id,
            created_at: now,
            expires_at,
        };
        self.purge_expired(now).await;
        self.store.insert_message(&message).await?;
        info!(message_id = %message.id, flash = message.flash, "Message sent");
        self.events.publish(DisplayEvent::MessageSent {
            message: message.clone(),
        });
        Ok(message)
    }

    /// Fetch one message.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::NotFound`] if the message does not exist.
    pub async fn get(&self, id: MessageId) -> Result<TimerMessage, EngineError> {
        self.store
            .get_message(id)
            .await?
            .ok_or_else(|| EngineError::not_found("message", id))
    }

    /// Unexpired messages, newest first.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Store`] if the read fails.
    pub async fn list(&self) -> Result<Vec<TimerMessage>, EngineError> {
        Ok(self.store.list_messages(self.clock.now()).await?)
    }

    /// Delete a message. Returns `false` when it was already gone.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Store`] if the delete fails.
    pub async fn delete(&self, id: MessageId) -> Result<bool, EngineError> {
        let deleted = self.store.delete_message(id).await?;
        if deleted {
            info!(message_id = %id, "Message deleted");
            self.events.publish(DisplayEvent::MessageDeleted { message_id: id });
        }
        Ok(deleted)
    }

    async fn purge_expired(&self, now: DateTime<Utc>) {
        let Some(before) = now.checked_sub_signed(EXPIRED_MESSAGE_RETENTION) else {
            return;
        };
        match self.store.purge_expired_messages(before).await {
            Ok(0) => {}
            Ok(purged) => debug!(purged, "Purged expired messages"),
            Err(e) => warn!(error = %e, "Failed to purge expired messages"),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use crate::clock::ManualClock;
    use crate::memory::MemoryStore;

    use super::*;

    fn board() -> (MessageBoard<MemoryStore>, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::at_millis(1_700_000_000_000));
        let board = MessageBoard::new(MemoryStore::new(), clock.clone(), EventBus::default());
        (board, clock)
    }

    fn text(t: &str) -> NewTimerMessage {
        NewTimerMessage {
            text: t.to_owned(),
            ..NewTimerMessage::default()
        }
    }

    #[tokio::test]
    async fn send_creates_distinct_messages() {
        let (board, clock) = board();
        let first = board.send(text("Doors open")).await.ok();
        clock.advance_ms(1);
        let second = board.send(text("Doors open")).await.ok();
        assert!(first.is_some());
        assert_ne!(first.as_ref().map(|m| m.id), second.as_ref().map(|m| m.id));
        assert_eq!(first.and_then(|m| m.color).as_deref(), Some(DEFAULT_MESSAGE_COLOR));

        let listed = board.list().await.unwrap();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed.first().map(|m| m.id), second.map(|m| m.id));
    }

    #[tokio::test]
    async fn blank_text_is_invalid() {
        let (board, _) = board();
        assert!(matches!(
            board.send(text("   ")).await,
            Err(EngineError::InvalidInput(_))
        ));
    }

    #[tokio::test]
    async fn delete_is_idempotent() {
        let (board, _) = board();
        let message = board.send(text("bye")).await.unwrap();
        assert!(board.delete(message.id).await.unwrap_or(false));
        assert!(!board.delete(message.id).await.unwrap_or(true));
        assert!(matches!(
            board.get(message.id).await,
            Err(EngineError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn ttl_hides_message_after_expiry() {
        let (board, clock) = board();
        let new = NewTimerMessage {
            ttl_secs: Some(10),
            ..text("Intermission")
        };
        assert!(board.send(new).await.is_ok());
        assert_eq!(board.list().await.unwrap().len(), 1);
        clock.advance_ms(10_000);
        assert!(board.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn expired_messages_are_purged_after_retention() {
        let (board, clock) = board();
        let new = NewTimerMessage {
            ttl_secs: Some(10),
            ..text("Intermission")
        };
        let old = board.send(new).await.unwrap();
        clock.advance_ms(10_000);
        board.send(text("still fetchable")).await.unwrap();
        assert!(board.get(old.id).await.is_ok());

        clock.advance_ms(EXPIRED_MESSAGE_RETENTION.num_milliseconds());
        board.send(text("later")).await.unwrap();
        assert!(matches!(
            board.get(old.id).await,
            Err(EngineError::NotFound { .. })
        ));
    }
}
