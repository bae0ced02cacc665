//! Background task that fires timer actions for the running current timer.

use std::time::Duration;

use eventops_types::{TimerAction, TimerState};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::actions::TimerActions;
use crate::error::EngineError;
use crate::store::{ActionStore, MessageStore, TimerStore};
use crate::timer::TimerEngine;

/// Check the current timer once and fire whatever is due.
///
/// Does nothing unless the current timer is running.
///
/// # Errors
///
/// Returns [`EngineError::Store`] if a store call fails.
pub async fn check_current<S>(
    engine: &TimerEngine<S>,
    actions: &TimerActions<S>,
) -> Result<Vec<TimerAction>, EngineError>
where
    S: TimerStore + ActionStore + MessageStore,
{
    let Some(timer) = engine.current().await? else {
        return Ok(Vec::new());
    };
    if timer.state != TimerState::Running {
        return Ok(Vec::new());
    }
    let reading = engine.reading(&timer);
    let fired = actions.check_due(&timer, reading.remaining_ms).await?;
    if !fired.is_empty() {
        debug!(timer_id = %timer.id, remaining_ms = reading.remaining_ms, fired = fired.len(), "Timer actions fired");
    }
    Ok(fired)
}

/// Spawn the action scheduler. It checks every `interval` until `shutdown`
/// changes or its sender is dropped. Store failures are logged and retried
/// on the next tick.
pub fn spawn_action_scheduler<S>(
    engine: TimerEngine<S>,
    actions: TimerActions<S>,
    interval: Duration,
    mut shutdown: watch::Receiver<bool>,
) -> JoinHandle<()>
where
    S: TimerStore + ActionStore + MessageStore,
{
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval.max(Duration::from_millis(10)));
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        info!(interval_ms = interval.as_millis(), "Action scheduler started");

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if let Err(e) = check_current(&engine, &actions).await {
                        warn!(error = %e, "Action check failed");
                    }
                }
                _ = shutdown.changed() => {
                    info!("Action scheduler shutting down");
                    return;
                }
            }
        }
    })
}
