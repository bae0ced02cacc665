//! Clock synchronization client.
//!
//! A display estimates the offset between its own clock and the server's
//! from one request/response round trip, assuming the server read its clock
//! halfway through:
//!
//! ```text
//! offset = server_time - (sent_at + received_at) / 2
//! adjusted_now = local_now + offset
//! ```
//!
//! Only the latest offset is kept. A failed sync keeps the previous offset;
//! after `stale_after` without any successful sync the offset is dropped
//! back to zero rather than trusting an arbitrarily old estimate.
//!
//! The transport is abstracted behind [`TimeSource`]; the display binary
//! supplies an HTTP implementation.

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};
use std::time::Duration;

use tokio::sync::{Notify, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::clock::Clock;
use crate::config::DisplayConfig;

/// Sentinel stored in `last_success_ms` before the first successful sync.
const NEVER: i64 = i64::MIN;

/// Errors from a single synchronization round trip.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    /// The request could not be sent or the connection failed.
    #[error("time request failed: {0}")]
    Transport(String),

    /// No response arrived within the request timeout.
    #[error("time request timed out after {timeout_ms}ms")]
    Timeout {
        /// The configured timeout.
        timeout_ms: u64,
    },

    /// The server answered with something other than a timestamp.
    #[error("invalid time response: {0}")]
    InvalidResponse(String),
}

/// Something that reports the server's current time.
pub trait TimeSource: Send + Sync + 'static {
    /// The server's clock as Unix epoch milliseconds.
    fn server_time_ms(&self) -> impl Future<Output = Result<i64, SyncError>> + Send;
}

/// One round trip: when it was sent, what the server said, when it came
/// back. All values are Unix epoch milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClockSample {
    /// Local clock when the request was sent.
    pub sent_at_ms: i64,
    /// Server clock reported in the response.
    pub server_time_ms: i64,
    /// Local clock when the response arrived.
    pub received_at_ms: i64,
}

impl ClockSample {
    /// Time from send to receive. Never negative.
    pub const fn round_trip_ms(&self) -> i64 {
        let rtt = self.received_at_ms.saturating_sub(self.sent_at_ms);
        if rtt < 0 { 0 } else { rtt }
    }

    /// Estimated one-way delay: half the round trip.
    pub const fn one_way_delay_ms(&self) -> i64 {
        self.round_trip_ms() / 2
    }

    /// Server clock minus the local clock at the midpoint of the round trip.
    pub const fn offset_ms(&self) -> i64 {
        let midpoint = self
            .sent_at_ms
            .saturating_add(self.received_at_ms.saturating_sub(self.sent_at_ms) / 2);
        self.server_time_ms.saturating_sub(midpoint)
    }
}

/// Timing knobs for the sync task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncSettings {
    /// Resync once the last success is at least this old.
    pub interval_ms: i64,
    /// How often the task wakes to check.
    pub check_interval: Duration,
    /// Drop the offset after this long without a success.
    pub stale_after_ms: i64,
}

impl SyncSettings {
    /// Settings from the display section of the configuration.
    pub fn from_config(config: &DisplayConfig) -> Self {
        Self {
            interval_ms: i64::try_from(config.sync_interval_ms).unwrap_or(i64::MAX),
            check_interval: Duration::from_millis(config.sync_check_interval_ms.max(1)),
            stale_after_ms: i64::try_from(config.stale_after_ms).unwrap_or(i64::MAX),
        }
    }
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self::from_config(&DisplayConfig::default())
    }
}

/// Shared offset state. Lock-free, so the render loop can read it on every
/// frame while the sync task writes.
pub struct ClockSync {
    clock: Arc<dyn Clock>,
    settings: SyncSettings,
    offset_ms: AtomicI64,
    last_success_ms: AtomicI64,
}

impl std::fmt::Debug for ClockSync {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClockSync")
            .field("settings", &self.settings)
            .field("offset_ms", &self.offset_ms())
            .field("last_success_ms", &self.last_success_ms())
            .finish()
    }
}

impl ClockSync {
    /// Fresh state: zero offset, never synced.
    pub const fn new(clock: Arc<dyn Clock>, settings: SyncSettings) -> Self {
        Self {
            clock,
            settings,
            offset_ms: AtomicI64::new(0),
            last_success_ms: AtomicI64::new(NEVER),
        }
    }

    /// The latest offset estimate.
    pub fn offset_ms(&self) -> i64 {
        self.offset_ms.load(Ordering::Acquire)
    }

    /// Local time of the last successful sync, if any.
    pub fn last_success_ms(&self) -> Option<i64> {
        match self.last_success_ms.load(Ordering::Acquire) {
            NEVER => None,
            ms => Some(ms),
        }
    }

    /// The uncorrected local clock.
    pub fn local_now_ms(&self) -> i64 {
        self.clock.now_ms()
    }

    /// The local clock corrected by the current offset.
    pub fn adjusted_now_ms(&self) -> i64 {
        self.clock.now_ms().saturating_add(self.offset_ms())
    }

    /// Whether a resync is due: never synced, or the last success is at
    /// least one interval old.
    pub fn should_sync(&self) -> bool {
        self.last_success_ms().is_none_or(|last| {
            self.clock.now_ms().saturating_sub(last) >= self.settings.interval_ms
        })
    }

    /// Adopt the offset of `sample`.
    pub fn record(&self, sample: &ClockSample) {
        self.offset_ms.store(sample.offset_ms(), Ordering::Release);
        self.last_success_ms
            .store(sample.received_at_ms, Ordering::Release);
    }

    /// Reset the offset to zero if the last success is older than the
    /// staleness window. Returns whether it did.
    pub fn expire_stale(&self) -> bool {
        let Some(last) = self.last_success_ms() else {
            return false;
        };
        let age = self.clock.now_ms().saturating_sub(last);
        if age <= self.settings.stale_after_ms || self.offset_ms() == 0 {
            return false;
        }
        self.offset_ms.store(0, Ordering::Release);
        warn!(age_ms = age, "Clock offset stale, reset to zero");
        true
    }

    /// Perform one round trip against `source` and adopt its offset.
    ///
    /// # Errors
    ///
    /// Returns the [`SyncError`] from the source. The previous offset is
    /// left untouched.
    pub async fn sync_once<T: TimeSource>(&self, source: &T) -> Result<ClockSample, SyncError> {
        let sent_at_ms = self.clock.now_ms();
        let server_time_ms = source.server_time_ms().await?;
        let received_at_ms = self.clock.now_ms();
        let sample = ClockSample {
            sent_at_ms,
            server_time_ms,
            received_at_ms,
        };
        self.record(&sample);
        debug!(
            offset_ms = sample.offset_ms(),
            round_trip_ms = sample.round_trip_ms(),
            "Clock synchronized"
        );
        Ok(sample)
    }

    async fn attempt<T: TimeSource>(&self, source: &T) {
        if let Err(e) = self.sync_once(source).await {
            warn!(error = %e, offset_ms = self.offset_ms(), "Clock sync failed, keeping previous offset");
        }
    }
}

/// Cloneable way to ask the sync task for an immediate round trip, for
/// tasks that notice the host was suspended or its clock was set.
#[derive(Debug, Clone)]
pub struct ResyncTrigger(Arc<Notify>);

impl ResyncTrigger {
    /// Wake the sync task. Requests made while it is busy coalesce.
    pub fn fire(&self) {
        self.0.notify_one();
    }
}

/// Handle to a running sync task. Dropping it stops the task.
#[derive(Debug)]
pub struct ClockSyncHandle {
    shutdown: watch::Sender<bool>,
    resync: Arc<Notify>,
    join: Option<JoinHandle<()>>,
}

impl ClockSyncHandle {
    /// Ask for an immediate resync, e.g. when the display regains focus.
    pub fn request_resync(&self) {
        self.resync.notify_one();
    }

    /// A trigger other tasks can hold to request resyncs.
    pub fn trigger(&self) -> ResyncTrigger {
        ResyncTrigger(Arc::clone(&self.resync))
    }

    /// Stop the task and wait for it to exit.
    pub async fn stop(mut self) {
        let _ = self.shutdown.send(true);
        if let Some(join) = self.join.take() {
            let _ = join.await;
        }
    }
}

impl Drop for ClockSyncHandle {
    fn drop(&mut self) {
        let _ = self.shutdown.send(true);
    }
}

/// Spawn the periodic sync task: one sync immediately, then a check every
/// `check_interval` (resync when due, expire when stale), plus an
/// immediate sync on [`ClockSyncHandle::request_resync`].
pub fn spawn_clock_sync<T: TimeSource>(sync: Arc<ClockSync>, source: T) -> ClockSyncHandle {
    let (shutdown_tx, mut shutdown) = watch::channel(false);
    let resync = Arc::new(Notify::new());
    let wake = Arc::clone(&resync);

    let join = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(sync.settings.check_interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        info!(
            interval_ms = sync.settings.interval_ms,
            stale_after_ms = sync.settings.stale_after_ms,
            "Clock sync started"
        );

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    sync.expire_stale();
                    if sync.should_sync() {
                        sync.attempt(&source).await;
                    }
                }
                () = wake.notified() => {
                    sync.attempt(&source).await;
                }
                _ = shutdown.changed() => {
                    info!("Clock sync shutting down");
                    return;
                }
            }
        }
    });

    ClockSyncHandle {
        shutdown: shutdown_tx,
        resync,
        join: Some(join),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;

    use crate::clock::ManualClock;

    use super::*;

    #[derive(Clone)]
    struct FakeSource {
        server_ms: Arc<AtomicI64>,
        fail: Arc<std::sync::atomic::AtomicBool>,
        calls: Arc<AtomicUsize>,
    }

    impl FakeSource {
        fn at(server_ms: i64) -> Self {
            Self {
                server_ms: Arc::new(AtomicI64::new(server_ms)),
                fail: Arc::new(std::sync::atomic::AtomicBool::new(false)),
                calls: Arc::new(AtomicUsize::new(0)),
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl TimeSource for FakeSource {
        async fn server_time_ms(&self) -> Result<i64, SyncError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail.load(Ordering::SeqCst) {
                return Err(SyncError::Transport("connection refused".to_owned()));
            }
            Ok(self.server_ms.load(Ordering::SeqCst))
        }
    }

    const LOCAL: i64 = 1_700_000_000_000;

    fn sync_at(local_ms: i64) -> (Arc<ClockSync>, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::at_millis(local_ms));
        let settings = SyncSettings {
            interval_ms: 30_000,
            check_interval: Duration::from_secs(5),
            stale_after_ms: 600_000,
        };
        (Arc::new(ClockSync::new(clock.clone(), settings)), clock)
    }

    #[test]
    fn offset_is_server_minus_midpoint() {
        let sample = ClockSample {
            sent_at_ms: 1_000,
            server_time_ms: 5_000,
            received_at_ms: 1_200,
        };
        assert_eq!(sample.round_trip_ms(), 200);
        assert_eq!(sample.one_way_delay_ms(), 100);
        assert_eq!(sample.offset_ms(), 3_900);

        let behind = ClockSample {
            sent_at_ms: 10_000,
            server_time_ms: 9_000,
            received_at_ms: 10_050,
        };
        assert_eq!(behind.offset_ms(), -1_025);
    }

    #[test]
    fn should_sync_until_first_success_then_after_interval() {
        let (sync, clock) = sync_at(LOCAL);
        assert!(sync.should_sync());

        sync.record(&ClockSample {
            sent_at_ms: LOCAL,
            server_time_ms: LOCAL + 2_000,
            received_at_ms: LOCAL,
        });
        assert_eq!(sync.offset_ms(), 2_000);
        assert_eq!(sync.adjusted_now_ms(), LOCAL + 2_000);
        assert!(!sync.should_sync());

        clock.advance_ms(29_999);
        assert!(!sync.should_sync());
        clock.advance_ms(1);
        assert!(sync.should_sync());
    }

    #[tokio::test]
    async fn failure_keeps_previous_offset() {
        let (sync, _) = sync_at(LOCAL);
        let source = FakeSource::at(LOCAL + 750);
        assert!(sync.sync_once(&source).await.is_ok());
        assert_eq!(sync.offset_ms(), 750);

        source.fail.store(true, Ordering::SeqCst);
        assert!(sync.sync_once(&source).await.is_err());
        assert_eq!(sync.offset_ms(), 750);
    }

    #[test]
    fn stale_offset_resets_to_zero() {
        let (sync, clock) = sync_at(LOCAL);
        assert!(!sync.expire_stale());
        sync.record(&ClockSample {
            sent_at_ms: LOCAL,
            server_time_ms: LOCAL - 3_000,
            received_at_ms: LOCAL,
        });

        clock.advance_ms(600_000);
        assert!(!sync.expire_stale());
        assert_eq!(sync.offset_ms(), -3_000);

        clock.advance_ms(1);
        assert!(sync.expire_stale());
        assert_eq!(sync.offset_ms(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn task_syncs_on_start_and_on_request() {
        let (sync, _) = sync_at(LOCAL);
        let source = FakeSource::at(LOCAL + 400);
        let handle = spawn_clock_sync(Arc::clone(&sync), source.clone());

        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(source.calls(), 1);
        assert_eq!(sync.offset_ms(), 400);

        source.server_ms.store(LOCAL + 900, Ordering::SeqCst);
        handle.request_resync();
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(source.calls(), 2);
        assert_eq!(sync.offset_ms(), 900);

        handle.trigger().fire();
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(source.calls(), 3);

        handle.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn dropping_handle_stops_task() {
        let (sync, clock) = sync_at(LOCAL);
        let source = FakeSource::at(LOCAL);
        let handle = spawn_clock_sync(Arc::clone(&sync), source.clone());
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(source.calls(), 1);

        drop(handle);
        tokio::time::sleep(Duration::from_millis(10)).await;

        clock.advance_ms(60_000);
        tokio::time::sleep(Duration::from_secs(20)).await;
        assert_eq!(source.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn task_resyncs_after_interval() {
        let (sync, clock) = sync_at(LOCAL);
        let source = FakeSource::at(LOCAL);
        let handle = spawn_clock_sync(Arc::clone(&sync), source.clone());
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(source.calls(), 1);

        // Not due yet: the check interval passes but the sync interval has not.
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(source.calls(), 1);

        clock.advance_ms(30_000);
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(source.calls(), 2);

        handle.stop().await;
    }
}
