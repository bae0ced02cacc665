//! The display loop: poll the server, render the clock.
//!
//! Two cancelable tasks share the latest [`Snapshot`] through a `watch`
//! channel. The poller replaces it every `poll_interval`; on failure it
//! logs and leaves the previous snapshot in place. The renderer projects
//! the snapshot at the sync-adjusted clock every `render_interval` and
//! logs a frame whenever the visible text changes.
//!
//! The renderer also watches the local clock between ticks. A gap far
//! larger than the render interval means the host was suspended (or its
//! clock was set), so the offset is no longer trusted and a resync is
//! requested.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use eventops_core::clock_sync::{ClockSync, ResyncTrigger};
use eventops_types::{Timer, TimerMessage};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::client::ApiClient;
use crate::error::DisplayError;
use crate::render::Frame;

/// Everything the display knows about the server's state.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Snapshot {
    /// The current timer.
    pub timer: Option<Timer>,
    /// Live messages, newest first.
    pub messages: Vec<TimerMessage>,
}

/// Where snapshots come from.
pub trait TimerFeed: Send + Sync + 'static {
    /// Fetch a fresh snapshot.
    fn fetch(&self) -> impl Future<Output = Result<Snapshot, DisplayError>> + Send;
}

impl TimerFeed for ApiClient {
    async fn fetch(&self) -> Result<Snapshot, DisplayError> {
        let (current, messages) = tokio::join!(self.current_timer(), self.messages());
        Ok(Snapshot {
            timer: current?.timer,
            messages: messages?,
        })
    }
}

/// Intervals for the two display tasks.
#[derive(Debug, Clone, Copy)]
pub struct LoopSettings {
    /// Time between polls.
    pub poll_interval: Duration,
    /// Time between frames.
    pub render_interval: Duration,
}

/// Handle to the running display tasks. Dropping it stops them.
#[derive(Debug)]
pub struct DisplayHandle {
    shutdown: watch::Sender<bool>,
    snapshots: watch::Receiver<Snapshot>,
    tasks: Vec<JoinHandle<()>>,
}

impl DisplayHandle {
    /// The latest snapshot the poller produced.
    pub fn snapshot(&self) -> Snapshot {
        self.snapshots.borrow().clone()
    }

    /// Stop both tasks and wait for them to exit.
    pub async fn stop(mut self) {
        let _ = self.shutdown.send(true);
        for task in self.tasks.drain(..) {
            if let Err(e) = task.await {
                warn!(error = %e, "Display task failed");
            }
        }
    }
}

impl Drop for DisplayHandle {
    fn drop(&mut self) {
        let _ = self.shutdown.send(true);
    }
}

/// Ticks a clock jump must span, in render intervals, to count as a resume.
const RESUME_GAP_TICKS: u32 = 4;

/// Smallest clock jump treated as a resume regardless of render interval.
const RESUME_MIN_GAP: Duration = Duration::from_secs(2);

/// Flags a local clock jump between consecutive render ticks.
#[derive(Debug, Clone, Copy)]
pub struct ResumeDetector {
    threshold_ms: i64,
    last_ms: Option<i64>,
}

impl ResumeDetector {
    /// A detector for ticks `interval` apart.
    pub fn new(interval: Duration) -> Self {
        let gap = interval.saturating_mul(RESUME_GAP_TICKS).max(RESUME_MIN_GAP);
        Self {
            threshold_ms: i64::try_from(gap.as_millis()).unwrap_or(i64::MAX),
            last_ms: None,
        }
    }

    /// Record the local clock at a tick. Returns `true` when it moved, in
    /// either direction, by more than the threshold since the last tick.
    pub fn observe(&mut self, now_ms: i64) -> bool {
        let jumped = self
            .last_ms
            .is_some_and(|last| now_ms.saturating_sub(last).saturating_abs() > self.threshold_ms);
        self.last_ms = Some(now_ms);
        jumped
    }
}

/// Project `snapshot` at `now`. `None` when there is no current timer.
pub fn render(snapshot: &Snapshot, now: DateTime<Utc>) -> Option<Frame> {
    snapshot
        .timer
        .as_ref()
        .map(|timer| Frame::project(timer, now, &snapshot.messages))
}

/// Spawn the poller and the renderer. The renderer fires `resync` when it
/// detects a resume.
pub fn spawn_display<F: TimerFeed>(
    feed: F,
    sync: Arc<ClockSync>,
    resync: ResyncTrigger,
    settings: LoopSettings,
) -> DisplayHandle {
    let (shutdown, shutdown_rx) = watch::channel(false);
    let (snapshot_tx, snapshots) = watch::channel(Snapshot::default());

    let poller = tokio::spawn(poll_loop(
        feed,
        snapshot_tx,
        settings.poll_interval,
        shutdown_rx.clone(),
    ));
    let renderer = tokio::spawn(render_loop(
        snapshots.clone(),
        sync,
        resync,
        settings.render_interval,
        shutdown_rx,
    ));

    DisplayHandle {
        shutdown,
        snapshots,
        tasks: vec![poller, renderer],
    }
}

async fn poll_loop<F: TimerFeed>(
    feed: F,
    snapshots: watch::Sender<Snapshot>,
    interval: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut ticker = tokio::time::interval(interval.max(Duration::from_millis(10)));
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    info!(interval_ms = interval.as_millis(), "Poller started");

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                match feed.fetch().await {
                    Ok(snapshot) => {
                        debug!(
                            has_timer = snapshot.timer.is_some(),
                            messages = snapshot.messages.len(),
                            "Polled server"
                        );
                        snapshots.send_if_modified(|current| {
                            let changed = *current != snapshot;
                            *current = snapshot;
                            changed
                        });
                    }
                    Err(e) => warn!(error = %e, "Poll failed, keeping last snapshot"),
                }
            }
            _ = shutdown.changed() => {
                info!("Poller shutting down");
                return;
            }
        }
    }
}

async fn render_loop(
    snapshots: watch::Receiver<Snapshot>,
    sync: Arc<ClockSync>,
    resync: ResyncTrigger,
    interval: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    let interval = interval.max(Duration::from_millis(10));
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    let mut resume = ResumeDetector::new(interval);
    let mut last: Option<Frame> = None;

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                if resume.observe(sync.local_now_ms()) {
                    info!("Local clock jumped between frames, requesting clock resync");
                    resync.fire();
                }
                let now = DateTime::from_timestamp_millis(sync.adjusted_now_ms())
                    .unwrap_or_else(Utc::now);
                let frame = render(&snapshots.borrow(), now);
                if frame != last {
                    log_frame(last.as_ref(), frame.as_ref(), sync.offset_ms());
                    last = frame;
                }
            }
            _ = shutdown.changed() => {
                debug!("Renderer shutting down");
                return;
            }
        }
    }
}

fn log_frame(previous: Option<&Frame>, frame: Option<&Frame>, offset_ms: i64) {
    let Some(frame) = frame else {
        info!("No current timer");
        return;
    };
    if frame.overtime && !previous.is_some_and(|p| p.overtime) {
        info!(title = frame.title, "Time is up");
    }
    info!(
        state = frame.state.as_str(),
        color = frame.color,
        overtime = frame.overtime,
        flash = frame.flash,
        offset_ms,
        "{frame}"
    );
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use eventops_core::clock::{Clock, ManualClock};
    use eventops_core::clock_sync::{SyncError, SyncSettings, TimeSource, spawn_clock_sync};
    use eventops_types::{TimerId, TimerKind, TimerState};

    use super::*;

    struct FakeFeed {
        calls: Arc<AtomicUsize>,
        timer: Timer,
    }

    impl TimerFeed for FakeFeed {
        async fn fetch(&self) -> Result<Snapshot, DisplayError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            if n == 1 {
                return Err(DisplayError::Http("flaky".to_owned()));
            }
            Ok(Snapshot {
                timer: Some(self.timer.clone()),
                messages: Vec::new(),
            })
        }
    }

    #[derive(Clone)]
    struct CountingSource {
        calls: Arc<AtomicUsize>,
    }

    impl TimeSource for CountingSource {
        async fn server_time_ms(&self) -> Result<i64, SyncError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(1_700_000_000_000)
        }
    }

    fn timer() -> Timer {
        let now = Utc::now();
        Timer {
            id: TimerId::new(),
            title: "Doors".to_owned(),
            kind: TimerKind::Countdown,
            duration_ms: 60_000,
            state: TimerState::Idle,
            started_at: None,
            elapsed_ms: 0,
            show_seconds: true,
            play_sound: false,
            color: "#3b82f6".to_owned(),
            overtime_color: "#ef4444".to_owned(),
            message: None,
            is_current: true,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn render_without_timer_is_none() {
        assert!(render(&Snapshot::default(), Utc::now()).is_none());
    }

    #[test]
    fn idle_timer_renders_full_duration() {
        let snapshot = Snapshot {
            timer: Some(timer()),
            messages: Vec::new(),
        };
        let frame = render(&snapshot, Utc::now());
        assert_eq!(frame.map(|f| f.text), Some("01:00".to_owned()));
    }

    #[tokio::test(start_paused = true)]
    async fn poller_keeps_last_snapshot_on_failure_and_stops() {
        let calls = Arc::new(AtomicUsize::new(0));
        let feed = FakeFeed {
            calls: Arc::clone(&calls),
            timer: timer(),
        };
        let clock: Arc<dyn Clock> = Arc::new(ManualClock::at_millis(1_700_000_000_000));
        let sync = Arc::new(ClockSync::new(clock, SyncSettings::default()));
        let sync_task = spawn_clock_sync(
            Arc::clone(&sync),
            CountingSource {
                calls: Arc::new(AtomicUsize::new(0)),
            },
        );
        let handle = spawn_display(
            feed,
            sync,
            sync_task.trigger(),
            LoopSettings {
                poll_interval: Duration::from_millis(100),
                render_interval: Duration::from_millis(50),
            },
        );

        tokio::time::sleep(Duration::from_millis(250)).await;
        assert!(calls.load(Ordering::SeqCst) >= 3);
        assert_eq!(
            handle.snapshot().timer.map(|t| t.title),
            Some("Doors".to_owned())
        );

        handle.stop().await;
        let after = calls.load(Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(500)).await;
        assert_eq!(calls.load(Ordering::SeqCst), after);
        sync_task.stop().await;
    }

    #[test]
    fn resume_detector_flags_large_jumps_only() {
        let mut detector = ResumeDetector::new(Duration::from_millis(250));
        assert!(!detector.observe(0));
        assert!(!detector.observe(250));
        assert!(!detector.observe(1_900));
        assert!(detector.observe(61_900));
        assert!(!detector.observe(62_150));
        assert!(detector.observe(10_000));
    }

    #[tokio::test(start_paused = true)]
    async fn clock_jump_between_frames_requests_resync() {
        let manual = Arc::new(ManualClock::at_millis(1_700_000_000_000));
        let clock: Arc<dyn Clock> = manual.clone();
        let settings = SyncSettings {
            interval_ms: 3_600_000,
            check_interval: Duration::from_secs(5),
            stale_after_ms: i64::MAX,
        };
        let sync = Arc::new(ClockSync::new(clock, settings));
        let source = CountingSource {
            calls: Arc::new(AtomicUsize::new(0)),
        };
        let sync_task = spawn_clock_sync(Arc::clone(&sync), source.clone());
        let feed = FakeFeed {
            calls: Arc::new(AtomicUsize::new(0)),
            timer: timer(),
        };
        let handle = spawn_display(
            feed,
            sync,
            sync_task.trigger(),
            LoopSettings {
                poll_interval: Duration::from_millis(100),
                render_interval: Duration::from_millis(50),
            },
        );

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(source.calls.load(Ordering::SeqCst), 1);

        // The host slept for two minutes.
        manual.advance_ms(120_000);
        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(source.calls.load(Ordering::SeqCst), 2);

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(source.calls.load(Ordering::SeqCst), 2);

        handle.stop().await;
        sync_task.stop().await;
    }
}
