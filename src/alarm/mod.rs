//! Repeating interval alarm
//!
//! [`AlarmClock`] runs one background task that sleeps for the interval,
//! fires the caller's callback with a timestamped message and then plays the
//! alert sound, over and over until stopped.

mod interval;

pub use interval::parse_interval;

use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Local};
use thiserror::Error;
use tokio::sync::Notify;
use tokio::task::JoinHandle;

use crate::sound::AlertSoundSelector;

/// How long `stop` waits for the worker before aborting it
pub const DEFAULT_STOP_GRACE: Duration = Duration::from_secs(2);

/// Callback invoked on every fire with the alarm message
pub type FireCallback = Arc<dyn Fn(&str) -> anyhow::Result<()> + Send + Sync>;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum AlarmError {
    #[error("Invalid interval '{0}': must be a positive number")]
    InvalidInterval(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartOutcome {
    Started,
    AlreadyRunning,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopOutcome {
    /// The alarm was running; `fires` is how often it went off
    Stopped { fires: u64 },
    NotRunning,
}

/// Convert an interval in seconds, rejecting anything a timer cannot wait for
pub(crate) fn interval_duration(seconds: f64) -> Result<Duration, AlarmError> {
    let invalid = || AlarmError::InvalidInterval(format_seconds(seconds));
    if !seconds.is_finite() || seconds <= 0.0 {
        return Err(invalid());
    }
    let interval = Duration::try_from_secs_f64(seconds).map_err(|_| invalid())?;
    if interval.is_zero() {
        return Err(invalid());
    }
    Ok(interval)
}

/// Plain notation for ordinary values, exponent notation for extreme ones
fn format_seconds(seconds: f64) -> String {
    if seconds == 0.0 || (1e-3..1e9).contains(&seconds.abs()) {
        seconds.to_string()
    } else {
        format!("{:e}", seconds)
    }
}

/// Format the message passed to the fire callback
pub fn fire_message(now: DateTime<Local>) -> String {
    format!("ALARM! Time: {}", now.format("%H:%M:%S"))
}

struct ActiveRun {
    running: Arc<AtomicBool>,
    wake: Arc<Notify>,
    fires: Arc<AtomicU64>,
    interval: Duration,
    handle: JoinHandle<()>,
}

/// Repeating alarm with a single background worker
pub struct AlarmClock {
    selector: Arc<AlertSoundSelector>,
    grace: Duration,
    run: Option<ActiveRun>,
}

impl AlarmClock {
    pub fn new(selector: Arc<AlertSoundSelector>) -> Self {
        Self {
            selector,
            grace: DEFAULT_STOP_GRACE,
            run: None,
        }
    }

    pub fn with_grace_period(mut self, grace: Duration) -> Self {
        self.grace = grace;
        self
    }

    pub fn is_running(&self) -> bool {
        self.run
            .as_ref()
            .map(|run| run.running.load(Ordering::SeqCst))
            .unwrap_or(false)
    }

    /// Interval of the current run
    pub fn interval(&self) -> Option<Duration> {
        self.run.as_ref().map(|run| run.interval)
    }

    /// Fires so far in the current run
    pub fn fire_count(&self) -> u64 {
        self.run
            .as_ref()
            .map(|run| run.fires.load(Ordering::SeqCst))
            .unwrap_or(0)
    }

    /// Start firing every `interval_seconds`. Must be called inside a tokio
    /// runtime; returns without waiting for the first fire.
    pub fn start<F>(&mut self, interval_seconds: f64, on_fire: F) -> Result<StartOutcome, AlarmError>
    where
        F: Fn(&str) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        let interval = interval_duration(interval_seconds)?;

        if self.is_running() {
            tracing::warn!("[Alarm] Already running");
            return Ok(StartOutcome::AlreadyRunning);
        }

        let running = Arc::new(AtomicBool::new(true));
        let wake = Arc::new(Notify::new());
        let fires = Arc::new(AtomicU64::new(0));

        tracing::info!("[Alarm] Starting with interval {:?}", interval);

        let handle = tokio::spawn(worker(
            interval,
            running.clone(),
            wake.clone(),
            fires.clone(),
            Arc::new(on_fire),
            self.selector.clone(),
        ));

        self.run = Some(ActiveRun {
            running,
            wake,
            fires,
            interval,
            handle,
        });
        Ok(StartOutcome::Started)
    }

    /// Stop the alarm and wait (bounded) for the worker to exit
    pub async fn stop(&mut self) -> StopOutcome {
        let Some(run) = self.run.take() else {
            return StopOutcome::NotRunning;
        };

        tracing::info!("[Alarm] Stopping");
        run.running.store(false, Ordering::SeqCst);
        run.wake.notify_one();

        let mut handle = run.handle;
        match tokio::time::timeout(self.grace, &mut handle).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => tracing::error!("[Alarm] Worker ended abnormally: {}", e),
            Err(_) => {
                tracing::warn!(
                    "[Alarm] Worker did not exit within {:?}, aborting",
                    self.grace
                );
                handle.abort();
            }
        }

        StopOutcome::Stopped {
            fires: run.fires.load(Ordering::SeqCst),
        }
    }
}

impl Drop for AlarmClock {
    fn drop(&mut self) {
        if let Some(run) = self.run.take() {
            run.running.store(false, Ordering::SeqCst);
            run.wake.notify_one();
        }
    }
}

async fn worker(
    interval: Duration,
    running: Arc<AtomicBool>,
    wake: Arc<Notify>,
    fires: Arc<AtomicU64>,
    on_fire: FireCallback,
    selector: Arc<AlertSoundSelector>,
) {
    while running.load(Ordering::SeqCst) {
        tokio::select! {
            _ = tokio::time::sleep(interval) => {}
            _ = wake.notified() => {}
        }

        // A stop during the wait must not fire
        if !running.load(Ordering::SeqCst) {
            break;
        }

        let count = fires.fetch_add(1, Ordering::SeqCst) + 1;

        // Playback opens files and spawns players, keep it off the runtime threads
        let fired = tokio::task::spawn_blocking({
            let on_fire = on_fire.clone();
            let selector = selector.clone();
            move || fire(count, &on_fire, &selector)
        })
        .await;
        if let Err(e) = fired {
            tracing::error!("[Alarm] Fire #{} did not complete: {}", count, e);
        }
    }
    tracing::info!("[Alarm] Worker stopped");
}

/// One fire: callback then sound. Nothing in here may end the loop.
fn fire(count: u64, on_fire: &FireCallback, selector: &AlertSoundSelector) {
    let message = fire_message(Local::now());
    tracing::debug!("[Alarm] Fire #{}: {}", count, message);

    match panic::catch_unwind(AssertUnwindSafe(|| on_fire(&message))) {
        Ok(Ok(())) => {}
        Ok(Err(e)) => tracing::warn!("[Alarm] Fire callback failed: {:#}", e),
        Err(_) => tracing::error!("[Alarm] Fire callback panicked"),
    }

    match panic::catch_unwind(AssertUnwindSafe(|| selector.play())) {
        Ok(Ok(played)) if played.fell_back => {
            tracing::info!("[Alarm] Played default sound after custom sound failed")
        }
        Ok(Ok(_)) => {}
        Ok(Err(e)) => tracing::warn!("[Alarm] {}", e),
        Err(_) => tracing::error!("[Alarm] Sound playback panicked"),
    }
}
