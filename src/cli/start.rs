//! Start command: run the alarm without the menu

use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;

use clap::Args;
use tokio::sync::mpsc;

use super::{alarm_callback, build_selector, describe_interval, open_audio, wait_for_sound};
use crate::alarm::{parse_interval, AlarmClock, AlarmError, FireCallback, StopOutcome};
use crate::notifications::{self, Notifier};
use crate::settings::Settings;
use crate::sound::{AlertSoundSelector, SoundSource};

/// Arguments for the start command
#[derive(Args, Debug)]
pub struct StartArgs {
    /// Interval between alarms: minutes, or with units like "90s" or "1h30m"
    #[arg(short, long)]
    pub interval: Option<String>,

    /// Sound file to play instead of the configured one
    #[arg(short, long)]
    pub sound: Option<PathBuf>,

    /// Stop after this many alarms
    #[arg(short = 'n', long, value_parser = clap::value_parser!(u64).range(1..))]
    pub count: Option<u64>,

    /// Don't show desktop notifications
    #[arg(long)]
    pub no_notify: bool,
}

/// Run the start command
pub async fn run(args: StartArgs, settings: Settings, system_audio: bool) -> anyhow::Result<()> {
    let seconds = interval_seconds(args.interval.as_deref(), &settings)?;

    let session = open_audio(&settings, system_audio)?;
    let selector = build_selector(&session, &settings);
    if let Some(path) = &args.sound {
        selector.set_custom_sound(path)?;
    }

    let notifier: Arc<dyn Notifier> =
        Arc::from(notifications::detect(settings.show_notifications && !args.no_notify));
    let mut clock = AlarmClock::new(selector.clone()).with_grace_period(settings.stop_grace());

    match selector.active_source() {
        SoundSource::Custom(path) => println!("Using sound: {}", path.display()),
        SoundSource::Default => println!("Using default sound"),
    }
    println!("Timer started with interval: {}", describe_interval(seconds));
    println!("Press Ctrl+C to stop the timer");

    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!("[Start] Could not listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };
    let fires = run_alarm(
        &mut clock,
        &selector,
        seconds,
        alarm_callback(notifier),
        args.count,
        ctrl_c,
    )
    .await?;

    println!("Timer stopped after {} alarm(s).", fires);
    Ok(())
}

/// Interval in seconds: the argument if given, else the configured minutes
fn interval_seconds(arg: Option<&str>, settings: &Settings) -> Result<f64, AlarmError> {
    match arg {
        Some(text) => parse_interval(text),
        None if settings.interval_minutes.is_finite() && settings.interval_minutes > 0.0 => {
            Ok(settings.interval_minutes * 60.0)
        }
        None => Err(AlarmError::InvalidInterval(
            settings.interval_minutes.to_string(),
        )),
    }
}

/// Keep the alarm running until `shutdown` resolves or `count` alarms have
/// fired. Returns how many fired.
async fn run_alarm<S>(
    clock: &mut AlarmClock,
    selector: &AlertSoundSelector,
    seconds: f64,
    on_fire: FireCallback,
    count: Option<u64>,
    shutdown: S,
) -> anyhow::Result<u64>
where
    S: Future,
{
    let (fired_tx, mut fired_rx) = mpsc::unbounded_channel::<()>();
    clock.start(seconds, move |message| {
        let result = on_fire(message);
        let _ = fired_tx.send(());
        result
    })?;

    let mut shutdown = std::pin::pin!(shutdown);
    let mut seen = 0u64;
    let interrupted = loop {
        tokio::select! {
            _ = shutdown.as_mut() => break true,
            Some(()) = fired_rx.recv() => {
                seen += 1;
                if count.is_some_and(|limit| seen >= limit) {
                    break false;
                }
            }
        }
    };

    // Stopping joins the worker, so the last alarm's sound has been started
    let fires = match clock.stop().await {
        StopOutcome::Stopped { fires } => fires,
        StopOutcome::NotRunning => seen,
    };

    if interrupted {
        println!("\nProgram interrupted.");
    } else {
        tracing::debug!("[Start] Reached {} alarm(s), waiting for the sound", fires);
        wait_for_sound(selector, shutdown).await;
    }

    if let Err(e) = selector.stop_current() {
        tracing::warn!("[Start] {}", e);
    }
    Ok(fires)
}
