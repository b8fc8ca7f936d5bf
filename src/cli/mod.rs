//! CLI module - command-line interface
//!
//! - `chimer` - interactive menu (same as `chimer menu`)
//! - `chimer start` - run the alarm without the menu
//! - `chimer sound` - check or preview sound files
//! - `chimer config` - inspect configuration

pub mod config;
pub mod menu;
pub mod sound;
pub mod start;

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};

use crate::alarm::{AlarmError, FireCallback};
use crate::notifications::{Notifier, APP_NAME};
use crate::settings::Settings;
use crate::sound::{AlertSoundSelector, AudioOptions, AudioSession, SoundError};

/// Exit codes
pub mod exit_codes {
    pub const SUCCESS: i32 = 0;
    pub const UNEXPECTED_FAILURE: i32 = 1;
    pub const INVALID_INTERVAL: i32 = 2;
    pub const SOUND_LOAD_FAILED: i32 = 3;
    pub const PLAYBACK_FAILED: i32 = 4;
}

const LONG_VERSION: &str = concat!(
    env!("CARGO_PKG_VERSION"),
    " (",
    env!("GIT_COMMIT"),
    " ",
    env!("BUILD_DATE"),
    ")"
);

/// Chimer - repeating interval alarm
///
/// Plays a sound and shows a notification every time the interval elapses,
/// until stopped. Runs the interactive menu when no subcommand is given.
#[derive(Parser, Debug)]
#[command(name = "chimer")]
#[command(author, version, long_version = LONG_VERSION, about, long_about = None)]
pub struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Emit machine-readable logs (JSON) to stderr
    #[arg(long = "json-output", global = true)]
    pub json_output: bool,

    /// Set log level (trace, debug, info, warn, error)
    #[arg(long = "log-level", global = true, value_parser = ["trace", "verbose", "debug", "info", "warning", "warn", "error", "critical"])]
    pub log_level: Option<String>,

    /// Always play through an OS audio player, even when built with in-process audio
    #[arg(long = "system-audio", global = true, env = "CHIMER_SYSTEM_AUDIO")]
    pub system_audio: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Interactive menu (default command)
    Menu,

    /// Start the alarm and keep it running until Ctrl+C
    Start(start::StartArgs),

    /// Check or preview sound files
    Sound(sound::SoundArgs),

    /// Inspect and validate configuration
    Config(config::ConfigArgs),
}

/// Open the audio subsystem as configured
pub fn open_audio(settings: &Settings, system_audio: bool) -> anyhow::Result<AudioSession> {
    let options = AudioOptions {
        volume: settings.volume,
        system_only: system_audio,
        ..Default::default()
    };
    Ok(AudioSession::open(&options)?)
}

/// Build the selector and restore the saved custom sound, if it still loads
pub fn build_selector(session: &AudioSession, settings: &Settings) -> Arc<AlertSoundSelector> {
    let selector = Arc::new(AlertSoundSelector::new(session.backend()));
    if let Some(path) = settings.active_custom_sound() {
        if let Err(e) = selector.set_custom_sound(path) {
            eprintln!("Saved sound is unavailable ({}); using default sound.", e);
        }
    }
    selector
}

/// The fire callback: print the alarm line and raise a notification
pub fn alarm_callback(notifier: Arc<dyn Notifier>) -> FireCallback {
    Arc::new(move |message: &str| {
        println!("\n{}", message);
        notifier.notify(APP_NAME, message)?;
        Ok(())
    })
}

/// Longest a finished run waits for its last sound
const SOUND_WAIT_LIMIT: Duration = Duration::from_secs(60);
const SOUND_POLL: Duration = Duration::from_millis(100);

/// Wait until the current sound ends. Returns false if `shutdown` resolved
/// or the sound was still playing after [`SOUND_WAIT_LIMIT`].
pub async fn wait_for_sound<S: Future>(selector: &AlertSoundSelector, shutdown: S) -> bool {
    let finished = async {
        while selector.is_playing() {
            tokio::time::sleep(SOUND_POLL).await;
        }
    };
    tokio::select! {
        _ = shutdown => false,
        result = tokio::time::timeout(SOUND_WAIT_LIMIT, finished) => result.is_ok(),
    }
}

/// Render an interval in seconds for people
pub fn describe_interval(seconds: f64) -> String {
    fn plural(value: f64, unit: &str) -> String {
        if value == 1.0 {
            format!("1 {}", unit)
        } else {
            format!("{} {}s", value, unit)
        }
    }

    if seconds >= 3600.0 && seconds % 3600.0 == 0.0 {
        plural(seconds / 3600.0, "hour")
    } else if seconds < 60.0 {
        plural(seconds, "second")
    } else {
        plural(seconds / 60.0, "minute")
    }
}

/// Map an error onto an exit code
pub fn exit_code_for(e: &anyhow::Error) -> i32 {
    if let Some(AlarmError::InvalidInterval(_)) = e.downcast_ref::<AlarmError>() {
        return exit_codes::INVALID_INTERVAL;
    }
    match e.downcast_ref::<SoundError>() {
        Some(SoundError::LoadFailed { .. }) => exit_codes::SOUND_LOAD_FAILED,
        Some(SoundError::PlaybackFailed { .. }) | Some(SoundError::NoPlayer(_)) => {
            exit_codes::PLAYBACK_FAILED
        }
        None => exit_codes::UNEXPECTED_FAILURE,
    }
}
