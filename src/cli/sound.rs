//! Sound command implementation
//!
//! Check a file before using it as the alarm sound, or listen to it once.

use std::future::Future;
use std::path::{Path, PathBuf};

use clap::{Args, Subcommand};

use super::{open_audio, wait_for_sound};
use crate::settings::Settings;
use crate::sound::probe::probe_file;
use crate::sound::{AlertSoundSelector, Played, SoundError};

/// Arguments for the sound command
#[derive(Args, Debug)]
pub struct SoundArgs {
    #[command(subcommand)]
    pub command: SoundCommand,
}

#[derive(Subcommand, Debug)]
pub enum SoundCommand {
    /// Check that a file can be used as the alarm sound
    Check {
        /// Sound file (.wav, .mp3, .ogg, ...)
        path: PathBuf,
    },
    /// Play a sound once and wait for it to finish
    Play {
        /// Sound file; the built-in tone when omitted
        path: Option<PathBuf>,
    },
}

/// Run the sound command
pub async fn run(args: SoundArgs, settings: Settings, system_audio: bool) -> anyhow::Result<()> {
    let session = open_audio(&settings, system_audio)?;
    let selector = AlertSoundSelector::new(session.backend());

    match args.command {
        SoundCommand::Check { path } => println!("{}", check(&selector, &path)?),
        SoundCommand::Play { path } => {
            let ctrl_c = async {
                if tokio::signal::ctrl_c().await.is_err() {
                    std::future::pending::<()>().await;
                }
            };
            let played = preview(&selector, path.as_deref(), ctrl_c).await?;
            if played.fell_back {
                eprintln!("Could not play the custom sound; played the default sound instead.");
            }
        }
    }
    Ok(())
}

/// Let the backend accept or reject `path`; the header only labels the format
fn check(selector: &AlertSoundSelector, path: &Path) -> Result<String, SoundError> {
    selector.set_custom_sound(path)?;
    Ok(match probe_file(path) {
        Ok(format) => format!(
            "{}: {} audio, playable with {}",
            path.display(),
            format,
            selector.backend_name()
        ),
        Err(_) => format!(
            "{}: playable with {}",
            path.display(),
            selector.backend_name()
        ),
    })
}

/// Play once, then wait for the sound or `shutdown`, whichever comes first
async fn preview<S: Future>(
    selector: &AlertSoundSelector,
    path: Option<&Path>,
    shutdown: S,
) -> anyhow::Result<Played> {
    if let Some(path) = path {
        selector.set_custom_sound(path)?;
    }

    let played = selector.play()?;
    println!("Playing {} sound...", played.source);

    if !wait_for_sound(selector, shutdown).await {
        selector.stop_current()?;
    }
    Ok(played)
}
