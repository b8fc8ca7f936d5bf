//! Playback through the operating system's command line audio players
//!
//! Each play spawns a player process; the child is the playing handle and
//! killing it stops the sound.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};

use super::probe::{self, AudioFormat};
use super::{AudioBackend, PlayingSound, SoundError, SoundSource, SourceKind};

/// A command line audio player
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Player {
    PaPlay,
    PwPlay,
    FfPlay,
    APlay,
    AfPlay,
    PowerShell,
}

impl Player {
    /// Candidates in order of preference for this platform
    pub fn candidates() -> &'static [Player] {
        #[cfg(target_os = "windows")]
        {
            &[Player::PowerShell, Player::FfPlay]
        }
        #[cfg(target_os = "macos")]
        {
            &[Player::AfPlay, Player::FfPlay]
        }
        #[cfg(not(any(target_os = "windows", target_os = "macos")))]
        {
            &[Player::PaPlay, Player::PwPlay, Player::FfPlay, Player::APlay]
        }
    }

    pub fn program(&self) -> &'static str {
        match self {
            Player::PaPlay => "paplay",
            Player::PwPlay => "pw-play",
            Player::FfPlay => "ffplay",
            Player::APlay => "aplay",
            Player::AfPlay => "afplay",
            Player::PowerShell => "powershell",
        }
    }

    pub fn supports(&self, format: AudioFormat) -> bool {
        use AudioFormat::*;
        match self {
            Player::FfPlay => true,
            Player::PaPlay | Player::PwPlay => matches!(format, Wav | Ogg | Flac | Aiff),
            Player::AfPlay => matches!(format, Wav | Mp3 | Flac | Aiff),
            Player::APlay | Player::PowerShell => format == Wav,
        }
    }

    /// Build the command that plays `path` at `volume` percent
    pub fn command(&self, path: &Path, volume: u8) -> Command {
        let volume = volume.min(100);
        let mut cmd = Command::new(self.program());
        match self {
            Player::PaPlay => {
                // paplay volume is linear, 65536 = 100%
                cmd.arg(format!("--volume={}", volume as u32 * 65536 / 100));
                cmd.arg(path);
            }
            Player::PwPlay => {
                cmd.arg(format!("--volume={:.2}", volume as f32 / 100.0));
                cmd.arg(path);
            }
            Player::FfPlay => {
                cmd.args(["-nodisp", "-autoexit", "-loglevel", "quiet", "-volume"]);
                cmd.arg(volume.to_string());
                cmd.arg(path);
            }
            Player::APlay => {
                cmd.arg("-q");
                cmd.arg(path);
            }
            Player::AfPlay => {
                cmd.arg("-v");
                cmd.arg(format!("{:.2}", volume as f32 / 100.0));
                cmd.arg(path);
            }
            Player::PowerShell => {
                let script = format!(
                    "(New-Object Media.SoundPlayer '{}').PlaySync()",
                    path.display().to_string().replace('\'', "''")
                );
                cmd.args(["-NoProfile", "-NonInteractive", "-Command", &script]);
                #[cfg(target_os = "windows")]
                {
                    use std::os::windows::process::CommandExt;
                    cmd.creation_flags(0x08000000); // CREATE_NO_WINDOW
                }
            }
        }
        cmd.stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null());
        cmd
    }
}

/// Find every candidate player that is installed
pub fn detect_players() -> Vec<Player> {
    Player::candidates()
        .iter()
        .copied()
        .filter(|player| which::which(player.program()).is_ok())
        .collect()
}

/// Audio backend that shells out to installed players
pub struct SystemAudioBackend {
    players: Vec<Player>,
    default_tone: PathBuf,
    volume: u8,
}

impl SystemAudioBackend {
    /// Detect installed players. `default_tone` must point at a WAV file.
    pub fn new(default_tone: PathBuf, volume: u8) -> Self {
        let players = detect_players();
        if players.is_empty() {
            tracing::warn!("[Sound] No audio player found on PATH; alarms will only ring the bell");
        } else {
            tracing::debug!("[Sound] Available players: {:?}", players);
        }
        Self::with_players(players, default_tone, volume)
    }

    pub fn with_players(players: Vec<Player>, default_tone: PathBuf, volume: u8) -> Self {
        Self {
            players,
            default_tone,
            volume,
        }
    }

    fn player_for(&self, format: AudioFormat) -> Option<Player> {
        self.players.iter().copied().find(|p| p.supports(format))
    }

    fn resolve(&self, path: &Path) -> Result<Player, SoundError> {
        if self.players.is_empty() {
            return Err(SoundError::NoPlayer(format!(
                "install one of: {}",
                Player::candidates()
                    .iter()
                    .map(|p| p.program())
                    .collect::<Vec<_>>()
                    .join(", ")
            )));
        }
        let format = probe::probe_file(path)?;
        self.player_for(format).ok_or_else(|| {
            SoundError::load_failed(path, format!("no installed player can play {} files", format))
        })
    }
}

impl AudioBackend for SystemAudioBackend {
    fn name(&self) -> &'static str {
        "system"
    }

    fn probe(&self, path: &Path) -> Result<(), SoundError> {
        self.resolve(path).map(|_| ())
    }

    fn play(&self, source: &SoundSource) -> Result<Box<dyn PlayingSound>, SoundError> {
        let kind = source.kind();
        let path = match source {
            SoundSource::Default => self.default_tone.as_path(),
            SoundSource::Custom(path) => path.as_path(),
        };

        let player = self.resolve(path).map_err(|e| match e {
            SoundError::LoadFailed { reason, .. } => SoundError::playback_failed(kind, reason),
            other => other,
        })?;

        let child = player
            .command(path, self.volume)
            .spawn()
            .map_err(|e| SoundError::playback_failed(kind, format!("{}: {}", player.program(), e)))?;

        tracing::debug!(
            "[Sound] {} playing {} (pid {})",
            player.program(),
            path.display(),
            child.id()
        );
        Ok(Box::new(ChildSound::new(child, kind)))
    }
}

/// A sound being played by a player process
pub struct ChildSound {
    child: Child,
    kind: SourceKind,
}

impl ChildSound {
    pub fn new(child: Child, kind: SourceKind) -> Self {
        Self { child, kind }
    }
}

impl PlayingSound for ChildSound {
    fn stop(&mut self) -> Result<(), SoundError> {
        if !self.is_playing() {
            return Ok(());
        }
        self.child
            .kill()
            .map_err(|e| SoundError::playback_failed(self.kind, format!("failed to stop player: {}", e)))?;
        // Reap so the player does not linger as a zombie
        let _ = self.child.wait();
        Ok(())
    }

    fn is_playing(&mut self) -> bool {
        matches!(self.child.try_wait(), Ok(None))
    }
}

impl Drop for ChildSound {
    fn drop(&mut self) {
        // Reap finished players; a still running one keeps playing to its end
        let _ = self.child.try_wait();
    }
}

/// The minimal alert: a message beep on Windows, BEL everywhere else
#[cfg(target_os = "windows")]
pub fn terminal_bell() {
    use windows::Win32::UI::WindowsAndMessaging::{MessageBeep, MB_ICONWARNING};

    if unsafe { MessageBeep(MB_ICONWARNING) }.is_err() {
        ring_bel();
    }
}

#[cfg(not(target_os = "windows"))]
pub fn terminal_bell() {
    ring_bel();
}

fn ring_bel() {
    let mut stdout = std::io::stdout();
    let _ = stdout.write_all(b"\x07");
    let _ = stdout.flush();
}
