//! Alert sounds for chimer
//!
//! [`AlertSoundSelector`] decides which sound plays when an alarm fires and
//! keeps at most one sound in flight. The actual decoding and output is
//! delegated to an [`AudioBackend`] handed out by the [`AudioSession`].

pub mod probe;
#[cfg(feature = "audio")]
pub mod rodio_backend;
pub mod session;
pub mod system;
pub mod tone;

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use thiserror::Error;

pub use session::{AudioOptions, AudioSession, SessionError};

/// Which of the two configured sources a sound came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SourceKind {
    /// The built-in tone
    Default,
    /// A user supplied sound file
    Custom,
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceKind::Default => write!(f, "default"),
            SourceKind::Custom => write!(f, "custom"),
        }
    }
}

/// A playable sound
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SoundSource {
    Default,
    Custom(PathBuf),
}

impl SoundSource {
    pub fn kind(&self) -> SourceKind {
        match self {
            SoundSource::Default => SourceKind::Default,
            SoundSource::Custom(_) => SourceKind::Custom,
        }
    }
}

/// Sound errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SoundError {
    #[error("Could not load sound '{}': {reason}", .path.display())]
    LoadFailed { path: PathBuf, reason: String },

    #[error("Playing the {kind} sound failed: {reason}")]
    PlaybackFailed { kind: SourceKind, reason: String },

    #[error("No audio player available: {0}")]
    NoPlayer(String),
}

impl SoundError {
    pub fn load_failed(path: &Path, reason: impl fmt::Display) -> Self {
        SoundError::LoadFailed {
            path: path.to_path_buf(),
            reason: reason.to_string(),
        }
    }

    pub fn playback_failed(kind: SourceKind, reason: impl fmt::Display) -> Self {
        SoundError::PlaybackFailed {
            kind,
            reason: reason.to_string(),
        }
    }
}

/// A sound instance that is (or was) playing
pub trait PlayingSound: Send {
    /// Stop playback immediately
    fn stop(&mut self) -> Result<(), SoundError>;

    /// Whether audio is still coming out of this instance
    fn is_playing(&mut self) -> bool;
}

/// The external audio subsystem
pub trait AudioBackend: Send + Sync {
    /// Short name for logs and `config path`
    fn name(&self) -> &'static str;

    /// Check that `path` can be played without playing it
    fn probe(&self, path: &Path) -> Result<(), SoundError>;

    /// Start playing `source` and return a handle to stop it. Must not block
    /// for the length of the sound.
    fn play(&self, source: &SoundSource) -> Result<Box<dyn PlayingSound>, SoundError>;

    /// Last resort alert when nothing else could be played
    fn bell(&self) {
        system::terminal_bell();
    }
}

/// Result of a successful [`AlertSoundSelector::play`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Played {
    pub source: SourceKind,
    /// The custom sound failed and the default tone was played instead
    pub fell_back: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopSoundOutcome {
    Stopped,
    NothingPlaying,
}

#[derive(Default)]
struct SelectorState {
    custom: Option<PathBuf>,
    use_custom: bool,
    playing: Option<Box<dyn PlayingSound>>,
}

impl SelectorState {
    fn active_source(&self) -> SoundSource {
        match (&self.custom, self.use_custom) {
            (Some(path), true) => SoundSource::Custom(path.clone()),
            _ => SoundSource::Default,
        }
    }
}

/// Picks and plays the alert sound
///
/// Shared between the control path and the alarm worker, so every method
/// takes `&self`.
pub struct AlertSoundSelector {
    backend: Arc<dyn AudioBackend>,
    state: Mutex<SelectorState>,
}

impl AlertSoundSelector {
    pub fn new(backend: Arc<dyn AudioBackend>) -> Self {
        Self {
            backend,
            state: Mutex::new(SelectorState::default()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, SelectorState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    /// Validate and select a custom sound. On error nothing changes.
    pub fn set_custom_sound(&self, path: impl AsRef<Path>) -> Result<SourceKind, SoundError> {
        let path = path.as_ref();
        if let Err(e) = self.backend.probe(path) {
            tracing::warn!("[Sound] Rejected custom sound: {}", e);
            return Err(e);
        }

        let mut state = self.lock();
        state.custom = Some(path.to_path_buf());
        state.use_custom = true;
        tracing::info!("[Sound] Custom sound set to {}", path.display());
        Ok(SourceKind::Custom)
    }

    /// Switch back to the built-in tone. The custom path is kept.
    pub fn reset_to_default(&self) {
        self.lock().use_custom = false;
        tracing::info!("[Sound] Using default sound");
    }

    pub fn active_source(&self) -> SoundSource {
        self.lock().active_source()
    }

    pub fn custom_sound(&self) -> Option<PathBuf> {
        self.lock().custom.clone()
    }

    pub fn is_playing(&self) -> bool {
        self.lock()
            .playing
            .as_mut()
            .map(|sound| sound.is_playing())
            .unwrap_or(false)
    }

    /// Play the active source, replacing whatever is playing.
    ///
    /// Falls back custom -> default -> bell. Only returns an error once the
    /// bell has been rung.
    pub fn play(&self) -> Result<Played, SoundError> {
        let mut state = self.lock();

        // The previous instance must be gone before a new one starts
        if let Some(mut previous) = state.playing.take() {
            if let Err(e) = previous.stop() {
                tracing::warn!("[Sound] Failed to stop previous sound: {}", e);
            }
        }

        let source = state.active_source();
        let primary_err = match self.backend.play(&source) {
            Ok(handle) => {
                state.playing = Some(handle);
                tracing::debug!("[Sound] Playing {} sound", source.kind());
                return Ok(Played {
                    source: source.kind(),
                    fell_back: false,
                });
            }
            Err(e) => e,
        };

        let cause = if source.kind() == SourceKind::Custom {
            tracing::warn!("[Sound] {}; falling back to default sound", primary_err);
            match self.backend.play(&SoundSource::Default) {
                Ok(handle) => {
                    state.playing = Some(handle);
                    return Ok(Played {
                        source: SourceKind::Default,
                        fell_back: true,
                    });
                }
                Err(e) => e,
            }
        } else {
            primary_err
        };

        tracing::error!("[Sound] {}; ringing bell", cause);
        self.backend.bell();
        Err(cause)
    }

    /// Stop the current sound without touching the alarm
    pub fn stop_current(&self) -> Result<StopSoundOutcome, SoundError> {
        let mut state = self.lock();
        let Some(mut current) = state.playing.take() else {
            return Ok(StopSoundOutcome::NothingPlaying);
        };
        if !current.is_playing() {
            return Ok(StopSoundOutcome::NothingPlaying);
        }
        current.stop()?;
        tracing::info!("[Sound] Current sound stopped");
        Ok(StopSoundOutcome::Stopped)
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! Recording backend for tests

    use super::*;
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    #[derive(Debug, Clone, PartialEq, Eq)]
    pub enum Event {
        Probe(PathBuf),
        Play(SoundSource),
        Stop(usize),
        Bell,
    }

    #[derive(Default)]
    pub struct RecordingBackend {
        pub events: Arc<Mutex<Vec<Event>>>,
        /// Paths that fail both probe and play
        pub bad_paths: Mutex<HashSet<PathBuf>>,
        pub fail_default: AtomicBool,
        pub fail_stop: AtomicBool,
        next_id: AtomicUsize,
        live: Arc<Mutex<HashSet<usize>>>,
    }

    impl RecordingBackend {
        pub fn new() -> Arc<Self> {
            Arc::new(Self::default())
        }

        pub fn reject(&self, path: impl Into<PathBuf>) {
            self.bad_paths.lock().unwrap().insert(path.into());
        }

        pub fn events(&self) -> Vec<Event> {
            self.events.lock().unwrap().clone()
        }

        pub fn plays(&self) -> Vec<SoundSource> {
            self.events()
                .into_iter()
                .filter_map(|e| match e {
                    Event::Play(source) => Some(source),
                    _ => None,
                })
                .collect()
        }

        pub fn live_count(&self) -> usize {
            self.live.lock().unwrap().len()
        }

        fn record(&self, event: Event) {
            self.events.lock().unwrap().push(event);
        }
    }

    struct FakeSound {
        id: usize,
        live: Arc<Mutex<HashSet<usize>>>,
        fail_stop: bool,
        events: Arc<Mutex<Vec<Event>>>,
    }

    impl PlayingSound for FakeSound {
        fn stop(&mut self) -> Result<(), SoundError> {
            self.events.lock().unwrap().push(Event::Stop(self.id));
            self.live.lock().unwrap().remove(&self.id);
            if self.fail_stop {
                return Err(SoundError::playback_failed(SourceKind::Default, "stuck"));
            }
            Ok(())
        }

        fn is_playing(&mut self) -> bool {
            self.live.lock().unwrap().contains(&self.id)
        }
    }

    impl AudioBackend for RecordingBackend {
        fn name(&self) -> &'static str {
            "recording"
        }

        fn probe(&self, path: &Path) -> Result<(), SoundError> {
            self.record(Event::Probe(path.to_path_buf()));
            if self.bad_paths.lock().unwrap().contains(path) {
                return Err(SoundError::load_failed(path, "unsupported format"));
            }
            Ok(())
        }

        fn play(&self, source: &SoundSource) -> Result<Box<dyn PlayingSound>, SoundError> {
            self.record(Event::Play(source.clone()));
            let fails = match source {
                SoundSource::Default => self.fail_default.load(Ordering::SeqCst),
                SoundSource::Custom(path) => self.bad_paths.lock().unwrap().contains(path),
            };
            if fails {
                return Err(SoundError::playback_failed(source.kind(), "device busy"));
            }
            let id = self.next_id.fetch_add(1, Ordering::SeqCst);
            self.live.lock().unwrap().insert(id);
            Ok(Box::new(FakeSound {
                id,
                live: self.live.clone(),
                fail_stop: self.fail_stop.load(Ordering::SeqCst),
                events: self.events.clone(),
            }))
        }

        fn bell(&self) {
            self.record(Event::Bell);
        }
    }

    impl RecordingBackend {
        /// Let every live sound finish as if it reached its end
        pub fn finish_all(&self) {
            self.live.lock().unwrap().clear();
        }
    }
}
