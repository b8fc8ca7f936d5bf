//! Process-wide audio subsystem lifecycle
//!
//! The audio output is initialised once when the session opens and torn down
//! when it drops. Everything that plays sound gets the backend from here.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use thiserror::Error;

use super::system::SystemAudioBackend;
use super::{tone, AudioBackend};

static SESSION_OPEN: AtomicBool = AtomicBool::new(false);

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("An audio session is already open")]
    AlreadyOpen,

    #[error("Failed to prepare the default tone: {0}")]
    Io(#[from] std::io::Error),
}

/// How the session should set up audio
#[derive(Debug, Clone)]
pub struct AudioOptions {
    /// Playback volume, 0-100
    pub volume: u8,
    /// Skip in-process audio and always use an OS player
    pub system_only: bool,
    /// Where to write the default tone (temp dir when unset)
    pub tone_dir: Option<PathBuf>,
}

impl Default for AudioOptions {
    fn default() -> Self {
        Self {
            volume: 100,
            system_only: false,
            tone_dir: None,
        }
    }
}

/// Owner of the audio subsystem. Only one may be open at a time.
pub struct AudioSession {
    backend: Arc<dyn AudioBackend>,
    tone_path: Option<PathBuf>,
    #[cfg(feature = "audio")]
    _stream: Option<rodio::OutputStream>,
}

impl AudioSession {
    pub fn open(options: &AudioOptions) -> Result<Self, SessionError> {
        if SESSION_OPEN.swap(true, Ordering::SeqCst) {
            return Err(SessionError::AlreadyOpen);
        }

        Self::init(options).inspect_err(|_| SESSION_OPEN.store(false, Ordering::SeqCst))
    }

    fn init(options: &AudioOptions) -> Result<Self, SessionError> {
        #[cfg(feature = "audio")]
        if !options.system_only {
            match rodio::OutputStream::try_default() {
                Ok((stream, handle)) => {
                    tracing::info!("[Sound] Audio session opened (rodio)");
                    return Ok(Self {
                        backend: Arc::new(super::rodio_backend::RodioBackend::new(
                            handle,
                            options.volume,
                        )),
                        tone_path: None,
                        _stream: Some(stream),
                    });
                }
                Err(e) => {
                    tracing::warn!("[Sound] No audio output device ({}); using system players", e);
                }
            }
        }

        let dir = options.tone_dir.clone().unwrap_or_else(std::env::temp_dir);
        let tone_path = dir.join(format!("chimer-tone-{}.wav", std::process::id()));
        std::fs::write(&tone_path, tone::default_tone_wav())?;

        tracing::info!(
            "[Sound] Audio session opened (system players, tone at {})",
            tone_path.display()
        );
        Ok(Self {
            backend: Arc::new(SystemAudioBackend::new(tone_path.clone(), options.volume)),
            tone_path: Some(tone_path),
            #[cfg(feature = "audio")]
            _stream: None,
        })
    }

    /// The backend to inject into an [`AlertSoundSelector`](super::AlertSoundSelector)
    pub fn backend(&self) -> Arc<dyn AudioBackend> {
        self.backend.clone()
    }

    #[cfg(test)]
    fn is_open() -> bool {
        SESSION_OPEN.load(Ordering::SeqCst)
    }
}

impl Drop for AudioSession {
    fn drop(&mut self) {
        if let Some(path) = self.tone_path.take() {
            if let Err(e) = std::fs::remove_file(&path) {
                tracing::debug!("[Sound] Could not remove {}: {}", path.display(), e);
            }
        }
        SESSION_OPEN.store(false, Ordering::SeqCst);
        tracing::info!("[Sound] Audio session closed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_open_once_and_teardown() {
        // A failed init must not keep the slot
        let unwritable = AudioOptions {
            system_only: true,
            tone_dir: Some(PathBuf::from("/nonexistent/chimer/dir")),
            ..Default::default()
        };
        assert!(matches!(
            AudioSession::open(&unwritable),
            Err(SessionError::Io(_))
        ));
        assert!(!AudioSession::is_open());

        let dir = tempfile::tempdir().unwrap();
        let options = AudioOptions {
            volume: 80,
            system_only: true,
            tone_dir: Some(dir.path().to_path_buf()),
        };

        let session = AudioSession::open(&options).unwrap();
        assert!(AudioSession::is_open());
        assert_eq!(session.backend().name(), "system");
        assert!(matches!(
            AudioSession::open(&options),
            Err(SessionError::AlreadyOpen)
        ));

        let tone = session.tone_path.clone().unwrap();
        assert_eq!(std::fs::read(&tone).unwrap(), tone::default_tone_wav());

        drop(session);
        assert!(!tone.exists());
        assert!(!AudioSession::is_open());

        let reopened = AudioSession::open(&options).unwrap();
        drop(reopened);
    }
}
