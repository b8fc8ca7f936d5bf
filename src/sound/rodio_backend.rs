//! In-process playback through rodio

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use rodio::buffer::SamplesBuffer;
use rodio::{Decoder, OutputStreamHandle, Sink};

use super::tone;
use super::{AudioBackend, PlayingSound, SoundError, SoundSource};

/// Plays through the default output device. The `OutputStream` itself is
/// owned by the [`AudioSession`](super::AudioSession); this only holds the
/// handle.
pub struct RodioBackend {
    handle: OutputStreamHandle,
    volume: f32,
    default_samples: Vec<i16>,
}

impl RodioBackend {
    pub fn new(handle: OutputStreamHandle, volume: u8) -> Self {
        Self {
            handle,
            volume: volume.min(100) as f32 / 100.0,
            default_samples: tone::square_wave_samples(),
        }
    }

    fn decode(path: &Path) -> Result<Decoder<BufReader<File>>, SoundError> {
        let file = File::open(path).map_err(|e| SoundError::load_failed(path, e))?;
        Decoder::new(BufReader::new(file)).map_err(|e| SoundError::load_failed(path, e))
    }
}

impl AudioBackend for RodioBackend {
    fn name(&self) -> &'static str {
        "rodio"
    }

    fn probe(&self, path: &Path) -> Result<(), SoundError> {
        Self::decode(path).map(|_| ())
    }

    fn play(&self, source: &SoundSource) -> Result<Box<dyn PlayingSound>, SoundError> {
        let kind = source.kind();
        let sink = Sink::try_new(&self.handle)
            .map_err(|e| SoundError::playback_failed(kind, e))?;
        sink.set_volume(self.volume);

        match source {
            SoundSource::Default => {
                sink.append(SamplesBuffer::new(
                    1,
                    tone::SAMPLE_RATE,
                    self.default_samples.clone(),
                ));
            }
            SoundSource::Custom(path) => {
                let decoder = Self::decode(path).map_err(|e| match e {
                    SoundError::LoadFailed { reason, .. } => SoundError::playback_failed(kind, reason),
                    other => other,
                })?;
                sink.append(decoder);
            }
        }

        Ok(Box::new(RodioSound { sink }))
    }
}

/// A sound queued on its own sink. Dropping the sink silences it.
struct RodioSound {
    sink: Sink,
}

impl PlayingSound for RodioSound {
    fn stop(&mut self) -> Result<(), SoundError> {
        self.sink.stop();
        Ok(())
    }

    fn is_playing(&mut self) -> bool {
        !self.sink.empty()
    }
}
