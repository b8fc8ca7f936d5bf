//! The built-in alarm tone
//!
//! A one second 440 Hz square wave, rendered as 16-bit mono PCM. The system
//! backend writes it out as a WAV file; rodio plays the samples directly.

pub const SAMPLE_RATE: u32 = 44_100;
pub const FREQUENCY_HZ: f64 = 440.0;
pub const DURATION_SECS: f64 = 1.0;

/// Peak amplitude as a fraction of full scale
const AMPLITUDE: f64 = 0.3;

/// Render the default tone
pub fn square_wave_samples() -> Vec<i16> {
    let count = (SAMPLE_RATE as f64 * DURATION_SECS) as usize;
    let peak = (i16::MAX as f64 * AMPLITUDE) as i16;

    (0..count)
        .map(|i| {
            let phase = i as f64 / SAMPLE_RATE as f64 * FREQUENCY_HZ * 2.0;
            if phase % 2.0 < 1.0 {
                peak
            } else {
                -peak
            }
        })
        .collect()
}

/// Wrap mono 16-bit samples in a RIFF/WAVE container
pub fn encode_wav(samples: &[i16], sample_rate: u32) -> Vec<u8> {
    const CHANNELS: u16 = 1;
    const BITS: u16 = 16;

    let block_align = CHANNELS * BITS / 8;
    let byte_rate = sample_rate * block_align as u32;
    let data_len = (samples.len() * 2) as u32;

    let mut out = Vec::with_capacity(44 + data_len as usize);
    out.extend_from_slice(b"RIFF");
    out.extend_from_slice(&(36 + data_len).to_le_bytes());
    out.extend_from_slice(b"WAVE");

    out.extend_from_slice(b"fmt ");
    out.extend_from_slice(&16u32.to_le_bytes());
    out.extend_from_slice(&1u16.to_le_bytes()); // PCM
    out.extend_from_slice(&CHANNELS.to_le_bytes());
    out.extend_from_slice(&sample_rate.to_le_bytes());
    out.extend_from_slice(&byte_rate.to_le_bytes());
    out.extend_from_slice(&block_align.to_le_bytes());
    out.extend_from_slice(&BITS.to_le_bytes());

    out.extend_from_slice(b"data");
    out.extend_from_slice(&data_len.to_le_bytes());
    for sample in samples {
        out.extend_from_slice(&sample.to_le_bytes());
    }
    out
}

/// The default tone as a complete WAV file
pub fn default_tone_wav() -> Vec<u8> {
    encode_wav(&square_wave_samples(), SAMPLE_RATE)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_square_wave_shape() {
        let samples = square_wave_samples();
        assert_eq!(samples.len(), 44_100);

        let peak = samples[0];
        assert!(peak > 0);
        assert!(samples.iter().all(|s| *s == peak || *s == -peak));

        // 440 Hz means 880 sign changes per second, give or take rounding
        let flips = samples.windows(2).filter(|w| w[0] != w[1]).count();
        assert!((878..=880).contains(&flips), "flips = {}", flips);
    }

    #[test]
    fn test_wav_header() {
        let wav = encode_wav(&[0, 1, -1], 8_000);

        assert_eq!(&wav[0..4], b"RIFF");
        assert_eq!(u32::from_le_bytes(wav[4..8].try_into().unwrap()), 36 + 6);
        assert_eq!(&wav[8..12], b"WAVE");
        assert_eq!(&wav[12..16], b"fmt ");
        assert_eq!(u16::from_le_bytes([wav[22], wav[23]]), 1);
        assert_eq!(u32::from_le_bytes(wav[24..28].try_into().unwrap()), 8_000);
        assert_eq!(u32::from_le_bytes(wav[28..32].try_into().unwrap()), 16_000);
        assert_eq!(&wav[36..40], b"data");
        assert_eq!(u32::from_le_bytes(wav[40..44].try_into().unwrap()), 6);
        assert_eq!(wav.len(), 44 + 6);
        assert_eq!(&wav[46..48], &1i16.to_le_bytes());
    }

    #[test]
    fn test_default_tone_is_sniffed_as_wav() {
        let wav = default_tone_wav();
        assert_eq!(
            crate::sound::probe::sniff(&wav),
            Some(crate::sound::probe::AudioFormat::Wav)
        );
    }
}
