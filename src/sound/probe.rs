//! Audio format sniffing
//!
//! Identifies a sound file from its first bytes so a bad custom sound can be
//! rejected up front, before an alarm ever tries to play it.

use std::fmt;
use std::fs::File;
use std::io::{self, BufReader, Read, Seek, SeekFrom};
use std::path::Path;

use thiserror::Error;

use super::SoundError;

const HEADER_LEN: usize = 12;

/// How far past the ID3 tag to look for the first MPEG frames
const MPEG_SEARCH_WINDOW: usize = 16 * 1024;

/// Give up on WAV files with more chunks than this before `data`
const MAX_WAV_CHUNKS: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioFormat {
    Wav,
    Mp3,
    Ogg,
    Flac,
    Aiff,
}

impl fmt::Display for AudioFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AudioFormat::Wav => "WAV",
            AudioFormat::Mp3 => "MP3",
            AudioFormat::Ogg => "Ogg",
            AudioFormat::Flac => "FLAC",
            AudioFormat::Aiff => "AIFF",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Error)]
enum Rejection {
    #[error("{0}")]
    Io(#[from] io::Error),

    #[error("file is empty")]
    Empty,

    #[error("unsupported or corrupt audio format")]
    Unknown,

    #[error("corrupt {format} file: {detail}")]
    Corrupt {
        format: AudioFormat,
        detail: &'static str,
    },
}

/// Identify the container from a file header
pub fn sniff(header: &[u8]) -> Option<AudioFormat> {
    match header {
        [b'R', b'I', b'F', b'F', _, _, _, _, b'W', b'A', b'V', b'E', ..] => Some(AudioFormat::Wav),
        [b'F', b'O', b'R', b'M', _, _, _, _, b'A', b'I', b'F', kind, ..]
            if *kind == b'F' || *kind == b'C' =>
        {
            Some(AudioFormat::Aiff)
        }
        [b'O', b'g', b'g', b'S', ..] => Some(AudioFormat::Ogg),
        [b'f', b'L', b'a', b'C', ..] => Some(AudioFormat::Flac),
        [b'I', b'D', b'3', ..] => Some(AudioFormat::Mp3),
        // Bare MPEG audio frame
        _ if mpeg_frame_len(header).is_some() => Some(AudioFormat::Mp3),
        _ => None,
    }
}

const MPEG1_LAYER1_KBPS: [u16; 15] = [0, 32, 64, 96, 128, 160, 192, 224, 256, 288, 320, 352, 384, 416, 448];
const MPEG1_LAYER2_KBPS: [u16; 15] = [0, 32, 48, 56, 64, 80, 96, 112, 128, 160, 192, 224, 256, 320, 384];
const MPEG1_LAYER3_KBPS: [u16; 15] = [0, 32, 40, 48, 56, 64, 80, 96, 112, 128, 160, 192, 224, 256, 320];
const MPEG2_LAYER1_KBPS: [u16; 15] = [0, 32, 48, 56, 64, 80, 96, 112, 128, 144, 160, 176, 192, 224, 256];
const MPEG2_LAYER23_KBPS: [u16; 15] = [0, 8, 16, 24, 32, 40, 48, 56, 64, 80, 96, 112, 128, 144, 160];

/// Length of the MPEG audio frame whose header starts `bytes`, or `None`
/// if the bytes are not a usable frame header
fn mpeg_frame_len(bytes: &[u8]) -> Option<usize> {
    let (b1, b2) = match bytes {
        [0xFF, b1, b2, _, ..] if b1 & 0xE0 == 0xE0 => (*b1, *b2),
        _ => return None,
    };

    let version = (b1 >> 3) & 0b11;
    let layer = (b1 >> 1) & 0b11;
    let bitrate_index = usize::from(b2 >> 4);
    let rate_index = usize::from((b2 >> 2) & 0b11);
    let padding = usize::from((b2 >> 1) & 1);

    // Reserved values, plus free-format bitrate which has no fixed length
    if version == 0b01 || layer == 0b00 || bitrate_index == 0 || bitrate_index == 0b1111 || rate_index == 0b11 {
        return None;
    }

    let mpeg1 = version == 0b11;
    let kbps = match (mpeg1, layer) {
        (true, 0b11) => MPEG1_LAYER1_KBPS[bitrate_index],
        (true, 0b10) => MPEG1_LAYER2_KBPS[bitrate_index],
        (true, _) => MPEG1_LAYER3_KBPS[bitrate_index],
        (false, 0b11) => MPEG2_LAYER1_KBPS[bitrate_index],
        (false, _) => MPEG2_LAYER23_KBPS[bitrate_index],
    };
    let sample_rate: usize = match version {
        0b11 => [44_100, 48_000, 32_000][rate_index],
        0b10 => [22_050, 24_000, 16_000][rate_index],
        _ => [11_025, 12_000, 8_000][rate_index],
    };
    let bitrate = usize::from(kbps) * 1000;

    let len = match layer {
        0b11 => (12 * bitrate / sample_rate + padding) * 4,
        0b01 if !mpeg1 => 72 * bitrate / sample_rate + padding,
        _ => 144 * bitrate / sample_rate + padding,
    };
    Some(len)
}

/// A frame header at `offset` directly followed by another one
fn has_frame_pair(buf: &[u8], offset: usize) -> bool {
    let Some(len) = buf.get(offset..).and_then(mpeg_frame_len) else {
        return false;
    };
    buf.get(offset + len..).and_then(mpeg_frame_len).is_some()
}

/// Total size of the ID3v2 tag at the start of `header`
fn id3_tag_len(header: &[u8]) -> Option<u64> {
    let [b'I', b'D', b'3', _, _, flags, size @ ..] = header else {
        return None;
    };
    let size = size.get(..4)?;
    // Sizes are synchsafe: seven bits per byte
    if size.iter().any(|b| b & 0x80 != 0) {
        return None;
    }
    let body = size.iter().fold(0u64, |acc, b| (acc << 7) | u64::from(*b));
    let footer = if flags & 0x10 != 0 { 10 } else { 0 };
    Some(10 + body + footer)
}

fn read_up_to<R: Read>(reader: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

/// The RIFF chunk list must hold a `fmt ` chunk followed by a `data` chunk
fn check_wav_chunks<R: Read + Seek>(reader: &mut R) -> Result<(), Rejection> {
    let corrupt = |detail: &'static str| Rejection::Corrupt {
        format: AudioFormat::Wav,
        detail,
    };

    reader.seek(SeekFrom::Start(HEADER_LEN as u64))?;
    let mut has_fmt = false;
    for _ in 0..MAX_WAV_CHUNKS {
        let mut chunk = [0u8; 8];
        if read_up_to(reader, &mut chunk)? < chunk.len() {
            break;
        }
        let size = u32::from_le_bytes([chunk[4], chunk[5], chunk[6], chunk[7]]);
        match &chunk[..4] {
            b"fmt " if size >= 16 => has_fmt = true,
            b"fmt " => return Err(corrupt("fmt chunk too short")),
            b"data" if has_fmt => return Ok(()),
            b"data" => return Err(corrupt("data chunk before fmt chunk")),
            _ => {}
        }
        // Chunks are padded to an even length
        reader.seek(SeekFrom::Current(i64::from(size) + i64::from(size & 1)))?;
    }

    Err(corrupt(if has_fmt {
        "missing data chunk"
    } else {
        "missing fmt chunk"
    }))
}

/// Two consecutive frame headers must follow the ID3 tag (if any)
fn check_mpeg_frames<R: Read + Seek>(reader: &mut R, header: &[u8]) -> Result<(), Rejection> {
    let corrupt = |detail: &'static str| Rejection::Corrupt {
        format: AudioFormat::Mp3,
        detail,
    };

    let tagged = header.starts_with(b"ID3");
    let start = if tagged {
        id3_tag_len(header).ok_or_else(|| corrupt("bad ID3 tag"))?
    } else {
        0
    };

    reader.seek(SeekFrom::Start(start))?;
    let mut window = vec![0u8; MPEG_SEARCH_WINDOW];
    let filled = read_up_to(reader, &mut window)?;
    window.truncate(filled);

    let found = if tagged {
        // Encoders may pad between the tag and the first frame
        (0..window.len()).any(|offset| has_frame_pair(&window, offset))
    } else {
        has_frame_pair(&window, 0)
    };
    if found {
        Ok(())
    } else {
        Err(corrupt("no MPEG audio frames"))
    }
}

fn probe_reader<R: Read + Seek>(reader: &mut R) -> Result<AudioFormat, Rejection> {
    let mut header = [0u8; HEADER_LEN];
    let filled = read_up_to(reader, &mut header)?;
    if filled == 0 {
        return Err(Rejection::Empty);
    }
    let header = &header[..filled];

    let format = sniff(header).ok_or(Rejection::Unknown)?;
    match format {
        AudioFormat::Wav => check_wav_chunks(reader)?,
        AudioFormat::Mp3 => check_mpeg_frames(reader, header)?,
        AudioFormat::Ogg | AudioFormat::Flac | AudioFormat::Aiff => {}
    }
    Ok(format)
}

/// Identify `path` from its header and check the container is complete
/// enough to play
pub fn probe_file(path: &Path) -> Result<AudioFormat, SoundError> {
    let file = File::open(path).map_err(|e| SoundError::load_failed(path, e))?;
    probe_reader(&mut BufReader::new(file)).map_err(|e| SoundError::load_failed(path, e))
}


#[cfg(test)]
mod tests {
    use super::fixtures::{id3_tag, mp3_frames};
    use super::*;
    use std::io::Write;

    fn probe_bytes(bytes: &[u8]) -> Result<AudioFormat, SoundError> {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sound");
        std::fs::write(&path, bytes).unwrap();
        probe_file(&path)
    }

    fn assert_rejected(bytes: &[u8], expected: &str) {
        match probe_bytes(bytes) {
            Err(SoundError::LoadFailed { reason, .. }) => {
                assert!(reason.contains(expected), "reason was {:?}", reason)
            }
            other => panic!("expected rejection, got {:?}", other),
        }
    }

    #[test]
    fn test_mpeg_frame_len() {
        assert_eq!(mpeg_frame_len(&[0xFF, 0xFB, 0x90, 0x64]), Some(417));
        // Padding bit adds one byte
        assert_eq!(mpeg_frame_len(&[0xFF, 0xFB, 0x92, 0x64]), Some(418));
        // MPEG-2 Layer III, 64 kbps, 22.05 kHz
        assert_eq!(mpeg_frame_len(&[0xFF, 0xF3, 0x80, 0x00]), Some(208));

        // Reserved version, reserved layer, bad bitrate, reserved sample rate
        assert_eq!(mpeg_frame_len(&[0xFF, 0xEB, 0x90, 0x00]), None);
        assert_eq!(mpeg_frame_len(&[0xFF, 0xF9, 0x90, 0x00]), None);
        assert_eq!(mpeg_frame_len(&[0xFF, 0xFB, 0xF0, 0x00]), None);
        assert_eq!(mpeg_frame_len(&[0xFF, 0xFB, 0x9C, 0x00]), None);
        assert_eq!(mpeg_frame_len(&[0xFF, 0xFB]), None);
    }

    #[test]
    fn test_probe_accepts_mp3_streams() {
        assert_eq!(probe_bytes(&mp3_frames(3)), Ok(AudioFormat::Mp3));

        let mut tagged = id3_tag(20);
        tagged.extend_from_slice(&[0, 0, 0]);
        tagged.extend_from_slice(&mp3_frames(2));
        assert_eq!(probe_bytes(&tagged), Ok(AudioFormat::Mp3));
    }

    #[test]
    fn test_probe_rejects_utf16_text() {
        let mut text = vec![0xFF, 0xFE];
        for ch in "hello, this is just text".encode_utf16() {
            text.extend_from_slice(&ch.to_le_bytes());
        }
        assert_rejected(&text, "no MPEG audio frames");
    }

    #[test]
    fn test_probe_rejects_single_frame_and_empty_tag() {
        assert_rejected(&mp3_frames(1), "no MPEG audio frames");
        assert_rejected(&id3_tag(10), "no MPEG audio frames");
        assert_rejected(b"ID3\x04\x00\x00\x80\x00\x00\x00", "bad ID3 tag");
    }

    #[test]
    fn test_probe_rejects_incomplete_wav() {
        assert_rejected(b"RIFF\x24\x00\x00\x00WAVE", "missing fmt chunk");

        let full = crate::sound::tone::encode_wav(&[0; 4], 8_000);
        // Header and fmt chunk, no data chunk
        assert_rejected(&full[..36], "missing data chunk");

        let mut short_fmt = full.clone();
        short_fmt[16..20].copy_from_slice(&8u32.to_le_bytes());
        assert_rejected(&short_fmt, "fmt chunk too short");

        let mut data_first = b"RIFF\x2c\x00\x00\x00WAVE".to_vec();
        data_first.extend_from_slice(&full[36..]);
        data_first.extend_from_slice(&full[12..36]);
        assert_rejected(&data_first, "data chunk before fmt chunk");
    }

    #[test]
    fn test_probe_skips_unknown_wav_chunks() {
        let full = crate::sound::tone::encode_wav(&[0; 4], 8_000);
        let mut with_list = full[..12].to_vec();
        // Odd-sized chunk plus its pad byte
        with_list.extend_from_slice(b"LIST\x03\x00\x00\x00abc\x00");
        with_list.extend_from_slice(&full[12..]);
        assert_eq!(probe_bytes(&with_list), Ok(AudioFormat::Wav));
    }

    #[test]
    fn test_sniff_known_formats() {
        assert_eq!(sniff(b"RIFF\x24\x00\x00\x00WAVEfmt "), Some(AudioFormat::Wav));
        assert_eq!(sniff(b"FORM\x00\x00\x00\x00AIFF"), Some(AudioFormat::Aiff));
        assert_eq!(sniff(b"FORM\x00\x00\x00\x00AIFC"), Some(AudioFormat::Aiff));
        assert_eq!(sniff(b"OggS\x00\x02"), Some(AudioFormat::Ogg));
        assert_eq!(sniff(b"fLaC\x00\x00\x00\x22"), Some(AudioFormat::Flac));
        assert_eq!(sniff(b"ID3\x04\x00"), Some(AudioFormat::Mp3));
        assert_eq!(sniff(&[0xFF, 0xFB, 0x90, 0x64]), Some(AudioFormat::Mp3));
    }

    #[test]
    fn test_sniff_rejects_other_data() {
        assert_eq!(sniff(b""), None);
        assert_eq!(sniff(b"RIFF\x24\x00\x00\x00AVI "), None);
        assert_eq!(sniff(b"%PDF-1.7"), None);
        assert_eq!(sniff(&[0xFF, 0x00]), None);
        assert_eq!(sniff(b"hello world!"), None);
    }

    #[test]
    fn test_probe_file() {
        let dir = tempfile::tempdir().unwrap();

        let wav = dir.path().join("tone.wav");
        std::fs::write(&wav, crate::sound::tone::encode_wav(&[0; 4], 8_000)).unwrap();
        assert_eq!(probe_file(&wav), Ok(AudioFormat::Wav));

        let text = dir.path().join("notes.mp3");
        let mut f = std::fs::File::create(&text).unwrap();
        writeln!(f, "definitely not audio").unwrap();
        assert!(matches!(
            probe_file(&text),
            Err(SoundError::LoadFailed { reason, .. }) if reason.contains("unsupported")
        ));

        let empty = dir.path().join("empty.wav");
        std::fs::write(&empty, b"").unwrap();
        assert!(matches!(
            probe_file(&empty),
            Err(SoundError::LoadFailed { reason, .. }) if reason == "file is empty"
        ));
    }

    #[test]
    fn test_probe_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing.wav");
        let err = probe_file(&missing).unwrap_err();
        assert!(matches!(err, SoundError::LoadFailed { ref path, .. } if *path == missing));
    }
}
