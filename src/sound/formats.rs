//! Accepted audio file types
//!
//! The check is a plain, case-sensitive suffix match on the last four bytes
//! of the path. Nothing is read from disk.

use std::fmt;

/// Length of the recognised suffixes (".mp3", ".wav")
const SUFFIX_LEN: usize = 4;

/// Audio file types the mixer will attempt to load
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioFileType {
    Mp3,
    Wav,
}

impl AudioFileType {
    /// Classify a path by its suffix
    pub fn from_path(path: &str) -> Option<Self> {
        Self::from_bytes(path.as_bytes())
    }

    /// Classify a raw (not necessarily UTF-8) path by its suffix
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        if bytes.len() < SUFFIX_LEN {
            return None;
        }
        match &bytes[bytes.len() - SUFFIX_LEN..] {
            b".mp3" => Some(AudioFileType::Mp3),
            b".wav" => Some(AudioFileType::Wav),
            _ => None,
        }
    }

    /// The suffix this type is recognised by
    pub fn suffix(self) -> &'static str {
        match self {
            AudioFileType::Mp3 => ".mp3",
            AudioFileType::Wav => ".wav",
        }
    }
}

impl fmt::Display for AudioFileType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AudioFileType::Mp3 => write!(f, "MP3"),
            AudioFileType::Wav => write!(f, "WAV"),
        }
    }
}

/// Returns true if the path names a playable file type
pub fn check_type(path: &str) -> bool {
    AudioFileType::from_path(path).is_some()
}
