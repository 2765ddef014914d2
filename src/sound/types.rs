// types.rs - Core types and error codes for the channel mixer

//! Core types shared by the mixer, the status table and the backends.
//!
//! Integer codes on [`ChannelStatus`] and [`AudioError`] are the values the
//! C interface hands back to callers, so they must not be renumbered.

use std::fmt;
use std::time::Duration;

/// Default number of mixing channels (and status table entries)
pub const DEFAULT_MAX_CHANNELS: usize = 10;

/// Full-scale channel/chunk volume of the mixing library
pub const MIX_MAX_VOLUME: u8 = 128;

/// Default sleep between polls while a blocking play waits for its channel
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Loop count meaning "repeat until stopped"
pub const LOOP_FOREVER: i32 = -1;

/// A channel index that has been checked against the mixer's channel count
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChannelId(usize);

impl ChannelId {
    /// Validate a raw channel number against `max_channels`
    pub fn new(raw: i32, max_channels: usize) -> Result<Self, AudioError> {
        if raw < 0 || raw as usize >= max_channels {
            return Err(AudioError::InvalidChannel(raw));
        }
        Ok(ChannelId(raw as usize))
    }

    /// Index into per-channel storage
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Per-channel status as reported to callers
#[repr(i32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChannelStatus {
    /// Channel is currently playing (derived, never stored)
    Playing = -1,
    /// Reserved channel or nothing played yet
    #[default]
    Idle = 0,
    /// Last play request ran to completion (or is still running)
    PlaybackCompleted = 1,
    /// Channel was busy or the index was invalid
    ChannelBusyOrInvalid = 2,
    /// File type is not .mp3/.wav
    UnsupportedFormat = 3,
    /// File could not be read or decoded
    LoadFailed = 4,
    /// Channel is paused (derived, never stored)
    Paused = 5,
}

impl ChannelStatus {
    /// Convert from the raw integer code
    pub fn from_i32(code: i32) -> Option<Self> {
        match code {
            -1 => Some(ChannelStatus::Playing),
            0 => Some(ChannelStatus::Idle),
            1 => Some(ChannelStatus::PlaybackCompleted),
            2 => Some(ChannelStatus::ChannelBusyOrInvalid),
            3 => Some(ChannelStatus::UnsupportedFormat),
            4 => Some(ChannelStatus::LoadFailed),
            5 => Some(ChannelStatus::Paused),
            _ => None,
        }
    }

    /// Raw integer code for the C interface
    pub fn as_i32(self) -> i32 {
        self as i32
    }
}

/// What the mixing backend reports for a channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChannelState {
    #[default]
    Idle,
    Playing,
    Paused,
}

impl ChannelState {
    /// A paused channel still holds its chunk, so it counts as active
    pub fn is_active(self) -> bool {
        self != ChannelState::Idle
    }
}

/// How `play` treats the caller's thread
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Deserialize, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PlayMode {
    /// Return only after the channel has stopped
    #[default]
    Blocking,
    /// Start playback and return immediately
    Detached,
}

impl PlayMode {
    pub fn from_i32(mode: i32) -> Option<Self> {
        match mode {
            0 => Some(PlayMode::Blocking),
            1 => Some(PlayMode::Detached),
            _ => None,
        }
    }
}

/// Number of extra repetitions after the first play
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopCount {
    Forever,
    Times(u32),
}

impl LoopCount {
    /// `-1` (and any other negative) loops forever, `n` plays `n + 1` times
    pub fn from_raw(loops: i32) -> Self {
        if loops < 0 {
            LoopCount::Forever
        } else {
            LoopCount::Times(loops as u32)
        }
    }

    /// Total number of plays, `None` when infinite
    pub fn plays(self) -> Option<u32> {
        match self {
            LoopCount::Forever => None,
            LoopCount::Times(n) => Some(n.saturating_add(1)),
        }
    }
}

/// Map a 0-100 percentage onto the mixer's 0-128 volume scale.
///
/// Values above 100 are clamped; negative values yield `None`, meaning the
/// volume is left untouched.
pub fn percent_to_volume(percent: i32) -> Option<u8> {
    if percent < 0 {
        return None;
    }
    let percent = percent.min(100);
    Some((percent * MIX_MAX_VOLUME as i32 / 100) as u8)
}

/// Mixer volume (0-128) as a linear gain
pub fn volume_to_gain(volume: u8) -> f32 {
    volume.min(MIX_MAX_VOLUME) as f32 / MIX_MAX_VOLUME as f32
}

/// Errors returned by mixer operations
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AudioError {
    #[error("Invalid channel: {0}")]
    InvalidChannel(i32),

    #[error("Channel {0} is already playing")]
    ChannelBusy(ChannelId),

    #[error("Unsupported audio file type: {0}")]
    UnsupportedFormat(String),

    #[error("Failed to load {path}: {reason}")]
    LoadFailed { path: String, reason: String },

    #[error("Audio device is not open")]
    NotInitialized,

    #[error("Channel {0} is not playing")]
    NotPlaying(ChannelId),

    #[error("Channel {0} is not paused")]
    NotPaused(ChannelId),

    #[error("Audio subsystem init failed: {0}")]
    SubsystemInit(String),

    #[error("Audio stream setup failed: {0}")]
    StreamSetup(String),

    #[error("Audio backend error: {0}")]
    Backend(String),
}

impl AudioError {
    /// Return code of `InitAudio` for this error
    pub fn init_code(&self) -> i32 {
        match self {
            AudioError::SubsystemInit(_) => 1,
            _ => 2,
        }
    }

    /// Status recorded in the channel table when a play request fails this way
    pub fn play_status(&self) -> ChannelStatus {
        match self {
            AudioError::InvalidChannel(_) | AudioError::ChannelBusy(_) => {
                ChannelStatus::ChannelBusyOrInvalid
            }
            AudioError::UnsupportedFormat(_) => ChannelStatus::UnsupportedFormat,
            _ => ChannelStatus::LoadFailed,
        }
    }
}
