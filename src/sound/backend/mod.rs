//! Mixing backends
//!
//! A backend is the external mixing library the channel API forwards to.
//! It owns the output device, decodes files into chunks and knows which
//! channels are playing or paused.

use std::path::Path;
use std::sync::Arc;

use crate::sound::types::{AudioError, ChannelId, ChannelState, LoopCount, MIX_MAX_VOLUME};

pub mod null;
pub mod rodio_backend;

pub use null::{NullBackend, NullControl};
pub use rodio_backend::RodioBackend;

/// Output stream parameters requested by `InitAudio`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AudioSpec {
    /// Output sampling frequency in samples per second
    pub frequency: u32,
    /// Number of output channels (1 = mono, 2 = stereo)
    pub channels: u16,
    /// Bytes per output chunk
    pub chunk_size: u32,
}

impl AudioSpec {
    /// Validate raw values coming from the C interface
    pub fn new(frequency: i32, channels: i32, chunk_size: i32) -> Result<Self, AudioError> {
        if frequency <= 0 {
            return Err(AudioError::StreamSetup(format!(
                "invalid frequency {}",
                frequency
            )));
        }
        if channels <= 0 || channels > u16::MAX as i32 {
            return Err(AudioError::StreamSetup(format!(
                "invalid channel count {}",
                channels
            )));
        }
        if chunk_size <= 0 {
            return Err(AudioError::StreamSetup(format!(
                "invalid chunk size {}",
                chunk_size
            )));
        }
        Ok(Self {
            frequency: frequency as u32,
            channels: channels as u16,
            chunk_size: chunk_size as u32,
        })
    }
}

impl Default for AudioSpec {
    fn default() -> Self {
        Self {
            frequency: 44100,
            channels: 2,
            chunk_size: 2048,
        }
    }
}

/// Decoded sample buffer ready to be played on a channel
#[derive(Debug, Clone)]
pub struct Chunk {
    channels: u16,
    sample_rate: u32,
    samples: Arc<Vec<i16>>,
    volume: u8,
}

impl Chunk {
    pub fn new(channels: u16, sample_rate: u32, samples: Vec<i16>) -> Self {
        Self {
            channels,
            sample_rate,
            samples: Arc::new(samples),
            volume: MIX_MAX_VOLUME,
        }
    }

    pub fn channels(&self) -> u16 {
        self.channels
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Interleaved samples
    pub fn samples(&self) -> &[i16] {
        &self.samples
    }

    /// Shared handle to the samples, for playing without copying
    pub fn shared_samples(&self) -> Arc<Vec<i16>> {
        Arc::clone(&self.samples)
    }

    /// Per-chunk volume (0-128)
    pub fn volume(&self) -> u8 {
        self.volume
    }

    /// Set the per-chunk volume, clamped to 128
    pub fn set_volume(&mut self, volume: u8) {
        self.volume = volume.min(MIX_MAX_VOLUME);
    }

    /// Playback length of one pass
    pub fn duration(&self) -> std::time::Duration {
        if self.channels == 0 || self.sample_rate == 0 {
            return std::time::Duration::ZERO;
        }
        let frames = self.samples.len() as f64 / self.channels as f64;
        std::time::Duration::from_secs_f64(frames / self.sample_rate as f64)
    }
}

/// Interface to the mixing library
pub trait MixerBackend: Send {
    /// Backend name for logging
    fn name(&self) -> &'static str;

    /// Open the output device and allocate `channels` mixing channels
    fn open(&mut self, spec: &AudioSpec, channels: usize) -> Result<(), AudioError>;

    /// Halt everything and release the output device
    fn close(&mut self);

    fn is_open(&self) -> bool;

    /// Read and decode an audio file
    fn load_chunk(&mut self, path: &Path) -> Result<Chunk, AudioError>;

    /// Start `chunk` on `channel`
    fn play_channel(
        &mut self,
        channel: ChannelId,
        chunk: Chunk,
        loops: LoopCount,
    ) -> Result<(), AudioError>;

    /// Current playback state of a channel
    fn channel_state(&self, channel: ChannelId) -> ChannelState;

    fn pause(&mut self, channel: ChannelId);

    fn resume(&mut self, channel: ChannelId);

    /// Stop the channel and drop its chunk
    fn halt(&mut self, channel: ChannelId);

    /// Set channel volume (0-128)
    fn set_volume(&mut self, channel: ChannelId, volume: u8);

    /// True while a chunk is assigned, including when paused
    fn is_playing(&self, channel: ChannelId) -> bool {
        self.channel_state(channel).is_active()
    }

    fn is_paused(&self, channel: ChannelId) -> bool {
        self.channel_state(channel) == ChannelState::Paused
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_audio_spec_validation() {
        let spec = AudioSpec::new(22050, 1, 1024).unwrap();
        assert_eq!(spec.frequency, 22050);
        assert_eq!(spec.channels, 1);
        assert_eq!(spec.chunk_size, 1024);

        assert!(matches!(AudioSpec::new(0, 2, 1024), Err(AudioError::StreamSetup(_))));
        assert!(matches!(AudioSpec::new(44100, 0, 1024), Err(AudioError::StreamSetup(_))));
        assert!(matches!(AudioSpec::new(44100, 2, -1), Err(AudioError::StreamSetup(_))));
    }

    #[test]
    fn test_chunk_volume_and_duration() {
        let mut chunk = Chunk::new(2, 100, vec![0; 400]);
        assert_eq!(chunk.volume(), MIX_MAX_VOLUME);
        chunk.set_volume(200);
        assert_eq!(chunk.volume(), MIX_MAX_VOLUME);
        chunk.set_volume(3);
        assert_eq!(chunk.volume(), 3);
        assert_eq!(chunk.duration(), std::time::Duration::from_secs(2));
    }
}
