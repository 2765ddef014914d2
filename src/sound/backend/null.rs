//! Null (silent) mixing backend
//!
//! Tracks channel state exactly like a real mixer but produces no sound.
//! Playback never ends on its own unless a poll budget is configured or the
//! channel is finished through a [`NullControl`] handle. Used for headless
//! hosts and tests.

use std::path::Path;
use std::sync::Arc;

use parking_lot::Mutex;

use super::{AudioSpec, Chunk, MixerBackend};
use crate::sound::types::{AudioError, ChannelId, ChannelState, LoopCount, MIX_MAX_VOLUME};

#[derive(Debug, Clone)]
struct NullChannel {
    state: ChannelState,
    /// State queries left before a playing channel reports idle
    remaining_polls: Option<u32>,
    volume: u8,
    chunk: Option<Chunk>,
    loops: Option<LoopCount>,
}

impl NullChannel {
    fn new() -> Self {
        Self {
            state: ChannelState::Idle,
            remaining_polls: None,
            volume: MIX_MAX_VOLUME,
            chunk: None,
            loops: None,
        }
    }

    fn halt(&mut self) {
        self.state = ChannelState::Idle;
        self.remaining_polls = None;
        self.chunk = None;
    }
}

#[derive(Debug, Default)]
struct NullState {
    open: bool,
    spec: Option<AudioSpec>,
    channels: Vec<NullChannel>,
    playback_polls: Option<u32>,
    open_error: Option<AudioError>,
    loads: usize,
}

impl NullState {
    fn channel_mut(&mut self, channel: ChannelId) -> Option<&mut NullChannel> {
        self.channels.get_mut(channel.index())
    }
}

/// Null mixing backend
#[derive(Debug, Default)]
pub struct NullBackend {
    state: Arc<Mutex<NullState>>,
}

impl NullBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Playing channels report idle after `polls` state queries
    pub fn with_playback_polls(polls: u32) -> Self {
        let backend = Self::new();
        backend.state.lock().playback_polls = Some(polls);
        backend
    }

    /// Handle for driving and inspecting the backend from outside the mixer
    pub fn control(&self) -> NullControl {
        NullControl {
            state: Arc::clone(&self.state),
        }
    }
}

impl MixerBackend for NullBackend {
    fn name(&self) -> &'static str {
        "null"
    }

    fn open(&mut self, spec: &AudioSpec, channels: usize) -> Result<(), AudioError> {
        let mut state = self.state.lock();
        if let Some(err) = state.open_error.take() {
            return Err(err);
        }
        state.open = true;
        state.spec = Some(*spec);
        state.channels = vec![NullChannel::new(); channels];
        Ok(())
    }

    fn close(&mut self) {
        let mut state = self.state.lock();
        state.open = false;
        state.channels.clear();
    }

    fn is_open(&self) -> bool {
        self.state.lock().open
    }

    fn load_chunk(&mut self, path: &Path) -> Result<Chunk, AudioError> {
        let mut state = self.state.lock();
        state.loads += 1;
        let spec = match (state.open, state.spec) {
            (true, Some(spec)) => spec,
            _ => return Err(AudioError::NotInitialized),
        };

        let bytes = std::fs::read(path).map_err(|e| AudioError::LoadFailed {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        if bytes.is_empty() {
            return Err(AudioError::LoadFailed {
                path: path.display().to_string(),
                reason: "empty file".to_string(),
            });
        }

        Ok(Chunk::new(spec.channels, spec.frequency, Vec::new()))
    }

    fn play_channel(
        &mut self,
        channel: ChannelId,
        chunk: Chunk,
        loops: LoopCount,
    ) -> Result<(), AudioError> {
        let mut state = self.state.lock();
        if !state.open {
            return Err(AudioError::NotInitialized);
        }
        let polls = match loops {
            LoopCount::Forever => None,
            LoopCount::Times(_) => state.playback_polls,
        };
        let ch = state
            .channel_mut(channel)
            .ok_or(AudioError::InvalidChannel(channel.index() as i32))?;
        ch.state = ChannelState::Playing;
        ch.remaining_polls = polls;
        ch.chunk = Some(chunk);
        ch.loops = Some(loops);
        Ok(())
    }

    fn channel_state(&self, channel: ChannelId) -> ChannelState {
        let mut state = self.state.lock();
        let Some(ch) = state.channel_mut(channel) else {
            return ChannelState::Idle;
        };
        if ch.state == ChannelState::Playing {
            let remaining = ch.remaining_polls;
            match remaining {
                Some(0) => ch.halt(),
                Some(n) => ch.remaining_polls = Some(n - 1),
                None => {}
            }
        }
        ch.state
    }

    fn pause(&mut self, channel: ChannelId) {
        if let Some(ch) = self.state.lock().channel_mut(channel) {
            if ch.state.is_active() {
                ch.state = ChannelState::Paused;
            }
        }
    }

    fn resume(&mut self, channel: ChannelId) {
        if let Some(ch) = self.state.lock().channel_mut(channel) {
            if ch.state == ChannelState::Paused {
                ch.state = ChannelState::Playing;
            }
        }
    }

    fn halt(&mut self, channel: ChannelId) {
        if let Some(ch) = self.state.lock().channel_mut(channel) {
            ch.halt();
        }
    }

    fn set_volume(&mut self, channel: ChannelId, volume: u8) {
        if let Some(ch) = self.state.lock().channel_mut(channel) {
            ch.volume = volume.min(MIX_MAX_VOLUME);
        }
    }
}

/// Shared handle onto a [`NullBackend`]'s state
#[derive(Debug, Clone)]
pub struct NullControl {
    state: Arc<Mutex<NullState>>,
}

impl NullControl {
    /// End playback on a channel as if the chunk ran out
    pub fn finish(&self, channel: ChannelId) {
        if let Some(ch) = self.state.lock().channel_mut(channel) {
            ch.halt();
        }
    }

    /// Make the next `open` fail with `err`
    pub fn fail_next_open(&self, err: AudioError) {
        self.state.lock().open_error = Some(err);
    }

    /// Number of load attempts so far
    pub fn loads(&self) -> usize {
        self.state.lock().loads
    }

    pub fn is_open(&self) -> bool {
        self.state.lock().open
    }

    /// Spec passed to the last successful `open`
    pub fn spec(&self) -> Option<AudioSpec> {
        self.state.lock().spec
    }

    /// Number of channels allocated by `open`
    pub fn allocated_channels(&self) -> usize {
        self.state.lock().channels.len()
    }

    pub fn volume(&self, channel: ChannelId) -> Option<u8> {
        self.state.lock().channel_mut(channel).map(|ch| ch.volume)
    }

    /// Volume of the chunk currently assigned to the channel
    pub fn chunk_volume(&self, channel: ChannelId) -> Option<u8> {
        self.state
            .lock()
            .channel_mut(channel)
            .and_then(|ch| ch.chunk.as_ref().map(Chunk::volume))
    }

    /// Loop count of the last play on the channel
    pub fn last_loops(&self, channel: ChannelId) -> Option<LoopCount> {
        self.state.lock().channel_mut(channel).and_then(|ch| ch.loops)
    }
}
