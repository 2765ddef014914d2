// mixer.rs - Channel mixer facade

//! Channel-based playback on top of a [`MixerBackend`].
//!
//! `AudioMixer` validates requests, forwards them to the backend and keeps
//! the per-channel status table up to date. The table outlives the output
//! device: closing the mixer halts playback but keeps the recorded statuses.

use std::path::Path;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::sound::backend::{AudioSpec, MixerBackend, NullBackend, RodioBackend};
use crate::sound::formats::AudioFileType;
use crate::sound::status::ChannelStatusTable;
use crate::sound::types::*;

/// Behaviour knobs for an [`AudioMixer`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MixerSettings {
    pub play_mode: PlayMode,
    /// Sleep between channel polls while a blocking play waits
    pub poll_interval: Duration,
    /// Volume applied to every loaded chunk (0-128)
    pub chunk_volume: u8,
    /// Number of mixing channels and status entries
    pub max_channels: usize,
}

impl Default for MixerSettings {
    fn default() -> Self {
        Self {
            play_mode: PlayMode::Blocking,
            poll_interval: DEFAULT_POLL_INTERVAL,
            chunk_volume: MIX_MAX_VOLUME,
            max_channels: DEFAULT_MAX_CHANNELS,
        }
    }
}

/// One play request on a channel.
///
/// Later requests on the same channel supersede it, whether or not they
/// manage to start a sound.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlayToken {
    channel: ChannelId,
    request: u64,
}

impl PlayToken {
    pub fn channel(self) -> ChannelId {
        self.channel
    }
}

/// Channel mixer
pub struct AudioMixer {
    backend: Box<dyn MixerBackend>,
    table: ChannelStatusTable,
    settings: MixerSettings,
    /// Last play request number per channel
    requests: Vec<u64>,
    /// Request number of the sound last started per channel
    started: Vec<u64>,
}

impl AudioMixer {
    /// Create a mixer over the given backend. The device is not opened yet.
    pub fn with_backend(backend: Box<dyn MixerBackend>, settings: MixerSettings) -> Self {
        Self {
            backend,
            table: ChannelStatusTable::new(settings.max_channels),
            settings,
            requests: vec![0; settings.max_channels],
            started: vec![0; settings.max_channels],
        }
    }

    /// Mixer playing through the default output device
    pub fn with_rodio_backend(settings: MixerSettings) -> Self {
        Self::with_backend(Box::new(RodioBackend::new()), settings)
    }

    /// Mixer that produces no sound. Finite plays end at the first poll.
    pub fn with_null_backend(settings: MixerSettings) -> Self {
        Self::with_backend(Box::new(NullBackend::with_playback_polls(0)), settings)
    }

    pub fn settings(&self) -> &MixerSettings {
        &self.settings
    }

    pub fn set_play_mode(&mut self, mode: PlayMode) {
        self.settings.play_mode = mode;
    }

    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    /// Validate a raw channel number
    pub fn channel(&self, raw: i32) -> Result<ChannelId, AudioError> {
        ChannelId::new(raw, self.settings.max_channels)
    }

    /// Open the output device. An already open device is closed first.
    pub fn open(&mut self, spec: AudioSpec) -> Result<(), AudioError> {
        if self.backend.is_open() {
            debug!("mixer already open, reopening");
            self.backend.close();
        }
        self.backend.open(&spec, self.settings.max_channels)?;
        info!(
            backend = self.backend.name(),
            frequency = spec.frequency,
            channels = spec.channels,
            chunk_size = spec.chunk_size,
            "audio opened"
        );
        Ok(())
    }

    pub fn is_open(&self) -> bool {
        self.backend.is_open()
    }

    /// Halt all channels and release the output device
    pub fn close(&mut self) {
        if self.backend.is_open() {
            self.backend.close();
            info!("audio closed");
        }
    }

    /// True while the channel holds a chunk, paused or not
    pub fn is_active(&self, channel: ChannelId) -> bool {
        self.backend.is_playing(channel)
    }

    /// Start `path` on `channel` without waiting for it to finish.
    ///
    /// Any failure is also recorded in the status table. The returned token
    /// identifies this request for [`is_playing_request`](Self::is_playing_request)
    /// and [`finish_playback`](Self::finish_playback).
    pub fn start_playback(
        &mut self,
        channel: ChannelId,
        path: &str,
        loops: i32,
    ) -> Result<PlayToken, AudioError> {
        let request = self
            .requests
            .get_mut(channel.index())
            .ok_or(AudioError::InvalidChannel(channel.index() as i32))?;
        *request += 1;
        let token = PlayToken {
            channel,
            request: *request,
        };

        match self.try_start(channel, path, LoopCount::from_raw(loops)) {
            Ok(()) => {
                self.started[channel.index()] = token.request;
                self.table.set(channel, ChannelStatus::PlaybackCompleted)?;
                Ok(token)
            }
            Err(e) => {
                warn!(channel = channel.index(), path, "play failed: {}", e);
                self.table.set(channel, e.play_status())?;
                Err(e)
            }
        }
    }

    fn try_start(
        &mut self,
        channel: ChannelId,
        path: &str,
        loops: LoopCount,
    ) -> Result<(), AudioError> {
        if self.backend.is_playing(channel) {
            return Err(AudioError::ChannelBusy(channel));
        }
        let file_type = AudioFileType::from_path(path)
            .ok_or_else(|| AudioError::UnsupportedFormat(path.to_string()))?;

        let mut chunk = self.backend.load_chunk(Path::new(path))?;
        chunk.set_volume(self.settings.chunk_volume);
        self.backend.play_channel(channel, chunk, loops)?;

        debug!(
            channel = channel.index(),
            path,
            kind = %file_type,
            ?loops,
            "playback started"
        );
        Ok(())
    }

    /// True while the sound started by `token` is still on its channel
    pub fn is_playing_request(&self, token: PlayToken) -> bool {
        self.started.get(token.channel.index()) == Some(&token.request)
            && self.backend.is_playing(token.channel)
    }

    /// Block the caller until the sound started by `token` is gone
    pub fn wait_for(&self, token: PlayToken) {
        while self.is_playing_request(token) {
            std::thread::sleep(self.settings.poll_interval);
        }
    }

    /// Play `path` on `channel`, `loops` extra times (-1 forever).
    ///
    /// In [`PlayMode::Blocking`] this returns once the channel is idle again.
    pub fn play(&mut self, channel: ChannelId, path: &str, loops: i32) -> Result<(), AudioError> {
        let token = self.start_playback(channel, path, loops)?;
        if self.settings.play_mode == PlayMode::Blocking {
            self.wait_for(token);
            self.finish_playback(token)?;
        }
        Ok(())
    }

    /// Record `token`'s request as run to completion.
    ///
    /// Returns false, leaving the table alone, when a later request on the
    /// channel has already recorded its own outcome.
    pub fn finish_playback(&mut self, token: PlayToken) -> Result<bool, AudioError> {
        if self.requests.get(token.channel.index()) != Some(&token.request) {
            return Ok(false);
        }
        self.table
            .set(token.channel, ChannelStatus::PlaybackCompleted)?;
        Ok(true)
    }

    /// Set channel volume from a 0-100 percentage.
    ///
    /// Above 100 is treated as 100; a negative value leaves the volume as is.
    pub fn set_volume(&mut self, channel: ChannelId, percent: i32) -> Result<(), AudioError> {
        match percent_to_volume(percent) {
            Some(volume) => {
                debug!(channel = channel.index(), percent, volume, "set volume");
                self.backend.set_volume(channel, volume);
            }
            None => debug!(channel = channel.index(), percent, "negative volume ignored"),
        }
        Ok(())
    }

    pub fn pause(&mut self, channel: ChannelId) -> Result<(), AudioError> {
        if !self.backend.is_playing(channel) {
            return Err(AudioError::NotPlaying(channel));
        }
        self.backend.pause(channel);
        Ok(())
    }

    pub fn resume(&mut self, channel: ChannelId) -> Result<(), AudioError> {
        if !self.backend.is_paused(channel) {
            return Err(AudioError::NotPaused(channel));
        }
        self.backend.resume(channel);
        Ok(())
    }

    pub fn stop(&mut self, channel: ChannelId) -> Result<(), AudioError> {
        if !self.backend.is_playing(channel) {
            return Err(AudioError::NotPlaying(channel));
        }
        self.backend.halt(channel);
        Ok(())
    }

    /// Status of the channel, with live playing/paused state taking priority
    pub fn channel_status(&self, channel: ChannelId) -> Result<ChannelStatus, AudioError> {
        let state = self.backend.channel_state(channel);
        self.table.refresh(channel, state)
    }

    pub fn clear_channel_status(&mut self, channel: ChannelId) -> Result<(), AudioError> {
        self.table.clear(channel)
    }
}

impl Drop for AudioMixer {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sound::backend::NullControl;
    use std::io::Write;

    fn mixer(mode: PlayMode) -> (AudioMixer, NullControl) {
        let backend = NullBackend::new();
        let control = backend.control();
        let settings = MixerSettings {
            play_mode: mode,
            poll_interval: Duration::from_millis(1),
            ..MixerSettings::default()
        };
        let mut mixer = AudioMixer::with_backend(Box::new(backend), settings);
        mixer.open(AudioSpec::default()).unwrap();
        (mixer, control)
    }

    fn sound_file(suffix: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(suffix).tempfile().unwrap();
        file.write_all(b"RIFF....WAVE").unwrap();
        file
    }

    fn path(file: &tempfile::NamedTempFile) -> String {
        file.path().to_str().unwrap().to_string()
    }

    #[test]
    fn test_detached_play_reports_playing_then_completed() {
        let (mut mixer, control) = mixer(PlayMode::Detached);
        let ch = mixer.channel(0).unwrap();
        let file = sound_file(".wav");

        mixer.play(ch, &path(&file), 0).unwrap();
        assert_eq!(mixer.channel_status(ch).unwrap(), ChannelStatus::Playing);

        control.finish(ch);
        assert_eq!(
            mixer.channel_status(ch).unwrap(),
            ChannelStatus::PlaybackCompleted
        );
    }

    #[test]
    fn test_blocking_play_waits_for_channel() {
        let backend = NullBackend::with_playback_polls(5);
        let settings = MixerSettings {
            poll_interval: Duration::from_millis(1),
            ..MixerSettings::default()
        };
        let mut mixer = AudioMixer::with_backend(Box::new(backend), settings);
        mixer.open(AudioSpec::default()).unwrap();
        let ch = mixer.channel(3).unwrap();
        let file = sound_file(".mp3");

        mixer.play(ch, &path(&file), 0).unwrap();
        assert!(!mixer.is_active(ch));
        assert_eq!(
            mixer.channel_status(ch).unwrap(),
            ChannelStatus::PlaybackCompleted
        );
    }

    #[test]
    fn test_busy_channel_does_not_touch_file() {
        let (mut mixer, control) = mixer(PlayMode::Detached);
        let ch = mixer.channel(1).unwrap();
        let file = sound_file(".wav");
        mixer.play(ch, &path(&file), LOOP_FOREVER).unwrap();
        let loads = control.loads();

        let err = mixer.play(ch, "/does/not/exist.wav", 0).unwrap_err();
        assert_eq!(err, AudioError::ChannelBusy(ch));
        assert_eq!(control.loads(), loads);

        // Live state still wins while the first sound plays
        assert_eq!(mixer.channel_status(ch).unwrap(), ChannelStatus::Playing);
        control.finish(ch);
        assert_eq!(
            mixer.channel_status(ch).unwrap(),
            ChannelStatus::ChannelBusyOrInvalid
        );
    }

    #[test]
    fn test_unsupported_type_is_recorded() {
        let (mut mixer, control) = mixer(PlayMode::Detached);
        let ch = mixer.channel(2).unwrap();
        let file = sound_file(".ogg");

        let err = mixer.play(ch, &path(&file), 0).unwrap_err();
        assert!(matches!(err, AudioError::UnsupportedFormat(_)));
        assert_eq!(control.loads(), 0);
        assert_eq!(
            mixer.channel_status(ch).unwrap(),
            ChannelStatus::UnsupportedFormat
        );
    }

    #[test]
    fn test_load_failure_is_recorded() {
        let (mut mixer, _control) = mixer(PlayMode::Detached);
        let ch = mixer.channel(2).unwrap();

        let err = mixer.play(ch, "/does/not/exist.mp3", 0).unwrap_err();
        assert!(matches!(err, AudioError::LoadFailed { .. }));
        assert_eq!(mixer.channel_status(ch).unwrap(), ChannelStatus::LoadFailed);
    }

    #[test]
    fn test_play_before_open_is_load_failure() {
        let mut mixer = AudioMixer::with_null_backend(MixerSettings::default());
        let ch = mixer.channel(0).unwrap();
        let file = sound_file(".wav");
        assert_eq!(
            mixer.play(ch, &path(&file), 0),
            Err(AudioError::NotInitialized)
        );
        assert_eq!(mixer.channel_status(ch).unwrap(), ChannelStatus::LoadFailed);
    }

    #[test]
    fn test_pause_resume_stop() {
        let (mut mixer, _control) = mixer(PlayMode::Detached);
        let ch = mixer.channel(4).unwrap();
        let file = sound_file(".wav");

        assert_eq!(mixer.pause(ch), Err(AudioError::NotPlaying(ch)));
        assert_eq!(mixer.stop(ch), Err(AudioError::NotPlaying(ch)));

        mixer.play(ch, &path(&file), 2).unwrap();
        assert_eq!(mixer.resume(ch), Err(AudioError::NotPaused(ch)));

        mixer.pause(ch).unwrap();
        assert_eq!(mixer.channel_status(ch).unwrap(), ChannelStatus::Paused);

        mixer.resume(ch).unwrap();
        assert_eq!(mixer.channel_status(ch).unwrap(), ChannelStatus::Playing);

        mixer.stop(ch).unwrap();
        assert!(!mixer.is_active(ch));
        assert_eq!(
            mixer.channel_status(ch).unwrap(),
            ChannelStatus::PlaybackCompleted
        );
    }

    #[test]
    fn test_set_volume_scale() {
        let (mut mixer, control) = mixer(PlayMode::Detached);
        let ch = mixer.channel(0).unwrap();

        mixer.set_volume(ch, 50).unwrap();
        assert_eq!(control.volume(ch), Some(64));

        mixer.set_volume(ch, 250).unwrap();
        assert_eq!(control.volume(ch), Some(MIX_MAX_VOLUME));

        mixer.set_volume(ch, -20).unwrap();
        assert_eq!(control.volume(ch), Some(MIX_MAX_VOLUME));
    }

    #[test]
    fn test_chunk_volume_and_loops_reach_backend() {
        let backend = NullBackend::new();
        let control = backend.control();
        let settings = MixerSettings {
            play_mode: PlayMode::Detached,
            chunk_volume: 3,
            ..MixerSettings::default()
        };
        let mut mixer = AudioMixer::with_backend(Box::new(backend), settings);
        mixer.open(AudioSpec::default()).unwrap();
        let ch = mixer.channel(5).unwrap();
        let file = sound_file(".wav");

        mixer.play(ch, &path(&file), LOOP_FOREVER).unwrap();
        assert_eq!(control.chunk_volume(ch), Some(3));
        assert_eq!(control.last_loops(ch), Some(LoopCount::Forever));
    }

    #[test]
    fn test_later_request_keeps_its_status() {
        let (mut mixer, control) = mixer(PlayMode::Detached);
        let ch = mixer.channel(0).unwrap();
        let file = sound_file(".wav");

        let first = mixer.start_playback(ch, &path(&file), 0).unwrap();
        control.finish(ch);
        mixer.play(ch, "clip.ogg", 0).unwrap_err();

        assert!(!mixer.is_playing_request(first));
        assert!(!mixer.finish_playback(first).unwrap());
        assert_eq!(
            mixer.channel_status(ch).unwrap(),
            ChannelStatus::UnsupportedFormat
        );
    }

    #[test]
    fn test_busy_request_does_not_end_running_sound() {
        let (mut mixer, _control) = mixer(PlayMode::Detached);
        let ch = mixer.channel(1).unwrap();
        let file = sound_file(".wav");

        let first = mixer.start_playback(ch, &path(&file), LOOP_FOREVER).unwrap();
        mixer.play(ch, &path(&file), 0).unwrap_err();

        // Still the first sound playing, but its completion is no longer recorded
        assert!(mixer.is_playing_request(first));
        mixer.stop(ch).unwrap();
        assert!(!mixer.is_playing_request(first));
        assert!(!mixer.finish_playback(first).unwrap());
        assert_eq!(
            mixer.channel_status(ch).unwrap(),
            ChannelStatus::ChannelBusyOrInvalid
        );
    }

    #[test]
    fn test_new_sound_supersedes_request() {
        let (mut mixer, _control) = mixer(PlayMode::Detached);
        let ch = mixer.channel(2).unwrap();
        let file = sound_file(".wav");

        let first = mixer.start_playback(ch, &path(&file), LOOP_FOREVER).unwrap();
        mixer.stop(ch).unwrap();
        let second = mixer.start_playback(ch, &path(&file), LOOP_FOREVER).unwrap();

        assert_eq!(second.channel(), ch);
        assert!(!mixer.is_playing_request(first));
        assert!(mixer.is_playing_request(second));
        assert!(!mixer.finish_playback(first).unwrap());
        assert!(mixer.finish_playback(second).unwrap());
    }

    #[test]
    fn test_clear_status() {
        let (mut mixer, _control) = mixer(PlayMode::Detached);
        let ch = mixer.channel(6).unwrap();
        mixer.play(ch, "clip.ogg", 0).unwrap_err();
        assert_eq!(
            mixer.channel_status(ch).unwrap(),
            ChannelStatus::UnsupportedFormat
        );

        mixer.clear_channel_status(ch).unwrap();
        assert_eq!(mixer.channel_status(ch).unwrap(), ChannelStatus::Idle);
    }

    #[test]
    fn test_channel_validation() {
        let (mixer, _control) = mixer(PlayMode::Detached);
        assert_eq!(mixer.channel(-1), Err(AudioError::InvalidChannel(-1)));
        assert_eq!(
            mixer.channel(DEFAULT_MAX_CHANNELS as i32),
            Err(AudioError::InvalidChannel(DEFAULT_MAX_CHANNELS as i32))
        );
    }

    #[test]
    fn test_close_keeps_status_and_reopen() {
        let (mut mixer, control) = mixer(PlayMode::Detached);
        let ch = mixer.channel(0).unwrap();
        mixer.play(ch, "clip.ogg", 0).unwrap_err();

        mixer.close();
        assert!(!control.is_open());
        assert_eq!(
            mixer.channel_status(ch).unwrap(),
            ChannelStatus::UnsupportedFormat
        );

        mixer
            .open(AudioSpec::new(22050, 1, 512).unwrap())
            .unwrap();
        mixer.open(AudioSpec::default()).unwrap();
        assert_eq!(control.spec(), Some(AudioSpec::default()));
        assert_eq!(control.allocated_channels(), DEFAULT_MAX_CHANNELS);
    }
}
