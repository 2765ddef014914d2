//! Rodio-based mixing backend
//!
//! Each mixing channel is a rodio `Sink`. rodio's `OutputStream` is not
//! `Send`, so the stream and all sinks live on a dedicated audio thread;
//! the backend drives it through a command channel, with a reply channel
//! for anything that returns a value.
//!
//! Files are decoded on the caller's thread and shipped to the audio thread
//! as shared sample buffers. Loops replay the same buffer pass by pass.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use cpal::traits::{DeviceTrait, HostTrait};
use crossbeam::channel::{self, Receiver, Sender};
use rodio::source::FromIter;
use rodio::{Decoder, OutputStream, OutputStreamHandle, Sink, Source};
use tracing::{debug, error, info, warn};

use super::{AudioSpec, Chunk, MixerBackend};
use crate::sound::types::{
    volume_to_gain, AudioError, ChannelId, ChannelState, LoopCount, MIX_MAX_VOLUME,
};

/// Commands sent to the audio thread
enum AudioCommand {
    Play {
        channel: usize,
        chunk: Chunk,
        loops: LoopCount,
        reply: Sender<Result<(), AudioError>>,
    },
    Pause(usize),
    Resume(usize),
    Halt(usize),
    HaltAll,
    SetVolume(usize, u8),
    State(usize, Sender<ChannelState>),
    Shutdown,
}

/// One mixing channel on the audio thread
struct ChannelSlot {
    sink: Option<Sink>,
    volume: u8,
    chunk_volume: u8,
}

impl ChannelSlot {
    fn new() -> Self {
        Self {
            sink: None,
            volume: MIX_MAX_VOLUME,
            chunk_volume: MIX_MAX_VOLUME,
        }
    }

    fn gain(&self) -> f32 {
        volume_to_gain(self.volume) * volume_to_gain(self.chunk_volume)
    }

    fn state(&mut self) -> ChannelState {
        match self.sink {
            Some(ref sink) if !sink.empty() => {
                if sink.is_paused() {
                    ChannelState::Paused
                } else {
                    ChannelState::Playing
                }
            }
            Some(_) => {
                // Drained; release the sink
                self.sink = None;
                ChannelState::Idle
            }
            None => ChannelState::Idle,
        }
    }

    fn halt(&mut self) {
        if let Some(sink) = self.sink.take() {
            sink.stop();
        }
    }
}

/// Open the default output device, preferring the requested format
fn open_output(spec: &AudioSpec) -> Result<(OutputStream, OutputStreamHandle), AudioError> {
    let host = cpal::default_host();
    let device = host.default_output_device().ok_or_else(|| {
        AudioError::SubsystemInit(format!("no output device on host {:?}", host.id()))
    })?;

    let device_name = device.name().unwrap_or_else(|_| "unknown".to_string());
    let requested = cpal::SupportedStreamConfig::new(
        spec.channels,
        cpal::SampleRate(spec.frequency),
        cpal::SupportedBufferSize::Unknown,
        cpal::SampleFormat::I16,
    );

    match OutputStream::try_from_device_config(&device, requested) {
        Ok(stream) => {
            info!(
                device = %device_name,
                frequency = spec.frequency,
                channels = spec.channels,
                "output stream opened"
            );
            Ok(stream)
        }
        Err(e) => {
            warn!(
                device = %device_name,
                "requested format {:?} rejected ({}), using device default",
                spec,
                e
            );
            OutputStream::try_from_device(&device)
                .map_err(|e| AudioError::StreamSetup(e.to_string()))
        }
    }
}

fn play_chunk(
    handle: &OutputStreamHandle,
    slot: &mut ChannelSlot,
    chunk: Chunk,
    loops: LoopCount,
) -> Result<(), AudioError> {
    if chunk.samples().is_empty() {
        return Err(AudioError::Backend("chunk has no samples".to_string()));
    }
    let sink = Sink::try_new(handle).map_err(|e| AudioError::Backend(e.to_string()))?;
    slot.chunk_volume = chunk.volume();
    sink.set_volume(slot.gain());
    sink.append(chunk_source(&chunk, loops));

    slot.halt();
    slot.sink = Some(sink);
    Ok(())
}

/// One pass over a chunk's samples, read from the shared buffer
struct ChunkPass {
    samples: Arc<Vec<i16>>,
    pos: usize,
    channels: u16,
    sample_rate: u32,
}

impl ChunkPass {
    fn new(chunk: &Chunk) -> Self {
        Self {
            samples: chunk.shared_samples(),
            pos: 0,
            channels: chunk.channels(),
            sample_rate: chunk.sample_rate(),
        }
    }
}

impl Iterator for ChunkPass {
    type Item = i16;

    fn next(&mut self) -> Option<i16> {
        let sample = self.samples.get(self.pos).copied()?;
        self.pos += 1;
        Some(sample)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let left = self.samples.len() - self.pos;
        (left, Some(left))
    }
}

impl Source for ChunkPass {
    fn current_frame_len(&self) -> Option<usize> {
        Some(self.samples.len() - self.pos)
    }

    fn channels(&self) -> u16 {
        self.channels
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn total_duration(&self) -> Option<Duration> {
        let frames = self.samples.len() as u64 / self.channels.max(1) as u64;
        Some(Duration::from_nanos(
            frames * 1_000_000_000 / self.sample_rate.max(1) as u64,
        ))
    }
}

type ChunkPasses = Box<dyn Iterator<Item = ChunkPass> + Send>;

/// Source playing whole passes of `chunk`: `loops.plays()` of them, or
/// without end. Passes are counted, never timed.
fn chunk_source(chunk: &Chunk, loops: LoopCount) -> FromIter<ChunkPasses> {
    let chunk = chunk.clone();
    let passes: ChunkPasses = match loops.plays() {
        None => Box::new(std::iter::repeat_with(move || ChunkPass::new(&chunk))),
        Some(n) => Box::new((0..n).map(move |_| ChunkPass::new(&chunk))),
    };
    rodio::source::from_iter(passes)
}

/// Audio thread main function
fn audio_thread_main(
    spec: AudioSpec,
    channels: usize,
    rx: Receiver<AudioCommand>,
    ready: Sender<Result<(), AudioError>>,
) {
    let (_stream, handle) = match open_output(&spec) {
        Ok(s) => s,
        Err(e) => {
            error!("audio thread: {}", e);
            let _ = ready.send(Err(e));
            return;
        }
    };

    let mut slots: Vec<ChannelSlot> = (0..channels).map(|_| ChannelSlot::new()).collect();
    let _ = ready.send(Ok(()));
    debug!(channels, "audio thread ready");

    while let Ok(cmd) = rx.recv() {
        match cmd {
            AudioCommand::Play {
                channel,
                chunk,
                loops,
                reply,
            } => {
                let result = match slots.get_mut(channel) {
                    Some(slot) => play_chunk(&handle, slot, chunk, loops),
                    None => Err(AudioError::InvalidChannel(channel as i32)),
                };
                let _ = reply.send(result);
            }
            AudioCommand::Pause(channel) => {
                if let Some(sink) = slots.get(channel).and_then(|s| s.sink.as_ref()) {
                    sink.pause();
                }
            }
            AudioCommand::Resume(channel) => {
                if let Some(sink) = slots.get(channel).and_then(|s| s.sink.as_ref()) {
                    sink.play();
                }
            }
            AudioCommand::Halt(channel) => {
                if let Some(slot) = slots.get_mut(channel) {
                    slot.halt();
                }
            }
            AudioCommand::HaltAll => slots.iter_mut().for_each(ChannelSlot::halt),
            AudioCommand::SetVolume(channel, volume) => {
                if let Some(slot) = slots.get_mut(channel) {
                    slot.volume = volume.min(MIX_MAX_VOLUME);
                    let gain = slot.gain();
                    if let Some(ref sink) = slot.sink {
                        sink.set_volume(gain);
                    }
                }
            }
            AudioCommand::State(channel, reply) => {
                let state = slots
                    .get_mut(channel)
                    .map(ChannelSlot::state)
                    .unwrap_or_default();
                let _ = reply.send(state);
            }
            AudioCommand::Shutdown => break,
        }
    }

    slots.iter_mut().for_each(ChannelSlot::halt);
    debug!("audio thread exited");
}

fn load_error(path: &Path, reason: impl std::fmt::Display) -> AudioError {
    AudioError::LoadFailed {
        path: path.display().to_string(),
        reason: reason.to_string(),
    }
}

/// Decode a WAV or MP3 file into an in-memory chunk
pub fn decode_file(path: &Path) -> Result<Chunk, AudioError> {
    let file = File::open(path).map_err(|e| load_error(path, e))?;
    let decoder = Decoder::new(BufReader::new(file)).map_err(|e| load_error(path, e))?;

    let channels = decoder.channels();
    let sample_rate = decoder.sample_rate();
    let samples: Vec<i16> = decoder.collect();
    if samples.is_empty() {
        return Err(load_error(path, "no audio data"));
    }

    debug!(
        path = %path.display(),
        channels,
        sample_rate,
        samples = samples.len(),
        "decoded chunk"
    );
    Ok(Chunk::new(channels, sample_rate, samples))
}

/// Mixing backend playing through rodio
#[derive(Default)]
pub struct RodioBackend {
    sender: Option<Sender<AudioCommand>>,
    thread: Option<JoinHandle<()>>,
}

impl RodioBackend {
    pub fn new() -> Self {
        Self::default()
    }

    fn send_command(&self, cmd: AudioCommand) -> bool {
        match self.sender {
            Some(ref sender) => sender.send(cmd).is_ok(),
            None => false,
        }
    }
}

impl MixerBackend for RodioBackend {
    fn name(&self) -> &'static str {
        "rodio"
    }

    fn open(&mut self, spec: &AudioSpec, channels: usize) -> Result<(), AudioError> {
        if self.is_open() {
            self.close();
        }

        let (tx, rx) = channel::unbounded();
        let (ready_tx, ready_rx) = channel::bounded(1);
        let thread_spec = *spec;
        let handle = thread::Builder::new()
            .name("audio".to_string())
            .spawn(move || audio_thread_main(thread_spec, channels, rx, ready_tx))
            .map_err(|e| AudioError::SubsystemInit(e.to_string()))?;

        let started = ready_rx.recv().unwrap_or_else(|_| {
            Err(AudioError::SubsystemInit(
                "audio thread exited during startup".to_string(),
            ))
        });
        if let Err(e) = started {
            let _ = handle.join();
            return Err(e);
        }

        self.sender = Some(tx);
        self.thread = Some(handle);
        Ok(())
    }

    fn close(&mut self) {
        self.send_command(AudioCommand::HaltAll);
        self.send_command(AudioCommand::Shutdown);
        self.sender = None;
        if let Some(handle) = self.thread.take() {
            if handle.join().is_err() {
                error!("audio thread panicked");
            }
        }
    }

    fn is_open(&self) -> bool {
        self.sender.is_some()
    }

    fn load_chunk(&mut self, path: &Path) -> Result<Chunk, AudioError> {
        if !self.is_open() {
            return Err(AudioError::NotInitialized);
        }
        decode_file(path)
    }

    fn play_channel(
        &mut self,
        channel: ChannelId,
        chunk: Chunk,
        loops: LoopCount,
    ) -> Result<(), AudioError> {
        let (reply, response) = channel::bounded(1);
        let cmd = AudioCommand::Play {
            channel: channel.index(),
            chunk,
            loops,
            reply,
        };
        if !self.send_command(cmd) {
            return Err(AudioError::NotInitialized);
        }
        response
            .recv()
            .unwrap_or_else(|_| Err(AudioError::Backend("audio thread gone".to_string())))
    }

    fn channel_state(&self, channel: ChannelId) -> ChannelState {
        let (reply, response) = channel::bounded(1);
        if !self.send_command(AudioCommand::State(channel.index(), reply)) {
            return ChannelState::Idle;
        }
        response.recv().unwrap_or_default()
    }

    fn pause(&mut self, channel: ChannelId) {
        self.send_command(AudioCommand::Pause(channel.index()));
    }

    fn resume(&mut self, channel: ChannelId) {
        self.send_command(AudioCommand::Resume(channel.index()));
    }

    fn halt(&mut self, channel: ChannelId) {
        self.send_command(AudioCommand::Halt(channel.index()));
    }

    fn set_volume(&mut self, channel: ChannelId, volume: u8) {
        self.send_command(AudioCommand::SetVolume(channel.index(), volume));
    }
}

impl Drop for RodioBackend {
    fn drop(&mut self) {
        self.close();
    }
}
