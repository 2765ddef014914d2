// ffi.rs - C interface to the channel mixer

//! C-compatible entry points declared in `include/libaudio.h`.
//!
//! One process-wide [`AudioMixer`] sits behind a mutex and is created on first
//! use from the config file named by `LIBAUDIO_CONFIG` (or defaults). Every
//! failure is reported as an integer code; nothing panics across the boundary.

use std::ffi::{c_char, c_int, CStr};
use std::path::Path;

use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::config::{self, Options, SoundDriver};
use crate::logging::{self, LogLevel};
use crate::sound::backend::AudioSpec;
use crate::sound::formats::AudioFileType;
use crate::sound::mixer::AudioMixer;
use crate::sound::types::{ChannelStatus, PlayMode};

static AUDIO: Mutex<Option<AudioMixer>> = Mutex::new(None);

const OK: c_int = 0;
const FAIL: c_int = -1;

fn options() -> Options {
    config::load_from_env().unwrap_or_else(|e| {
        warn!("ignoring audio config: {:#}", e);
        Options::default()
    })
}

fn create_mixer() -> AudioMixer {
    let opts = options();
    let settings = opts.mixer_settings();
    match opts.sound_driver {
        SoundDriver::Rodio => AudioMixer::with_rodio_backend(settings),
        SoundDriver::None => AudioMixer::with_null_backend(settings),
    }
}

fn with_mixer<R>(f: impl FnOnce(&mut AudioMixer) -> R) -> R {
    let mut guard = AUDIO.lock();
    let mixer = guard.get_or_insert_with(create_mixer);
    f(mixer)
}

/// Replace the process-wide mixer used by the C interface.
///
/// Returns the previous mixer, if one had been created.
pub fn install_mixer(mixer: AudioMixer) -> Option<AudioMixer> {
    AUDIO.lock().replace(mixer)
}

/// Path argument as passed from C. NULL becomes the empty string, which
/// fails the type check.
unsafe fn path_arg(path: *const c_char) -> String {
    if path.is_null() {
        return String::new();
    }
    CStr::from_ptr(path).to_string_lossy().into_owned()
}

/// Open the audio device.
///
/// Returns 0 on success, 1 if the audio subsystem cannot start, 2 if the
/// output stream cannot be opened with the requested format.
#[no_mangle]
#[allow(non_snake_case)]
pub extern "C" fn InitAudio(frequency: c_int, channels: c_int, chunk_size: c_int) -> c_int {
    let result = AudioSpec::new(frequency, channels, chunk_size)
        .and_then(|spec| with_mixer(|mixer| mixer.open(spec)));
    match result {
        Ok(()) => OK,
        Err(e) => {
            warn!(frequency, channels, chunk_size, "InitAudio failed: {}", e);
            e.init_code()
        }
    }
}

/// Play a file on a channel, `loops` extra times (-1 forever).
///
/// The outcome is only visible through `GetChannelStatus`. In blocking mode
/// the call returns once its sound is gone from the channel; the mixer lock
/// is released while waiting so other threads can still control channels.
/// A later play request on the channel owns the recorded status.
///
/// # Safety
/// `path` must be NULL or a valid NUL-terminated string.
#[no_mangle]
#[allow(non_snake_case)]
pub unsafe extern "C" fn PlayAudio(channel: c_int, path: *const c_char, loops: c_int) {
    let path = path_arg(path);

    let wait = with_mixer(|mixer| {
        let ch = match mixer.channel(channel) {
            Ok(ch) => ch,
            Err(e) => {
                debug!("PlayAudio: {}", e);
                return None;
            }
        };
        let token = mixer.start_playback(ch, &path, loops).ok()?;
        match mixer.settings().play_mode {
            PlayMode::Blocking => Some((token, mixer.settings().poll_interval)),
            PlayMode::Detached => None,
        }
    });

    let Some((token, poll_interval)) = wait else {
        return;
    };

    loop {
        let playing = AUDIO
            .lock()
            .as_ref()
            .map_or(false, |mixer| mixer.is_playing_request(token));
        if !playing {
            break;
        }
        std::thread::sleep(poll_interval);
    }

    if let Some(mixer) = AUDIO.lock().as_mut() {
        let _ = mixer.finish_playback(token);
    }
}

/// Set a channel's volume from a 0-100 percentage
#[no_mangle]
#[allow(non_snake_case)]
pub extern "C" fn SetVolume(channel: c_int, percent: c_int) -> c_int {
    let result = with_mixer(|mixer| {
        let ch = mixer.channel(channel)?;
        mixer.set_volume(ch, percent)
    });
    code(result)
}

#[no_mangle]
#[allow(non_snake_case)]
pub extern "C" fn PauseAudio(channel: c_int) -> c_int {
    code(with_mixer(|mixer| {
        let ch = mixer.channel(channel)?;
        mixer.pause(ch)
    }))
}

#[no_mangle]
#[allow(non_snake_case)]
pub extern "C" fn ResumeAudio(channel: c_int) -> c_int {
    code(with_mixer(|mixer| {
        let ch = mixer.channel(channel)?;
        mixer.resume(ch)
    }))
}

#[no_mangle]
#[allow(non_snake_case)]
pub extern "C" fn StopAudio(channel: c_int) -> c_int {
    code(with_mixer(|mixer| {
        let ch = mixer.channel(channel)?;
        mixer.stop(ch)
    }))
}

/// Halt all channels and release the audio device. Channel statuses are kept.
#[no_mangle]
#[allow(non_snake_case)]
pub extern "C" fn CloseAudio() {
    if let Some(mixer) = AUDIO.lock().as_mut() {
        mixer.close();
    }
}

/// Status code of a channel; invalid channels report 2
#[no_mangle]
#[allow(non_snake_case)]
pub extern "C" fn GetChannelStatus(channel: c_int) -> c_int {
    let status = with_mixer(|mixer| {
        let ch = mixer.channel(channel)?;
        mixer.channel_status(ch)
    });
    status
        .unwrap_or(ChannelStatus::ChannelBusyOrInvalid)
        .as_i32()
}

#[no_mangle]
#[allow(non_snake_case)]
pub extern "C" fn ClearChannelStatus(channel: c_int) -> c_int {
    code(with_mixer(|mixer| {
        let ch = mixer.channel(channel)?;
        mixer.clear_channel_status(ch)
    }))
}

/// 0 if the path ends in `.mp3` or `.wav`, -1 otherwise
///
/// # Safety
/// `path` must be NULL or a valid NUL-terminated string.
#[no_mangle]
#[allow(non_snake_case)]
pub unsafe extern "C" fn CheckTypeAudio(path: *const c_char) -> c_int {
    if path.is_null() {
        return FAIL;
    }
    let bytes = CStr::from_ptr(path).to_bytes();
    match AudioFileType::from_bytes(bytes) {
        Some(_) => OK,
        None => FAIL,
    }
}

/// Select blocking (0) or detached (1) playback for `PlayAudio`
#[no_mangle]
#[allow(non_snake_case)]
pub extern "C" fn SetPlayMode(mode: c_int) -> c_int {
    match PlayMode::from_i32(mode) {
        Some(mode) => {
            with_mixer(|mixer| mixer.set_play_mode(mode));
            debug!(?mode, "play mode set");
            OK
        }
        None => FAIL,
    }
}

/// Install a log subscriber at the given level (0 nothing ... 6 all)
#[no_mangle]
#[allow(non_snake_case)]
pub extern "C" fn AudioLogInit(level: c_int) -> c_int {
    if !(LogLevel::Nothing.as_i32()..=LogLevel::All.as_i32()).contains(&level) {
        return FAIL;
    }
    let log_file = options().log_file;
    match logging::init(LogLevel::from_i32(level), log_file.as_deref().map(Path::new)) {
        Ok(()) => OK,
        Err(e) => {
            eprintln!("libaudio: {:#}", e);
            FAIL
        }
    }
}

fn code<E>(result: Result<(), E>) -> c_int {
    match result {
        Ok(()) => OK,
        Err(_) => FAIL,
    }
}
