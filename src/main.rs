use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{debug, info};

use libaudio::cli::{Cli, Command, PlayArgs};
use libaudio::config::{self, Options, SoundDriver};
use libaudio::logging;
use libaudio::sound::{AudioFileType, AudioMixer, PlayMode};

/// Shortest sleep between status reports in detached mode
const STATUS_INTERVAL: Duration = Duration::from_millis(50);

fn main() -> Result<()> {
    let cli = Cli::parse();

    let options = config::load_config(cli.config.as_deref().map(Path::new))?;
    let options = cli.merge_into_options(options)?;

    logging::init(
        options.log_level,
        options.log_file.as_deref().map(Path::new),
    )?;
    debug!(?options, "options loaded");

    match cli.command {
        Command::Check { ref file } => check(file),
        Command::Play(ref args) => play(args, &options),
    }
}

fn check(file: &str) -> Result<()> {
    match AudioFileType::from_path(file) {
        Some(kind) => {
            println!("{}: {}", file, kind);
            Ok(())
        }
        None => anyhow::bail!("{}: unsupported file type (expected .mp3 or .wav)", file),
    }
}

fn play(args: &PlayArgs, options: &Options) -> Result<()> {
    let settings = options.mixer_settings();
    let mut mixer = match options.sound_driver {
        SoundDriver::Rodio => AudioMixer::with_rodio_backend(settings),
        SoundDriver::None => AudioMixer::with_null_backend(settings),
    };

    mixer
        .open(options.audio_spec()?)
        .context("Failed to open audio device")?;
    info!(backend = mixer.backend_name(), "audio ready");

    let channel = mixer.channel(args.channel)?;
    if let Some(volume) = args.volume()? {
        mixer.set_volume(channel, volume)?;
    }

    mixer
        .play(channel, &args.file, args.loops)
        .with_context(|| format!("Failed to play {}", args.file))?;

    if settings.play_mode == PlayMode::Detached {
        // Play returned at once; follow the channel through its status
        let interval = settings.poll_interval.max(STATUS_INTERVAL);
        let mut last = None;
        while mixer.is_active(channel) {
            let status = mixer.channel_status(channel)?;
            if last != Some(status) {
                println!("channel {}: {:?} ({})", channel, status, status.as_i32());
                last = Some(status);
            }
            std::thread::sleep(interval);
        }
    }

    let status = mixer.channel_status(channel)?;
    println!("channel {}: {:?} ({})", channel, status, status.as_i32());
    mixer.close();
    Ok(())
}
