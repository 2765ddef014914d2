use crate::config::{parse_play_mode, parse_volume, Options, SoundDriver};
use crate::logging::LogLevel;
use crate::sound::types::PlayMode;
use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};

/// Play audio files through the libaudio channel mixer
#[derive(Parser, Debug)]
#[command(name = "audioplay")]
#[command(version)]
#[command(about = "Play .mp3/.wav files on mixer channels", long_about = None)]
pub struct Cli {
    /// Configuration file (TOML)
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<String>,

    /// Log level (nothing, user, error, warning, info, debug, all)
    #[arg(long = "log-level", global = true, value_name = "LEVEL")]
    pub log_level: Option<String>,

    /// Log file path
    #[arg(long = "log-file", global = true, value_name = "FILE")]
    pub log_file: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Command {
    /// Play a file on a channel
    Play(PlayArgs),
    /// Report whether a file has a playable type
    Check {
        /// Path to test
        file: String,
    },
}

#[derive(Args, Debug, Clone, Default, PartialEq)]
pub struct PlayArgs {
    /// File to play (.mp3 or .wav)
    pub file: String,

    /// Mixer channel
    #[arg(long, default_value_t = 0)]
    pub channel: i32,

    /// Extra repetitions (-1 loops forever)
    #[arg(long, default_value_t = 0, allow_negative_numbers = true)]
    pub loops: i32,

    /// Channel volume (0-100)
    #[arg(long, value_name = "VOLUME")]
    pub volume: Option<String>,

    /// Output frequency in Hz
    #[arg(long, value_name = "HZ")]
    pub frequency: Option<i32>,

    /// Output channel count
    #[arg(long, value_name = "COUNT")]
    pub channels: Option<i32>,

    /// Mixer chunk size
    #[arg(long = "chunk-size", value_name = "BYTES")]
    pub chunk_size: Option<i32>,

    /// Return from the play call at once and report channel status until done
    #[arg(long)]
    pub detached: bool,

    /// Play mode (blocking, detached)
    #[arg(long, value_name = "MODE", conflicts_with = "detached")]
    pub mode: Option<String>,

    /// Sound driver (rodio, none)
    #[arg(long, value_name = "DRIVER")]
    pub sound: Option<String>,
}

impl PlayArgs {
    /// The requested channel volume, if any
    pub fn volume(&self) -> Result<Option<i32>> {
        self.volume
            .as_deref()
            .map(parse_volume)
            .transpose()
            .context("Invalid --volume")
    }
}

impl Cli {
    /// Merge CLI arguments into the options struct
    pub fn merge_into_options(&self, mut opts: Options) -> Result<Options> {
        if let Some(ref level) = self.log_level {
            opts.log_level = Self::parse_log_level(level)?;
        }

        if let Some(ref log_file) = self.log_file {
            opts.log_file = Some(log_file.clone());
        }

        if let Command::Play(ref play) = self.command {
            if let Some(frequency) = play.frequency {
                opts.frequency = frequency;
            }
            if let Some(channels) = play.channels {
                opts.channels = channels;
            }
            if let Some(chunk_size) = play.chunk_size {
                opts.chunk_size = chunk_size;
            }

            if let Some(ref mode) = play.mode {
                opts.play_mode = parse_play_mode(mode)?;
            }
            if play.detached {
                opts.play_mode = PlayMode::Detached;
            }

            if let Some(ref sound) = play.sound {
                opts.sound_driver = Self::parse_sound_driver(sound)?;
            }
        }

        Ok(opts)
    }

    fn parse_log_level(s: &str) -> Result<LogLevel> {
        LogLevel::parse(s).with_context(|| {
            format!(
                "Invalid log level: {}. Valid options: nothing, user, error, warning, info, debug, all",
                s
            )
        })
    }

    fn parse_sound_driver(s: &str) -> Result<SoundDriver> {
        match s.to_lowercase().as_str() {
            "rodio" => Ok(SoundDriver::Rodio),
            "none" | "nosound" => Ok(SoundDriver::None),
            _ => anyhow::bail!("Invalid sound driver: {}. Valid options: rodio, none", s),
        }
    }
}
