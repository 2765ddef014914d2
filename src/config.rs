use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::logging::LogLevel;
use crate::sound::backend::AudioSpec;
use crate::sound::mixer::MixerSettings;
use crate::sound::types::{PlayMode, DEFAULT_MAX_CHANNELS, MIX_MAX_VOLUME};

/// Environment variable naming the config file read by the C interface
pub const CONFIG_ENV: &str = "LIBAUDIO_CONFIG";

/// Upper bound on configured mixing channels
pub const MAX_CONFIG_CHANNELS: usize = 256;

/// Which mixing backend to drive
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SoundDriver {
    #[default]
    Rodio,
    None,
}

/// Library options, read from a TOML file and overridable from the CLI
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Options {
    pub sound_driver: SoundDriver,
    pub play_mode: PlayMode,
    pub max_channels: usize,
    /// Volume applied to every loaded chunk (0-128)
    pub chunk_volume: u8,
    pub poll_interval_ms: u64,

    // Default output spec for the command line player
    pub frequency: i32,
    pub channels: i32,
    pub chunk_size: i32,

    pub log_level: LogLevel,
    pub log_file: Option<String>,
}

impl Default for Options {
    fn default() -> Self {
        let spec = AudioSpec::default();
        Self {
            sound_driver: SoundDriver::Rodio,
            play_mode: PlayMode::Blocking,
            max_channels: DEFAULT_MAX_CHANNELS,
            chunk_volume: MIX_MAX_VOLUME,
            poll_interval_ms: 10,
            frequency: spec.frequency as i32,
            channels: spec.channels as i32,
            chunk_size: spec.chunk_size as i32,
            log_level: LogLevel::Warning,
            log_file: None,
        }
    }
}

impl Options {
    /// Reject values the mixer cannot work with
    pub fn validate(&self) -> Result<()> {
        if self.max_channels == 0 || self.max_channels > MAX_CONFIG_CHANNELS {
            anyhow::bail!(
                "max_channels must be between 1 and {} (got {})",
                MAX_CONFIG_CHANNELS,
                self.max_channels
            );
        }
        if self.chunk_volume > MIX_MAX_VOLUME {
            anyhow::bail!(
                "chunk_volume must be at most {} (got {})",
                MIX_MAX_VOLUME,
                self.chunk_volume
            );
        }
        Ok(())
    }

    pub fn mixer_settings(&self) -> MixerSettings {
        MixerSettings {
            play_mode: self.play_mode,
            poll_interval: Duration::from_millis(self.poll_interval_ms.max(1)),
            chunk_volume: self.chunk_volume.min(MIX_MAX_VOLUME),
            max_channels: self.max_channels,
        }
    }

    pub fn audio_spec(&self) -> Result<AudioSpec> {
        AudioSpec::new(self.frequency, self.channels, self.chunk_size)
            .context("Invalid audio output settings")
    }
}

/// Load options from a TOML file, or defaults when no path is given
pub fn load_config(path: Option<&Path>) -> Result<Options> {
    let Some(path) = path else {
        return Ok(Options::default());
    };

    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file {}", path.display()))?;
    let options: Options = toml::from_str(&text)
        .with_context(|| format!("Failed to parse config file {}", path.display()))?;
    options.validate()?;
    Ok(options)
}

/// Load options from the file named by `LIBAUDIO_CONFIG`, if set
pub fn load_from_env() -> Result<Options> {
    match std::env::var_os(CONFIG_ENV) {
        Some(path) => load_config(Some(Path::new(&path))),
        None => Ok(Options::default()),
    }
}

/// Parse a volume percentage (0-100)
pub fn parse_volume(s: &str) -> Result<i32> {
    let vol: i32 = s.trim().parse().context("Invalid volume value")?;
    if !(0..=100).contains(&vol) {
        anyhow::bail!("Volume must be between 0 and 100 (got {})", vol);
    }
    Ok(vol)
}

/// Parse a play mode name
pub fn parse_play_mode(s: &str) -> Result<PlayMode> {
    match s.to_lowercase().as_str() {
        "blocking" | "sync" => Ok(PlayMode::Blocking),
        "detached" | "async" => Ok(PlayMode::Detached),
        _ => anyhow::bail!(
            "Invalid play mode: {}. Valid options: blocking, detached",
            s
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_options_default() {
        let opts = Options::default();
        assert_eq!(opts.sound_driver, SoundDriver::Rodio);
        assert_eq!(opts.play_mode, PlayMode::Blocking);
        assert_eq!(opts.max_channels, 10);
        assert_eq!(opts.chunk_volume, 128);
        assert!(opts.validate().is_ok());
        assert_eq!(opts.audio_spec().unwrap(), AudioSpec::default());
    }

    #[test]
    fn test_load_config_none_is_default() {
        assert_eq!(load_config(None).unwrap(), Options::default());
    }

    #[test]
    fn test_load_config_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
sound_driver = "none"
play_mode = "detached"
max_channels = 4
chunk_volume = 3
log_level = "debug"
"#
        )
        .unwrap();

        let opts = load_config(Some(file.path())).unwrap();
        assert_eq!(opts.sound_driver, SoundDriver::None);
        assert_eq!(opts.play_mode, PlayMode::Detached);
        assert_eq!(opts.max_channels, 4);
        assert_eq!(opts.chunk_volume, 3);
        assert_eq!(opts.log_level, LogLevel::Debug);
        // Unset keys keep their defaults
        assert_eq!(opts.frequency, 44100);

        let settings = opts.mixer_settings();
        assert_eq!(settings.max_channels, 4);
        assert_eq!(settings.chunk_volume, 3);
        assert_eq!(settings.play_mode, PlayMode::Detached);
    }

    #[test]
    fn test_load_config_rejects_bad_values() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "max_channels = 0").unwrap();
        assert!(load_config(Some(file.path())).is_err());

        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "chunk_volume = 200").unwrap();
        assert!(load_config(Some(file.path())).is_err());

        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "no_such_key = true").unwrap();
        assert!(load_config(Some(file.path())).is_err());
    }

    #[test]
    fn test_load_config_missing_file() {
        assert!(load_config(Some(Path::new("/nonexistent/libaudio.toml"))).is_err());
    }

    #[test]
    fn test_parse_volume() {
        assert_eq!(parse_volume("0").unwrap(), 0);
        assert_eq!(parse_volume(" 50 ").unwrap(), 50);
        assert_eq!(parse_volume("100").unwrap(), 100);
        assert!(parse_volume("101").is_err());
        assert!(parse_volume("-1").is_err());
        assert!(parse_volume("loud").is_err());
    }

    #[test]
    fn test_parse_play_mode() {
        assert_eq!(parse_play_mode("blocking").unwrap(), PlayMode::Blocking);
        assert_eq!(parse_play_mode("ASYNC").unwrap(), PlayMode::Detached);
        assert!(parse_play_mode("later").is_err());
    }
}
