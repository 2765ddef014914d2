// libaudio: channel-based audio playback with a C interface

pub mod cli;
pub mod config;
pub mod logging;
pub mod sound;

pub use cli::Cli;
pub use config::Options;
pub use logging::LogLevel;
pub use sound::{AudioError, AudioMixer, ChannelId, ChannelStatus, PlayMode};
