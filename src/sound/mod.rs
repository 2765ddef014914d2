//! Channel-based audio playback
//!
//! # Architecture
//!
//! - `types` holds channel ids, status codes and `AudioError`
//! - `formats` decides which files are playable
//! - `status` keeps the per-channel status table
//! - `backend` defines `MixerBackend` with rodio and null implementations
//! - `mixer` ties a backend and the status table together
//! - `ffi` exposes the mixer to C

pub mod backend;
pub mod ffi;
pub mod formats;
pub mod mixer;
pub mod status;
pub mod types;

pub use backend::{AudioSpec, Chunk, MixerBackend, NullBackend, RodioBackend};
pub use formats::{check_type, AudioFileType};
pub use mixer::{AudioMixer, MixerSettings};
pub use status::ChannelStatusTable;
pub use types::{AudioError, ChannelId, ChannelState, ChannelStatus, LoopCount, PlayMode};
