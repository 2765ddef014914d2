// status.rs - Per-channel status bookkeeping

//! Channel status table.
//!
//! Records the outcome of the most recent play request on each channel.
//! The backend owns the real playing/paused state; [`ChannelStatusTable::refresh`]
//! overlays it on the stored value when a caller asks.

use crate::sound::types::{AudioError, ChannelId, ChannelState, ChannelStatus};

/// Fixed-size table of channel statuses
#[derive(Debug, Clone)]
pub struct ChannelStatusTable {
    entries: Box<[ChannelStatus]>,
}

impl ChannelStatusTable {
    /// Create a table with every entry `Idle`
    pub fn new(channels: usize) -> Self {
        Self {
            entries: vec![ChannelStatus::Idle; channels].into_boxed_slice(),
        }
    }

    /// Number of channels tracked
    pub fn capacity(&self) -> usize {
        self.entries.len()
    }

    fn slot(&mut self, channel: ChannelId) -> Result<&mut ChannelStatus, AudioError> {
        self.entries
            .get_mut(channel.index())
            .ok_or(AudioError::InvalidChannel(channel.index() as i32))
    }

    /// Record a status for the channel
    pub fn set(&mut self, channel: ChannelId, status: ChannelStatus) -> Result<(), AudioError> {
        *self.slot(channel)? = status;
        Ok(())
    }

    /// The stored value, without consulting the backend
    pub fn stored(&self, channel: ChannelId) -> Result<ChannelStatus, AudioError> {
        self.entries
            .get(channel.index())
            .copied()
            .ok_or(AudioError::InvalidChannel(channel.index() as i32))
    }

    /// Report the channel status given the backend's current view.
    ///
    /// Paused wins over playing, and either one hides the stored value.
    pub fn refresh(
        &self,
        channel: ChannelId,
        state: ChannelState,
    ) -> Result<ChannelStatus, AudioError> {
        let stored = self.stored(channel)?;
        Ok(match state {
            ChannelState::Paused => ChannelStatus::Paused,
            ChannelState::Playing => ChannelStatus::Playing,
            ChannelState::Idle => stored,
        })
    }

    /// Reset the channel to `Idle`
    pub fn clear(&mut self, channel: ChannelId) -> Result<(), AudioError> {
        self.set(channel, ChannelStatus::Idle)
    }
}
