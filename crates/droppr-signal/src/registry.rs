//! Registry of active signal channels

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tracing::debug;

use droppr_core::{ChannelId, RelayConfig};

use crate::channel::SignalChannel;

/// Maps channel ids to live channels
///
/// Channels are created on first lookup and removed by the last connection
/// to leave them. There is no background sweep.
pub struct ChannelRegistry {
    channels: DashMap<ChannelId, Arc<SignalChannel>>,
    write_timeout: Duration,
}

impl ChannelRegistry {
    pub fn new(config: &RelayConfig) -> Self {
        Self {
            channels: DashMap::new(),
            write_timeout: config.write_timeout(),
        }
    }

    /// Get the channel for `id`, creating an empty one if none exists
    pub fn get_or_create(&self, id: &ChannelId) -> Arc<SignalChannel> {
        let entry = self.channels.entry(id.clone()).or_insert_with(|| {
            debug!("Channel {} created", id);
            Arc::new(SignalChannel::new(id.clone(), self.write_timeout))
        });
        Arc::clone(&entry)
    }

    /// Get the channel for `id` if it exists
    pub fn get(&self, id: &ChannelId) -> Option<Arc<SignalChannel>> {
        self.channels.get(id).map(|entry| Arc::clone(&entry))
    }

    /// Remove `channel` from the registry
    ///
    /// The caller must have seen both of the channel's slots empty while
    /// holding the channel lock. Only this exact channel object is removed;
    /// a newer channel registered under the same id is left alone.
    pub fn remove_if_empty(&self, channel: &SignalChannel) -> bool {
        self.channels
            .remove_if(channel.id(), |_, current| {
                std::ptr::eq(Arc::as_ptr(current), channel)
            })
            .is_some()
    }

    /// Deadline for a single write to a relayed connection
    pub fn write_timeout(&self) -> Duration {
        self.write_timeout
    }

    /// Number of live channels
    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }
}

impl Default for ChannelRegistry {
    fn default() -> Self {
        Self::new(&RelayConfig::default())
    }
}
