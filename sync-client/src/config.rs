//! Configuration for the sync engine.

use std::time::Duration;

use ledger_sync_types::ChannelId;

/// Default delay between periodic broadcasts.
pub const DEFAULT_BROADCAST_INTERVAL: Duration = Duration::from_secs(60);

/// Default first topic segment.
pub const DEFAULT_TOPIC_PREFIX: &str = "ledgerapp";

/// Configuration for [`crate::SyncClient`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncConfig {
    /// Delay between full-state broadcasts while connected.
    pub broadcast_interval: Duration,
    /// First topic segment; every ledger channel lives under it.
    pub topic_prefix: String,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            broadcast_interval: DEFAULT_BROADCAST_INTERVAL,
            topic_prefix: DEFAULT_TOPIC_PREFIX.to_string(),
        }
    }
}

impl SyncConfig {
    /// Set the broadcast interval.
    pub fn with_broadcast_interval(mut self, interval: Duration) -> Self {
        self.broadcast_interval = interval;
        self
    }

    /// Set the topic prefix.
    pub fn with_topic_prefix(mut self, prefix: &str) -> Self {
        self.topic_prefix = prefix.to_string();
        self
    }

    /// Topic of a channel, with an optional suffix.
    pub fn topic(&self, channel: &ChannelId, suffix: Option<&str>) -> String {
        channel.topic(&self.topic_prefix, suffix)
    }
}
