//! Sync engine configuration

use serde::{Deserialize, Serialize};
use terminal_core::{TerminalError, TerminalResult};

use crate::backoff::BackoffConfig;
use crate::notify::DEFAULT_NOTIFY_CAPACITY;

/// What the feed does when a delta skips ahead of the expected sequence
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GapPolicy {
    /// Drop the delta, mark the book resyncing and request a snapshot
    #[default]
    Resync,
    /// Apply the delta and log the gap
    Tolerate,
}

/// Market data feed settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeedConfig {
    pub backoff: BackoffConfig,
    pub gap_policy: GapPolicy,
    /// Request a fresh snapshot when a stale delta arrives
    pub resync_on_stale: bool,
    /// Refused snapshots re-requested in a row before a book is left resyncing
    pub max_snapshot_retries: u32,
    /// Capacity of the command channel behind `FeedHandle`
    pub command_buffer: usize,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            backoff: BackoffConfig::default(),
            gap_policy: GapPolicy::Resync,
            resync_on_stale: true,
            max_snapshot_retries: 3,
            command_buffer: 256,
        }
    }
}

/// Top-level configuration for a [`crate::SyncContext`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    pub feed: FeedConfig,
    /// Broadcast capacity for change notifications
    pub notify_capacity: usize,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            feed: FeedConfig::default(),
            notify_capacity: DEFAULT_NOTIFY_CAPACITY,
        }
    }
}

impl SyncConfig {
    /// Parse and validate a JSON document; missing fields take defaults
    pub fn from_json(json: &str) -> TerminalResult<Self> {
        let config: SyncConfig =
            serde_json::from_str(json).map_err(|e| TerminalError::config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> TerminalResult<()> {
        let backoff = &self.feed.backoff;
        if backoff.base_delay_ms == 0 {
            return Err(TerminalError::config("feed.backoff.base_delay_ms must be > 0"));
        }
        if backoff.max_delay_ms < backoff.base_delay_ms {
            return Err(TerminalError::config(format!(
                "feed.backoff.max_delay_ms ({}) is below base_delay_ms ({})",
                backoff.max_delay_ms, backoff.base_delay_ms
            )));
        }
        if backoff.max_attempts == Some(0) {
            return Err(TerminalError::config("feed.backoff.max_attempts must be > 0"));
        }
        if self.feed.command_buffer == 0 {
            return Err(TerminalError::config("feed.command_buffer must be > 0"));
        }
        if self.notify_capacity == 0 {
            return Err(TerminalError::config("notify_capacity must be > 0"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = SyncConfig::default();
        assert_eq!(config.feed.backoff.base_delay_ms, 500);
        assert_eq!(config.feed.backoff.max_delay_ms, 30_000);
        assert_eq!(config.feed.backoff.max_attempts, None);
        assert_eq!(config.feed.gap_policy, GapPolicy::Resync);
        assert!(config.feed.resync_on_stale);
        assert_eq!(config.feed.max_snapshot_retries, 3);
        assert_eq!(config.notify_capacity, 1024);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_json_fills_defaults() {
        let config = SyncConfig::from_json(
            r#"{"feed": {"gap_policy": "tolerate", "backoff": {"max_attempts": 3}}}"#,
        )
        .unwrap();
        assert_eq!(config.feed.gap_policy, GapPolicy::Tolerate);
        assert_eq!(config.feed.backoff.max_attempts, Some(3));
        assert_eq!(config.feed.backoff.base_delay_ms, 500);
        assert_eq!(config.feed.command_buffer, 256);
    }

    #[test]
    fn test_invalid_values_rejected() {
        let err = SyncConfig::from_json(
            r#"{"feed": {"backoff": {"base_delay_ms": 1000, "max_delay_ms": 10}}}"#,
        )
        .unwrap_err();
        assert!(matches!(err, TerminalError::Config(_)));

        let err = SyncConfig::from_json(r#"{"notify_capacity": 0}"#).unwrap_err();
        assert!(matches!(err, TerminalError::Config(_)));

        let err = SyncConfig::from_json("not json").unwrap_err();
        assert!(matches!(err, TerminalError::Config(_)));
    }
}
