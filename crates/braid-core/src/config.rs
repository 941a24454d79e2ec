//! Collaboration configuration.
//!
//! # Configuration Options
//!
//! | Option | Default | Description |
//! |--------|---------|-------------|
//! | `max_update_bytes` | 32768 | Max size of one opaque CRDT update |
//! | `checkpoint_max_updates` | 500 | Fold to a checkpoint after this many updates |
//! | `checkpoint_max_seconds` | 20 | ...or after this many seconds, whichever first |
//! | `max_concurrent_users_per_session` | 10 | Soft cap enforced at join time |
//! | `session_timeout_minutes` | 30 | Idle session reclaim threshold |
//! | `max_operation_history_size` | 1000 | Bound on retained OT history per session |
//! | `cursor_broadcast_min_interval_ms` | 1000 | Throttle for cursor fan-out |
//! | `auto_cleanup_interval_minutes` | 10 | Idle-session sweep cadence |
//! | `presence_ttl_seconds` | 30 | Prune presence with no heartbeat after this long |
//! | `accept_crdt_deltas` | false | Accept tagged CRDT-delta updates, not just full snapshots |

use std::time::Duration;

#[derive(Clone, Debug, PartialEq)]
pub struct CollabConfig {
    pub max_update_bytes: usize,
    pub checkpoint_max_updates: u64,
    pub checkpoint_max_seconds: u64,
    pub max_concurrent_users_per_session: usize,
    pub session_timeout_minutes: u64,
    pub max_operation_history_size: usize,
    pub cursor_broadcast_min_interval_ms: u64,
    pub auto_cleanup_interval_minutes: u64,
    pub presence_ttl_seconds: u64,
    pub accept_crdt_deltas: bool,
}

impl Default for CollabConfig {
    fn default() -> Self {
        Self {
            max_update_bytes: 32 * 1024,
            checkpoint_max_updates: 500,
            checkpoint_max_seconds: 20,
            max_concurrent_users_per_session: 10,
            session_timeout_minutes: 30,
            max_operation_history_size: 1000,
            cursor_broadcast_min_interval_ms: 1000,
            auto_cleanup_interval_minutes: 10,
            presence_ttl_seconds: 30,
            accept_crdt_deltas: false,
        }
    }
}

impl CollabConfig {
    #[must_use]
    pub fn session_timeout(&self) -> Duration {
        Duration::from_secs(self.session_timeout_minutes * 60)
    }

    #[must_use]
    pub fn checkpoint_max_age(&self) -> Duration {
        Duration::from_secs(self.checkpoint_max_seconds)
    }

    #[must_use]
    pub fn presence_ttl(&self) -> Duration {
        Duration::from_secs(self.presence_ttl_seconds)
    }

    #[must_use]
    pub fn auto_cleanup_interval(&self) -> Duration {
        Duration::from_secs(self.auto_cleanup_interval_minutes * 60)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_spec() {
        let config = CollabConfig::default();
        assert_eq!(config.max_update_bytes, 32768);
        assert_eq!(config.checkpoint_max_updates, 500);
        assert_eq!(config.checkpoint_max_seconds, 20);
        assert!(!config.accept_crdt_deltas);
    }

    #[test]
    fn partial_override() {
        let config = CollabConfig {
            checkpoint_max_updates: 50,
            ..Default::default()
        };
        assert_eq!(config.checkpoint_max_updates, 50);
        assert_eq!(config.max_update_bytes, 32768);
    }

    #[test]
    fn duration_helpers() {
        let config = CollabConfig::default();
        assert_eq!(config.session_timeout(), Duration::from_secs(30 * 60));
        assert_eq!(config.presence_ttl(), Duration::from_secs(30));
    }
}
