//! Runtime timing and sizing for the engine.

use std::time::Duration;
use tonegen_core::format;

/// Engine configuration.
///
/// ## Fields
///
/// - `block_frames`: frames per synthesis block (default: 800, 1/60 s)
/// - `resolve_backoff`: wait after a failed resolution or open (default: 500 ms)
/// - `idle_wait`: re-check interval while the selector is blank (default: 100 ms)
/// - `rebuild_wait`: pause between closing a session and re-resolving (default: 100 ms)
/// - `pump_wait`: bounded wait inside an idle pump tick (default: 1 ms)
/// - `shutdown_timeout`: per-thread join window (default: 1 s)
/// - `default_poll`: default-endpoint watch interval for polling backends (default: 500 ms)
#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    /// Frames per synthesis block.
    pub block_frames: usize,
    /// Wait after `NoMatchingDevice` or `DeviceUnavailable`.
    pub resolve_backoff: Duration,
    /// Re-check interval while the selector is blank.
    pub idle_wait: Duration,
    /// Pause between closing a session and resolving again.
    pub rebuild_wait: Duration,
    /// Bounded wait inside an idle pump tick.
    pub pump_wait: Duration,
    /// Join window per worker thread.
    pub shutdown_timeout: Duration,
    /// Default-endpoint watch interval.
    pub default_poll: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            block_frames: format::DEFAULT_BLOCK_FRAMES,
            resolve_backoff: Duration::from_millis(500),
            idle_wait: Duration::from_millis(100),
            rebuild_wait: Duration::from_millis(100),
            pump_wait: Duration::from_millis(1),
            shutdown_timeout: Duration::from_secs(1),
            default_poll: Duration::from_millis(500),
        }
    }
}

impl EngineConfig {
    /// Bytes per synthesis block.
    pub fn block_bytes(&self) -> usize {
        format::block_bytes(self.block_frames.max(1))
    }
}
