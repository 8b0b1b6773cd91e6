//! Timeout and drain budgets for channel I/O.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Request/response budget used by the register protocol (milliseconds).
pub const DEFAULT_READ_TIMEOUT_MS: u64 = 2000;
/// Poll timeout used while draining stale input before a send.
pub const DEFAULT_DRAIN_POLL_MS: i32 = 1;
/// Upper bound on frames discarded by a single drain.
pub const DEFAULT_MAX_DRAIN_READS: usize = 64;

/// Channel timing configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Timeouts {
    /// Total budget for one request/response exchange.
    pub read_timeout_ms: u64,
    /// Per-poll timeout while draining pending input.
    pub drain_poll_ms: i32,
    /// Maximum number of stale frames discarded before a send.
    pub max_drain_reads: usize,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            read_timeout_ms: DEFAULT_READ_TIMEOUT_MS,
            drain_poll_ms: DEFAULT_DRAIN_POLL_MS,
            max_drain_reads: DEFAULT_MAX_DRAIN_READS,
        }
    }
}

impl Timeouts {
    /// Check that every budget is usable.
    pub fn validate(self) -> Result<Self> {
        if self.read_timeout_ms == 0 {
            return Err(Error::Config("read_timeout_ms must be non-zero".into()));
        }
        if self.drain_poll_ms < 0 {
            return Err(Error::Config("drain_poll_ms must not be negative".into()));
        }
        if self.max_drain_reads == 0 {
            return Err(Error::Config("max_drain_reads must be non-zero".into()));
        }
        Ok(self)
    }

    /// Parse from a JSON document; missing fields take their defaults.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let timeouts: Self =
            serde_json::from_str(json).map_err(|e| Error::Config(e.to_string()))?;
        timeouts.validate()
    }

    /// Load from a JSON file.
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("{}: {e}", path.display())))?;
        Self::from_json_str(&json)
    }
}
