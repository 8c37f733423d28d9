//! Configuration types for Conduit
//!
//! Runtime settings for the pipeline driver and unit buffers, plus the
//! on-disk config file that persists them alongside node parameters.

mod file;

pub use file::{sample_config, ConfigFile};

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::{ConduitError, Result};

/// Settings for [`Pipeline::run`](crate::pipeline::Pipeline::run)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DriverConfig {
    /// Sleep between reads that answered AGAIN, in milliseconds
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Consecutive AGAIN answers before giving up (unset = wait forever)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_idle_polls: Option<u32>,
}

fn default_poll_interval_ms() -> u64 {
    5
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval_ms(),
            max_idle_polls: None,
        }
    }
}

impl DriverConfig {
    /// Poll interval as a duration
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Set the poll interval
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval_ms = interval.as_millis() as u64;
        self
    }

    /// Give up after `polls` consecutive AGAIN answers
    pub fn with_max_idle_polls(mut self, polls: u32) -> Self {
        self.max_idle_polls = Some(polls);
        self
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.max_idle_polls == Some(0) {
            return Err(ConduitError::config("max_idle_polls must be at least 1"));
        }
        Ok(())
    }
}

/// Unit buffer sizing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BufferConfig {
    /// Capacity reserved for each new unit buffer, in bytes
    #[serde(default = "default_unit_capacity")]
    pub unit_capacity: usize,
}

fn default_unit_capacity() -> usize {
    64 * 1024
}

impl Default for BufferConfig {
    fn default() -> Self {
        Self {
            unit_capacity: default_unit_capacity(),
        }
    }
}
