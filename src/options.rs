//! Channel configuration.
//!
//! [`ChannelOptions`] is created once, validated, and shared by every channel
//! a factory opens (`Arc<ChannelOptions>`). It can be built with the `with_*`
//! setters or loaded from JSON:
//!
//! ```
//! use sockpipe::ChannelOptions;
//!
//! let options = ChannelOptions::from_json(r#"{ "receive_buffer_size": 8192 }"#).unwrap();
//! assert_eq!(options.receive_buffer_size, 8192);
//! assert_eq!(options.send_buffer_size, 4096);
//! ```

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{ChannelError, Result};

/// Default receive buffer size per socket read.
pub const DEFAULT_RECEIVE_BUFFER_SIZE: usize = 4 * 1024;

/// Default outbound byte budget before senders are held back.
pub const DEFAULT_SEND_BUFFER_SIZE: usize = 4 * 1024;

/// Default maximum unit (package) length, 4 MiB.
pub const DEFAULT_MAX_PACKAGE_LENGTH: usize = 4 * 1024 * 1024;

/// Default number of committed receive chunks the decode loop may lag behind.
pub const DEFAULT_INBOUND_QUEUE_DEPTH: usize = 16;

/// Default outbound queue capacity (items).
pub const DEFAULT_OUTBOUND_QUEUE_CAPACITY: usize = 256;

/// Default capacity of the decoded-unit subscription queue.
pub const DEFAULT_UNIT_QUEUE_CAPACITY: usize = 64;

/// Default time a sender waits for outbound backpressure to clear.
pub const DEFAULT_SEND_TIMEOUT_MS: u64 = 5_000;

/// Immutable per-listener channel configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChannelOptions {
    /// Bytes reserved for each socket receive.
    pub receive_buffer_size: usize,
    /// Outbound bytes allowed in flight before `send` waits.
    pub send_buffer_size: usize,
    /// Largest payload a decoded unit may declare (0 = unlimited).
    pub max_package_length: usize,
    /// Committed receive chunks buffered ahead of the decode loop.
    pub inbound_queue_depth: usize,
    /// Outbound items buffered ahead of the send loop.
    pub outbound_queue_capacity: usize,
    /// Decoded units buffered ahead of the subscriber.
    pub unit_queue_capacity: usize,
    /// How long `send` waits on backpressure, in milliseconds.
    pub send_timeout_ms: u64,
    /// Set `TCP_NODELAY` on accepted sockets.
    pub no_delay: bool,
}

impl Default for ChannelOptions {
    fn default() -> Self {
        Self {
            receive_buffer_size: DEFAULT_RECEIVE_BUFFER_SIZE,
            send_buffer_size: DEFAULT_SEND_BUFFER_SIZE,
            max_package_length: DEFAULT_MAX_PACKAGE_LENGTH,
            inbound_queue_depth: DEFAULT_INBOUND_QUEUE_DEPTH,
            outbound_queue_capacity: DEFAULT_OUTBOUND_QUEUE_CAPACITY,
            unit_queue_capacity: DEFAULT_UNIT_QUEUE_CAPACITY,
            send_timeout_ms: DEFAULT_SEND_TIMEOUT_MS,
            no_delay: true,
        }
    }
}

impl ChannelOptions {
    /// Create options with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse options from a JSON document; missing fields take defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        let options: Self = serde_json::from_str(json)?;
        options.validate()?;
        Ok(options)
    }

    /// Set the receive buffer size.
    pub fn with_receive_buffer_size(mut self, size: usize) -> Self {
        self.receive_buffer_size = size;
        self
    }

    /// Set the outbound byte budget.
    pub fn with_send_buffer_size(mut self, size: usize) -> Self {
        self.send_buffer_size = size;
        self
    }

    /// Set the maximum unit length (0 = unlimited).
    pub fn with_max_package_length(mut self, length: usize) -> Self {
        self.max_package_length = length;
        self
    }

    /// Set the inbound queue depth.
    pub fn with_inbound_queue_depth(mut self, depth: usize) -> Self {
        self.inbound_queue_depth = depth;
        self
    }

    /// Set the outbound queue capacity.
    pub fn with_outbound_queue_capacity(mut self, capacity: usize) -> Self {
        self.outbound_queue_capacity = capacity;
        self
    }

    /// Set the decoded-unit queue capacity.
    pub fn with_unit_queue_capacity(mut self, capacity: usize) -> Self {
        self.unit_queue_capacity = capacity;
        self
    }

    /// Set the send timeout.
    pub fn with_send_timeout(mut self, timeout: Duration) -> Self {
        self.send_timeout_ms = timeout.as_millis() as u64;
        self
    }

    /// Enable or disable `TCP_NODELAY`.
    pub fn with_no_delay(mut self, no_delay: bool) -> Self {
        self.no_delay = no_delay;
        self
    }

    /// Send timeout as a `Duration`.
    #[inline]
    pub fn send_timeout(&self) -> Duration {
        Duration::from_millis(self.send_timeout_ms)
    }

    /// Maximum unit length, `None` when unlimited.
    #[inline]
    pub fn max_package_length(&self) -> Option<u64> {
        (self.max_package_length > 0).then_some(self.max_package_length as u64)
    }

    /// Size of the region reserved for one socket receive.
    ///
    /// Never larger than the maximum unit length when one is configured.
    #[inline]
    pub fn receive_size(&self) -> usize {
        match self.max_package_length {
            0 => self.receive_buffer_size,
            max => self.receive_buffer_size.min(max),
        }
    }

    /// Check that every size and capacity is usable.
    pub fn validate(&self) -> Result<()> {
        let checks = [
            ("receive_buffer_size", self.receive_buffer_size),
            ("send_buffer_size", self.send_buffer_size),
            ("inbound_queue_depth", self.inbound_queue_depth),
            ("outbound_queue_capacity", self.outbound_queue_capacity),
            ("unit_queue_capacity", self.unit_queue_capacity),
        ];

        for (name, value) in checks {
            if value == 0 {
                return Err(ChannelError::Config(format!("{} must be positive", name)));
            }
        }

        Ok(())
    }
}
