//! Retransmission timing for the exchange engine.
//!
//! Each outstanding frame is guarded by a fixed acknowledgment timeout.  When
//! it expires the frame is sent again, up to a bounded number of
//! transmissions.  This module provides:
//! - [`TimerConfig`] — the timeout and the transmission bound.
//! - [`RetryBudget`] — per-call transmission counter, created fresh by every
//!   [`crate::exchange::Exchange`] call so no state leaks between calls.
//!
//! The timeout is fixed; RTT samples are not taken.

use std::time::Duration;

/// Default wait for a matching acknowledgment before retransmitting.
pub const DEFAULT_ACK_TIMEOUT: Duration = Duration::from_secs(3);

/// Default number of times one frame is put on the wire before giving up.
pub const DEFAULT_MAX_TRANSMISSIONS: u32 = 3;

/// Adjustable timeout parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimerConfig {
    /// How long to wait for a matching acknowledgment after each send.
    pub ack_timeout: Duration,
    /// Total transmissions of one frame (first send included).
    pub max_transmissions: u32,
}

impl Default for TimerConfig {
    fn default() -> Self {
        Self {
            ack_timeout: DEFAULT_ACK_TIMEOUT,
            max_transmissions: DEFAULT_MAX_TRANSMISSIONS,
        }
    }
}

/// Counts the transmissions of a single logical frame.
#[derive(Debug)]
pub struct RetryBudget {
    sent: u32,
    limit: u32,
}

impl RetryBudget {
    pub fn new(config: &TimerConfig) -> Self {
        Self {
            sent: 0,
            // A zero bound would never transmit at all.
            limit: config.max_transmissions.max(1),
        }
    }

    /// Record that the frame was (re)sent.
    pub fn record_transmission(&mut self) {
        self.sent += 1;
    }

    /// Number of transmissions so far.
    pub fn transmissions(&self) -> u32 {
        self.sent
    }

    /// `true` once no further retransmission is allowed.
    pub fn exhausted(&self) -> bool {
        self.sent >= self.limit
    }
}
