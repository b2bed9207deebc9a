//! # Logging Utilities
//!
//! Rate limiting for log messages emitted from the receive path. A noisy
//! bus can drop hundreds of bytes per second; the throttle keeps the log
//! readable while still recording that drops are happening.

use std::time::Instant;

/// Throttling structure for rate-limiting log messages
#[derive(Debug)]
pub struct LogThrottle {
    /// Time window for throttling (in milliseconds)
    window_ms: u64,
    /// Maximum messages allowed per window
    cap: u32,
    /// Current message count in window
    count: u32,
    /// Start time of current window
    t0: Instant,
}

impl LogThrottle {
    /// Create new throttle with time window and message cap
    pub fn new(window_ms: u64, cap: u32) -> Self {
        Self {
            window_ms,
            cap,
            count: 0,
            t0: Instant::now(),
        }
    }

    /// Check if logging is allowed (resets counter after window expires)
    ///
    /// Returns `true` if the message should be logged, `false` if it
    /// should be throttled.
    pub fn allow(&mut self) -> bool {
        let now = Instant::now();
        if now.duration_since(self.t0).as_millis() as u64 >= self.window_ms {
            self.t0 = now;
            self.count = 0;
        }
        if self.count < self.cap {
            self.count += 1;
            true
        } else {
            false
        }
    }
}
