//! Session configuration for clamd connections.

use std::time::Duration;

use crate::error::{ClamdError, Result};

/// Default socket read timeout, matching the common clamd client default.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(2000);

/// Where and how to reach the clamav daemon.
///
/// Immutable after construction and safely shared across threads: each
/// `ping`/`scan` opens its own connection and allocates its own buffers,
/// so there is no mutable state to contend on.
#[derive(Debug, Clone)]
pub struct ClamdConfig {
    pub host: String,
    pub port: u16,
    /// Read deadline applied once per connection. Zero means no deadline.
    pub timeout: Duration,
}

impl ClamdConfig {
    #[must_use]
    pub fn new(host: impl Into<String>, port: u16, timeout: Duration) -> Self {
        Self {
            host: host.into(),
            port,
            timeout,
        }
    }

    /// Build a config from a signed millisecond timeout, the form most
    /// external configuration hands over.
    ///
    /// # Errors
    ///
    /// Returns `ClamdError::InvalidTimeout` for negative values. Zero is
    /// accepted and means no read deadline.
    pub fn from_millis(host: impl Into<String>, port: u16, timeout_ms: i64) -> Result<Self> {
        let ms = u64::try_from(timeout_ms).map_err(|_| ClamdError::InvalidTimeout(timeout_ms))?;
        Ok(Self::new(host, port, Duration::from_millis(ms)))
    }

    /// Config with the default 2 second read timeout.
    #[must_use]
    pub fn with_default_timeout(host: impl Into<String>, port: u16) -> Self {
        Self::new(host, port, DEFAULT_TIMEOUT)
    }

    /// Read deadline in the form `TcpStream::set_read_timeout` expects:
    /// zero maps to `None` (block indefinitely).
    #[must_use]
    pub fn read_timeout(&self) -> Option<Duration> {
        (!self.timeout.is_zero()).then_some(self.timeout)
    }
}
