//! Error taxonomy for clamd sessions.

pub type Result<T> = std::result::Result<T, ClamdError>;

#[derive(Debug, thiserror::Error)]
pub enum ClamdError {
    /// Rejected at construction, before anything touches the network.
    #[error("negative timeout value does not make sense: {0} ms")]
    InvalidTimeout(i64),
    /// Connection refused/reset, read/write failure, or deadline exceeded.
    #[error("clamd transport: {0}")]
    Transport(#[from] std::io::Error),
    /// The daemon reported its configured stream size ceiling was exceeded.
    /// Carries the full reply text for diagnostics.
    #[error("clamd size limit exceeded, full reply from server: {0}")]
    SizeLimitExceeded(String),
    /// The daemon replied before the client finished streaming, with
    /// something other than the size limit message. Carries the reply text.
    #[error("scan aborted, reply from server: {0}")]
    ProtocolAborted(String),
}

impl ClamdError {
    /// True for errors where the daemon itself cut the scan short
    /// (as opposed to an infrastructure fault).
    #[must_use]
    pub const fn is_daemon_abort(&self) -> bool {
        matches!(self, Self::SizeLimitExceeded(_) | Self::ProtocolAborted(_))
    }
}
