//! TCP transport for daemon communication.
//!
//! The protocol layer talks to a [`Connection`], an opaque bidirectional
//! byte channel. The one capability beyond `Read + Write` is
//! [`Connection::available`]: the INSTREAM session must poll for an
//! unsolicited early reply while its write side is still active, so the
//! channel has to report buffered unread bytes without blocking.

use std::io::{self, Read, Write};
use std::net::{Shutdown, TcpStream};

use tracing::{trace, warn};

use crate::config::ClamdConfig;

/// Bidirectional byte channel to the daemon.
pub trait Connection: Read + Write {
    /// Number of inbound bytes readable right now without blocking.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying channel cannot be probed.
    fn available(&mut self) -> io::Result<usize>;

    /// Best-effort teardown. Failures here are logged and swallowed so
    /// they never mask the primary result of the session.
    fn close(&mut self);
}

pub struct TcpConnection {
    stream: TcpStream,
}

impl TcpConnection {
    /// Open a fresh connection and apply the configured read deadline.
    /// One connection serves exactly one command; there is no pooling.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection cannot be established or the
    /// deadline cannot be set.
    pub fn connect(config: &ClamdConfig) -> io::Result<Self> {
        trace!(host = %config.host, port = config.port, "connecting to clamd");
        let stream = TcpStream::connect((config.host.as_str(), config.port))?;
        stream.set_read_timeout(config.read_timeout())?;
        Ok(Self { stream })
    }
}

impl Read for TcpConnection {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.stream.read(buf)
    }
}

impl Write for TcpConnection {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.stream.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.stream.flush()
    }
}

impl Connection for TcpConnection {
    fn available(&mut self) -> io::Result<usize> {
        // A non-blocking peek leaves the probed bytes in the kernel
        // buffer for the subsequent real read.
        self.stream.set_nonblocking(true)?;
        let mut probe = [0u8; 512];
        let peeked = match self.stream.peek(&mut probe) {
            Ok(n) => Ok(n),
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => Ok(0),
            Err(e) => Err(e),
        };
        let restore = self.stream.set_nonblocking(false);
        let n = peeked?;
        restore?;
        Ok(n)
    }

    fn close(&mut self) {
        if let Err(e) = self.stream.shutdown(Shutdown::Both) {
            warn!(%e, "error closing clamd connection");
        }
    }
}
