//! Protocol session: one connection per PING or INSTREAM command.

use std::io::Read;

use bytes::BytesMut;
use md5::{Digest, Md5};
use tracing::{debug, trace};

use crate::config::ClamdConfig;
use crate::error::{ClamdError, Result};
use crate::protocol::{
    self, CHUNK_SIZE, INSTREAM_HANDSHAKE, PING_HANDSHAKE, PONG_REPLY_LEN, TERMINATOR,
};
use crate::transport::{Connection, TcpConnection};

/// Result of one INSTREAM scan. Immutable; the connection that produced
/// it is already closed.
#[derive(Debug, Clone)]
pub struct ScanOutcome {
    /// Raw daemon reply, ASCII text.
    pub raw_reply: Vec<u8>,
    /// Lowercase hex MD5 of the streamed content. Incidental telemetry,
    /// not part of the verdict.
    pub content_hash: Option<String>,
    /// Verdict per [`protocol::is_clean_reply`].
    pub is_clean: bool,
}

impl ScanOutcome {
    /// The daemon reply as text, for logs and error surfaces.
    #[must_use]
    pub fn reply_text(&self) -> String {
        String::from_utf8_lossy(&self.raw_reply).into_owned()
    }
}

/// Client for a clamav daemon. Cheap to clone; safe to share across
/// threads since every call opens an independent connection.
#[derive(Debug, Clone)]
pub struct ClamdClient {
    config: ClamdConfig,
}

impl ClamdClient {
    #[must_use]
    pub const fn new(config: ClamdConfig) -> Self {
        Self { config }
    }

    /// Send PING and report whether the daemon answered PONG.
    ///
    /// A short or garbled reply is `Ok(false)`, not an error; only
    /// transport failures (connect, deadline) surface as `Err`.
    ///
    /// # Errors
    ///
    /// Returns `ClamdError::Transport` if the connection cannot be
    /// established or times out.
    pub fn ping(&self) -> Result<bool> {
        let mut conn = TcpConnection::connect(&self.config)?;
        run_ping(&mut conn)
    }

    /// Stream `source` to the daemon via INSTREAM and return the verdict.
    ///
    /// The whole content is never held in memory: it is read in
    /// [`CHUNK_SIZE`] blocks, framed, and forwarded, with an MD5 digest
    /// folded over the same bytes. The source is read to EOF and left
    /// there; the caller retains ownership of it.
    ///
    /// # Errors
    ///
    /// - `ClamdError::Transport` on any I/O failure.
    /// - `ClamdError::SizeLimitExceeded` when the daemon reports its
    ///   configured stream ceiling was hit.
    /// - `ClamdError::ProtocolAborted` when the daemon sends any other
    ///   reply before streaming finished.
    pub fn scan<R: Read + ?Sized>(&self, source: &mut R) -> Result<ScanOutcome> {
        let mut conn = TcpConnection::connect(&self.config)?;
        run_scan(&mut conn, source)
    }
}

/// Drive a ping over an open connection, closing it on every exit path.
fn run_ping<C: Connection>(conn: &mut C) -> Result<bool> {
    let result = ping_session(conn);
    conn.close();
    result
}

/// Drive a scan over an open connection, closing it on every exit path.
fn run_scan<C: Connection, R: Read + ?Sized>(conn: &mut C, source: &mut R) -> Result<ScanOutcome> {
    let outcome = scan_session(conn, source);
    conn.close();
    outcome
}

fn ping_session<C: Connection>(conn: &mut C) -> Result<bool> {
    conn.write_all(PING_HANDSHAKE)?;
    conn.flush()?;

    let mut reply = [0u8; PONG_REPLY_LEN];
    let mut filled = 0;
    while filled < PONG_REPLY_LEN {
        let read = conn.read(&mut reply[filled..])?;
        if read == 0 {
            break;
        }
        filled += read;
    }

    let pong = &reply[..filled] == b"PONG";
    debug!(pong, "ping complete");
    Ok(pong)
}

fn scan_session<C: Connection, R: Read + ?Sized>(
    conn: &mut C,
    source: &mut R,
) -> Result<ScanOutcome> {
    conn.write_all(INSTREAM_HANDSHAKE)?;
    conn.flush()?;

    let mut digest = Md5::new();
    let mut chunk = [0u8; CHUNK_SIZE];
    let mut frame = BytesMut::with_capacity(4 + CHUNK_SIZE);
    let mut streamed = 0usize;

    loop {
        let read = source.read(&mut chunk)?;
        if read == 0 {
            break;
        }

        frame.clear();
        protocol::encode_chunk(&chunk[..read], &mut frame)?;
        conn.write_all(&frame)?;
        digest.update(&chunk[..read]);
        streamed += read;

        // An unsolicited reply mid-stream means the daemon aborted,
        // almost always a StreamMaxLength breach. Stop sending.
        if conn.available()? > 0 {
            let reply = protocol::read_reply(conn)?;
            protocol::check_size_limit(&reply)?;
            let text = String::from_utf8_lossy(&reply).into_owned();
            debug!(streamed, reply = %text, "daemon aborted scan mid-stream");
            return Err(ClamdError::ProtocolAborted(text));
        }
    }

    conn.write_all(&TERMINATOR)?;
    conn.flush()?;
    trace!(streamed, "stream terminated, awaiting verdict");

    let content_hash = hex::encode(digest.finalize());

    let raw_reply = protocol::read_reply(conn)?;
    protocol::check_size_limit(&raw_reply)?;
    let is_clean = protocol::is_clean_reply(&raw_reply);
    debug!(
        streamed,
        is_clean,
        reply = %String::from_utf8_lossy(&raw_reply),
        "scan complete"
    );

    Ok(ScanOutcome {
        raw_reply,
        content_hash: (!content_hash.is_empty()).then_some(content_hash),
        is_clean,
    })
}
