//! Wire protocol for the clamd TCP interface.
//!
//! Wire format (INSTREAM):
//! - Handshake: literal `zINSTREAM\0`
//! - Data: chunks of `[4B length, big-endian u32][payload...]`
//! - Terminator: a zero-length chunk (`[0, 0, 0, 0]`)
//! - Reply: informal ASCII text, e.g. `stream: OK` or
//!   `stream: Eicar-Test-Signature FOUND`
//!
//! PING is simpler: literal `zPING\0` out, ASCII `PONG` back.

use std::io;

use bytes::BufMut;

use crate::error::{ClamdError, Result};
use crate::transport::Connection;

/// Chunk payload ceiling. Kept well under clamd's `StreamMaxLength` so the
/// daemon signals any size breach via its reply, not a dropped connection.
pub const CHUNK_SIZE: usize = 2048;

/// Exact length of the daemon's ping reply.
pub const PONG_REPLY_LEN: usize = 4;

pub const PING_HANDSHAKE: &[u8] = b"zPING\0";
pub const INSTREAM_HANDSHAKE: &[u8] = b"zINSTREAM\0";

/// Zero-length chunk ending an INSTREAM transfer.
pub const TERMINATOR: [u8; 4] = [0, 0, 0, 0];

const SIZE_LIMIT_PREFIX: &str = "INSTREAM size limit exceeded.";

/// Scratch buffer size for reply reads.
const REPLY_BUF_LEN: usize = 2000;

/// Frame one data chunk: 4-byte big-endian length prefix, then the payload.
///
/// # Errors
///
/// Returns an error if the payload length does not fit the prefix; callers
/// feed at most [`CHUNK_SIZE`] bytes so this does not happen in practice.
pub fn encode_chunk(payload: &[u8], buf: &mut impl BufMut) -> io::Result<()> {
    let len = u32::try_from(payload.len())
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidData, "chunk payload too large"))?;
    buf.put_u32(len);
    buf.put_slice(payload);
    Ok(())
}

/// Read one logical reply: whatever arrived for this exchange.
///
/// Loops a blocking read (bounded by the connection deadline), then keeps
/// reading only while the last read was positive and more bytes are already
/// buffered. This bounds the read without requiring the daemon to close the
/// connection, and serves both the abort-path drain and the final reply.
///
/// # Errors
///
/// Returns an error if a read fails or the deadline expires.
pub fn read_reply<C: Connection + ?Sized>(conn: &mut C) -> io::Result<Vec<u8>> {
    let mut reply = Vec::new();
    let mut buf = [0u8; REPLY_BUF_LEN];
    loop {
        let read = conn.read(&mut buf)?;
        reply.extend_from_slice(&buf[..read]);
        if read == 0 || conn.available()? == 0 {
            break;
        }
    }
    Ok(reply)
}

/// Fail with `SizeLimitExceeded` if the daemon reports its configured
/// stream ceiling was hit. Runs on every reply read, before any other
/// interpretation.
///
/// # Errors
///
/// Returns `ClamdError::SizeLimitExceeded` carrying the full reply text.
pub fn check_size_limit(reply: &[u8]) -> Result<()> {
    let text = String::from_utf8_lossy(reply);
    if text.starts_with(SIZE_LIMIT_PREFIX) {
        return Err(ClamdError::SizeLimitExceeded(text.into_owned()));
    }
    Ok(())
}

/// Classify a daemon reply as clean. Pure, never fails; malformed text is
/// simply not clean.
///
/// The check is substring-based on purpose: the reply grammar is informal
/// and varies across daemon versions, so `OK` without `FOUND` is as much
/// structure as can be relied on.
#[must_use]
pub fn is_clean_reply(reply: &[u8]) -> bool {
    let text = String::from_utf8_lossy(reply);
    text.contains("OK") && !text.contains("FOUND")
}
