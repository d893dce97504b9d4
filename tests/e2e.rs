//! End-to-end tests against a fake clamd speaking the wire protocol on a
//! loopback TCP listener.

use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::thread::JoinHandle;
use std::time::Duration;

use md5::{Digest, Md5};

use clamd_client::{ClamdClient, ClamdConfig, ClamdError};

const EMPTY_MD5: &str = "d41d8cd98f00b204e9800998ecf8427e";

fn client_with_timeout(port: u16, timeout: Duration) -> ClamdClient {
    ClamdClient::new(ClamdConfig::new("127.0.0.1", port, timeout))
}

fn client(port: u16) -> ClamdClient {
    client_with_timeout(port, Duration::from_secs(2))
}

/// Run `handler` against the first accepted connection.
fn spawn_daemon<F>(handler: F) -> (u16, JoinHandle<()>)
where
    F: FnOnce(TcpStream) + Send + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    let handle = std::thread::spawn(move || {
        let (stream, _) = listener.accept().unwrap();
        handler(stream);
    });
    (port, handle)
}

fn read_exact_bytes(stream: &mut TcpStream, n: usize) -> Vec<u8> {
    let mut buf = vec![0u8; n];
    stream.read_exact(&mut buf).unwrap();
    buf
}

/// Read INSTREAM chunks until the zero-length terminator; returns the
/// reassembled content.
fn read_instream_body(stream: &mut TcpStream) -> Vec<u8> {
    let mut content = Vec::new();
    loop {
        let prefix = read_exact_bytes(stream, 4);
        let len = u32::from_be_bytes([prefix[0], prefix[1], prefix[2], prefix[3]]) as usize;
        if len == 0 {
            return content;
        }
        content.extend_from_slice(&read_exact_bytes(stream, len));
    }
}

fn expect_instream_handshake(stream: &mut TcpStream) {
    assert_eq!(read_exact_bytes(stream, 10), b"zINSTREAM\0");
}

// ─── ping ────────────────────────────────────────────────────────────────

#[test]
fn ping_pong() {
    let (port, handle) = spawn_daemon(|mut stream| {
        assert_eq!(read_exact_bytes(&mut stream, 6), b"zPING\0");
        stream.write_all(b"PONG").unwrap();
    });

    assert!(client(port).ping().unwrap());
    handle.join().unwrap();
}

#[test]
fn ping_wrong_reply_is_false() {
    let (port, handle) = spawn_daemon(|mut stream| {
        let _ = read_exact_bytes(&mut stream, 6);
        stream.write_all(b"GONP").unwrap();
    });

    assert!(!client(port).ping().unwrap());
    handle.join().unwrap();
}

#[test]
fn ping_short_reply_is_false() {
    let (port, handle) = spawn_daemon(|mut stream| {
        let _ = read_exact_bytes(&mut stream, 6);
        stream.write_all(b"PO").unwrap();
        // Close so the client's accumulate loop sees EOF.
    });

    assert!(!client(port).ping().unwrap());
    handle.join().unwrap();
}

#[test]
fn ping_silence_times_out_as_transport_error() {
    let (port, handle) = spawn_daemon(|mut stream| {
        let _ = read_exact_bytes(&mut stream, 6);
        // Never reply; hold the connection open past the client deadline.
        std::thread::sleep(Duration::from_millis(500));
    });

    let err = client_with_timeout(port, Duration::from_millis(100))
        .ping()
        .unwrap_err();
    assert!(matches!(err, ClamdError::Transport(_)));
    handle.join().unwrap();
}

#[test]
fn ping_connection_refused() {
    let port = {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    };
    let err = client(port).ping().unwrap_err();
    assert!(matches!(err, ClamdError::Transport(_)));
}

// ─── scan ────────────────────────────────────────────────────────────────

#[test]
fn scan_clean_verdict_and_hash() {
    let content: Vec<u8> = (0..10_000u32).map(|i| (i % 253) as u8).collect();
    let expected = content.clone();

    let (port, handle) = spawn_daemon(move |mut stream| {
        expect_instream_handshake(&mut stream);
        assert_eq!(read_instream_body(&mut stream), expected);
        stream.write_all(b"stream: OK\0").unwrap();
    });

    let outcome = client(port).scan(&mut content.as_slice()).unwrap();
    assert!(outcome.is_clean);
    assert_eq!(
        outcome.content_hash.as_deref(),
        Some(hex::encode(Md5::digest(&content)).as_str())
    );
    assert_eq!(outcome.raw_reply, b"stream: OK\0");
    handle.join().unwrap();
}

#[test]
fn scan_infected_verdict() {
    let (port, handle) = spawn_daemon(|mut stream| {
        expect_instream_handshake(&mut stream);
        let _ = read_instream_body(&mut stream);
        stream
            .write_all(b"stream: Eicar-Test-Signature FOUND\0")
            .unwrap();
    });

    let outcome = client(port)
        .scan(&mut b"definitely a virus".as_slice())
        .unwrap();
    assert!(!outcome.is_clean);
    assert!(outcome.reply_text().contains("FOUND"));
    handle.join().unwrap();
}

#[test]
fn scan_empty_source() {
    let (port, handle) = spawn_daemon(|mut stream| {
        expect_instream_handshake(&mut stream);
        assert!(read_instream_body(&mut stream).is_empty());
        stream.write_all(b"stream: OK\0").unwrap();
    });

    let outcome = client(port).scan(&mut std::io::empty()).unwrap();
    assert!(outcome.is_clean);
    assert_eq!(outcome.content_hash.as_deref(), Some(EMPTY_MD5));
    handle.join().unwrap();
}

#[test]
fn scan_early_size_limit_abort() {
    // Daemon bails after the first chunk, like clamd does when
    // StreamMaxLength is exceeded. It keeps draining afterwards so the
    // client is never blocked on a full send buffer.
    let (port, handle) = spawn_daemon(|mut stream| {
        expect_instream_handshake(&mut stream);
        let prefix = read_exact_bytes(&mut stream, 4);
        let len = u32::from_be_bytes([prefix[0], prefix[1], prefix[2], prefix[3]]) as usize;
        let _ = read_exact_bytes(&mut stream, len);
        stream
            .write_all(b"INSTREAM size limit exceeded. ERROR\0")
            .unwrap();
        let mut sink = Vec::new();
        let _ = stream.read_to_end(&mut sink);
    });

    // Large enough that the client cannot finish before the early reply
    // lands, regardless of socket buffer sizes.
    let content = vec![0x41u8; 8 * 1024 * 1024];
    let err = client(port).scan(&mut content.as_slice()).unwrap_err();
    assert!(matches!(
        err,
        ClamdError::SizeLimitExceeded(ref text) if text.starts_with("INSTREAM size limit exceeded.")
    ));
    handle.join().unwrap();
}

#[test]
fn scan_size_limit_on_final_reply() {
    let (port, handle) = spawn_daemon(|mut stream| {
        expect_instream_handshake(&mut stream);
        let _ = read_instream_body(&mut stream);
        stream
            .write_all(b"INSTREAM size limit exceeded. ERROR\0")
            .unwrap();
    });

    let err = client(port).scan(&mut b"abc".as_slice()).unwrap_err();
    assert!(matches!(err, ClamdError::SizeLimitExceeded(_)));
    handle.join().unwrap();
}

#[test]
fn same_client_serves_many_scans() {
    // One fresh connection per scan; the client itself is reusable.
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    let handle = std::thread::spawn(move || {
        for _ in 0..2 {
            let (mut stream, _) = listener.accept().unwrap();
            expect_instream_handshake(&mut stream);
            let _ = read_instream_body(&mut stream);
            stream.write_all(b"stream: OK\0").unwrap();
        }
    });

    let client = client(port);
    for _ in 0..2 {
        let mut source = b"same client, new connection".as_slice();
        let outcome = client.scan(&mut source).unwrap();
        assert!(outcome.is_clean);
        assert!(source.is_empty(), "source should be read to EOF");
    }
    handle.join().unwrap();
}
