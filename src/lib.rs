//! Streaming client for the ClamAV daemon (clamd) wire protocol.
//!
//! Implements the `INSTREAM` and `PING` commands over a plain TCP socket.
//! Content is forwarded in length-prefixed chunks so a file or upload
//! stream can be scanned without staging it on disk or holding it in
//! memory. Each call opens one fresh connection; a [`ClamdClient`] is
//! immutable and can be shared freely across threads.
//!
//! ```no_run
//! use clamd_client::{ClamdClient, ClamdConfig};
//!
//! # fn main() -> clamd_client::Result<()> {
//! let client = ClamdClient::new(ClamdConfig::with_default_timeout("localhost", 3310));
//! assert!(client.ping()?);
//!
//! let mut file = std::fs::File::open("upload.bin")?;
//! let outcome = client.scan(&mut file)?;
//! if !outcome.is_clean {
//!     eprintln!("rejected: {}", outcome.reply_text());
//! }
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod config;
pub mod error;
pub mod protocol;
pub mod transport;

pub use client::{ClamdClient, ScanOutcome};
pub use config::ClamdConfig;
pub use error::{ClamdError, Result};
pub use protocol::is_clean_reply;
