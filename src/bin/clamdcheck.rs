//! clamdcheck - ping a clamav daemon or stream a file to it for scanning.

use std::fs::File;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use clamd_client::{ClamdClient, ClamdConfig, ClamdError, ScanOutcome};
use tracing::debug;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser)]
#[command(name = "clamdcheck", about = "Stream content to a ClamAV daemon for scanning")]
struct Cli {
    /// Hostname of the machine running clamd
    #[arg(long, env = "CLAMD_HOST", default_value = "localhost")]
    host: String,

    /// TCP port clamd listens on
    #[arg(long, env = "CLAMD_PORT", default_value = "3310")]
    port: u16,

    /// Socket read timeout in milliseconds; 0 waits forever
    #[arg(long, env = "CLAMD_TIMEOUT_MS", default_value = "2000")]
    timeout_ms: i64,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Check daemon liveness, exit 0 on PONG
    Ping,
    /// Stream a file (or `-` for stdin), exit 0 clean / 1 infected
    Scan {
        #[arg(name = "FILE")]
        file: PathBuf,
    },
}

fn init_tracing() {
    let filter = EnvFilter::try_from_env("CLAMD_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
    fmt().with_env_filter(filter).init();
}

fn main() -> ExitCode {
    init_tracing();
    let cli = Cli::parse();

    let config = match ClamdConfig::from_millis(cli.host, cli.port, cli.timeout_ms) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("clamdcheck: {e}");
            return ExitCode::from(2);
        }
    };
    let client = ClamdClient::new(config);

    match cli.command {
        Command::Ping => run_ping(&client),
        Command::Scan { file } => run_scan(&client, &file),
    }
}

fn run_ping(client: &ClamdClient) -> ExitCode {
    match client.ping() {
        Ok(true) => {
            println!("PONG");
            ExitCode::SUCCESS
        }
        Ok(false) => {
            eprintln!("clamdcheck: daemon did not answer PONG");
            ExitCode::FAILURE
        }
        Err(e) => {
            eprintln!("clamdcheck: {e}");
            ExitCode::from(2)
        }
    }
}

fn run_scan(client: &ClamdClient, file: &Path) -> ExitCode {
    debug!(file = %file.display(), "scanning");
    let result = if file == Path::new("-") {
        client.scan(&mut std::io::stdin().lock())
    } else {
        match File::open(file) {
            Ok(mut f) => client.scan(&mut f),
            Err(e) => {
                eprintln!("clamdcheck: cannot open {}: {e}", file.display());
                return ExitCode::from(2);
            }
        }
    };

    match result {
        Ok(outcome) => report(&outcome),
        Err(e @ ClamdError::SizeLimitExceeded(_)) => {
            // Callers commonly reject the upload on this one rather than
            // treating it as an infrastructure fault.
            eprintln!("clamdcheck: upload too large for daemon: {e}");
            ExitCode::from(2)
        }
        Err(e) => {
            eprintln!("clamdcheck: {e}");
            ExitCode::from(2)
        }
    }
}

fn report(outcome: &ScanOutcome) -> ExitCode {
    let reply = outcome.reply_text();
    println!("{}", reply.trim_end_matches(['\0', '\n']));
    if let Some(ref hash) = outcome.content_hash {
        println!("md5: {hash}");
    }
    if outcome.is_clean {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}
