//! Entry point for `udp-file-transfer`.
//!
//! Parses CLI arguments and dispatches into either **server** or **client** mode.
//! All actual protocol work is delegated to library modules; `main.rs` owns only
//! process setup (logging, signal handling, argument parsing).

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use udp_file_transfer::{
    config::{BASE_PORT, SERVER_PORT},
    timer::TimerConfig,
    ChunkMode, Client, ClientConfig, Dispatcher, ServerConfig, SessionConfig,
};

/// Reliable stop-and-wait file transfer over UDP.
#[derive(Parser)]
#[command(author, version, about)]
struct Cli {
    #[command(subcommand)]
    mode: Mode,
}

#[derive(Subcommand)]
enum Mode {
    /// Run as a server, accepting files from clients.
    Server {
        /// Well-known address for write requests.
        #[arg(short, long, default_value_t = SocketAddr::from(([0, 0, 0, 0], SERVER_PORT)))]
        listen: SocketAddr,
        /// Session N listens on BASE_PORT + N.
        #[arg(long, default_value_t = BASE_PORT)]
        base_port: u16,
        /// Directory received files are written to.
        #[arg(short, long, default_value = ".")]
        output_dir: PathBuf,
        /// Abort sessions idle for this many seconds (0 disables).
        #[arg(long, default_value_t = 120)]
        idle_timeout_secs: u64,
    },
    /// Push a file to a server.
    Client {
        /// Server address as host:port.
        server: String,
        /// File to send.
        file: PathBuf,
        /// Local address for the client socket.
        #[arg(long, default_value = "0.0.0.0:0")]
        bind: SocketAddr,
        /// Wait this long for each acknowledgment.
        #[arg(long, default_value_t = 3000)]
        ack_timeout_ms: u64,
        /// Transmissions of one frame before giving up.
        #[arg(long, default_value_t = 3)]
        max_transmissions: u32,
        /// Send fixed-size opaque chunks instead of lines.
        #[arg(long)]
        binary: bool,
    },
}

#[tokio::main]
async fn main() {
    // Initialise env_logger; set RUST_LOG to control verbosity.
    env_logger::init();

    let cli = Cli::parse();
    let outcome = match cli.mode {
        Mode::Server {
            listen,
            base_port,
            output_dir,
            idle_timeout_secs,
        } => {
            let config = ServerConfig {
                listen,
                base_port,
                output_dir,
                session: SessionConfig {
                    idle_timeout: (idle_timeout_secs > 0)
                        .then(|| Duration::from_secs(idle_timeout_secs)),
                },
            };
            serve(config).await
        }
        Mode::Client {
            server,
            file,
            bind,
            ack_timeout_ms,
            max_transmissions,
            binary,
        } => {
            let config = ClientConfig {
                bind,
                timer: TimerConfig {
                    ack_timeout: Duration::from_millis(ack_timeout_ms),
                    max_transmissions,
                },
                chunking: if binary {
                    ChunkMode::Fixed
                } else {
                    ChunkMode::Lines
                },
            };
            send(&server, &file, config).await
        }
    };

    if let Err(e) = outcome {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}

async fn serve(config: ServerConfig) -> Result<()> {
    let dispatcher = Dispatcher::bind(config)
        .await
        .context("starting dispatcher")?;
    tokio::select! {
        result = dispatcher.run() => result.context("dispatcher"),
        _ = tokio::signal::ctrl_c() => {
            log::info!("Interrupted, shutting down");
            Ok(())
        }
    }
}

async fn send(server: &str, file: &Path, config: ClientConfig) -> Result<()> {
    let server_addr = tokio::net::lookup_host(server)
        .await
        .with_context(|| format!("resolving {server}"))?
        .next()
        .with_context(|| format!("no address for {server}"))?;

    let mut client = Client::bind(config).await.context("creating client socket")?;
    let report = client
        .send_file(file, server_addr)
        .await
        .with_context(|| format!("sending {}", file.display()))?;
    log::info!(
        "Transferred {} bytes in {} frames via {}",
        report.bytes,
        report.data_frames,
        report.session
    );
    Ok(())
}
