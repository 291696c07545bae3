//! Runtime configuration for both ends of a transfer.
//!
//! Every struct has a `Default` matching the reference deployment; `main.rs`
//! overrides individual fields from command-line flags.

use std::net::{Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

use crate::timer::TimerConfig;

/// Well-known port the dispatcher listens on for write requests.
pub const SERVER_PORT: u16 = 9877;

/// Session ports are `BASE_PORT + admission counter`.
pub const BASE_PORT: u16 = 9900;

/// How the client cuts the source file into Data frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChunkMode {
    /// One frame per text line (newline included); long lines are split.
    #[default]
    Lines,
    /// Opaque fixed-size chunks of [`crate::frame::MAX_PAYLOAD`] bytes.
    Fixed,
}

#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Local address for the client socket.
    pub bind: SocketAddr,
    pub timer: TimerConfig,
    pub chunking: ChunkMode,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            bind: SocketAddr::from((Ipv4Addr::UNSPECIFIED, 0)),
            timer: TimerConfig::default(),
            chunking: ChunkMode::default(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Abort a session that receives nothing for this long (`None` waits forever).
    pub idle_timeout: Option<Duration>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            idle_timeout: Some(Duration::from_secs(120)),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Well-known endpoint for write requests.
    pub listen: SocketAddr,
    pub base_port: u16,
    /// Directory that received files are created in.
    pub output_dir: PathBuf,
    pub session: SessionConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: SocketAddr::from((Ipv4Addr::UNSPECIFIED, SERVER_PORT)),
            base_port: BASE_PORT,
            output_dir: PathBuf::from("."),
            session: SessionConfig::default(),
        }
    }
}
