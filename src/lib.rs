//! `udp-file-transfer` — stop-and-wait reliable file push over UDP.
//!
//! # Architecture
//!
//! ```text
//!   Client                               Server
//!  ┌──────────────┐   WRQ    ┌──────────────────────────┐
//!  │   Exchange   │─────────▶│ Dispatcher (well-known)  │
//!  │ (seq, retry) │          └────────────┬─────────────┘
//!  │              │                       │ spawn task
//!  │              │   ACK    ┌────────────▼─────────────┐
//!  │              │◀─────────│ Session (base_port + n)  │
//!  │              │ DATA/END │   owns socket + file     │
//!  │              │─────────▶│                          │
//!  └──────────────┘◀─────────└──────────────────────────┘
//!                     ACK
//! ```
//!
//! Each module has a single responsibility:
//! - [`frame`]       — wire format (encode / decode)
//! - [`socket`]      — async UDP socket speaking frames
//! - [`timer`]       — acknowledgment timeout and transmission budget
//! - [`exchange`]    — client send / await-ack / retransmit engine
//! - [`client`]      — file transfer driver and chunking
//! - [`state`]       — session finite-state machine types
//! - [`session`]     — per-client receive / ack / terminate loop
//! - [`dispatcher`]  — write-request admission and session spawning
//! - [`config`]      — runtime configuration
//! - [`error`]       — error taxonomy

pub mod client;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod exchange;
pub mod frame;
pub mod session;
pub mod socket;
pub mod state;
pub mod timer;

pub use client::{Client, TransferReport};
pub use config::{ChunkMode, ClientConfig, ServerConfig, SessionConfig};
pub use dispatcher::Dispatcher;
pub use error::TransferError;
