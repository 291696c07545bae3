//! Error taxonomy shared by the client engine, sessions and the dispatcher.

use std::io;
use std::time::Duration;

use thiserror::Error;

use crate::frame::{FrameError, Opcode};
use crate::socket::SocketError;
use crate::state::SessionState;

#[derive(Debug, Error)]
pub enum TransferError {
    /// No matching acknowledgment after the last allowed transmission.
    #[error("no acknowledgment for seq {seq} after {transmissions} transmissions")]
    Timeout { seq: u32, transmissions: u32 },

    /// Opcode the session cannot legally process in its current state.
    #[error("unexpected {opcode} frame while {state}")]
    ProtocolViolation { opcode: Opcode, state: SessionState },

    /// Transport or storage primitive failure.
    #[error("{op}: {source}")]
    Resource {
        op: &'static str,
        #[source]
        source: io::Error,
    },

    #[error("invalid file name {0:?}")]
    InvalidFilename(String),

    #[error("no frame from client for {0:?}")]
    SessionIdle(Duration),

    #[error("session port range above {base_port} is exhausted")]
    PortsExhausted { base_port: u16 },

    #[error(transparent)]
    Frame(#[from] FrameError),
}

impl TransferError {
    /// Adapter for `map_err` on plain I/O results.
    pub(crate) fn io(op: &'static str) -> impl FnOnce(io::Error) -> Self {
        move |source| Self::Resource { op, source }
    }

    /// Adapter for `map_err` on socket results.
    pub(crate) fn socket(op: &'static str) -> impl FnOnce(SocketError) -> Self {
        move |err| match err {
            SocketError::Io(source) => Self::Resource { op, source },
            SocketError::Frame(e) => Self::Frame(e),
        }
    }
}
