//! Async UDP socket abstraction.
//!
//! [`Socket`] is a thin wrapper around `tokio::net::UdpSocket` that speaks
//! [`crate::frame::Frame`] instead of raw bytes.  All protocol logic lives
//! elsewhere; this module owns only byte I/O.

use std::net::SocketAddr;

use thiserror::Error;
use tokio::net::UdpSocket;

use crate::frame::{Frame, FrameError, MAX_FRAME};

/// Errors that can arise from socket operations.
#[derive(Debug, Error)]
pub enum SocketError {
    /// Underlying I/O error from the OS.
    #[error("socket I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// A datagram could not be encoded or decoded as a frame.
    #[error("frame error: {0}")]
    Frame(#[from] FrameError),
}

/// An async, frame-oriented UDP socket.
#[derive(Debug)]
pub struct Socket {
    /// Address this socket is bound to (filled in after OS assigns ephemeral port).
    pub local_addr: SocketAddr,
    inner: UdpSocket,
}

impl Socket {
    /// Bind a new socket to `local_addr`.
    ///
    /// Passing `0.0.0.0:0` lets the OS choose an ephemeral port.
    pub async fn bind(local_addr: SocketAddr) -> Result<Self, SocketError> {
        let inner = UdpSocket::bind(local_addr).await?;
        let local_addr = inner.local_addr()?;
        Ok(Self { local_addr, inner })
    }

    /// Restrict this socket to datagrams from `peer`.
    pub async fn connect(&self, peer: SocketAddr) -> Result<(), SocketError> {
        self.inner.connect(peer).await?;
        Ok(())
    }

    /// Encode `frame` and send it as a single UDP datagram to `dest`.
    pub async fn send_to(&self, frame: &Frame, dest: SocketAddr) -> Result<(), SocketError> {
        let bytes = frame.encode()?;
        self.inner.send_to(&bytes, dest).await?;
        Ok(())
    }

    /// Send `frame` to the peer set by [`Socket::connect`].
    pub async fn send(&self, frame: &Frame) -> Result<(), SocketError> {
        let bytes = frame.encode()?;
        self.inner.send(&bytes).await?;
        Ok(())
    }

    /// Receive the next datagram and decode it into a [`Frame`].
    ///
    /// Returns `(frame, sender_address)`.  Datagrams that fail to decode are
    /// returned as [`SocketError::Frame`]; the caller decides whether to keep
    /// listening.
    pub async fn recv_from(&self) -> Result<(Frame, SocketAddr), SocketError> {
        let mut buf = [0u8; MAX_FRAME + 1];
        let (n, addr) = self.inner.recv_from(&mut buf).await?;
        let frame = Frame::decode(&buf[..n])?;
        Ok((frame, addr))
    }
}
