//! Client-side reliable exchange engine (stop-and-wait ARQ).
//!
//! [`Exchange`] owns the client socket and the sequence counter.  Each call
//! sends exactly one logical frame and waits for the acknowledgment carrying
//! the same sequence number:
//!
//! - The sequence number advances once per call, never on retransmission.
//! - Every (re)transmission carries a fresh wall-clock timestamp.
//! - Frames that are malformed, carry another sequence number, or come from
//!   the wrong endpoint are discarded while waiting.
//! - After [`TimerConfig::max_transmissions`] unanswered sends the call fails
//!   with [`TransferError::Timeout`].
//!
//! At most one frame is ever in flight; `&mut self` makes that structural.

use std::net::SocketAddr;

use tokio::time::{timeout_at, Instant};

use crate::error::TransferError;
use crate::frame::{wall_clock_stamp, Frame, FrameError, Header, Opcode, MAX_PAYLOAD};
use crate::socket::{Socket, SocketError};
use crate::timer::{RetryBudget, TimerConfig};

/// The acknowledgment that completed an exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub header: Header,
    pub payload: Vec<u8>,
    /// Endpoint the reply came from.
    pub from: SocketAddr,
}

/// Which sources may answer an outstanding frame.
#[derive(Debug, Clone, Copy)]
enum ReplySource {
    /// Only the endpoint the frame was sent to.
    Destination,
    /// Any endpoint (a write request is answered by a freshly bound session).
    Any,
}

/// Stop-and-wait send/await-ack engine for one client.
#[derive(Debug)]
pub struct Exchange {
    socket: Socket,
    /// Sequence number of the last frame sent (0 before the first call).
    seq: u32,
    config: TimerConfig,
}

impl Exchange {
    pub fn new(socket: Socket, config: TimerConfig) -> Self {
        Self {
            socket,
            seq: 0,
            config,
        }
    }

    /// Sequence number of the most recent call.
    pub fn sequence(&self) -> u32 {
        self.seq
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.socket.local_addr
    }

    /// Send one frame to `dest` and wait for its acknowledgment from `dest`.
    pub async fn exchange(
        &mut self,
        opcode: Opcode,
        payload: &[u8],
        dest: SocketAddr,
    ) -> Result<Reply, TransferError> {
        self.transact(opcode, payload, dest, ReplySource::Destination)
            .await
    }

    /// Like [`Exchange::exchange`], but the acknowledgment may come from any
    /// endpoint; [`Reply::from`] tells the caller where the peer now lives.
    pub async fn request(
        &mut self,
        opcode: Opcode,
        payload: &[u8],
        dest: SocketAddr,
    ) -> Result<Reply, TransferError> {
        self.transact(opcode, payload, dest, ReplySource::Any).await
    }

    async fn transact(
        &mut self,
        opcode: Opcode,
        payload: &[u8],
        dest: SocketAddr,
        source: ReplySource,
    ) -> Result<Reply, TransferError> {
        if payload.len() > MAX_PAYLOAD {
            return Err(FrameError::PayloadTooLarge { len: payload.len() }.into());
        }

        self.seq = self.seq.wrapping_add(1);
        let seq = self.seq;
        let mut budget = RetryBudget::new(&self.config);

        loop {
            let frame = Frame::new(opcode, seq, wall_clock_stamp(), payload.to_vec());
            self.socket
                .send_to(&frame, dest)
                .await
                .map_err(TransferError::socket("send"))?;
            budget.record_transmission();
            log::debug!(
                "[exchange] → {} seq={} len={} to {} (tx #{})",
                opcode,
                seq,
                payload.len(),
                dest,
                budget.transmissions()
            );

            let deadline = Instant::now() + self.config.ack_timeout;
            match timeout_at(deadline, self.await_reply(seq, dest, source)).await {
                Ok(result) => return result,
                Err(_elapsed) if budget.exhausted() => {
                    log::warn!(
                        "[exchange] no response for seq={} after {} transmissions, giving up",
                        seq,
                        budget.transmissions()
                    );
                    return Err(TransferError::Timeout {
                        seq,
                        transmissions: budget.transmissions(),
                    });
                }
                Err(_elapsed) => {
                    log::debug!("[exchange] timeout on seq={}, retransmitting", seq);
                }
            }
        }
    }

    /// Receive until a frame acknowledging `seq` arrives from an acceptable source.
    async fn await_reply(
        &self,
        seq: u32,
        dest: SocketAddr,
        source: ReplySource,
    ) -> Result<Reply, TransferError> {
        loop {
            let (frame, from) = match self.socket.recv_from().await {
                Ok(received) => received,
                Err(SocketError::Frame(e)) => {
                    log::warn!("[exchange] dropping malformed datagram: {e}");
                    continue;
                }
                Err(SocketError::Io(e)) => {
                    return Err(TransferError::Resource {
                        op: "recv",
                        source: e,
                    })
                }
            };

            if matches!(source, ReplySource::Destination) && from != dest {
                log::debug!("[exchange] ignoring frame from unexpected peer {from}");
                continue;
            }
            if frame.header.seq != seq {
                log::debug!(
                    "[exchange] ← {} seq={} does not match outstanding seq={}",
                    frame.header.opcode,
                    frame.header.seq,
                    seq
                );
                continue;
            }

            log::debug!("[exchange] ← {} seq={} from {}", frame.header.opcode, seq, from);
            return Ok(Reply {
                header: frame.header,
                payload: frame.payload,
                from,
            });
        }
    }
}
