//! Server-side transfer session.
//!
//! A [`Session`] is created by [`crate::dispatcher::Dispatcher`] for every
//! admitted write request.  It owns a socket bound to its own endpoint
//! (connected to the requesting client) and the output file, and shares
//! nothing with other sessions.
//!
//! Lifecycle:
//! 1. [`Session::establish`] binds the endpoint, creates the output file and
//!    acknowledges the write request *from the new endpoint*.
//! 2. [`Session::run`] receives frames until END:
//!    - `DATA` — append the payload, flush, acknowledge.
//!    - `END`  — close the file, acknowledge, terminate.
//!    - anything else — [`TransferError::ProtocolViolation`], no ACK.
//!
//! Every accepted frame gets exactly one ACK echoing its sequence number
//! and timestamp.  A DATA frame whose sequence number is not newer than the
//! last accepted one (a retransmission after a lost ACK, or a delayed copy)
//! is acknowledged again but not written twice.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use tokio::fs::File;
use tokio::io::AsyncWriteExt;

use crate::config::SessionConfig;
use crate::error::TransferError;
use crate::frame::{Frame, Header, Opcode};
use crate::socket::{Socket, SocketError};
use crate::state::SessionState;

/// Everything a session needs to start, captured by the dispatcher at
/// admission time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Admission {
    /// Value of the admission counter that produced this session.
    pub id: u32,
    /// Endpoint the session binds.
    pub local: SocketAddr,
    /// Client endpoint that sent the write request.
    pub peer: SocketAddr,
    /// Header of the write request, echoed by the first ACK.
    pub request: Header,
    /// Requested file name, exactly as received.
    pub filename: Vec<u8>,
}

/// Result of a session that ran to END.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSummary {
    pub id: u32,
    pub path: PathBuf,
    pub data_frames: u32,
    pub bytes: u64,
}

pub struct Session {
    id: u32,
    socket: Socket,
    peer: SocketAddr,
    path: PathBuf,
    /// `None` once END closed the file.
    file: Option<File>,
    state: SessionState,
    /// Sequence number of the last accepted frame, starting with the WRQ.
    last_seq: u32,
    idle_timeout: Option<Duration>,
    data_frames: u32,
    bytes: u64,
}

impl Session {
    /// Bind the session endpoint, create the output file under `output_dir`
    /// and acknowledge the write request.
    pub async fn establish(
        admission: Admission,
        output_dir: &Path,
        config: &SessionConfig,
    ) -> Result<Self, TransferError> {
        let socket = Socket::bind(admission.local)
            .await
            .map_err(TransferError::socket("bind"))?;
        socket
            .connect(admission.peer)
            .await
            .map_err(TransferError::socket("connect"))?;

        let name = sanitize_filename(&admission.filename)?;
        let path = output_dir.join(name);
        let file = File::create(&path)
            .await
            .map_err(TransferError::io("create file"))?;

        let session = Self {
            id: admission.id,
            socket,
            peer: admission.peer,
            path,
            file: Some(file),
            state: SessionState::Receiving,
            last_seq: admission.request.seq,
            idle_timeout: config.idle_timeout,
            data_frames: 0,
            bytes: 0,
        };
        session.acknowledge(&admission.request).await?;
        log::info!(
            "[session {}] {} ← {} writing {}",
            session.id,
            session.socket.local_addr,
            session.peer,
            session.path.display()
        );
        Ok(session)
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.socket.local_addr
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Receive and acknowledge frames until END.
    pub async fn run(mut self) -> Result<SessionSummary, TransferError> {
        while self.state == SessionState::Receiving {
            let frame = self.next_frame().await?;
            let header = frame.header;

            match header.opcode {
                Opcode::Data if !is_newer(header.seq, self.last_seq) => {
                    log::debug!(
                        "[session {}] stale DATA seq={} (last {}), re-acking",
                        self.id,
                        header.seq,
                        self.last_seq
                    );
                }
                Opcode::Data => self.append(&frame.payload).await?,
                Opcode::End => self.close().await?,
                opcode => {
                    log::warn!("[session {}] unexpected {} seq={}", self.id, opcode, header.seq);
                    return Err(TransferError::ProtocolViolation {
                        opcode,
                        state: self.state,
                    });
                }
            }

            if is_newer(header.seq, self.last_seq) {
                self.last_seq = header.seq;
            }
            self.acknowledge(&header).await?;
        }

        log::info!(
            "[session {}] complete: {} bytes in {} frames",
            self.id,
            self.bytes,
            self.data_frames
        );
        Ok(SessionSummary {
            id: self.id,
            path: self.path,
            data_frames: self.data_frames,
            bytes: self.bytes,
        })
    }

    /// Wait for the next well-formed frame from the client.
    async fn next_frame(&self) -> Result<Frame, TransferError> {
        loop {
            let received = match self.idle_timeout {
                Some(idle) => tokio::time::timeout(idle, self.socket.recv_from())
                    .await
                    .map_err(|_| TransferError::SessionIdle(idle))?,
                None => self.socket.recv_from().await,
            };
            match received {
                Ok((frame, _)) => {
                    log::debug!(
                        "[session {}] ← {} seq={} len={}",
                        self.id,
                        frame.header.opcode,
                        frame.header.seq,
                        frame.payload.len()
                    );
                    return Ok(frame);
                }
                Err(SocketError::Frame(e)) => {
                    log::warn!("[session {}] dropping malformed datagram: {e}", self.id);
                }
                Err(SocketError::Io(source)) => {
                    return Err(TransferError::Resource { op: "recv", source });
                }
            }
        }
    }

    async fn append(&mut self, payload: &[u8]) -> Result<(), TransferError> {
        if let Some(file) = self.file.as_mut() {
            file.write_all(payload)
                .await
                .map_err(TransferError::io("write file"))?;
            file.flush().await.map_err(TransferError::io("flush file"))?;
        }
        self.data_frames += 1;
        self.bytes += payload.len() as u64;
        Ok(())
    }

    async fn close(&mut self) -> Result<(), TransferError> {
        if let Some(mut file) = self.file.take() {
            file.flush().await.map_err(TransferError::io("close file"))?;
        }
        self.state = SessionState::Terminated;
        Ok(())
    }

    async fn acknowledge(&self, received: &Header) -> Result<(), TransferError> {
        self.socket
            .send(&Frame::ack(received))
            .await
            .map_err(TransferError::socket("send"))?;
        log::debug!("[session {}] → ACK seq={}", self.id, received.seq);
        Ok(())
    }
}

/// Serial-number comparison: `true` when `seq` comes after `last` modulo 2^32.
fn is_newer(seq: u32, last: u32) -> bool {
    (seq.wrapping_sub(last) as i32) > 0
}

/// Reduce a requested name to a single plain file name.
fn sanitize_filename(raw: &[u8]) -> Result<&str, TransferError> {
    let invalid = || TransferError::InvalidFilename(String::from_utf8_lossy(raw).into_owned());
    let name = std::str::from_utf8(raw).map_err(|_| invalid())?;
    if name.is_empty()
        || name == "."
        || name == ".."
        || name.contains(['/', '\\', '\0'])
    {
        return Err(invalid());
    }
    Ok(name)
}
