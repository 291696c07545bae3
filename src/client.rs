//! File transfer driver for the client side.
//!
//! A transfer is three phases over one [`Exchange`]:
//!
//! 1. `WRQ(file name)` to the server's well-known endpoint.  The ACK arrives
//!    from the session's own endpoint, which becomes the target for the rest
//!    of the transfer.
//! 2. One `DATA` frame per chunk produced by [`Chunker`].
//! 3. `END(file name)`.
//!
//! Any unrecovered error aborts the whole transfer; there is no retry above
//! the frame level.

use std::net::SocketAddr;
use std::path::Path;

use tokio::fs::File;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};

use crate::config::{ChunkMode, ClientConfig};
use crate::error::TransferError;
use crate::exchange::Exchange;
use crate::frame::{Opcode, MAX_PAYLOAD};
use crate::socket::Socket;

/// Summary of a completed transfer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferReport {
    /// Session endpoint that received the data.
    pub session: SocketAddr,
    pub data_frames: u32,
    pub bytes: u64,
}

pub struct Client {
    engine: Exchange,
    chunking: ChunkMode,
}

impl Client {
    pub async fn bind(config: ClientConfig) -> Result<Self, TransferError> {
        let socket = Socket::bind(config.bind)
            .await
            .map_err(TransferError::socket("bind"))?;
        Ok(Self {
            engine: Exchange::new(socket, config.timer),
            chunking: config.chunking,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.engine.local_addr()
    }

    /// Push the file at `path` to the server listening on `server`.
    pub async fn send_file(
        &mut self,
        path: &Path,
        server: SocketAddr,
    ) -> Result<TransferReport, TransferError> {
        let name = remote_name(path)?;
        let file = File::open(path)
            .await
            .map_err(TransferError::io("open file"))?;

        let session = self.open(&name, server).await?;
        log::info!("[client] {} accepted by session {}", name, session);

        let mut chunks = Chunker::new(BufReader::new(file), self.chunking);
        let mut report = TransferReport {
            session,
            data_frames: 0,
            bytes: 0,
        };
        while let Some(chunk) = chunks
            .next_chunk()
            .await
            .map_err(TransferError::io("read file"))?
        {
            self.engine.exchange(Opcode::Data, &chunk, session).await?;
            report.data_frames += 1;
            report.bytes += chunk.len() as u64;
        }

        self.engine
            .exchange(Opcode::End, name.as_bytes(), session)
            .await?;
        log::info!(
            "[client] sent {} bytes in {} frames to {}",
            report.bytes,
            report.data_frames,
            session
        );
        Ok(report)
    }

    /// Send the write request and return the session endpoint that acknowledged it.
    async fn open(&mut self, name: &str, server: SocketAddr) -> Result<SocketAddr, TransferError> {
        let reply = self
            .engine
            .request(Opcode::WriteRequest, name.as_bytes(), server)
            .await?;
        Ok(reply.from)
    }
}

/// File name announced to the server: the last component of `path`.
fn remote_name(path: &Path) -> Result<String, TransferError> {
    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| TransferError::InvalidFilename(path.display().to_string()))?;
    if name.len() > MAX_PAYLOAD {
        return Err(TransferError::InvalidFilename(name.to_string()));
    }
    Ok(name.to_string())
}

/// Cuts a byte stream into Data frame payloads of at most [`MAX_PAYLOAD`] bytes.
pub struct Chunker<R> {
    reader: R,
    mode: ChunkMode,
}

impl<R: AsyncBufRead + Unpin> Chunker<R> {
    pub fn new(reader: R, mode: ChunkMode) -> Self {
        Self { reader, mode }
    }

    /// Next payload, or `None` at end of input.
    pub async fn next_chunk(&mut self) -> std::io::Result<Option<Vec<u8>>> {
        let mut chunk = Vec::new();
        while chunk.len() < MAX_PAYLOAD {
            let available = self.reader.fill_buf().await?;
            if available.is_empty() {
                break;
            }
            let window = &available[..available.len().min(MAX_PAYLOAD - chunk.len())];
            let (take, line_done) = match self.mode {
                ChunkMode::Lines => match window.iter().position(|&b| b == b'\n') {
                    Some(i) => (i + 1, true),
                    None => (window.len(), false),
                },
                ChunkMode::Fixed => (window.len(), false),
            };
            chunk.extend_from_slice(&window[..take]);
            self.reader.consume(take);
            if line_done {
                break;
            }
        }
        Ok((!chunk.is_empty()).then_some(chunk))
    }
}
