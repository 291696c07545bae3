//! Well-known-port dispatcher.
//!
//! The [`Dispatcher`] only ever listens.  For each write request it
//! advances its admission counter, derives the session endpoint
//! `listen_ip:(base_port + counter)` and spawns an independent task running
//! a [`Session`].  Everything else that reaches the well-known port is
//! dropped without a reply.
//!
//! The counter is a plain value owned by the dispatcher loop; each session
//! receives its endpoint by value in an [`Admission`], so ports are
//! allocated monotonically and never handed out twice.  Ports are not
//! recycled.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use crate::config::{ServerConfig, SessionConfig};
use crate::error::TransferError;
use crate::frame::{Frame, Opcode};
use crate::session::{Admission, Session};
use crate::socket::{Socket, SocketError};

pub struct Dispatcher {
    socket: Socket,
    base_port: u16,
    /// Sessions admitted so far; the latest session listens on `base_port + admissions`.
    admissions: u32,
    output_dir: Arc<PathBuf>,
    session: SessionConfig,
}

impl Dispatcher {
    /// Bind the well-known endpoint.
    pub async fn bind(config: ServerConfig) -> Result<Self, TransferError> {
        let socket = Socket::bind(config.listen)
            .await
            .map_err(TransferError::socket("bind"))?;
        log::info!("[dispatcher] listening on {}", socket.local_addr);
        Ok(Self {
            socket,
            base_port: config.base_port,
            admissions: 0,
            output_dir: Arc::new(config.output_dir),
            session: config.session,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.socket.local_addr
    }

    pub fn admissions(&self) -> u32 {
        self.admissions
    }

    /// Decide what to do with one frame that reached the well-known port.
    ///
    /// Returns `Ok(None)` for anything but a write request.
    pub fn admit(
        &mut self,
        frame: Frame,
        peer: SocketAddr,
    ) -> Result<Option<Admission>, TransferError> {
        if frame.header.opcode != Opcode::WriteRequest {
            log::debug!(
                "[dispatcher] dropping {} seq={} from {}",
                frame.header.opcode,
                frame.header.seq,
                peer
            );
            return Ok(None);
        }

        let id = self.admissions + 1;
        let port = u16::try_from(id)
            .ok()
            .and_then(|offset| self.base_port.checked_add(offset))
            .ok_or(TransferError::PortsExhausted {
                base_port: self.base_port,
            })?;
        self.admissions = id;

        let mut local = self.socket.local_addr;
        local.set_port(port);
        Ok(Some(Admission {
            id,
            local,
            peer,
            request: frame.header,
            filename: frame.payload,
        }))
    }

    /// Serve write requests until the listening socket fails.
    pub async fn run(mut self) -> Result<(), TransferError> {
        loop {
            let (frame, peer) = match self.socket.recv_from().await {
                Ok(received) => received,
                Err(SocketError::Frame(e)) => {
                    log::warn!("[dispatcher] dropping malformed datagram: {e}");
                    continue;
                }
                Err(SocketError::Io(source)) => {
                    return Err(TransferError::Resource { op: "recv", source });
                }
            };

            match self.admit(frame, peer) {
                Ok(Some(admission)) => self.spawn_session(admission),
                Ok(None) => {}
                Err(e) => log::warn!("[dispatcher] refusing write request from {peer}: {e}"),
            }
        }
    }

    fn spawn_session(&self, admission: Admission) {
        log::info!(
            "[dispatcher] admitting {} as session {} on {}",
            admission.peer,
            admission.id,
            admission.local
        );
        let output_dir = Arc::clone(&self.output_dir);
        let config = self.session.clone();
        tokio::spawn(async move {
            let id = admission.id;
            let result = match Session::establish(admission, &output_dir, &config).await {
                Ok(session) => session.run().await,
                Err(e) => Err(e),
            };
            match result {
                Ok(summary) => log::info!(
                    "[dispatcher] session {} finished: {}",
                    id,
                    summary.path.display()
                ),
                Err(e) => log::error!("[dispatcher] session {} failed: {}", id, e),
            }
        });
    }
}
