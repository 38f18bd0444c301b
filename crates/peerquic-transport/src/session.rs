//! One established QUIC connection and the streams multiplexed over it.

use std::net::{SocketAddr, UdpSocket};
use std::sync::Arc;

use peerquic_types::Fingerprint;
use quinn::{Connection, ConnectionError, Endpoint};
use rustls::pki_types::CertificateDer;
use tracing::{debug, info};

use crate::config::TransportConfig;
use crate::error::TransportError;
use crate::stream::{BidirectionalStream, ReadableStream, WritableStream};
use crate::tls;

/// Application error code used for a graceful close.
pub const NO_ERROR: u16 = 0;

/// Which side of the handshake this peer plays.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Client,
    Server,
}

/// Result of waiting for a peer-initiated stream.
#[derive(Debug)]
pub enum AcceptOutcome<S> {
    /// The peer opened a new stream.
    Delivered(S),
    /// The session ended without an application error: the peer closed
    /// with code 0, or this side closed the session.
    Closed,
    /// The session ended abnormally.
    Failed(TransportError),
}

impl<S> AcceptOutcome<S> {
    fn from_connection_error(err: ConnectionError) -> Self {
        match err {
            ConnectionError::LocallyClosed => Self::Closed,
            ConnectionError::ApplicationClosed(close)
                if close.error_code.into_inner() == u64::from(NO_ERROR) =>
            {
                Self::Closed
            }
            other => Self::Failed(other.into()),
        }
    }
}

/// A QUIC connection between exactly two peers.
#[derive(Debug, Clone)]
pub struct Session {
    connection: Connection,
    remote_certificates: Arc<[CertificateDer<'static>]>,
    /// Endpoint created for this session alone; `None` when a listener owns it.
    endpoint: Option<Endpoint>,
}

impl Session {
    pub(crate) fn new(connection: Connection, endpoint: Option<Endpoint>) -> Self {
        let remote_certificates: Arc<[CertificateDer<'static>]> = connection
            .peer_identity()
            .and_then(|identity| identity.downcast::<Vec<CertificateDer<'static>>>().ok())
            .map_or_else(|| Arc::from(Vec::new()), |certs| Arc::from(*certs));
        Self {
            connection,
            remote_certificates,
            endpoint,
        }
    }

    /// Dial `addr` on a fresh client endpoint.
    pub async fn dial(
        addr: SocketAddr,
        server_name: &str,
        config: &TransportConfig,
    ) -> Result<Self, TransportError> {
        let bind: SocketAddr = if addr.is_ipv6() {
            (std::net::Ipv6Addr::UNSPECIFIED, 0).into()
        } else {
            (std::net::Ipv4Addr::UNSPECIFIED, 0).into()
        };
        let mut endpoint =
            Endpoint::client(bind).map_err(|e| TransportError::Connection(e.to_string()))?;
        endpoint.set_default_client_config(tls::client_config(config)?);

        let connection = endpoint
            .connect(addr, server_name)
            .map_err(|e| TransportError::Connection(e.to_string()))?
            .await
            .map_err(|e| TransportError::Connection(e.to_string()))?;

        debug!(remote = %addr, "dialed peer");
        Ok(Self::new(connection, Some(endpoint)))
    }

    /// Run QUIC over an already bound UDP socket.
    ///
    /// A client dials the socket's connected peer address, so the socket must
    /// have been connected first. A server accepts exactly one session.
    pub async fn over_socket(
        socket: UdpSocket,
        role: Role,
        config: &TransportConfig,
    ) -> Result<Self, TransportError> {
        let remote = match role {
            Role::Client => Some(
                socket
                    .peer_addr()
                    .map_err(|_| TransportError::ClientWithoutRemoteAddress)?,
            ),
            Role::Server => None,
        };

        socket.set_nonblocking(true)?;
        let runtime = quinn::default_runtime()
            .ok_or_else(|| TransportError::Connection("no async runtime found".to_string()))?;
        let server_config = match role {
            Role::Server => Some(tls::server_config(config)?),
            Role::Client => None,
        };
        let mut endpoint = Endpoint::new(
            quinn::EndpointConfig::default(),
            server_config,
            socket,
            runtime,
        )?;

        let connection = if let Some(remote) = remote {
            endpoint.set_default_client_config(tls::client_config(config)?);
            endpoint
                .connect(remote, "peerquic")
                .map_err(|e| TransportError::Connection(e.to_string()))?
                .await
                .map_err(|e| TransportError::Connection(e.to_string()))?
        } else {
            let incoming = endpoint.accept().await.ok_or(TransportError::ListenerClosed)?;
            incoming
                .await
                .map_err(|e| TransportError::Connection(e.to_string()))?
        };

        info!(remote = %connection.remote_address(), ?role, "session established over socket");
        Ok(Self::new(connection, Some(endpoint)))
    }

    /// Open a bidirectional stream.
    ///
    /// The peer only learns about the stream once data is written on it.
    pub async fn open_stream(&self) -> Result<BidirectionalStream, TransportError> {
        let (send, recv) = self.connection.open_bi().await?;
        Ok(BidirectionalStream::new(send, recv))
    }

    /// Open a send-only stream.
    pub async fn open_uni_stream(&self) -> Result<WritableStream, TransportError> {
        let send = self.connection.open_uni().await?;
        Ok(WritableStream::new(send))
    }

    /// Wait for the peer to open a bidirectional stream.
    pub async fn accept_stream(&self) -> AcceptOutcome<BidirectionalStream> {
        match self.connection.accept_bi().await {
            Ok((send, recv)) => AcceptOutcome::Delivered(BidirectionalStream::new(send, recv)),
            Err(e) => AcceptOutcome::from_connection_error(e),
        }
    }

    /// Wait for the peer to open a unidirectional stream.
    pub async fn accept_uni_stream(&self) -> AcceptOutcome<ReadableStream> {
        match self.connection.accept_uni().await {
            Ok(recv) => AcceptOutcome::Delivered(ReadableStream::new(recv)),
            Err(e) => AcceptOutcome::from_connection_error(e),
        }
    }

    /// Certificate chain the peer presented during the handshake.
    pub fn remote_certificates(&self) -> &[CertificateDer<'static>] {
        &self.remote_certificates
    }

    /// Fingerprint of the peer's leaf certificate.
    pub fn remote_fingerprint(&self) -> Option<Fingerprint> {
        self.remote_certificates
            .first()
            .map(|cert| Fingerprint::of_der(cert))
    }

    pub fn remote_address(&self) -> SocketAddr {
        self.connection.remote_address()
    }

    /// Close gracefully.
    pub fn close(&self) {
        self.close_with_error(NO_ERROR, "no error");
    }

    /// Close with an application error code and reason.
    ///
    /// Every pending accept, read and write on this session fails promptly.
    pub fn close_with_error(&self, code: u16, reason: &str) {
        self.connection.close(quinn::VarInt::from(code), reason.as_bytes());
        if let Some(endpoint) = &self.endpoint {
            endpoint.close(quinn::VarInt::from(code), reason.as_bytes());
        }
        debug!(remote = %self.remote_address(), code, reason, "session closed");
    }

    /// Endpoint created for this session alone, if any.
    pub(crate) fn owned_endpoint(&self) -> Option<Endpoint> {
        self.endpoint.clone()
    }

    /// Wait until the session has terminated and return why.
    pub async fn closed(&self) -> ConnectionError {
        self.connection.closed().await
    }
}
