//! Server endpoint accepting incoming sessions.

use std::net::SocketAddr;

use quinn::Endpoint;
use tracing::{debug, info};

use crate::config::TransportConfig;
use crate::error::TransportError;
use crate::session::Session;
use crate::tls;

/// A bound QUIC endpoint accepting sessions from peers.
#[derive(Debug)]
pub struct Listener {
    endpoint: Endpoint,
}

impl Listener {
    /// Bind a server endpoint on `addr`.
    pub fn bind(addr: SocketAddr, config: &TransportConfig) -> Result<Self, TransportError> {
        let server_config = tls::server_config(config)?;
        let endpoint = Endpoint::server(server_config, addr)
            .map_err(|e| TransportError::Connection(e.to_string()))?;
        info!(addr = %addr, "QUIC listener bound");
        Ok(Self { endpoint })
    }

    /// Accept the next incoming session.
    pub async fn accept(&self) -> Result<Session, TransportError> {
        let incoming = self
            .endpoint
            .accept()
            .await
            .ok_or(TransportError::ListenerClosed)?;

        let connection = incoming
            .await
            .map_err(|e| TransportError::Connection(e.to_string()))?;

        debug!(remote = %connection.remote_address(), "accepted session");
        Ok(Session::new(connection, None))
    }

    /// Get the local address this listener is bound to.
    pub fn local_addr(&self) -> Result<SocketAddr, TransportError> {
        Ok(self.endpoint.local_addr()?)
    }

    /// Stop accepting sessions and close any still open on this endpoint.
    pub fn close(&self) {
        self.endpoint.close(quinn::VarInt::from_u32(0), b"shutdown");
        info!("QUIC listener closed");
    }

    /// Wait until every connection on the endpoint has been cleanly shut down.
    pub async fn wait_idle(&self) {
        self.endpoint.wait_idle().await;
    }
}
