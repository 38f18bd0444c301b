//! Ways of establishing a [`Transport`]: dialing, listening and running over
//! an existing socket.

use std::net::{SocketAddr, UdpSocket};

use tracing::{info, warn};

use crate::config::TransportConfig;
use crate::error::TransportError;
use crate::listener::Listener;
use crate::session::{Role, Session};
use crate::transport::Transport;

impl Transport {
    /// Dial `address` (`host:port`) and start a transport on the new session.
    ///
    /// The host part is sent as the TLS server name. Peer certificates are
    /// never verified here; compare [`Transport::remote_fingerprint`] instead.
    pub async fn dial(address: &str, config: &TransportConfig) -> Result<Self, TransportError> {
        let config = config.skipping_verification();
        let remote = resolve(address).await?;
        let session = Session::dial(remote, server_name(address), &config).await?;
        info!(name = %config.log_name, remote = %remote, "dialed transport");
        Ok(Self::start(session, &config))
    }

    /// Listen on `address` and start a transport for the first peer to connect.
    ///
    /// The listener is returned so the caller can close it once the
    /// transport is no longer needed. It is closed already when accepting
    /// the first session fails.
    pub async fn listen(
        address: &str,
        config: &TransportConfig,
    ) -> Result<(Self, Listener), TransportError> {
        let config = config.skipping_verification();
        let local = resolve(address).await?;
        let listener = Listener::bind(local, &config)?;

        match listener.accept().await {
            Ok(session) => {
                info!(name = %config.log_name, remote = %session.remote_address(), "accepted transport");
                Ok((Self::start(session, &config), listener))
            }
            Err(e) => {
                warn!(name = %config.log_name, error = %e, "accepting first session failed");
                listener.close();
                Err(e)
            }
        }
    }

    /// Run a transport over an already bound UDP socket.
    ///
    /// A client socket must be connected to the peer first.
    pub async fn start_over_socket(
        socket: UdpSocket,
        role: Role,
        config: &TransportConfig,
    ) -> Result<Self, TransportError> {
        let config = config.skipping_verification();
        let session = Session::over_socket(socket, role, &config).await?;
        Ok(Self::start(session, &config))
    }
}

async fn resolve(address: &str) -> Result<SocketAddr, TransportError> {
    let invalid = |reason: String| TransportError::InvalidAddress {
        address: address.to_string(),
        reason,
    };

    if address.is_empty() {
        return Err(invalid("empty address".to_string()));
    }

    tokio::net::lookup_host(address)
        .await
        .map_err(|e| invalid(e.to_string()))?
        .next()
        .ok_or_else(|| invalid("no addresses found".to_string()))
}

/// Host part of `host:port`, without IPv6 brackets.
fn server_name(address: &str) -> &str {
    let host = address
        .rsplit_once(':')
        .map_or(address, |(host, _port)| host);
    host.trim_start_matches('[').trim_end_matches(']')
}
