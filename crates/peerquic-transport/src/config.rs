//! Transport configuration: local identity, logging name and QUIC limits.

use std::sync::Arc;
use std::time::Duration;

use rustls::pki_types::{CertificateDer, PrivateKeyDer};
use serde::{Deserialize, Serialize};

use crate::error::TransportError;
use crate::tls;

/// Configuration shared by every way of establishing a transport.
pub struct TransportConfig {
    /// Local certificate chain presented to the peer, leaf first.
    pub certificate_chain: Vec<CertificateDer<'static>>,
    /// Private key of the leaf certificate.
    pub private_key: PrivateKeyDer<'static>,
    /// Accept any peer certificate during the handshake. Trust is then
    /// established by comparing fingerprints at a higher layer. The
    /// constructors on [`Transport`](crate::Transport) always force this on.
    ///
    /// When off, the peer's chain must lead to one of
    /// [`trusted_certificates`](Self::trusted_certificates).
    pub skip_peer_verification: bool,
    /// Trust anchors for verifying the peer when verification is on.
    pub trusted_certificates: Vec<CertificateDer<'static>>,
    /// Name recorded on the tracing span of every task the transport runs.
    pub log_name: String,
    pub quic: QuicSettings,
}

impl TransportConfig {
    pub fn new(
        certificate_chain: Vec<CertificateDer<'static>>,
        private_key: PrivateKeyDer<'static>,
    ) -> Self {
        Self {
            certificate_chain,
            private_key,
            skip_peer_verification: true,
            trusted_certificates: Vec::new(),
            log_name: default_log_name(),
            quic: QuicSettings::default(),
        }
    }

    /// Build a configuration from PEM-encoded certificate chain and key.
    pub fn from_pem(cert_pem: &str, key_pem: &str) -> Result<Self, TransportError> {
        Ok(Self::new(tls::parse_certs(cert_pem)?, tls::parse_key(key_pem)?))
    }

    #[must_use]
    pub fn with_log_name(mut self, name: impl Into<String>) -> Self {
        self.log_name = name.into();
        self
    }

    /// Verify the peer against `certificates` instead of accepting anyone.
    ///
    /// Only honoured by [`Session`](crate::Session) and
    /// [`Listener`](crate::Listener); a self-signed peer certificate can be
    /// its own anchor.
    #[must_use]
    pub fn with_trusted_peers(mut self, certificates: Vec<CertificateDer<'static>>) -> Self {
        self.trusted_certificates = certificates;
        self.skip_peer_verification = false;
        self
    }

    #[must_use]
    pub fn with_quic(mut self, quic: QuicSettings) -> Self {
        self.quic = quic;
        self
    }

    /// Copy of this configuration with peer verification skipped.
    pub(crate) fn skipping_verification(&self) -> Self {
        if !self.skip_peer_verification {
            tracing::debug!(
                name = %self.log_name,
                "peer certificate verification deferred to fingerprint check"
            );
        }
        Self {
            skip_peer_verification: true,
            ..self.clone()
        }
    }
}

impl Clone for TransportConfig {
    fn clone(&self) -> Self {
        Self {
            certificate_chain: self.certificate_chain.clone(),
            private_key: self.private_key.clone_key(),
            skip_peer_verification: self.skip_peer_verification,
            trusted_certificates: self.trusted_certificates.clone(),
            log_name: self.log_name.clone(),
            quic: self.quic.clone(),
        }
    }
}

impl std::fmt::Debug for TransportConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransportConfig")
            .field("certificates", &self.certificate_chain.len())
            .field("skip_peer_verification", &self.skip_peer_verification)
            .field("trusted_certificates", &self.trusted_certificates.len())
            .field("log_name", &self.log_name)
            .field("quic", &self.quic)
            .finish_non_exhaustive()
    }
}

/// Stream limits, flow-control windows and liveness timers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuicSettings {
    #[serde(default = "default_max_streams")]
    pub max_incoming_streams: u32,
    #[serde(default = "default_max_streams")]
    pub max_incoming_uni_streams: u32,
    /// Per-stream receive window in bytes.
    #[serde(default = "default_stream_receive_window")]
    pub stream_receive_window: u32,
    /// Connection-wide receive window in bytes.
    #[serde(default = "default_receive_window")]
    pub receive_window: u32,
    /// Keep-alive interval; 0 disables keep-alives.
    #[serde(default = "default_keep_alive_secs")]
    pub keep_alive_secs: u64,
    /// Idle timeout; 0 waits forever.
    #[serde(default = "default_idle_timeout_secs")]
    pub idle_timeout_secs: u64,
}

impl Default for QuicSettings {
    fn default() -> Self {
        Self {
            max_incoming_streams: default_max_streams(),
            max_incoming_uni_streams: default_max_streams(),
            stream_receive_window: default_stream_receive_window(),
            receive_window: default_receive_window(),
            keep_alive_secs: default_keep_alive_secs(),
            idle_timeout_secs: default_idle_timeout_secs(),
        }
    }
}

impl QuicSettings {
    /// Translate into the engine's transport parameters.
    pub(crate) fn transport_config(&self) -> Result<Arc<quinn::TransportConfig>, TransportError> {
        let mut transport = quinn::TransportConfig::default();
        transport
            .max_concurrent_bidi_streams(quinn::VarInt::from_u32(self.max_incoming_streams))
            .max_concurrent_uni_streams(quinn::VarInt::from_u32(self.max_incoming_uni_streams))
            .stream_receive_window(quinn::VarInt::from_u32(self.stream_receive_window))
            .receive_window(quinn::VarInt::from_u32(self.receive_window));

        let keep_alive =
            (self.keep_alive_secs > 0).then(|| Duration::from_secs(self.keep_alive_secs));
        transport.keep_alive_interval(keep_alive);

        let idle_timeout = if self.idle_timeout_secs == 0 {
            None
        } else {
            let timeout = quinn::IdleTimeout::try_from(Duration::from_secs(self.idle_timeout_secs))
                .map_err(|e| TransportError::Config(format!("idle timeout: {e}")))?;
            Some(timeout)
        };
        transport.max_idle_timeout(idle_timeout);

        Ok(Arc::new(transport))
    }
}

fn default_log_name() -> String {
    "peerquic".to_string()
}

fn default_max_streams() -> u32 {
    1000
}

fn default_stream_receive_window() -> u32 {
    3 << 20 // 3 MiB
}

fn default_receive_window() -> u32 {
    9 << 19 // 4.5 MiB
}

fn default_keep_alive_secs() -> u64 {
    30
}

fn default_idle_timeout_secs() -> u64 {
    30
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let settings = QuicSettings::default();
        assert_eq!(settings.max_incoming_streams, 1000);
        assert_eq!(settings.max_incoming_uni_streams, 1000);
        assert_eq!(settings.stream_receive_window, 3 * 1024 * 1024);
        assert_eq!(settings.receive_window, 4_718_592);
        assert_eq!(settings.keep_alive_secs, 30);
    }

    #[test]
    fn parse_partial_toml() {
        let settings: QuicSettings = toml::from_str(
            r"
max_incoming_streams = 16
keep_alive_secs = 0
",
        )
        .unwrap();
        assert_eq!(settings.max_incoming_streams, 16);
        assert_eq!(settings.max_incoming_uni_streams, 1000);
        assert_eq!(settings.keep_alive_secs, 0);
        assert_eq!(settings.idle_timeout_secs, 30);
    }

    #[test]
    fn transport_config_accepts_disabled_timers() {
        let settings = QuicSettings {
            keep_alive_secs: 0,
            idle_timeout_secs: 0,
            ..QuicSettings::default()
        };
        assert!(settings.transport_config().is_ok());
    }

    #[test]
    fn transport_config_rejects_huge_idle_timeout() {
        let settings = QuicSettings {
            idle_timeout_secs: u64::MAX / 1000,
            ..QuicSettings::default()
        };
        assert!(matches!(
            settings.transport_config(),
            Err(TransportError::Config(_))
        ));
    }

    #[test]
    fn from_pem_and_skip_verification() {
        let cert = peerquic_certgen::generate_certificate("localhost").unwrap();
        let mut config = TransportConfig::from_pem(&cert.cert_pem, &cert.key_pem)
            .unwrap()
            .with_log_name("unit");
        assert_eq!(config.certificate_chain.len(), 1);
        assert_eq!(config.log_name, "unit");

        config.skip_peer_verification = false;
        let forced = config.skipping_verification();
        assert!(forced.skip_peer_verification);
        assert!(!config.skip_peer_verification);
    }

    #[test]
    fn trusted_peers_turn_verification_on() {
        let cert = peerquic_certgen::generate_certificate("localhost").unwrap();
        let config = TransportConfig::from_pem(&cert.cert_pem, &cert.key_pem).unwrap();
        assert!(config.skip_peer_verification);
        assert!(config.trusted_certificates.is_empty());

        let anchors = config.certificate_chain.clone();
        let config = config.with_trusted_peers(anchors);
        assert!(!config.skip_peer_verification);
        assert_eq!(config.clone().trusted_certificates.len(), 1);
        assert!(format!("{config:?}").contains("trusted_certificates: 1"));
    }

    #[test]
    fn debug_hides_key() {
        let cert = peerquic_certgen::generate_certificate("localhost").unwrap();
        let config = TransportConfig::from_pem(&cert.cert_pem, &cert.key_pem).unwrap();
        let debug = format!("{config:?}");
        assert!(debug.contains("certificates: 1"));
        assert!(!debug.contains("PRIVATE"));
    }
}
