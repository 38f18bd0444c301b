//! TLS configuration for QUIC sessions.
//!
//! Both peers present a certificate. By default each accepts whatever the
//! other side presents and trust is decided later by fingerprint; handshake
//! signatures are still checked so a peer has to hold the key of the
//! certificate it shows. With verification on, the peer's chain is checked
//! against the configured trust anchors instead.

use std::sync::Arc;

use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
use rustls::client::WebPkiServerVerifier;
use rustls::crypto::{CryptoProvider, WebPkiSupportedAlgorithms};
use rustls::pki_types::{CertificateDer, PrivateKeyDer, ServerName, UnixTime};
use rustls::server::danger::{ClientCertVerified, ClientCertVerifier};
use rustls::server::WebPkiClientVerifier;
use rustls::{DigitallySignedStruct, DistinguishedName, RootCertStore, SignatureScheme};
use tracing::debug;

use crate::config::TransportConfig;
use crate::error::TransportError;

/// ALPN protocol identifier negotiated by both peers.
pub const ALPN: &[u8] = b"peerquic";

fn provider() -> Arc<CryptoProvider> {
    Arc::new(rustls::crypto::ring::default_provider())
}

fn trust_anchors(config: &TransportConfig) -> Result<Arc<RootCertStore>, TransportError> {
    let mut roots = RootCertStore::empty();
    for cert in &config.trusted_certificates {
        roots
            .add(cert.clone())
            .map_err(|e| TransportError::Tls(format!("invalid trusted certificate: {e}")))?;
    }
    Ok(Arc::new(roots))
}

/// Build a quinn `ServerConfig` that requires a client certificate.
///
/// The certificate is only verified when `skip_peer_verification` is off.
pub fn server_config(config: &TransportConfig) -> Result<quinn::ServerConfig, TransportError> {
    let provider = provider();
    let verifier: Arc<dyn ClientCertVerifier> = if config.skip_peer_verification {
        Arc::new(AcceptAnyCertificate::new(&provider))
    } else {
        WebPkiClientVerifier::builder_with_provider(
            trust_anchors(config)?,
            Arc::clone(&provider),
        )
        .build()
        .map_err(|e| TransportError::Tls(e.to_string()))?
    };

    let mut tls_config = rustls::ServerConfig::builder_with_provider(provider)
        .with_protocol_versions(&[&rustls::version::TLS13])
        .map_err(|e| TransportError::Tls(e.to_string()))?
        .with_client_cert_verifier(verifier)
        .with_single_cert(
            config.certificate_chain.clone(),
            config.private_key.clone_key(),
        )
        .map_err(|e| TransportError::Tls(e.to_string()))?;

    tls_config.alpn_protocols = vec![ALPN.to_vec()];

    let mut server = quinn::ServerConfig::with_crypto(Arc::new(
        quinn::crypto::rustls::QuicServerConfig::try_from(tls_config)
            .map_err(|e| TransportError::Tls(e.to_string()))?,
    ));
    server.transport_config(config.quic.transport_config()?);
    debug!(verify = !config.skip_peer_verification, "built server TLS config");
    Ok(server)
}

/// Build a quinn `ClientConfig` that presents our certificate.
///
/// The server is only verified when `skip_peer_verification` is off.
pub fn client_config(config: &TransportConfig) -> Result<quinn::ClientConfig, TransportError> {
    let provider = provider();
    let verifier: Arc<dyn ServerCertVerifier> = if config.skip_peer_verification {
        Arc::new(AcceptAnyCertificate::new(&provider))
    } else {
        WebPkiServerVerifier::builder_with_provider(
            trust_anchors(config)?,
            Arc::clone(&provider),
        )
        .build()
        .map_err(|e| TransportError::Tls(e.to_string()))?
    };

    let mut tls_config = rustls::ClientConfig::builder_with_provider(provider)
        .with_protocol_versions(&[&rustls::version::TLS13])
        .map_err(|e| TransportError::Tls(e.to_string()))?
        .dangerous()
        .with_custom_certificate_verifier(verifier)
        .with_client_auth_cert(
            config.certificate_chain.clone(),
            config.private_key.clone_key(),
        )
        .map_err(|e| TransportError::Tls(e.to_string()))?;

    tls_config.alpn_protocols = vec![ALPN.to_vec()];

    let mut client = quinn::ClientConfig::new(Arc::new(
        quinn::crypto::rustls::QuicClientConfig::try_from(tls_config)
            .map_err(|e| TransportError::Tls(e.to_string()))?,
    ));
    client.transport_config(config.quic.transport_config()?);
    debug!(verify = !config.skip_peer_verification, "built client TLS config");
    Ok(client)
}

pub(crate) fn parse_certs(pem: &str) -> Result<Vec<CertificateDer<'static>>, TransportError> {
    let mut reader = std::io::BufReader::new(pem.as_bytes());
    let certs: Vec<CertificateDer<'static>> = rustls_pemfile::certs(&mut reader)
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| TransportError::Tls(format!("failed to parse certificate PEM: {e}")))?;
    if certs.is_empty() {
        return Err(TransportError::Tls(
            "no certificates found in PEM".to_string(),
        ));
    }
    Ok(certs)
}

pub(crate) fn parse_key(pem: &str) -> Result<PrivateKeyDer<'static>, TransportError> {
    let mut reader = std::io::BufReader::new(pem.as_bytes());
    rustls_pemfile::private_key(&mut reader)
        .map_err(|e| TransportError::Tls(format!("failed to parse key PEM: {e}")))?
        .ok_or_else(|| TransportError::Tls("no private key found in PEM".to_string()))
}

/// Accepts any certificate chain from either role, checking only signatures.
#[derive(Debug)]
struct AcceptAnyCertificate {
    algorithms: WebPkiSupportedAlgorithms,
}

impl AcceptAnyCertificate {
    fn new(provider: &CryptoProvider) -> Self {
        Self {
            algorithms: provider.signature_verification_algorithms,
        }
    }
}

impl ServerCertVerifier for AcceptAnyCertificate {
    fn verify_server_cert(
        &self,
        _end_entity: &CertificateDer<'_>,
        _intermediates: &[CertificateDer<'_>],
        _server_name: &ServerName<'_>,
        _ocsp_response: &[u8],
        _now: UnixTime,
    ) -> Result<ServerCertVerified, rustls::Error> {
        Ok(ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        rustls::crypto::verify_tls12_signature(message, cert, dss, &self.algorithms)
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        rustls::crypto::verify_tls13_signature(message, cert, dss, &self.algorithms)
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.algorithms.supported_schemes()
    }
}

impl ClientCertVerifier for AcceptAnyCertificate {
    fn root_hint_subjects(&self) -> &[DistinguishedName] {
        &[]
    }

    fn verify_client_cert(
        &self,
        _end_entity: &CertificateDer<'_>,
        _intermediates: &[CertificateDer<'_>],
        _now: UnixTime,
    ) -> Result<ClientCertVerified, rustls::Error> {
        Ok(ClientCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        rustls::crypto::verify_tls12_signature(message, cert, dss, &self.algorithms)
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        rustls::crypto::verify_tls13_signature(message, cert, dss, &self.algorithms)
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.algorithms.supported_schemes()
    }
}
