//! TLS certificate generation for peerquic.
//!
//! Peers authenticate with self-signed certificates and pin each other by
//! SHA-256 fingerprint, so every generated certificate is usable for both
//! the client and the server role of a session.

pub mod error;

use std::path::{Path, PathBuf};

pub use error::CertgenError;

use peerquic_types::Fingerprint;
use rcgen::{CertificateParams, DistinguishedName, DnType, ExtendedKeyUsagePurpose, KeyPair};

/// File name of the PEM certificate written by [`GeneratedCert::write_to`].
pub const CERT_FILE: &str = "peerquic.crt";
/// File name of the PEM private key written by [`GeneratedCert::write_to`].
pub const KEY_FILE: &str = "peerquic.key";

/// A generated certificate and private key pair.
pub struct GeneratedCert {
    /// PEM-encoded certificate.
    pub cert_pem: String,
    /// PEM-encoded private key.
    pub key_pem: String,
    /// SHA-256 fingerprint of the DER-encoded certificate.
    pub fingerprint: Fingerprint,
}

impl GeneratedCert {
    /// Write the certificate and key into `dir`, returning both paths.
    pub fn write_to(&self, dir: &Path) -> Result<(PathBuf, PathBuf), CertgenError> {
        std::fs::create_dir_all(dir).map_err(CertgenError::write(dir))?;
        let cert_path = dir.join(CERT_FILE);
        let key_path = dir.join(KEY_FILE);
        std::fs::write(&cert_path, &self.cert_pem).map_err(CertgenError::write(&cert_path))?;
        std::fs::write(&key_path, &self.key_pem).map_err(CertgenError::write(&key_path))?;
        Ok((cert_path, key_path))
    }
}

/// Generate a new self-signed certificate.
///
/// The certificate is valid for the given hostname and includes
/// `localhost` and `127.0.0.1` as subject alternative names.
pub fn generate_certificate(hostname: &str) -> Result<GeneratedCert, CertgenError> {
    let key_pair = KeyPair::generate().map_err(|e| CertgenError::Generation(e.to_string()))?;

    let mut params = CertificateParams::default();
    let mut dn = DistinguishedName::new();
    dn.push(DnType::CommonName, hostname);
    dn.push(DnType::OrganizationName, "peerquic");
    params.distinguished_name = dn;

    params.subject_alt_names = vec![
        rcgen::SanType::DnsName(
            hostname
                .try_into()
                .map_err(|e: rcgen::Error| CertgenError::Generation(e.to_string()))?,
        ),
        rcgen::SanType::DnsName(
            "localhost"
                .try_into()
                .map_err(|e: rcgen::Error| CertgenError::Generation(e.to_string()))?,
        ),
        rcgen::SanType::IpAddress(std::net::IpAddr::V4(std::net::Ipv4Addr::LOCALHOST)),
    ];
    params.extended_key_usages = vec![
        ExtendedKeyUsagePurpose::ServerAuth,
        ExtendedKeyUsagePurpose::ClientAuth,
    ];

    let cert = params
        .self_signed(&key_pair)
        .map_err(|e| CertgenError::Generation(e.to_string()))?;

    Ok(GeneratedCert {
        cert_pem: cert.pem(),
        key_pem: key_pair.serialize_pem(),
        fingerprint: Fingerprint::of_der(cert.der()),
    })
}
