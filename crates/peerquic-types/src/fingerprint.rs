//! SHA-256 certificate fingerprints.
//!
//! Peers trust each other by comparing fingerprints exchanged out of band,
//! so the textual form must be stable: `SHA256:` followed by 32 lowercase
//! hex bytes separated by colons.

use std::fmt::Write;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

const PREFIX: &str = "SHA256:";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum FingerprintError {
    #[error("fingerprint must start with {PREFIX}")]
    MissingPrefix,

    #[error("fingerprint must have 32 bytes, found {0}")]
    Length(usize),

    #[error("invalid hex byte {0:?} in fingerprint")]
    InvalidByte(String),
}

/// SHA-256 digest of a DER-encoded certificate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Fingerprint([u8; 32]);

impl Fingerprint {
    /// Fingerprint of DER-encoded certificate bytes.
    #[must_use]
    pub fn of_der(der: &[u8]) -> Self {
        let digest = ring::digest::digest(&ring::digest::SHA256, der);
        let mut bytes = [0u8; 32];
        bytes.copy_from_slice(digest.as_ref());
        Self(bytes)
    }

    #[must_use]
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl std::fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut out = String::with_capacity(PREFIX.len() + 32 * 3);
        out.push_str(PREFIX);
        for (i, byte) in self.0.iter().enumerate() {
            if i > 0 {
                out.push(':');
            }
            let _ = write!(out, "{byte:02x}");
        }
        f.write_str(&out)
    }
}

impl FromStr for Fingerprint {
    type Err = FingerprintError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let hex = s
            .strip_prefix(PREFIX)
            .ok_or(FingerprintError::MissingPrefix)?;
        let parts: Vec<&str> = hex.split(':').collect();
        if parts.len() != 32 {
            return Err(FingerprintError::Length(parts.len()));
        }
        let mut bytes = [0u8; 32];
        for (slot, part) in bytes.iter_mut().zip(parts) {
            if part.len() != 2 {
                return Err(FingerprintError::InvalidByte(part.to_string()));
            }
            *slot = u8::from_str_radix(part, 16)
                .map_err(|_| FingerprintError::InvalidByte(part.to_string()))?;
        }
        Ok(Self(bytes))
    }
}

impl TryFrom<String> for Fingerprint {
    type Error = FingerprintError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Fingerprint> for String {
    fn from(value: Fingerprint) -> Self {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_format() {
        let fp = Fingerprint::of_der(b"certificate bytes");
        let s = fp.to_string();
        assert!(s.starts_with("SHA256:"));
        // 32 bytes, two hex chars each, 31 separators
        assert_eq!(s.len(), PREFIX.len() + 64 + 31);
        assert_eq!(s, s.to_lowercase());
    }

    #[test]
    fn parses_own_output() {
        let fp = Fingerprint::of_der(b"abc");
        let parsed: Fingerprint = fp.to_string().parse().unwrap();
        assert_eq!(parsed, fp);
    }

    #[test]
    fn known_digest() {
        // SHA-256("abc")
        let fp = Fingerprint::of_der(b"abc");
        assert_eq!(fp.as_bytes()[0], 0xba);
        assert_eq!(fp.as_bytes()[31], 0xad);
    }

    #[test]
    fn rejects_malformed() {
        assert_eq!(
            "MD5:00".parse::<Fingerprint>(),
            Err(FingerprintError::MissingPrefix)
        );
        assert_eq!(
            "SHA256:00:11".parse::<Fingerprint>(),
            Err(FingerprintError::Length(2))
        );
        let bad = format!("SHA256:zz{}", ":00".repeat(31));
        assert!(matches!(
            bad.parse::<Fingerprint>(),
            Err(FingerprintError::InvalidByte(_))
        ));
    }

    #[test]
    fn serde_as_string() {
        let fp = Fingerprint::of_der(b"peer");
        let json = serde_json::to_string(&fp).unwrap();
        assert_eq!(json, format!("\"{fp}\""));
        let decoded: Fingerprint = serde_json::from_str(&json).unwrap();
        assert_eq!(decoded, fp);
    }
}
