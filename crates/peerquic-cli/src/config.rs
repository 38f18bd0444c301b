//! CLI configuration loaded from TOML.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use peerquic_transport::{QuicSettings, TransportConfig};
use serde::{Deserialize, Serialize};

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub identity: IdentityConfig,
    #[serde(default)]
    pub quic: QuicSettings,
    #[serde(default)]
    pub log: LogConfig,
}

/// Local certificate and key.
///
/// Without both paths an ephemeral certificate is generated on every start.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdentityConfig {
    #[serde(default)]
    pub cert: Option<PathBuf>,
    #[serde(default)]
    pub key: Option<PathBuf>,
    /// Hostname put into an ephemeral certificate.
    #[serde(default = "default_hostname")]
    pub hostname: String,
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            cert: None,
            key: None,
            hostname: default_hostname(),
        }
    }
}

/// Logging settings. `RUST_LOG` overrides `level`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Name attached to every transport log line.
    #[serde(default = "default_log_name")]
    pub name: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            name: default_log_name(),
        }
    }
}

impl Config {
    /// Load the file at `path`, or the defaults when no path is given.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        toml::from_str(&text).with_context(|| format!("invalid config {}", path.display()))
    }

    /// Build the transport configuration, reading or generating the identity.
    pub fn transport_config(&self) -> anyhow::Result<TransportConfig> {
        let (cert_pem, key_pem) = match (&self.identity.cert, &self.identity.key) {
            (Some(cert), Some(key)) => (
                std::fs::read_to_string(cert)
                    .with_context(|| format!("failed to read certificate {}", cert.display()))?,
                std::fs::read_to_string(key)
                    .with_context(|| format!("failed to read key {}", key.display()))?,
            ),
            (None, None) => {
                let generated = peerquic_certgen::generate_certificate(&self.identity.hostname)?;
                tracing::info!(
                    fingerprint = %generated.fingerprint,
                    "using ephemeral certificate"
                );
                (generated.cert_pem, generated.key_pem)
            }
            _ => bail!("[identity] needs both cert and key, or neither"),
        };

        Ok(TransportConfig::from_pem(&cert_pem, &key_pem)?
            .with_log_name(self.log.name.clone())
            .with_quic(self.quic.clone()))
    }
}

fn default_hostname() -> String {
    hostname::get()
        .ok()
        .and_then(|h| h.into_string().ok())
        .unwrap_or_else(|| "peerquic".to_string())
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_name() -> String {
    "peerquic".to_string()
}
