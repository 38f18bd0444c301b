//! Parameters for stopping a transport.

use serde::{Deserialize, Serialize};

/// Application error code and reason sent when a transport stops.
///
/// The default value (code 0, empty reason) closes the session gracefully.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransportStopInfo {
    #[serde(default)]
    pub error_code: u16,
    #[serde(default)]
    pub reason: String,
}

impl TransportStopInfo {
    /// Stop with an application error code and reason.
    pub fn new(error_code: u16, reason: impl Into<String>) -> Self {
        Self {
            error_code,
            reason: reason.into(),
        }
    }

    /// Stop with error code 0 but a non-empty reason.
    pub fn with_reason(reason: impl Into<String>) -> Self {
        Self::new(0, reason)
    }

    /// Whether this stop signals no application error at all.
    #[must_use]
    pub fn is_graceful(&self) -> bool {
        self.error_code == 0 && self.reason.is_empty()
    }
}

impl std::fmt::Display for TransportStopInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_graceful() {
            write!(f, "graceful")
        } else {
            write!(f, "code {}: {}", self.error_code, self.reason)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_graceful() {
        assert!(TransportStopInfo::default().is_graceful());
    }

    #[test]
    fn reason_or_code_is_not_graceful() {
        assert!(!TransportStopInfo::with_reason("accept failed").is_graceful());
        assert!(!TransportStopInfo::new(3, "").is_graceful());
    }

    #[test]
    fn display() {
        assert_eq!(TransportStopInfo::default().to_string(), "graceful");
        assert_eq!(TransportStopInfo::new(7, "bye").to_string(), "code 7: bye");
    }

    #[test]
    fn deserializes_with_defaults() {
        let info: TransportStopInfo = serde_json::from_str(r#"{"reason":"done"}"#).unwrap();
        assert_eq!(info.error_code, 0);
        assert_eq!(info.reason, "done");
    }
}
