//! Transport and stream errors.

use thiserror::Error;

/// Errors from establishing, using or stopping a session.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("quic: creating client without remote address")]
    ClientWithoutRemoteAddress,

    #[error("invalid address {address:?}: {reason}")]
    InvalidAddress { address: String, reason: String },

    #[error("connection failed: {0}")]
    Connection(String),

    #[error("TLS error: {0}")]
    Tls(String),

    #[error("invalid QUIC settings: {0}")]
    Config(String),

    #[error("listener closed")]
    ListenerClosed,

    #[error("transport stopped")]
    Stopped,

    #[error(transparent)]
    Quinn(#[from] quinn::ConnectionError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Errors from reading or writing one stream.
#[derive(Debug, Error)]
pub enum StreamError {
    #[error("stream deadline exceeded")]
    TimedOut,

    /// A write ran out of time after the first `written` bytes were accepted.
    #[error("stream deadline exceeded after writing {written} bytes")]
    WriteTimedOut { written: usize },

    #[error("stream reset by peer with code {0}")]
    Reset(u64),

    #[error("peer stopped reading with code {0}")]
    Stopped(u64),

    #[error("connection lost: {0}")]
    ConnectionLost(#[source] quinn::ConnectionError),

    #[error("stream already finished")]
    Finished,

    #[error("stream closed: {0}")]
    Closed(String),
}

impl StreamError {
    /// Whether the error is a deadline expiry.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::TimedOut | Self::WriteTimedOut { .. })
    }

    /// Bytes a failed write handed to the stream before giving up.
    ///
    /// Retrying with the rest of the payload keeps the stream intact.
    pub fn written(&self) -> usize {
        match self {
            Self::WriteTimedOut { written } => *written,
            _ => 0,
        }
    }

    /// Whether a read failing with this error ends the read side.
    ///
    /// Every error except a deadline expiry is treated as end of stream,
    /// including ones that may have been transient.
    pub fn finishes_read(&self) -> bool {
        !self.is_timeout()
    }
}

impl From<quinn::ReadError> for StreamError {
    fn from(err: quinn::ReadError) -> Self {
        match err {
            quinn::ReadError::Reset(code) => Self::Reset(code.into_inner()),
            quinn::ReadError::ConnectionLost(e) => Self::ConnectionLost(e),
            other => Self::Closed(other.to_string()),
        }
    }
}

impl From<quinn::WriteError> for StreamError {
    fn from(err: quinn::WriteError) -> Self {
        match err {
            quinn::WriteError::Stopped(code) => Self::Stopped(code.into_inner()),
            quinn::WriteError::ConnectionLost(e) => Self::ConnectionLost(e),
            other => Self::Closed(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_timeouts_keep_the_read_side_open() {
        assert!(!StreamError::TimedOut.finishes_read());
        assert!(StreamError::TimedOut.is_timeout());
        assert!(StreamError::Reset(3).finishes_read());
        assert!(StreamError::Closed("gone".to_string()).finishes_read());
        assert!(StreamError::ConnectionLost(quinn::ConnectionError::LocallyClosed).finishes_read());
    }

    #[test]
    fn write_timeout_reports_progress() {
        let err = StreamError::WriteTimedOut { written: 4096 };
        assert!(err.is_timeout());
        assert_eq!(err.written(), 4096);
        assert_eq!(
            err.to_string(),
            "stream deadline exceeded after writing 4096 bytes"
        );
        assert_eq!(StreamError::TimedOut.written(), 0);
    }

    #[test]
    fn read_errors_keep_their_kind() {
        let err = StreamError::from(quinn::ReadError::Reset(quinn::VarInt::from_u32(9)));
        assert!(matches!(err, StreamError::Reset(9)));

        let err = StreamError::from(quinn::ReadError::ConnectionLost(
            quinn::ConnectionError::TimedOut,
        ));
        assert!(matches!(
            err,
            StreamError::ConnectionLost(quinn::ConnectionError::TimedOut)
        ));
    }

    #[test]
    fn write_errors_keep_their_kind() {
        let err = StreamError::from(quinn::WriteError::Stopped(quinn::VarInt::from_u32(4)));
        assert!(matches!(err, StreamError::Stopped(4)));
        assert_eq!(err.to_string(), "peer stopped reading with code 4");
    }

    #[test]
    fn client_without_address_message() {
        assert_eq!(
            TransportError::ClientWithoutRemoteAddress.to_string(),
            "quic: creating client without remote address"
        );
    }
}
