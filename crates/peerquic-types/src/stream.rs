//! Stream identifiers and per-call read/write values.

use bytes::Bytes;
use serde::{Deserialize, Serialize};

/// Identifier of a stream within one session.
///
/// The two low bits follow RFC 9000: bit 0 is the initiator (0 = client),
/// bit 1 the directionality (0 = bidirectional).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct StreamId(pub u64);

impl StreamId {
    /// Whether the client side of the session opened this stream.
    #[must_use]
    pub fn is_client_initiated(self) -> bool {
        self.0 & 0x1 == 0
    }

    /// Whether data only flows from the initiator to the acceptor.
    #[must_use]
    pub fn is_unidirectional(self) -> bool {
        self.0 & 0x2 != 0
    }

    /// Sequence number among streams of the same initiator and direction.
    #[must_use]
    pub fn index(self) -> u64 {
        self.0 >> 2
    }
}

impl From<u64> for StreamId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

impl std::fmt::Display for StreamId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Outcome of a single read.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StreamReadResult {
    /// Bytes copied into the caller's buffer.
    pub amount: usize,
    /// The read side has ended; no further bytes will arrive.
    pub finished: bool,
}

impl StreamReadResult {
    /// A read that delivered `amount` bytes and left the stream open.
    #[must_use]
    pub fn data(amount: usize) -> Self {
        Self {
            amount,
            finished: false,
        }
    }

    /// The terminal read result.
    #[must_use]
    pub fn finished() -> Self {
        Self {
            amount: 0,
            finished: true,
        }
    }
}

/// A write request: payload plus whether it is the last one on the stream.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StreamWriteParameters {
    pub data: Bytes,
    /// Finish the write side once `data` has been written.
    pub finished: bool,
}

impl StreamWriteParameters {
    /// A write that keeps the stream open.
    pub fn new(data: impl Into<Bytes>) -> Self {
        Self {
            data: data.into(),
            finished: false,
        }
    }

    /// The final write on a stream.
    pub fn last(data: impl Into<Bytes>) -> Self {
        Self {
            data: data.into(),
            finished: true,
        }
    }

    /// Set the finish flag.
    #[must_use]
    pub fn with_finished(mut self, finished: bool) -> Self {
        self.finished = finished;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stream_id_bits() {
        // client-initiated bidirectional streams: 0, 4, 8, ...
        let id = StreamId(8);
        assert!(id.is_client_initiated());
        assert!(!id.is_unidirectional());
        assert_eq!(id.index(), 2);

        // server-initiated unidirectional: 3, 7, ...
        let id = StreamId(7);
        assert!(!id.is_client_initiated());
        assert!(id.is_unidirectional());
        assert_eq!(id.index(), 1);
    }

    #[test]
    fn stream_id_display() {
        assert_eq!(StreamId(42).to_string(), "42");
    }

    #[test]
    fn read_result_constructors() {
        assert_eq!(
            StreamReadResult::data(12),
            StreamReadResult {
                amount: 12,
                finished: false
            }
        );
        assert!(StreamReadResult::finished().finished);
        assert_eq!(StreamReadResult::finished().amount, 0);
        assert_eq!(StreamReadResult::default(), StreamReadResult::data(0));
    }

    #[test]
    fn write_parameters_flags() {
        let params = StreamWriteParameters::new(&b"abc"[..]);
        assert!(!params.finished);
        assert_eq!(params.data.as_ref(), b"abc");

        let params = StreamWriteParameters::last(vec![1u8, 2]);
        assert!(params.finished);

        let params = StreamWriteParameters::new(Vec::new()).with_finished(true);
        assert!(params.finished);
        assert!(params.data.is_empty());
    }
}
