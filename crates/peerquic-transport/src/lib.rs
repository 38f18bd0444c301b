//! QUIC session layer for peerquic.
//!
//! A [`Transport`] owns one QUIC session (via quinn), runs accept loops for
//! peer-initiated streams and hands each stream to a registered handler.
//! Streams are wrapped in [`ReadableStream`], [`WritableStream`] and
//! [`BidirectionalStream`], which add end-of-stream reporting and deadlines.

pub mod config;
pub mod deadline;
pub mod error;
mod establish;
pub mod listener;
pub mod session;
pub mod stream;
pub mod tls;
pub mod transport;

pub use config::{QuicSettings, TransportConfig};
pub use deadline::Deadline;
pub use error::{StreamError, TransportError};
pub use listener::Listener;
pub use session::{AcceptOutcome, Role, Session};
pub use stream::{BidirectionalStream, ReadableStream, WritableStream};
pub use transport::Transport;

pub use peerquic_types::{
    Fingerprint, StreamId, StreamReadResult, StreamWriteParameters, TransportStopInfo,
};
