//! Shared types for peerquic.
//!
//! Plain values exchanged between the transport core and its callers:
//! stream identifiers, read outcomes, write requests, stop parameters and
//! certificate fingerprints. Nothing here touches the network.

pub mod fingerprint;
pub mod stop;
pub mod stream;

pub use fingerprint::{Fingerprint, FingerprintError};
pub use stop::TransportStopInfo;
pub use stream::{StreamId, StreamReadResult, StreamWriteParameters};
