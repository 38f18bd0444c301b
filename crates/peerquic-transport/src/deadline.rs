//! Absolute deadlines for stream operations.
//!
//! The engine has no notion of deadlines, so each stream direction carries a
//! [`Deadline`] that races the engine future against a timer. Moving the
//! deadline re-arms the timer of an operation that is already waiting.

use std::future::Future;
use std::sync::Arc;

use tokio::sync::watch;
use tokio::time::{self, Instant};

use crate::error::StreamError;

/// Shared, adjustable deadline for one direction of a stream.
///
/// Clones share the same deadline, so a handle kept by another task can
/// shorten or clear it while a read or write is blocked.
#[derive(Debug, Clone)]
pub struct Deadline {
    tx: Arc<watch::Sender<Option<Instant>>>,
}

impl Deadline {
    pub(crate) fn new() -> Self {
        let (tx, _rx) = watch::channel(None);
        Self { tx: Arc::new(tx) }
    }

    /// Replace the deadline; `None` means operations never time out.
    pub fn set(&self, deadline: Option<Instant>) {
        self.tx.send_replace(deadline);
    }

    pub fn get(&self) -> Option<Instant> {
        *self.tx.borrow()
    }

    pub fn is_expired(&self) -> bool {
        self.get().is_some_and(|at| at <= Instant::now())
    }

    /// Drive `fut` unless the deadline passes first.
    pub(crate) async fn guard<F: Future>(&self, fut: F) -> Result<F::Output, StreamError> {
        let mut rx = self.tx.subscribe();
        tokio::pin!(fut);

        loop {
            let current = *rx.borrow_and_update();
            if current.is_some_and(|at| at <= Instant::now()) {
                return Err(StreamError::TimedOut);
            }

            let expiry = async move {
                match current {
                    Some(at) => time::sleep_until(at).await,
                    None => std::future::pending::<()>().await,
                }
            };

            tokio::select! {
                biased;
                () = expiry => return Err(StreamError::TimedOut),
                out = &mut fut => return Ok(out),
                Ok(()) = rx.changed() => {}
            }
        }
    }
}
