//! Stream multiplexing core: accept loops, handler dispatch and stop.

use std::future::Future;
use std::net::SocketAddr;
use std::pin::Pin;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use peerquic_types::{Fingerprint, TransportStopInfo};
use quinn::Endpoint;
use rustls::pki_types::CertificateDer;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info, info_span, Instrument, Span};

use crate::config::TransportConfig;
use crate::error::TransportError;
use crate::session::{AcceptOutcome, Session};
use crate::stream::{BidirectionalStream, ReadableStream, WritableStream};

type HandlerFuture = Pin<Box<dyn Future<Output = ()> + Send>>;
type StreamHandler<S> = Arc<dyn Fn(S) -> HandlerFuture + Send + Sync>;

/// A running QUIC session with background accept loops.
///
/// Cloning yields another handle to the same transport.
#[derive(Clone)]
pub struct Transport {
    inner: Arc<Inner>,
}

struct Inner {
    state: RwLock<State>,
    /// Accept loops and handler invocations.
    tasks: TaskTracker,
    span: Span,
    remote_certificates: Vec<CertificateDer<'static>>,
    remote_fingerprint: Option<Fingerprint>,
    remote_address: SocketAddr,
    /// Drained after stop so the close reaches the peer.
    endpoint: Option<Endpoint>,
}

struct State {
    /// `None` once stopped.
    session: Option<Session>,
    on_bidirectional: Option<StreamHandler<BidirectionalStream>>,
    on_unidirectional: Option<StreamHandler<ReadableStream>>,
}

impl Transport {
    /// Take ownership of an established session and start accepting streams.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(session: Session, config: &TransportConfig) -> Self {
        let span = info_span!(
            "transport",
            name = %config.log_name,
            remote = %session.remote_address()
        );

        let inner = Arc::new(Inner {
            remote_certificates: session.remote_certificates().to_vec(),
            remote_fingerprint: session.remote_fingerprint(),
            remote_address: session.remote_address(),
            endpoint: session.owned_endpoint(),
            state: RwLock::new(State {
                session: Some(session.clone()),
                on_bidirectional: None,
                on_unidirectional: None,
            }),
            tasks: TaskTracker::new(),
            span,
        });

        inner.span.in_scope(|| info!("transport started"));
        inner.tasks.spawn(
            accept_bidirectional(Arc::clone(&inner), session.clone())
                .instrument(inner.span.clone()),
        );
        inner.tasks.spawn(
            accept_unidirectional(Arc::clone(&inner), session).instrument(inner.span.clone()),
        );

        Self { inner }
    }

    /// Open a bidirectional stream to the peer.
    pub async fn create_bidirectional_stream(
        &self,
    ) -> Result<BidirectionalStream, TransportError> {
        self.inner.session()?.open_stream().await
    }

    /// Open a send-only stream to the peer.
    pub async fn create_unidirectional_stream(&self) -> Result<WritableStream, TransportError> {
        self.inner.session()?.open_uni_stream().await
    }

    /// Handle bidirectional streams opened by the peer.
    ///
    /// Replaces any previous handler. Each stream runs the handler on its own
    /// task; streams accepted while no handler is registered are dropped.
    pub fn on_bidirectional_stream<F, Fut>(&self, handler: F)
    where
        F: Fn(BidirectionalStream) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let handler: StreamHandler<BidirectionalStream> =
            Arc::new(move |stream: BidirectionalStream| -> HandlerFuture {
                Box::pin(handler(stream))
            });
        self.inner.write_state().on_bidirectional = Some(handler);
    }

    /// Handle unidirectional streams opened by the peer.
    ///
    /// Same rules as [`Transport::on_bidirectional_stream`].
    pub fn on_unidirectional_stream<F, Fut>(&self, handler: F)
    where
        F: Fn(ReadableStream) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let handler: StreamHandler<ReadableStream> =
            Arc::new(move |stream: ReadableStream| -> HandlerFuture { Box::pin(handler(stream)) });
        self.inner.write_state().on_unidirectional = Some(handler);
    }

    /// Close the session and let the accept loops wind down.
    ///
    /// A graceful `info` closes without an application error; otherwise its
    /// code and reason are sent to the peer. Stopping again has no effect.
    pub fn stop(&self, info: TransportStopInfo) {
        self.inner.stop(&info);
    }

    pub fn is_stopped(&self) -> bool {
        self.inner.read_state().session.is_none()
    }

    /// Wait for the accept loops and every handler task to complete.
    ///
    /// Only resolves after the transport has stopped, locally or because the
    /// session ended. A dialed session's endpoint is also drained, so the
    /// peer has been told about the close.
    pub async fn wait_stopped(&self) {
        self.inner.tasks.wait().await;
        if let Some(endpoint) = &self.inner.endpoint {
            endpoint.wait_idle().await;
        }
    }

    /// Certificate chain the peer presented during the handshake.
    pub fn remote_certificates(&self) -> &[CertificateDer<'static>] {
        &self.inner.remote_certificates
    }

    /// Fingerprint of the peer's leaf certificate.
    pub fn remote_fingerprint(&self) -> Option<Fingerprint> {
        self.inner.remote_fingerprint
    }

    pub fn remote_address(&self) -> SocketAddr {
        self.inner.remote_address
    }
}

impl std::fmt::Debug for Transport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Transport")
            .field("remote_address", &self.inner.remote_address)
            .field("stopped", &self.is_stopped())
            .finish_non_exhaustive()
    }
}

impl Inner {
    fn read_state(&self) -> RwLockReadGuard<'_, State> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_state(&self) -> RwLockWriteGuard<'_, State> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn session(&self) -> Result<Session, TransportError> {
        self.read_state()
            .session
            .clone()
            .ok_or(TransportError::Stopped)
    }

    fn stop(&self, info: &TransportStopInfo) {
        let mut state = self.write_state();
        let Some(session) = state.session.take() else {
            return;
        };

        self.span.in_scope(|| info!(%info, "stopping transport"));
        if info.is_graceful() {
            session.close();
        } else {
            session.close_with_error(info.error_code, &info.reason);
        }
        self.tasks.close();
    }

    fn dispatch_bidirectional(&self, stream: BidirectionalStream) {
        let handler = self.read_state().on_bidirectional.clone();
        let id = stream.stream_id();
        match handler {
            Some(handler) => {
                debug!(stream = %id, "dispatching bidirectional stream");
                self.tasks.spawn(handler(stream).instrument(self.span.clone()));
            }
            None => debug!(stream = %id, "no bidirectional stream handler, dropping stream"),
        }
    }

    fn dispatch_unidirectional(&self, stream: ReadableStream) {
        let handler = self.read_state().on_unidirectional.clone();
        let id = stream.stream_id();
        match handler {
            Some(handler) => {
                debug!(stream = %id, "dispatching unidirectional stream");
                self.tasks.spawn(handler(stream).instrument(self.span.clone()));
            }
            None => debug!(stream = %id, "no unidirectional stream handler, dropping stream"),
        }
    }
}

async fn accept_bidirectional(inner: Arc<Inner>, session: Session) {
    loop {
        match session.accept_stream().await {
            AcceptOutcome::Delivered(stream) => inner.dispatch_bidirectional(stream),
            AcceptOutcome::Closed => {
                debug!("session closed, bidirectional accept loop exiting");
                inner.stop(&TransportStopInfo::default());
                return;
            }
            AcceptOutcome::Failed(e) => {
                error!(error = %e, "failed to accept bidirectional stream");
                inner.stop(&TransportStopInfo::with_reason(e.to_string()));
                return;
            }
        }
    }
}

async fn accept_unidirectional(inner: Arc<Inner>, session: Session) {
    loop {
        match session.accept_uni_stream().await {
            AcceptOutcome::Delivered(stream) => inner.dispatch_unidirectional(stream),
            AcceptOutcome::Closed => {
                debug!("session closed, unidirectional accept loop exiting");
                inner.stop(&TransportStopInfo::default());
                return;
            }
            AcceptOutcome::Failed(e) => {
                error!(error = %e, "failed to accept unidirectional stream");
                inner.stop(&TransportStopInfo::with_reason(e.to_string()));
                return;
            }
        }
    }
}
