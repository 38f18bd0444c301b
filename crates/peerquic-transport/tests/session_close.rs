//! Integration test: how session closes surface in the accept paths.

use std::net::SocketAddr;
use std::time::Duration;

use peerquic_transport::{AcceptOutcome, Listener, Session, TransportConfig, TransportError};
use tokio::time::timeout;

const TIMEOUT: Duration = Duration::from_secs(10);

fn test_config() -> TransportConfig {
    let cert = peerquic_certgen::generate_certificate("localhost").unwrap();
    TransportConfig::from_pem(&cert.cert_pem, &cert.key_pem).unwrap()
}

async fn session_pair() -> (Session, Session, Listener) {
    let listener = Listener::bind("127.0.0.1:0".parse().unwrap(), &test_config()).unwrap();
    let addr: SocketAddr = listener.local_addr().unwrap();

    let client_config = test_config();
    let (server, client) = tokio::join!(
        listener.accept(),
        Session::dial(addr, "localhost", &client_config)
    );
    (server.unwrap(), client.unwrap(), listener)
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn peer_graceful_close_is_not_an_error() {
    let (server, client, listener) = session_pair().await;

    client.close();
    let outcome = timeout(TIMEOUT, server.accept_stream()).await.unwrap();
    assert!(matches!(outcome, AcceptOutcome::Closed));
    let outcome = timeout(TIMEOUT, server.accept_uni_stream()).await.unwrap();
    assert!(matches!(outcome, AcceptOutcome::Closed));

    listener.close();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn peer_error_close_fails_accept() {
    let (server, client, listener) = session_pair().await;

    client.close_with_error(42, "boom");
    let outcome = timeout(TIMEOUT, server.accept_uni_stream()).await.unwrap();
    match outcome {
        AcceptOutcome::Failed(TransportError::Quinn(quinn::ConnectionError::ApplicationClosed(
            close,
        ))) => {
            assert_eq!(close.error_code.into_inner(), 42);
            assert_eq!(&close.reason[..], b"boom");
        }
        other => panic!("expected application close, got {other:?}"),
    }

    listener.close();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn local_close_ends_accept_and_open() {
    let (server, client, listener) = session_pair().await;

    server.close();
    let outcome = timeout(TIMEOUT, server.accept_stream()).await.unwrap();
    assert!(matches!(outcome, AcceptOutcome::Closed));
    assert!(server.open_stream().await.is_err());
    assert!(matches!(
        server.closed().await,
        quinn::ConnectionError::LocallyClosed
    ));

    // the peer sees the graceful close too
    let outcome = timeout(TIMEOUT, client.accept_stream()).await.unwrap();
    assert!(matches!(outcome, AcceptOutcome::Closed));

    listener.close();
}
