//! peerquic CLI: generate identities and exchange streams with a peer.

mod config;

use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Parser, Subcommand};
use peerquic_transport::{
    BidirectionalStream, ReadableStream, StreamWriteParameters, Transport, TransportStopInfo,
};
use tokio::io::{AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{info, warn};

use crate::config::Config;

#[derive(Parser)]
#[command(
    name = "peerquic",
    about = "Peer-to-peer streams over QUIC",
    version,
    propagate_version = true
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate a TLS certificate for this peer.
    GenerateCert {
        /// Output directory for certificate files.
        #[arg(short, long, default_value = ".")]
        output: PathBuf,

        /// Hostname to put into the certificate. Defaults to this machine's.
        #[arg(long)]
        hostname: Option<String>,
    },

    /// Wait for one peer, echo its bidirectional streams and count its
    /// unidirectional ones.
    Listen {
        /// Local address to listen on (host:port).
        #[arg(short, long, default_value = "0.0.0.0:4433")]
        addr: String,

        /// Path to configuration file.
        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// Connect to a peer and send stdin or a file on a new stream.
    Dial {
        /// Address of the remote peer (host:port).
        address: String,

        /// Path to configuration file.
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Send on a unidirectional stream instead of waiting for an echo.
        #[arg(long)]
        uni: bool,

        /// Read the payload from this file instead of stdin.
        #[arg(short, long)]
        input: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::GenerateCert { output, hostname } => {
            init_tracing("info");
            generate_cert(&output, hostname)?;
        }
        Commands::Listen { addr, config } => {
            let config = Config::load(config.as_deref())?;
            init_tracing(&config.log.level);
            listen(&addr, &config).await?;
        }
        Commands::Dial {
            address,
            config,
            uni,
            input,
        } => {
            let config = Config::load(config.as_deref())?;
            init_tracing(&config.log.level);
            dial(&address, &config, uni, input.as_deref()).await?;
        }
    }

    Ok(())
}

fn init_tracing(default_level: &str) {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();
}

fn generate_cert(output: &Path, hostname: Option<String>) -> anyhow::Result<()> {
    let hostname = hostname.unwrap_or_else(|| {
        hostname::get()
            .ok()
            .and_then(|h| h.into_string().ok())
            .unwrap_or_else(|| "peerquic".to_string())
    });

    info!(hostname = %hostname, output = %output.display(), "generating TLS certificate");

    let cert = peerquic_certgen::generate_certificate(&hostname)?;
    let (cert_path, key_path) = cert.write_to(output)?;

    println!("Certificate: {}", cert_path.display());
    println!("Private key: {}", key_path.display());
    println!("Fingerprint: {}", cert.fingerprint);
    Ok(())
}

async fn listen(addr: &str, config: &Config) -> anyhow::Result<()> {
    let transport_config = config.transport_config()?;
    info!(addr = %addr, "waiting for a peer");

    let (transport, listener) = Transport::listen(addr, &transport_config)
        .await
        .with_context(|| format!("failed to accept a peer on {addr}"))?;
    if let Some(fingerprint) = transport.remote_fingerprint() {
        println!("Peer {} ({fingerprint})", transport.remote_address());
    }

    transport.on_bidirectional_stream(echo);
    transport.on_unidirectional_stream(count);

    tokio::select! {
        () = transport.wait_stopped() => info!("peer closed the session"),
        result = tokio::signal::ctrl_c() => {
            result?;
            info!("interrupted, stopping");
            transport.stop(TransportStopInfo::default());
            transport.wait_stopped().await;
        }
    }

    listener.close();
    listener.wait_idle().await;
    Ok(())
}

async fn echo(stream: BidirectionalStream) {
    let id = stream.stream_id();
    let (mut send, mut recv) = stream.split();
    let mut buf = vec![0u8; 64 * 1024];
    let mut total = 0;

    loop {
        let read = match recv.read_into(&mut buf).await {
            Ok(read) => read,
            Err(e) => {
                warn!(stream = %id, error = %e, "read failed");
                return;
            }
        };
        total += read.amount;

        let params = StreamWriteParameters::new(buf[..read.amount].to_vec())
            .with_finished(read.finished);
        if let Err(e) = send.write(params).await {
            warn!(stream = %id, error = %e, "echo failed");
            return;
        }
        if read.finished {
            break;
        }
    }

    info!(stream = %id, bytes = total, "echoed stream");
}

async fn count(mut stream: ReadableStream) {
    let id = stream.stream_id();
    let mut buf = vec![0u8; 64 * 1024];
    let mut total = 0;

    loop {
        match stream.read_into(&mut buf).await {
            Ok(read) => {
                total += read.amount;
                if read.finished {
                    break;
                }
            }
            Err(e) => {
                warn!(stream = %id, error = %e, bytes = total, "read failed");
                return;
            }
        }
    }

    info!(stream = %id, bytes = total, "received stream");
    println!("stream {id}: {total} bytes");
}

async fn dial(
    address: &str,
    config: &Config,
    uni: bool,
    input: Option<&Path>,
) -> anyhow::Result<()> {
    let payload = match input {
        Some(path) => tokio::fs::read(path)
            .await
            .with_context(|| format!("failed to read {}", path.display()))?,
        None => {
            let mut payload = Vec::new();
            tokio::io::stdin().read_to_end(&mut payload).await?;
            payload
        }
    };

    let transport_config = config.transport_config()?;
    let transport = Transport::dial(address, &transport_config)
        .await
        .with_context(|| format!("failed to dial {address}"))?;
    if let Some(fingerprint) = transport.remote_fingerprint() {
        info!(peer = %fingerprint, "connected");
    }

    let sent = payload.len();
    if uni {
        let mut stream = transport.create_unidirectional_stream().await?;
        stream.write(StreamWriteParameters::last(payload)).await?;
        if let Some(code) = stream.stopped().await? {
            warn!(code, "peer stopped the stream early");
        }
    } else {
        let stream = transport.create_bidirectional_stream().await?;
        let received = exchange(stream, payload, &mut tokio::io::stdout()).await?;
        info!(bytes = received, "received echo");
    }
    info!(bytes = sent, uni, "sent stream");

    transport.stop(TransportStopInfo::default());
    transport.wait_stopped().await;
    Ok(())
}

/// Send `payload` as the whole stream while copying the reply into `out`.
///
/// Both directions run concurrently: the peer stops reading once its echo
/// fills our receive window.
async fn exchange<W>(
    stream: BidirectionalStream,
    payload: Vec<u8>,
    out: &mut W,
) -> anyhow::Result<usize>
where
    W: AsyncWrite + Unpin,
{
    let (mut send, mut recv) = stream.split();

    let sender = async {
        send.write(StreamWriteParameters::last(payload)).await?;
        anyhow::Ok(())
    };
    let receiver = async {
        let mut buf = vec![0u8; 64 * 1024];
        let mut total = 0;
        loop {
            let read = recv.read_into(&mut buf).await?;
            out.write_all(&buf[..read.amount]).await?;
            total += read.amount;
            if read.finished {
                break;
            }
        }
        out.flush().await?;
        anyhow::Ok(total)
    };

    let ((), received) = tokio::try_join!(sender, receiver)?;
    Ok(received)
}
