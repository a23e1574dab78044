//! The two concurrently served listeners and per-connection lifecycle.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tokio::net::TcpListener;
use tracing::{debug, info, warn};

use super::connection::{BoxedIo, ClientConnection, ConnectionError};
use crate::registry::GameRegistry;
use crate::router;

/// Binds the line-framed TCP listener and the WebSocket listener on
/// their configured ports and accepts peers until the process exits.
pub async fn serve(registry: Arc<GameRegistry>) -> anyhow::Result<()> {
    let config = registry.config().clone();
    let tcp = TcpListener::bind((config.host.as_str(), config.tcp_port))
        .await
        .with_context(|| format!("binding tcp listener on {}:{}", config.host, config.tcp_port))?;
    let ws = TcpListener::bind((config.host.as_str(), config.ws_port))
        .await
        .with_context(|| format!("binding ws listener on {}:{}", config.host, config.ws_port))?;
    info!(
        host = %config.host,
        tcp_port = config.tcp_port,
        ws_port = config.ws_port,
        "server listening on both transports"
    );

    tokio::select! {
        result = accept_lines(tcp, Arc::clone(&registry)) => result,
        result = accept_sockets(ws, registry) => result,
    }
}

/// Accept loop for the newline-framed byte-stream transport.
async fn accept_lines(listener: TcpListener, registry: Arc<GameRegistry>) -> anyhow::Result<()> {
    loop {
        let (stream, addr) = listener.accept().await.context("accepting tcp peer")?;
        debug!(peer = %addr, "tcp peer accepted");
        let conn = Arc::new(ClientConnection::from_lines(
            Box::new(stream),
            addr.to_string(),
        ));
        tokio::spawn(run_connection(conn, Arc::clone(&registry)));
    }
}

/// Accept loop for the message-framed WebSocket transport.
async fn accept_sockets(listener: TcpListener, registry: Arc<GameRegistry>) -> anyhow::Result<()> {
    loop {
        let (stream, addr) = listener.accept().await.context("accepting ws peer")?;
        debug!(peer = %addr, "ws peer accepted");
        let registry = Arc::clone(&registry);
        tokio::spawn(async move {
            match tokio_tungstenite::accept_async(Box::new(stream) as BoxedIo).await {
                Ok(socket) => {
                    let conn = Arc::new(ClientConnection::from_socket(socket, addr.to_string()));
                    run_connection(conn, registry).await;
                }
                Err(err) => warn!(peer = %addr, error = %err, "websocket handshake failed"),
            }
        });
    }
}

/// The whole lifecycle of one peer: read frames until the peer goes
/// quiet, goes away, or misbehaves at the transport level, then route
/// the departure through its session.
async fn run_connection(conn: Arc<ClientConnection>, registry: Arc<GameRegistry>) {
    info!(peer = %conn.remote_addr(), "peer connected");
    let idle = Duration::from_secs(registry.config().idle_timeout_secs);
    loop {
        match tokio::time::timeout(idle, conn.read()).await {
            Err(_) => {
                info!(peer = %conn.remote_addr(), "idle timeout, dropping peer");
                break;
            }
            Ok(Err(ConnectionError::Closed)) => {
                info!(peer = %conn.remote_addr(), "peer closed the connection");
                break;
            }
            Ok(Err(err)) => {
                info!(peer = %conn.remote_addr(), error = %err, "transport failure, dropping peer");
                break;
            }
            Ok(Ok(frame)) => router::handle_message(&registry, &conn, &frame).await,
        }
    }
    router::handle_disconnect(&registry, &conn).await;
    debug!(peer = %conn.remote_addr(), "peer cleaned up");
}
