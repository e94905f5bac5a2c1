//! [`CockpitServer`] – WebSocket endpoint for dashboards and sensor apps.
//!
//! Listens on `0.0.0.0:8080` (configurable via [`CockpitServer::with_port`]).
//!
//! * WebSocket upgrades → one registered channel per connection; every text
//!   frame is dispatched in order and answered on the same channel.
//! * Any other HTTP request → a plain-text status line.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};

use futures_util::{SinkExt, StreamExt};
use rangelight_types::{LightError, Response};
use thiserror::Error;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::{accept_async, tungstenite::Message};
use tracing::{debug, error, info, warn};

use crate::context::AppContext;
use crate::dispatcher::dispatch;

/// Default TCP port for the WebSocket server.
pub const DEFAULT_PORT: u16 = 8080;

const STATUS_BODY: &str = "rangelight bridge: connect with a WebSocket client\n";

#[derive(Error, Debug)]
pub enum ServerError {
    #[error("bind error on {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        source: std::io::Error,
    },
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("websocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),
}

// ─────────────────────────────────────────────────────────────────────────────
// CockpitServer
// ─────────────────────────────────────────────────────────────────────────────

pub struct CockpitServer {
    ctx: AppContext,
    host: IpAddr,
    port: u16,
}

impl CockpitServer {
    /// Create a server on `0.0.0.0:`[`DEFAULT_PORT`].
    pub fn new(ctx: AppContext) -> Self {
        Self {
            ctx,
            host: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: DEFAULT_PORT,
        }
    }

    /// Override the listening port (builder-style). `0` picks a free port.
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn with_host(mut self, host: IpAddr) -> Self {
        self.host = host;
        self
    }

    /// Bind the listener without accepting yet.
    pub async fn bind(self) -> Result<BoundServer, ServerError> {
        let addr = SocketAddr::new(self.host, self.port);
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| ServerError::Bind { addr, source })?;
        let local_addr = listener.local_addr()?;
        info!(addr = %local_addr, "websocket server listening");
        Ok(BoundServer {
            ctx: self.ctx,
            listener,
            local_addr,
        })
    }

    /// Bind and serve until the task is dropped.
    pub async fn run(self) -> Result<(), ServerError> {
        self.bind().await?.serve().await;
        Ok(())
    }
}

/// A bound listener, ready to accept connections.
pub struct BoundServer {
    ctx: AppContext,
    listener: TcpListener,
    local_addr: SocketAddr,
}

impl BoundServer {
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Accept connections forever, one task per connection.
    pub async fn serve(self) {
        loop {
            match self.listener.accept().await {
                Ok((stream, peer)) => {
                    let ctx = self.ctx.clone();
                    tokio::spawn(async move {
                        if let Err(e) = handle_connection(stream, peer, ctx).await {
                            warn!(peer = %peer, error = %e, "client error");
                        }
                    });
                }
                Err(e) => {
                    error!(error = %e, "accept error");
                }
            }
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Per-connection handler
// ─────────────────────────────────────────────────────────────────────────────

async fn handle_connection(
    stream: TcpStream,
    peer: SocketAddr,
    ctx: AppContext,
) -> Result<(), ServerError> {
    // `peek` leaves the request in the socket for the handshake.
    let mut buf = [0u8; 1024];
    let n = stream.peek(&mut buf).await?;
    let head = String::from_utf8_lossy(&buf[..n]).to_lowercase();
    let is_ws_upgrade = head
        .lines()
        .any(|line| line.starts_with("upgrade:") && line.contains("websocket"));

    if is_ws_upgrade {
        handle_ws(stream, peer, ctx).await
    } else {
        serve_status(stream).await
    }
}

async fn serve_status(mut stream: TcpStream) -> Result<(), ServerError> {
    // Consume the peeked request so closing the socket does not reset it.
    let mut request = [0u8; 1024];
    let _ = stream.read(&mut request).await?;
    let response = format!(
        "HTTP/1.1 200 OK\r\n\
         Content-Type: text/plain; charset=utf-8\r\n\
         Content-Length: {}\r\n\
         Connection: close\r\n\
         \r\n\
         {}",
        STATUS_BODY.len(),
        STATUS_BODY
    );
    stream.write_all(response.as_bytes()).await?;
    stream.shutdown().await?;
    Ok(())
}

async fn handle_ws(stream: TcpStream, peer: SocketAddr, ctx: AppContext) -> Result<(), ServerError> {
    let ws_stream = accept_async(stream).await?;
    let (mut ws_tx, mut ws_rx) = ws_stream.split();

    let (client, mut outbound) = ctx.hub.register();
    let Some(replies) = ctx.hub.sender(client) else {
        return Ok(());
    };
    info!(peer = %peer, client = %client, "client connected");

    // Writer: drains direct replies and broadcasts in queue order.
    let writer = tokio::spawn(async move {
        while let Some(frame) = outbound.recv().await {
            if ws_tx.send(Message::Text(frame.into())).await.is_err() {
                break;
            }
        }
        let _ = ws_tx.close().await;
    });

    // Reader: one request at a time; the next frame is read only after the
    // current response is queued.
    while let Some(msg) = ws_rx.next().await {
        let reply = match msg {
            Ok(Message::Text(text)) => dispatch(&ctx, text.as_str()).await,
            Ok(Message::Binary(_)) => Response::rejected(
                LightError::InvalidMessage("binary frames are not supported".into()).to_string(),
            ),
            Ok(Message::Close(_)) => break,
            Ok(_) => continue,
            Err(e) => {
                debug!(client = %client, error = %e, "read error");
                break;
            }
        };
        match serde_json::to_string(&reply) {
            Ok(frame) => {
                if replies.send(frame).is_err() {
                    break;
                }
            }
            Err(e) => error!(client = %client, error = %e, "response encoding failed"),
        }
    }

    ctx.hub.unregister(client);
    drop(replies);
    let _ = writer.await;
    info!(peer = %peer, client = %client, "client disconnected");
    Ok(())
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
