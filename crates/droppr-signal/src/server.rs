//! WebSocket signal server implementation

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::time::timeout;
use tokio_tungstenite::accept_hdr_async_with_config;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::http::header::ORIGIN;
use tokio_tungstenite::tungstenite::http::StatusCode;
use tokio_tungstenite::tungstenite::protocol::WebSocketConfig;
use tracing::{debug, info, warn};

use droppr_core::{Config, ConnId, RelayError, Session};

use crate::registry::ChannelRegistry;
use crate::relay;
use crate::session::{CookieSessionResolver, SessionResolver};
use crate::ws;

/// Signal server state
#[derive(Clone)]
pub struct SignalServer {
    config: Arc<Config>,
    /// Active channels by drop id
    registry: Arc<ChannelRegistry>,
    resolver: Arc<dyn SessionResolver>,
    /// Live relay sessions
    connections: Arc<AtomicUsize>,
}

impl SignalServer {
    /// Server that authorizes connections by their session cookies
    pub fn new(config: Config) -> Self {
        Self::with_resolver(config, Arc::new(CookieSessionResolver))
    }

    pub fn with_resolver(config: Config, resolver: Arc<dyn SessionResolver>) -> Self {
        Self {
            registry: Arc::new(ChannelRegistry::new(&config.relay)),
            config: Arc::new(config),
            resolver,
            connections: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Start the signal server
    pub async fn serve(&self, addr: SocketAddr) -> Result<(), std::io::Error> {
        let listener = TcpListener::bind(addr).await?;
        self.serve_listener(listener).await
    }

    /// Accept connections from an already bound listener
    pub async fn serve_listener(&self, listener: TcpListener) -> Result<(), std::io::Error> {
        info!("Signal server listening on {}", listener.local_addr()?);

        loop {
            let (stream, peer_addr) = listener.accept().await?;
            let server = self.clone();

            tokio::spawn(async move {
                if let Err(e) = server.handle_connection(stream, peer_addr).await {
                    debug!("Connection error from {}: {:?}", peer_addr, e);
                }
            });
        }
    }

    pub fn registry(&self) -> &Arc<ChannelRegistry> {
        &self.registry
    }

    /// Get channel count (for monitoring)
    pub fn channel_count(&self) -> usize {
        self.registry.channel_count()
    }

    /// Get live connection count (for monitoring)
    pub fn connection_count(&self) -> usize {
        self.connections.load(Ordering::Relaxed)
    }

    /// Handle a single connection (HTTP or WebSocket)
    async fn handle_connection(
        &self,
        mut stream: TcpStream,
        peer_addr: SocketAddr,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let deadline = self.config.server.handshake_timeout();

        // Peek at the request line to route health checks
        let mut peek_buf = [0u8; 64];
        let n = timeout(deadline, peek_request_line(&stream, &mut peek_buf)).await??;
        if n == 0 {
            return Ok(());
        }
        let head = String::from_utf8_lossy(&peek_buf[..n]);

        if let Some(path @ ("/health" | "/stats")) = request_path(&head) {
            let path = path.to_string();
            return self.handle_http_request(&mut stream, &path).await;
        }

        let mut session = None;
        let callback = |request: &Request, response: Response| {
            self.authorize(request, peer_addr).map(|resolved| {
                session = Some(resolved);
                response
            })
        };

        let mut ws_config = WebSocketConfig::default();
        ws_config.max_message_size = Some(self.config.relay.max_frame_bytes);
        ws_config.max_frame_size = Some(self.config.relay.max_frame_bytes);

        let ws_stream = timeout(
            deadline,
            accept_hdr_async_with_config(stream, callback, Some(ws_config)),
        )
        .await??;
        let Some(session) = session else {
            return Ok(());
        };

        let conn_id = ConnId::try_generate()?;
        debug!(
            "New connection from {} as {} ({} on channel {})",
            peer_addr, conn_id, session.role, session.channel_id
        );

        self.connections.fetch_add(1, Ordering::Relaxed);
        let result = relay::run_session(
            &self.registry,
            &session,
            ws::connection(ws_stream),
            conn_id,
        )
        .await;
        self.connections.fetch_sub(1, Ordering::Relaxed);

        match result {
            Ok(_) | Err(RelayError::SlotBusy(_)) => {}
            Err(e) => debug!("Relay session {} ended with error: {}", conn_id, e),
        }

        debug!("Connection closed: {}", conn_id);
        Ok(())
    }

    /// Decide whether an upgrade request may open a signal channel
    fn authorize(&self, request: &Request, peer_addr: SocketAddr) -> Result<Session, ErrorResponse> {
        let server = &self.config.server;

        if request.uri().path() != server.path {
            return Err(error_response(StatusCode::NOT_FOUND));
        }

        let origin = request.headers().get(ORIGIN).and_then(|v| v.to_str().ok());
        if !server.origin_allowed(origin) {
            warn!("Rejected origin {:?} from {}", origin, peer_addr);
            return Err(error_response(StatusCode::FORBIDDEN));
        }

        match self.resolver.resolve(request) {
            Some(session) => Ok(session),
            None => {
                warn!("Invalid session from {}", peer_addr);
                Err(error_response(StatusCode::UNAUTHORIZED))
            }
        }
    }

    /// Handle an HTTP request (for health checks)
    async fn handle_http_request(
        &self,
        stream: &mut TcpStream,
        path: &str,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        // Drain the request
        let mut buf = vec![0u8; 1024];
        let _ = stream.read(&mut buf).await?;

        let channels = self.channel_count();
        let connections = self.connection_count();

        let body = match path {
            "/health" => serde_json::json!({
                "status": "healthy",
                "channels": channels,
                "connections": connections,
            }),
            _ => serde_json::json!({
                "channels": channels,
                "connections": connections,
            }),
        }
        .to_string();

        let response = format!(
            "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nAccess-Control-Allow-Origin: *\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
            body.len(),
            body
        );

        stream.write_all(response.as_bytes()).await?;
        Ok(())
    }
}

/// Peek until the first line of the request is buffered, the buffer is full,
/// or the client hangs up
async fn peek_request_line(stream: &TcpStream, buf: &mut [u8]) -> std::io::Result<usize> {
    loop {
        let n = stream.peek(buf).await?;
        if n == 0 || n == buf.len() || buf[..n].contains(&b'\n') {
            return Ok(n);
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}

/// Path of a plain `GET` request line, without the query string
fn request_path(head: &str) -> Option<&str> {
    let line = head.lines().next()?;
    let mut parts = line.split_whitespace();
    if parts.next()? != "GET" {
        return None;
    }
    let target = parts.next()?;
    Some(target.split('?').next().unwrap_or(target))
}

fn error_response(status: StatusCode) -> ErrorResponse {
    let mut response = ErrorResponse::new(status.canonical_reason().map(str::to_string));
    *response.status_mut() = status;
    response
}
