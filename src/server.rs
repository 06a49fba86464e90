//! Minimal HTTP/1.1 surface for the binary.
//!
//! Routes:
//! - `GET /limited` and `GET /limited/<identity>`: 200 allowed, 429 denied,
//!   503 when the store is unavailable
//! - `GET /` and `GET /health`: store reachability
//! - `GET /hit`: namespace-wide hit counter, 503 when the store is unavailable
//! - `GET /metrics`: Prometheus text format
//!
//! Request lines longer than [`MAX_REQUEST_LINE`] get 414 rather than being
//! cut short, so a long identity never shares a bucket with its prefix.

use crate::config::ServerConfig;
use crate::errors::{RateLimitError, Result};
use crate::limiter::RateLimiter;
use crate::metrics;
use serde_json::json;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::io::{
    AsyncBufRead, AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader,
};
use tokio::net::TcpListener;
use tracing::{debug, error, info, warn};

/// Longest request line accepted, CRLF included
pub const MAX_REQUEST_LINE: usize = 8 * 1024;

#[derive(Debug, Clone, PartialEq)]
pub struct HttpResponse {
    pub status: u16,
    pub content_type: &'static str,
    pub body: String,
}

impl HttpResponse {
    fn json(status: u16, body: serde_json::Value) -> Self {
        Self {
            status,
            content_type: "application/json",
            body: body.to_string(),
        }
    }

    fn text(status: u16, content_type: &'static str, body: String) -> Self {
        Self {
            status,
            content_type,
            body,
        }
    }

    fn reason(&self) -> &'static str {
        match self.status {
            200 => "OK",
            400 => "Bad Request",
            404 => "Not Found",
            405 => "Method Not Allowed",
            414 => "URI Too Long",
            429 => "Too Many Requests",
            503 => "Service Unavailable",
            _ => "Internal Server Error",
        }
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        format!(
            "HTTP/1.1 {} {}\r\nContent-Type: {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
            self.status,
            self.reason(),
            self.content_type,
            self.body.len(),
            self.body
        )
        .into_bytes()
    }
}

/// Start the HTTP listener and serve until the process exits
pub async fn start_server(config: ServerConfig, limiter: Arc<RateLimiter>) -> Result<()> {
    let listener = TcpListener::bind(config.addr()).await.map_err(|e| {
        RateLimitError::InternalError(format!("Failed to bind {}: {}", config.addr(), e))
    })?;

    info!("HTTP server listening on http://{}", config.addr());

    loop {
        match listener.accept().await {
            Ok((socket, peer)) => {
                let limiter = limiter.clone();
                tokio::spawn(async move {
                    if let Err(e) = serve(socket, peer, &limiter).await {
                        debug!("Connection from {} ended with error: {}", peer, e);
                    }
                });
            }
            Err(e) => {
                error!("Failed to accept connection: {}", e);
            }
        }
    }
}

#[derive(Debug, PartialEq)]
enum RequestLine {
    Line(String),
    TooLong,
    Closed,
}

/// Read up to the first `\n`, however many segments it arrives in
async fn read_request_line<R: AsyncBufRead + Unpin>(reader: &mut R) -> std::io::Result<RequestLine> {
    let mut raw = Vec::new();
    let n = (&mut *reader)
        .take(MAX_REQUEST_LINE as u64 + 1)
        .read_until(b'\n', &mut raw)
        .await?;

    if n == 0 {
        return Ok(RequestLine::Closed);
    }
    if raw.len() > MAX_REQUEST_LINE {
        return Ok(RequestLine::TooLong);
    }

    let line = String::from_utf8_lossy(&raw);
    Ok(RequestLine::Line(line.trim_end_matches(['\r', '\n']).to_string()))
}

async fn serve<S>(stream: S, peer: SocketAddr, limiter: &RateLimiter) -> std::io::Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let mut reader = BufReader::new(stream);

    let response = match read_request_line(&mut reader).await? {
        RequestLine::Line(line) => route(&line, peer, limiter).await,
        RequestLine::TooLong => {
            debug!("Request line from {} exceeds {} bytes", peer, MAX_REQUEST_LINE);
            HttpResponse::json(414, json!({ "error": "request line too long" }))
        }
        RequestLine::Closed => return Ok(()),
    };

    let stream = reader.get_mut();
    stream.write_all(&response.to_bytes()).await?;
    stream.shutdown().await
}

/// Map one request line to a response
pub async fn route(request_line: &str, peer: SocketAddr, limiter: &RateLimiter) -> HttpResponse {
    let mut parts = request_line.split_whitespace();
    let (method, target) = match (parts.next(), parts.next()) {
        (Some(method), Some(target)) => (method, target),
        _ => return HttpResponse::json(400, json!({ "error": "malformed request line" })),
    };

    if method != "GET" {
        return HttpResponse::json(405, json!({ "error": "only GET is supported" }));
    }

    let path = target.split('?').next().unwrap_or(target);

    match path {
        "/metrics" => match metrics::gather_text() {
            Ok(body) => HttpResponse::text(200, "text/plain; version=0.0.4", body),
            Err(e) => {
                error!("Failed to gather metrics: {}", e);
                HttpResponse::json(500, json!({ "error": e }))
            }
        },
        "/" | "/health" => match limiter.health_check().await {
            Ok(()) => HttpResponse::json(200, json!({ "status": "ok" })),
            Err(e) => HttpResponse::json(e.http_status(), json!({ "status": "unavailable", "error": e.to_string() })),
        },
        "/hit" => hit(limiter).await,
        "/limited" => limited(&peer.ip().to_string(), limiter).await,
        _ => match path.strip_prefix("/limited/") {
            Some(identity) if !identity.is_empty() => limited(identity, limiter).await,
            _ => HttpResponse::json(404, json!({ "error": "not found" })),
        },
    }
}

async fn hit(limiter: &RateLimiter) -> HttpResponse {
    match limiter.record_hit().await {
        Ok(count) => HttpResponse::json(200, json!({ "hits": count })),
        Err(e) if e.is_store_failure() => {
            warn!("Hit counter unavailable: {}", e);
            HttpResponse::json(503, json!({ "detail": "Store connection error" }))
        }
        Err(e) => {
            error!("Hit counter failed: {}", e);
            HttpResponse::json(e.http_status(), json!({ "error": e.to_string() }))
        }
    }
}

async fn limited(identity: &str, limiter: &RateLimiter) -> HttpResponse {
    match limiter.check(identity).await {
        Ok(decision) if decision.allowed => HttpResponse::json(
            200,
            json!({
                "message": "Request allowed",
                "identity": identity,
                "remaining": decision.remaining,
            }),
        ),
        Ok(decision) => HttpResponse::json(
            429,
            json!({
                "detail": "Rate limit exceeded",
                "identity": identity,
                "remaining": decision.remaining,
            }),
        ),
        Err(e) => {
            warn!("Could not decide for {}: {}", identity, e);
            HttpResponse::json(e.http_status(), json!({ "error": e.to_string() }))
        }
    }
}
