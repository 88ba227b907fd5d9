//! Status surface: health and stage counters as JSON over a minimal HTTP/1.1 listener.
//!
//! Routes: `GET /` and `GET /health` (503 while any stage is unhealthy), `GET /stats`.

pub mod http;

pub use http::{HttpRequest, HttpResponse, parse_request_line, render_response_text};

use anyhow::{Context, Result};
use log::{debug, info, warn};
use serde_json::json;
use std::io::ErrorKind;
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crate::pipeline::Shutdown;
use crate::stats::PipelineStatus;
use crate::utils::config::ListenDefaults;

/// Route one request against the current status.
pub fn handle_request(request: &HttpRequest, status: &PipelineStatus) -> HttpResponse {
    let path = request
        .target
        .split_once('?')
        .map_or(request.target.as_str(), |(path, _)| path);
    if request.method != "GET" {
        return HttpResponse::json(405, json!({ "error": "method not allowed" }).to_string());
    }
    match path {
        "/" | "/health" => {
            let snapshot = status.snapshot();
            let code = if snapshot.healthy { 200 } else { 503 };
            let body = json!({
                "healthy": snapshot.healthy,
                "source": snapshot.health.source,
                "finalize": snapshot.health.finalize,
                "shipper": snapshot.health.shipper,
            });
            HttpResponse::json(code, body.to_string())
        }
        "/stats" => match serde_json::to_string(&status.snapshot()) {
            Ok(body) => HttpResponse::json(200, body),
            Err(e) => HttpResponse::json(500, json!({ "error": e.to_string() }).to_string()),
        },
        _ => HttpResponse::json(404, json!({ "error": "not found" }).to_string()),
    }
}

/// Serves [`PipelineStatus`]; the status object is handed in at construction.
pub struct StatusServer {
    listener: TcpListener,
    status: Arc<PipelineStatus>,
}

impl StatusServer {
    pub fn bind(addr: &str, status: Arc<PipelineStatus>) -> Result<Self> {
        let listener =
            TcpListener::bind(addr).with_context(|| format!("bind status server to {addr}"))?;
        // Non-blocking accept so the loop can notice shutdown.
        listener
            .set_nonblocking(true)
            .context("set status listener non-blocking")?;
        Ok(Self { listener, status })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        self.listener
            .local_addr()
            .context("status server local address")
    }

    /// Accept and answer requests one at a time until shutdown.
    pub fn serve(self, shutdown: Shutdown) {
        if let Ok(addr) = self.local_addr() {
            info!("Status server listening on http://{addr}");
        }
        while !shutdown.is_triggered() {
            match self.listener.accept() {
                Ok((stream, peer)) => {
                    if let Err(e) = self.handle_connection(stream) {
                        debug!("status request from {peer} failed: {e}");
                    }
                }
                Err(e) if e.kind() == ErrorKind::WouldBlock => {
                    shutdown.wait_timeout(ListenDefaults::ACCEPT_POLL);
                }
                Err(e) => {
                    warn!("status server accept failed: {e}");
                    shutdown.wait_timeout(ListenDefaults::ACCEPT_POLL);
                }
            }
        }
        debug!("status server stopped");
    }

    pub fn spawn(self, shutdown: Shutdown) -> Result<JoinHandle<()>> {
        thread::Builder::new()
            .name("status".into())
            .spawn(move || self.serve(shutdown))
            .context("spawn status server")
    }

    fn handle_connection(&self, mut stream: TcpStream) -> Result<(), String> {
        stream.set_nonblocking(false).map_err(|e| e.to_string())?;
        stream
            .set_read_timeout(Some(ListenDefaults::READ_TIMEOUT))
            .map_err(|e| e.to_string())?;
        let response = match http::read_http_request(&mut stream) {
            Ok(Some(request)) => handle_request(&request, &self.status),
            Ok(None) => return Ok(()),
            Err(msg) => HttpResponse::json(400, json!({ "error": msg }).to_string()),
        };
        http::write_response(&mut stream, &response).map_err(|e| e.to_string())
    }
}
