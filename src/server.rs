//! HTTP surface: `GET /health` and `POST /generate-pdf` on `tiny_http`.
//!
//! Each accepted request is handled on its own thread, so a slow render never
//! blocks the accept loop or other renders.

use crate::render::PdfRenderer;
use crate::{Error, Launcher, RenderRequest, Result};
use log::{debug, info, warn};
use serde::Serialize;
use std::io::Read;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tiny_http::{Header, Method, Request, Response};

pub const PDF_FILENAME: &str = "resume.pdf";
const REQUEST_ID_HEADER: &str = "X-Request-Id";
const MAX_REQUEST_ID_LEN: usize = 128;

/// A bound listener that serves render requests.
pub struct PdfServer<L: Launcher + 'static> {
    server: tiny_http::Server,
    app: Arc<App<L>>,
}

impl<L: Launcher + 'static> PdfServer<L> {
    /// Bind to the address in the renderer's configuration.
    pub fn bind(renderer: PdfRenderer<L>) -> Result<Self> {
        let addr = renderer.config().bind_addr();
        let server = tiny_http::Server::http(&addr).map_err(|e| Error::ServerError(format!("Failed to bind {}: {}", addr, e)))?;
        Ok(Self { server, app: Arc::new(App::new(renderer)) })
    }

    /// Address actually bound (useful with port 0)
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.server.server_addr().to_ip()
    }

    /// Accept requests until the listener fails.
    pub fn serve(self) {
        if let Some(addr) = self.local_addr() {
            info!("PDF Service listening on {}", addr);
        }
        for request in self.server.incoming_requests() {
            let app = self.app.clone();
            std::thread::spawn(move || app.handle(request));
        }
    }
}

struct App<L: Launcher> {
    renderer: PdfRenderer<L>,
    started: Instant,
    next_id: AtomicU64,
}

impl<L: Launcher> App<L> {
    fn new(renderer: PdfRenderer<L>) -> Self {
        Self { renderer, started: Instant::now(), next_id: AtomicU64::new(1) }
    }

    fn request_id(&self, request: &Request) -> String {
        request
            .headers()
            .iter()
            .find(|h| h.field.equiv(REQUEST_ID_HEADER))
            .map(|h| h.value.as_str().trim())
            .filter(|v| !v.is_empty() && v.len() <= MAX_REQUEST_ID_LEN)
            .map(str::to_string)
            .unwrap_or_else(|| format!("req-{}", self.next_id.fetch_add(1, Ordering::Relaxed)))
    }

    fn handle(&self, mut request: Request) {
        let request_id = self.request_id(&request);
        let method = request.method().clone();
        let path = route_path(request.url());
        debug!("[{}] {} {}", request_id, method, path);

        let reply = match (&method, path.as_str()) {
            (Method::Get, "/health") => self.health(),
            (Method::Post, "/generate-pdf") => self.generate_pdf(&request_id, &mut request),
            (Method::Options, _) => Reply::preflight(),
            _ => Reply::error(404, "Not Found"),
        };

        if let Err(e) = request.respond(reply.into_response(&request_id)) {
            warn!("[{}] Failed to write response: {}", request_id, e);
        }
    }

    fn health(&self) -> Reply {
        let config = self.renderer.config();
        let report = HealthReport {
            status: "ok",
            message: "PDF Service is OK",
            uptime_seconds: self.started.elapsed().as_secs_f64(),
            environment: config.mode.as_str(),
            memory: MemoryUsage { rss_bytes: resident_memory_bytes() },
            platform: format!("{}-{}", std::env::consts::OS, std::env::consts::ARCH),
            version: env!("CARGO_PKG_VERSION"),
        };
        Reply::json(200, &report)
    }

    fn generate_pdf(&self, request_id: &str, request: &mut Request) -> Reply {
        info!("[{}] Received PDF generation request", request_id);
        let outcome = read_body(request, self.renderer.config().max_body_bytes)
            .and_then(|body| parse_render_request(&body))
            .and_then(|render| self.renderer.render(request_id, &render));

        match outcome {
            Ok(pdf) => Reply::pdf(pdf.into_bytes()),
            Err(e) => Reply::error(e.status_code(), &e.to_string()),
        }
    }
}

/// Path used for routing: query dropped, one trailing slash dropped, ASCII
/// lowercased. `/Generate-PDF/` routes like `/generate-pdf`.
fn route_path(url: &str) -> String {
    let path = url.split('?').next().unwrap_or_default();
    let path = match path.strip_suffix('/') {
        Some(trimmed) if !trimmed.is_empty() => trimmed,
        _ => path,
    };
    path.to_ascii_lowercase()
}

fn read_body(request: &mut Request, limit: usize) -> Result<Vec<u8>> {
    if request.body_length().is_some_and(|len| len > limit) {
        return Err(Error::PayloadTooLarge(limit));
    }
    let mut body = Vec::new();
    request.as_reader().take(limit as u64 + 1).read_to_end(&mut body)?;
    if body.len() > limit {
        return Err(Error::PayloadTooLarge(limit));
    }
    Ok(body)
}

/// Decode a JSON object body. An empty body reads as `{}`.
pub fn parse_render_request(body: &[u8]) -> Result<RenderRequest> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(RenderRequest::default());
    }
    let value: serde_json::Value = serde_json::from_slice(body).map_err(|e| Error::InvalidRequest(e.to_string()))?;
    if !value.is_object() {
        return Err(Error::InvalidRequest("expected a JSON object".into()));
    }
    serde_json::from_value(value).map_err(|e| Error::InvalidRequest(e.to_string()))
}

#[derive(Serialize)]
struct HealthReport {
    status: &'static str,
    message: &'static str,
    uptime_seconds: f64,
    environment: &'static str,
    memory: MemoryUsage,
    platform: String,
    version: &'static str,
}

#[derive(Serialize)]
struct MemoryUsage {
    rss_bytes: Option<u64>,
}

/// Resident set size from procfs; None where procfs is unavailable.
fn resident_memory_bytes() -> Option<u64> {
    let status = std::fs::read_to_string("/proc/self/status").ok()?;
    let line = status.lines().find(|l| l.starts_with("VmRSS:"))?;
    let kib: u64 = line.split_whitespace().nth(1)?.parse().ok()?;
    Some(kib * 1024)
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    error: &'a str,
}

/// A response before it is handed to `tiny_http`.
struct Reply {
    status: u16,
    body: Vec<u8>,
    headers: Vec<(&'static str, String)>,
}

impl Reply {
    fn json<T: Serialize>(status: u16, value: &T) -> Self {
        match serde_json::to_vec(value) {
            Ok(body) => Self { status, body, headers: vec![("Content-Type", "application/json".into())] },
            Err(e) => Self {
                status: 500,
                body: format!("{{\"error\":\"serialization failed: {}\"}}", e).into_bytes(),
                headers: vec![("Content-Type", "application/json".into())],
            },
        }
    }

    fn error(status: u16, message: &str) -> Self {
        Self::json(status, &ErrorBody { error: message })
    }

    fn pdf(bytes: Vec<u8>) -> Self {
        Self {
            status: 200,
            body: bytes,
            headers: vec![
                ("Content-Type", "application/pdf".into()),
                ("Content-Disposition", format!("attachment; filename=\"{}\"", PDF_FILENAME)),
            ],
        }
    }

    fn preflight() -> Self {
        Self {
            status: 204,
            body: Vec::new(),
            headers: vec![
                ("Access-Control-Allow-Methods", "GET, POST, OPTIONS".into()),
                ("Access-Control-Allow-Headers", format!("Content-Type, {}", REQUEST_ID_HEADER)),
                ("Access-Control-Max-Age", "86400".into()),
            ],
        }
    }

    fn into_response(self, request_id: &str) -> Response<std::io::Cursor<Vec<u8>>> {
        let mut response = Response::from_data(self.body).with_status_code(self.status);
        let common = [("Access-Control-Allow-Origin", "*".to_string()), (REQUEST_ID_HEADER, request_id.to_string())];
        for (name, value) in self.headers.into_iter().chain(common) {
            match Header::from_bytes(name.as_bytes(), value.as_bytes()) {
                Ok(header) => response.add_header(header),
                Err(()) => warn!("[{}] Dropping invalid header {}", request_id, name),
            }
        }
        response
    }
}
