//! pdfserve
//!
//! A thin HTTP service that turns caller-supplied HTML and CSS fragments into
//! PDF documents by driving a freshly launched headless Chrome per request.
//!
//! # Features
//!
//! - **CDP Backend** (default): Uses Chrome DevTools Protocol via headless Chrome
//! - **Scoped browsers**: every render launches its own browser process, and
//!   the process is closed on every exit path
//! - **Swappable engine**: the browser sits behind the [`Launcher`] and
//!   [`BrowserHandle`] traits so tests can substitute a double
//!
//! # Example
//!
//! ```no_run
//! # #[cfg(feature = "cdp")]
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! use pdfserve::{cdp::ChromeLauncher, render::PdfRenderer, RenderRequest, ServiceConfig};
//!
//! let renderer = PdfRenderer::new(ServiceConfig::default(), ChromeLauncher);
//! let request = RenderRequest::new("<h1>Hi</h1>").with_css("h1{color:red}");
//! let pdf = renderer.render("example", &request)?;
//! std::fs::write("out.pdf", pdf.as_bytes())?;
//! # Ok(())
//! # }
//! # #[cfg(not(feature = "cdp"))]
//! # fn main() {}
//! ```

use std::path::PathBuf;
use std::time::Duration;

pub mod error;
pub use error::{Error, Result};

#[cfg(feature = "cdp")]
pub mod cdp;

pub mod document;
pub mod locator;
pub mod render;
pub mod server;

/// Runtime mode of the service.
///
/// Production mode enables probing of well-known Chrome install locations;
/// development mode leaves executable discovery to the bundled default.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum Mode {
    #[default]
    #[value(alias = "dev")]
    Development,
    #[value(alias = "prod")]
    Production,
}

impl Mode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Mode::Development => "development",
            Mode::Production => "production",
        }
    }
}

impl std::fmt::Display for Mode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Process-wide configuration, captured once at startup.
///
/// Nothing in request handling reads the environment directly; everything
/// it needs is carried here.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Interface to bind
    pub host: String,
    /// Port to listen on
    pub port: u16,
    /// Production or development
    pub mode: Mode,
    /// Explicit browser executable, checked before any probing
    pub chrome_path: Option<PathBuf>,
    /// Upper bound for the document to reach network idleness
    pub load_timeout: Duration,
    /// Maximum accepted request body size in bytes
    pub max_body_bytes: usize,
    /// Family forced onto every element of the rendered document
    pub font_family: String,
    /// Optional ceiling on simultaneous renders (None => unbounded)
    pub max_concurrent_renders: Option<usize>,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            mode: Mode::Development,
            chrome_path: None,
            load_timeout: Duration::from_secs(30),
            max_body_bytes: 10 * 1024 * 1024,
            font_family: "Inter".to_string(),
            max_concurrent_renders: None,
        }
    }
}

impl ServiceConfig {
    /// Reject settings that cannot produce a working service.
    pub fn validate(&self) -> Result<()> {
        if self.load_timeout.is_zero() {
            return Err(Error::ConfigError("load timeout must be greater than zero".into()));
        }
        if self.max_body_bytes == 0 {
            return Err(Error::ConfigError("max body size must be greater than zero".into()));
        }
        if self.font_family.trim().is_empty() {
            return Err(Error::ConfigError("font family must not be empty".into()));
        }
        if self.max_concurrent_renders == Some(0) {
            return Err(Error::ConfigError("max concurrent renders must be at least 1".into()));
        }
        Ok(())
    }

    /// Socket address string for the listener
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Body of a `POST /generate-pdf` request.
#[derive(Debug, Clone, Default, serde::Deserialize)]
pub struct RenderRequest {
    #[serde(default)]
    pub html: Option<String>,
    #[serde(default)]
    pub css: Option<String>,
}

impl RenderRequest {
    pub fn new(html: impl Into<String>) -> Self {
        Self { html: Some(html.into()), css: None }
    }

    pub fn with_css(mut self, css: impl Into<String>) -> Self {
        self.css = Some(css.into());
        self
    }

    /// Return the HTML fragment, or the client-facing validation error.
    ///
    /// Only a missing or zero-length fragment is rejected; whitespace is
    /// passed through to the browser as-is.
    pub fn validated_html(&self) -> Result<&str> {
        match self.html.as_deref() {
            Some(html) if !html.is_empty() => Ok(html),
            _ => Err(Error::html_required()),
        }
    }

    /// Caller CSS, empty when absent
    pub fn css(&self) -> &str {
        self.css.as_deref().unwrap_or("")
    }
}

/// Flags passed to every browser launch.
pub const LAUNCH_ARGS: &[&str] = &[
    "--no-sandbox",
    "--disable-setuid-sandbox",
    // /dev/shm is tiny in most containers
    "--disable-dev-shm-usage",
    "--font-render-hinting=none",
];

/// How a browser process should be started
#[derive(Debug, Clone, PartialEq)]
pub struct LaunchConfig {
    /// Executable to run; None lets the engine pick its bundled default
    pub executable: Option<PathBuf>,
    pub headless: bool,
    /// Whether the OS-level sandbox stays enabled
    pub sandbox: bool,
    pub args: Vec<String>,
    /// How long the engine may go without hearing from the browser
    pub idle_timeout: Duration,
}

impl LaunchConfig {
    pub fn for_executable(executable: Option<PathBuf>, load_timeout: Duration) -> Self {
        Self {
            executable,
            headless: true,
            sandbox: false,
            args: LAUNCH_ARGS.iter().map(|a| a.to_string()).collect(),
            idle_timeout: load_timeout + Duration::from_secs(30),
        }
    }
}

/// Paper sizes understood by the capture step
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PaperSize {
    Letter,
    A4,
}

impl PaperSize {
    /// (width, height) in inches
    pub fn inches(&self) -> (f64, f64) {
        match self {
            PaperSize::Letter => (8.5, 11.0),
            PaperSize::A4 => (8.27, 11.69),
        }
    }
}

/// Options for the PDF capture step
#[derive(Debug, Clone, PartialEq)]
pub struct PdfOptions {
    pub paper: PaperSize,
    pub print_background: bool,
    pub display_header_footer: bool,
    /// Let `@page` rules in the document decide the page size
    pub prefer_css_page_size: bool,
    /// Uniform margin in inches
    pub margin: f64,
}

impl Default for PdfOptions {
    fn default() -> Self {
        Self {
            paper: PaperSize::Letter,
            print_background: true,
            display_header_footer: false,
            prefer_css_page_size: true,
            margin: 0.0,
        }
    }
}

/// Starts browser processes.
///
/// Each call must produce an independent process; handles are never shared
/// between requests.
pub trait Launcher: Send + Sync {
    type Browser: BrowserHandle;

    fn launch(&self, config: &LaunchConfig) -> Result<Self::Browser>;
}

/// A running browser with a single page
pub trait BrowserHandle {
    /// Load a full HTML document and wait for network idleness.
    ///
    /// Returns [`Error::Timeout`] when the page is still busy after `timeout`.
    fn load_document(&mut self, html: &str, timeout: Duration) -> Result<()>;

    /// Check whether `family` is usable in the page. Diagnostic only.
    fn font_available(&mut self, family: &str) -> Result<bool>;

    /// Print the loaded page to PDF bytes
    fn capture_pdf(&mut self, options: &PdfOptions) -> Result<Vec<u8>>;

    /// Terminate the browser process
    fn close(self) -> Result<()>;
}
