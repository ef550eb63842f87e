use clap::Parser;
use pdfserve::cdp::ChromeLauncher;
use pdfserve::render::PdfRenderer;
use pdfserve::server::PdfServer;
use pdfserve::{Mode, ServiceConfig};
use std::path::PathBuf;
use std::time::Duration;

/// Render HTML and CSS fragments to PDF over HTTP
#[derive(Parser, Debug)]
#[command(name = "pdfserve", version, about)]
struct Cli {
    /// Interface to listen on
    #[arg(long, env = "HOST", default_value = "0.0.0.0")]
    host: String,

    /// Port to listen on
    #[arg(long, env = "PORT", default_value_t = 3000)]
    port: u16,

    /// Runtime mode; production probes well-known Chrome install paths
    #[arg(long, env = "APP_ENV", value_enum, default_value_t = Mode::Development)]
    mode: Mode,

    /// Explicit Chrome/Chromium executable
    #[arg(long, env = "CHROME_PATH")]
    chrome_path: Option<PathBuf>,

    /// Seconds to wait for the document to reach network idle
    #[arg(long, env = "PDF_LOAD_TIMEOUT_SECS", default_value_t = 30)]
    load_timeout_secs: u64,

    /// Largest accepted request body
    #[arg(long, env = "PDF_MAX_BODY_BYTES", default_value_t = 10 * 1024 * 1024)]
    max_body_bytes: usize,

    /// Font family forced onto every element
    #[arg(long, env = "PDF_FONT_FAMILY", default_value = "Inter")]
    font_family: String,

    /// Reject renders beyond this many in flight (unbounded when unset)
    #[arg(long, env = "PDF_MAX_CONCURRENT_RENDERS")]
    max_concurrent_renders: Option<usize>,
}

impl From<Cli> for ServiceConfig {
    fn from(cli: Cli) -> Self {
        Self {
            host: cli.host,
            port: cli.port,
            mode: cli.mode,
            chrome_path: cli.chrome_path.filter(|p| !p.as_os_str().is_empty()),
            load_timeout: Duration::from_secs(cli.load_timeout_secs),
            max_body_bytes: cli.max_body_bytes,
            font_family: cli.font_family,
            max_concurrent_renders: cli.max_concurrent_renders,
        }
    }
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = ServiceConfig::from(Cli::parse());
    config.validate()?;
    log::info!(
        "Starting in {} mode (load timeout {:?}, body limit {} bytes)",
        config.mode,
        config.load_timeout,
        config.max_body_bytes
    );

    let renderer = PdfRenderer::new(config, ChromeLauncher);
    let server = PdfServer::bind(renderer)?;
    server.serve();
    Ok(())
}
