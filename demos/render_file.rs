//! Render an HTML file (and optional CSS file) to PDF without the HTTP layer
//!
//! cargo run --example render_file -- page.html [style.css] [out.pdf]

use pdfserve::cdp::ChromeLauncher;
use pdfserve::render::PdfRenderer;
use pdfserve::{RenderRequest, ServiceConfig};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("debug")).init();

    let mut args = std::env::args().skip(1);
    let html_path = args.next().ok_or("usage: render_file <page.html> [style.css] [out.pdf]")?;
    let css_path = args.next();
    let out_path = args.next().unwrap_or_else(|| "resume.pdf".to_string());

    let mut request = RenderRequest::new(std::fs::read_to_string(&html_path)?);
    if let Some(css_path) = css_path {
        request = request.with_css(std::fs::read_to_string(css_path)?);
    }

    let renderer = PdfRenderer::new(ServiceConfig::default(), ChromeLauncher);
    let pdf = renderer.render("demo", &request)?;
    std::fs::write(&out_path, pdf.as_bytes())?;
    println!("Wrote {} bytes to {}", pdf.len(), out_path);
    Ok(())
}
