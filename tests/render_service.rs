//! Render service lifecycle tests against the browser test double

mod support;

use pdfserve::locator::Locator;
use pdfserve::render::PdfRenderer;
use pdfserve::{Error, Mode, PaperSize, RenderRequest, ServiceConfig};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use support::{FakeLauncher, Script, FAKE_PDF};

fn renderer(script: Script) -> (PdfRenderer<FakeLauncher>, FakeLauncher) {
    renderer_with(ServiceConfig::default(), script)
}

fn renderer_with(config: ServiceConfig, script: Script) -> (PdfRenderer<FakeLauncher>, FakeLauncher) {
    let launcher = FakeLauncher::new(script);
    (PdfRenderer::new(config, launcher.clone()), launcher)
}

#[test]
fn missing_html_never_launches() {
    let (renderer, launcher) = renderer(Script::Succeed);
    for request in [RenderRequest::default(), RenderRequest::new(""), RenderRequest { html: None, css: Some("p{}".into()) }] {
        let err = renderer.render("t", &request).unwrap_err();
        assert_eq!(err.to_string(), "HTML is required");
        assert_eq!(err.status_code(), 400);
    }
    assert_eq!(launcher.calls.launched(), 0);
    assert!(launcher.calls.launch_configs.lock().unwrap().is_empty());
}

#[test]
fn successful_render_launches_and_closes_once() {
    let (renderer, launcher) = renderer(Script::Succeed);
    let pdf = renderer.render("t", &RenderRequest::new("<h1>Hi</h1>")).unwrap();
    assert_eq!(pdf.as_bytes(), FAKE_PDF);
    assert!(!pdf.is_empty());
    assert_eq!(launcher.calls.launched(), 1);
    assert_eq!(launcher.calls.closed(), 1);
}

#[test]
fn each_render_gets_a_fresh_browser() {
    let (renderer, launcher) = renderer(Script::Succeed);
    for _ in 0..3 {
        renderer.render("t", &RenderRequest::new("<p>x</p>")).unwrap();
    }
    assert_eq!(launcher.calls.launched(), 3);
    assert_eq!(launcher.calls.closed(), 3);
}

#[test]
fn load_timeout_fails_and_still_closes() {
    let (renderer, launcher) = renderer(Script::NeverIdle);
    let err = renderer.render("t", &RenderRequest::new("<img src=\"http://10.255.255.1/x.png\">")).unwrap_err();
    assert!(matches!(err, Error::Timeout(30000)));
    assert_eq!(err.status_code(), 500);
    assert_eq!(launcher.calls.launched(), 1);
    assert_eq!(launcher.calls.closed(), 1);
    assert!(launcher.calls.pdf_options.lock().unwrap().is_empty());
}

#[test]
fn capture_failure_still_closes() {
    let (renderer, launcher) = renderer(Script::FailCapture);
    let err = renderer.render("t", &RenderRequest::new("<p>x</p>")).unwrap_err();
    assert!(matches!(err, Error::RenderError(_)));
    assert_eq!(launcher.calls.launched(), 1);
    assert_eq!(launcher.calls.closed(), 1);
}

#[test]
fn launch_failure_has_nothing_to_close() {
    let (renderer, launcher) = renderer(Script::FailLaunch);
    let err = renderer.render("t", &RenderRequest::new("<p>x</p>")).unwrap_err();
    assert!(matches!(err, Error::LaunchError(_)));
    assert!(err.to_string().contains("executable not found"));
    assert_eq!(launcher.calls.closed(), 0);
}

#[test]
fn close_failure_does_not_change_result() {
    let (renderer, launcher) = renderer(Script::FailClose);
    let pdf = renderer.render("t", &RenderRequest::new("<p>x</p>")).unwrap();
    assert_eq!(pdf.len(), FAKE_PDF.len());
    assert_eq!(launcher.calls.closed(), 1);
}

#[test]
fn font_override_beats_caller_css() {
    let (renderer, launcher) = renderer(Script::Succeed);
    let request = RenderRequest::new("<p>x</p>").with_css("* { font-family: 'Papyrus' !important; }");
    renderer.render("t", &request).unwrap();

    let doc = launcher.calls.last_document().unwrap();
    let caller = doc.find("'Papyrus'").unwrap();
    let forced = doc.rfind("font-family: 'Inter', sans-serif !important").unwrap();
    assert!(caller < forced);
    let style_end = doc.find("</style>").unwrap();
    assert!(!doc[forced..style_end].contains("Papyrus"));
}

#[test]
fn configured_font_family_is_forced() {
    let config = ServiceConfig { font_family: "Roboto".into(), ..Default::default() };
    let (renderer, launcher) = renderer_with(config, Script::Succeed);
    renderer.render("t", &RenderRequest::new("<p>x</p>")).unwrap();
    assert!(launcher.calls.last_document().unwrap().contains("font-family: 'Roboto', sans-serif !important"));
}

#[test]
fn capture_uses_letter_zero_margin_backgrounds() {
    let (renderer, launcher) = renderer(Script::Succeed);
    renderer.render("t", &RenderRequest::new("<p>x</p>")).unwrap();
    let options = launcher.calls.pdf_options.lock().unwrap()[0].clone();
    assert_eq!(options.paper, PaperSize::Letter);
    assert_eq!(options.margin, 0.0);
    assert!(options.print_background);
    assert!(options.prefer_css_page_size);
    assert!(!options.display_header_footer);
}

#[test]
fn launch_uses_container_flags_and_located_executable() {
    let config = ServiceConfig { mode: Mode::Production, ..Default::default() };
    let (renderer, launcher) = renderer_with(config, Script::Succeed);
    let renderer = renderer.with_locator(
        Locator::new(Some("/missing/chrome".into()), Mode::Production)
            .with_probe(|p: &std::path::Path| p == std::path::Path::new("/usr/bin/chromium")),
    );
    renderer.render("t", &RenderRequest::new("<p>x</p>")).unwrap();

    let launch = launcher.calls.launch_configs.lock().unwrap()[0].clone();
    assert_eq!(launch.executable, Some(PathBuf::from("/usr/bin/chromium")));
    assert!(!launch.sandbox);
    assert!(launch.args.iter().any(|a| a == "--disable-setuid-sandbox"));
    assert!(launch.args.iter().any(|a| a == "--disable-dev-shm-usage"));
}

#[test]
fn missing_override_falls_back_to_bundled_default() {
    let config = ServiceConfig { chrome_path: Some("/no/such/chrome".into()), ..Default::default() };
    let (renderer, launcher) = renderer_with(config, Script::Succeed);
    renderer.render("t", &RenderRequest::new("<p>x</p>")).unwrap();
    assert_eq!(launcher.calls.launch_configs.lock().unwrap()[0].executable, None);
}

#[test]
fn admission_limit_rejects_overflow_without_launching() {
    let gate = support::new_gate();
    let config = ServiceConfig { max_concurrent_renders: Some(1), ..Default::default() };
    let (renderer, launcher) = renderer_with(config, Script::Block(gate.clone()));
    let renderer = Arc::new(renderer);

    let first = {
        let renderer = renderer.clone();
        std::thread::spawn(move || renderer.render("first", &RenderRequest::new("<p>1</p>")))
    };
    // Wait until the first render holds its permit inside load_document.
    while launcher.calls.documents.lock().unwrap().is_empty() {
        std::thread::sleep(Duration::from_millis(5));
    }

    let err = renderer.render("second", &RenderRequest::new("<p>2</p>")).unwrap_err();
    assert!(matches!(err, Error::Busy(1)));
    assert_eq!(err.status_code(), 503);
    assert_eq!(launcher.calls.launched(), 1);

    support::release(&gate);
    assert!(first.join().unwrap().is_ok());
    assert_eq!(launcher.calls.closed(), 1);
}
