//! Chrome DevTools Protocol backend (uses the `headless_chrome` crate)

use crate::{BrowserHandle, Error, LaunchConfig, Launcher, PdfOptions, Result};
use base64::Engine as Base64Engine;
use headless_chrome::browser::tab::{RequestInterceptor, RequestPausedDecision, Tab};
use headless_chrome::protocol::cdp::types::Event;
use headless_chrome::protocol::cdp::Fetch::events::RequestPausedEvent;
use headless_chrome::protocol::cdp::Fetch::{FailRequest, FulfillRequest, HeaderEntry};
use headless_chrome::protocol::cdp::{Network, Page};
use headless_chrome::types::PrintToPdfOptions;
use headless_chrome::{Browser, LaunchOptions};
use std::collections::HashSet;
use std::ffi::OsStr;
use std::sync::{Arc, Condvar, Mutex, PoisonError};
use std::time::{Duration, Instant};
use url::Url;

/// Host the assembled document is served from. `.invalid` never resolves.
const DOCUMENT_HOST: &str = "pdfserve.invalid";
const DOCUMENT_URL: &str = "http://pdfserve.invalid/";

/// Chrome lifecycle event fired once a loader has had no network
/// connections for 500ms.
const NETWORK_IDLE: &str = "networkIdle";

/// Launches one headless Chrome process per call.
#[derive(Debug, Clone, Copy, Default)]
pub struct ChromeLauncher;

impl Launcher for ChromeLauncher {
    type Browser = ChromeBrowser;

    fn launch(&self, config: &LaunchConfig) -> Result<ChromeBrowser> {
        let args: Vec<&OsStr> = config.args.iter().map(OsStr::new).collect();

        let launch_options = LaunchOptions::default_builder()
            .headless(config.headless)
            .sandbox(config.sandbox)
            .path(config.executable.clone())
            .args(args)
            .idle_browser_timeout(config.idle_timeout)
            .build()
            .map_err(|e| Error::LaunchError(format!("Failed to build launch options: {}", e)))?;

        let browser =
            Browser::new(launch_options).map_err(|e| Error::LaunchError(format!("Failed to launch browser: {}", e)))?;

        let tab = browser
            .new_tab()
            .map_err(|e| Error::LaunchError(format!("Failed to create tab: {}", e)))?;

        let idle = Arc::new(IdleTracker::default());
        tab.call_method(Page::SetLifecycleEventsEnabled { enabled: true })
            .map_err(|e| Error::LaunchError(format!("Failed to enable lifecycle events: {}", e)))?;

        let tracker = idle.clone();
        tab.add_event_listener(Arc::new(move |event: &Event| {
            if let Event::PageLifecycleEvent(lifecycle) = event {
                if lifecycle.params.name == NETWORK_IDLE {
                    tracker.mark_idle(&lifecycle.params.loader_id);
                }
            }
        }))
        .map_err(|e| Error::LaunchError(format!("Failed to register lifecycle listener: {}", e)))?;

        let document: Arc<Mutex<Option<String>>> = Arc::default();
        let served = document.clone();
        let interceptor: Arc<dyn RequestInterceptor + Send + Sync> =
            Arc::new(move |_transport, _session_id, event: RequestPausedEvent| {
                let request_id = event.params.request_id.clone();
                match classify(&event.params.request.url) {
                    Interception::Pass => RequestPausedDecision::Continue(None),
                    Interception::Block => blocked(request_id),
                    Interception::ServeDocument => {
                        let html = served.lock().unwrap_or_else(PoisonError::into_inner).clone();
                        match html {
                            Some(html) => fulfill_document(request_id, &html),
                            None => blocked(request_id),
                        }
                    }
                }
            });
        tab.enable_request_interception(interceptor)
            .map_err(|e| Error::LaunchError(format!("Failed to enable request interception: {}", e)))?;
        tab.enable_fetch(None, Some(false))
            .map_err(|e| Error::LaunchError(format!("Failed to enable fetch domain: {}", e)))?;

        Ok(ChromeBrowser { browser, tab, idle, document })
    }
}

/// Loaders that have reached network idleness.
#[derive(Default)]
struct IdleTracker {
    loaders: Mutex<HashSet<String>>,
    changed: Condvar,
}

impl IdleTracker {
    fn mark_idle(&self, loader_id: &str) {
        let mut loaders = self.loaders.lock().unwrap_or_else(PoisonError::into_inner);
        loaders.insert(loader_id.to_string());
        self.changed.notify_all();
    }

    /// Block until `loader_id` is idle or `deadline` passes.
    fn wait_for(&self, loader_id: &str, deadline: Instant) -> bool {
        let mut loaders = self.loaders.lock().unwrap_or_else(PoisonError::into_inner);
        loop {
            if loaders.contains(loader_id) {
                return true;
            }
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            loaders = self
                .changed
                .wait_timeout(loaders, deadline - now)
                .map(|(guard, _)| guard)
                .unwrap_or_else(|poisoned| poisoned.into_inner().0);
        }
    }
}

/// What to do with a request the page makes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Interception {
    /// Answer with the assembled document.
    ServeDocument,
    /// Fail the request. Local files and anything else on the document host.
    Block,
    /// Let the request reach the network.
    Pass,
}

fn classify(raw: &str) -> Interception {
    let Ok(url) = Url::parse(raw) else {
        return Interception::Block;
    };
    if url.scheme() == "file" {
        return Interception::Block;
    }
    if url.host_str() == Some(DOCUMENT_HOST) {
        if url.scheme() == "http" && url.path() == "/" && url.query().is_none() {
            return Interception::ServeDocument;
        }
        return Interception::Block;
    }
    Interception::Pass
}

fn blocked(request_id: String) -> RequestPausedDecision {
    RequestPausedDecision::Fail(FailRequest { request_id, error_reason: Network::ErrorReason::BlockedByClient })
}

fn fulfill_document(request_id: String, html: &str) -> RequestPausedDecision {
    RequestPausedDecision::Fulfill(FulfillRequest {
        request_id,
        response_code: 200,
        response_headers: Some(vec![HeaderEntry {
            name: "Content-Type".to_string(),
            value: "text/html; charset=utf-8".to_string(),
        }]),
        binary_response_headers: None,
        body: Some(base64::engine::general_purpose::STANDARD.encode(html)),
        response_phrase: None,
    })
}

/// A running Chrome process with one tab.
///
/// The assembled document is answered from memory at [`DOCUMENT_URL`] by the
/// tab's request interceptor. The page never has a `file://` origin and
/// `file://` subresources are failed.
pub struct ChromeBrowser {
    browser: Browser,
    tab: Arc<Tab>,
    idle: Arc<IdleTracker>,
    document: Arc<Mutex<Option<String>>>,
}

impl ChromeBrowser {
    fn main_loader_id(&self) -> Result<String> {
        let tree = self
            .tab
            .call_method(Page::GetFrameTree(None))
            .map_err(|e| Error::LoadError(format!("Failed to read frame tree: {}", e)))?;
        Ok(tree.frame_tree.frame.loader_id)
    }
}

impl BrowserHandle for ChromeBrowser {
    fn load_document(&mut self, html: &str, timeout: Duration) -> Result<()> {
        let deadline = Instant::now() + timeout;
        *self.document.lock().unwrap_or_else(PoisonError::into_inner) = Some(html.to_string());

        self.tab.set_default_timeout(timeout);
        self.tab
            .navigate_to(DOCUMENT_URL)
            .map_err(|e| Error::LoadError(format!("Navigation failed: {}", e)))?;
        if let Err(e) = self.tab.wait_until_navigated() {
            if Instant::now() >= deadline {
                return Err(Error::timeout(timeout));
            }
            return Err(Error::LoadError(format!("Wait for navigation failed: {}", e)));
        }

        let loader_id = self.main_loader_id()?;
        if self.idle.wait_for(&loader_id, deadline) {
            Ok(())
        } else {
            Err(Error::timeout(timeout))
        }
    }

    fn font_available(&mut self, family: &str) -> Result<bool> {
        let script = crate::document::DocumentTemplate::new(family).font_check_script();
        let result = self
            .tab
            .evaluate(&script, false)
            .map_err(|e| Error::RenderError(format!("Font check failed: {}", e)))?;
        Ok(result.value.and_then(|v| v.as_bool()).unwrap_or(false))
    }

    fn capture_pdf(&mut self, options: &PdfOptions) -> Result<Vec<u8>> {
        let (paper_width, paper_height) = options.paper.inches();
        let pdf_options = PrintToPdfOptions {
            display_header_footer: Some(options.display_header_footer),
            print_background: Some(options.print_background),
            paper_width: Some(paper_width),
            paper_height: Some(paper_height),
            margin_top: Some(options.margin),
            margin_bottom: Some(options.margin),
            margin_left: Some(options.margin),
            margin_right: Some(options.margin),
            prefer_css_page_size: Some(options.prefer_css_page_size),
            ..Default::default()
        };

        self.tab
            .print_to_pdf(Some(pdf_options))
            .map_err(|e| Error::RenderError(format!("PDF capture failed: {}", e)))
    }

    fn close(self) -> Result<()> {
        let closed = self.tab.close(false);
        // Dropping the browser terminates the child process.
        drop(self.tab);
        drop(self.browser);
        closed.map(|_| ()).map_err(|e| Error::CleanupError(e.to_string()))
    }
}
