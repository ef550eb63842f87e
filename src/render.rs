//! The render service: request in, PDF bytes out.
//!
//! Every render launches its own browser and wraps it in a [`BrowserSession`]
//! so the process is closed on every exit path, including panics.

use crate::document::DocumentTemplate;
use crate::locator::Locator;
use crate::{BrowserHandle, Error, LaunchConfig, Launcher, PdfOptions, RenderRequest, Result, ServiceConfig};
use log::{debug, error, info, warn};
use std::ops::{Deref, DerefMut};
use std::sync::Arc;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

/// Progress of a single render, logged at each transition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Validating,
    Admitting,
    Launching,
    Loading,
    Capturing,
    Closing,
    Done,
    Failed,
}

/// PDF bytes produced by a render
#[derive(Debug, Clone)]
pub struct RenderedPdf {
    bytes: Vec<u8>,
}

impl RenderedPdf {
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// Owns a launched browser for the duration of one render.
///
/// Dropping the session closes the browser. Close failures are logged and
/// otherwise ignored; they never replace the render's own outcome.
pub struct BrowserSession<'a, B: BrowserHandle> {
    browser: Option<B>,
    request_id: &'a str,
}

impl<'a, B: BrowserHandle> BrowserSession<'a, B> {
    pub fn new(browser: B, request_id: &'a str) -> Self {
        Self { browser: Some(browser), request_id }
    }
}

impl<B: BrowserHandle> Deref for BrowserSession<'_, B> {
    type Target = B;

    fn deref(&self) -> &B {
        // Only `drop` takes the browser out.
        self.browser.as_ref().unwrap_or_else(|| unreachable!("browser session already closed"))
    }
}

impl<B: BrowserHandle> DerefMut for BrowserSession<'_, B> {
    fn deref_mut(&mut self) -> &mut B {
        self.browser.as_mut().unwrap_or_else(|| unreachable!("browser session already closed"))
    }
}

impl<B: BrowserHandle> Drop for BrowserSession<'_, B> {
    fn drop(&mut self) {
        if let Some(browser) = self.browser.take() {
            debug!("[{}] stage={:?}", self.request_id, Stage::Closing);
            match browser.close() {
                Ok(()) => debug!("[{}] Browser closed", self.request_id),
                Err(e) => warn!("[{}] {}", self.request_id, e),
            }
        }
    }
}

/// Renders requests through a [`Launcher`].
pub struct PdfRenderer<L: Launcher> {
    config: ServiceConfig,
    launcher: L,
    locator: Locator,
    template: DocumentTemplate,
    pdf_options: PdfOptions,
    limiter: Option<Arc<Semaphore>>,
}

impl<L: Launcher> PdfRenderer<L> {
    pub fn new(config: ServiceConfig, launcher: L) -> Self {
        let locator = Locator::from_config(&config);
        let template = DocumentTemplate::new(config.font_family.clone());
        let limiter = config.max_concurrent_renders.map(|n| Arc::new(Semaphore::new(n)));
        Self { config, launcher, locator, template, pdf_options: PdfOptions::default(), limiter }
    }

    /// Replace the executable locator (used by tests).
    pub fn with_locator(mut self, locator: Locator) -> Self {
        self.locator = locator;
        self
    }

    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    pub fn launcher(&self) -> &L {
        &self.launcher
    }

    pub fn template(&self) -> &DocumentTemplate {
        &self.template
    }

    /// Render `request` to PDF, tagging every log line with `request_id`.
    pub fn render(&self, request_id: &str, request: &RenderRequest) -> Result<RenderedPdf> {
        let result = self.run(request_id, request);
        match &result {
            Ok(pdf) => {
                info!("[{}] PDF Generated. Size: {} bytes", request_id, pdf.len());
                debug!("[{}] stage={:?}", request_id, Stage::Done);
            }
            Err(e) if e.is_client_error() => {
                info!("[{}] Rejected request: {}", request_id, e);
                debug!("[{}] stage={:?}", request_id, Stage::Failed);
            }
            Err(e) => {
                error!("[{}] PDF Generation Error: {}", request_id, e);
                debug!("[{}] stage={:?}", request_id, Stage::Failed);
            }
        }
        result
    }

    fn run(&self, request_id: &str, request: &RenderRequest) -> Result<RenderedPdf> {
        debug!("[{}] stage={:?}", request_id, Stage::Validating);
        let html = request.validated_html()?;

        debug!("[{}] stage={:?}", request_id, Stage::Admitting);
        let _permit = self.admit()?;

        debug!("[{}] stage={:?}", request_id, Stage::Launching);
        let executable = self.locator.locate(request_id);
        let launch = LaunchConfig::for_executable(executable, self.config.load_timeout);
        let browser = self.launcher.launch(&launch)?;
        let mut session = BrowserSession::new(browser, request_id);

        debug!("[{}] stage={:?}", request_id, Stage::Loading);
        let document = self.template.assemble(html, request.css());
        session.load_document(&document, self.config.load_timeout)?;

        match session.font_available(self.template.font_family()) {
            Ok(available) => info!("[{}] {} font available: {}", request_id, self.template.font_family(), available),
            Err(e) => warn!("[{}] Font probe failed: {}", request_id, e),
        }

        debug!("[{}] stage={:?}", request_id, Stage::Capturing);
        let bytes = session.capture_pdf(&self.pdf_options)?;
        if bytes.is_empty() {
            return Err(Error::RenderError("browser returned an empty PDF".into()));
        }
        Ok(RenderedPdf { bytes })
    }

    fn admit(&self) -> Result<Option<OwnedSemaphorePermit>> {
        match &self.limiter {
            None => Ok(None),
            Some(limiter) => limiter.clone().try_acquire_owned().map(Some).map_err(|_| {
                Error::Busy(self.config.max_concurrent_renders.unwrap_or_default())
            }),
        }
    }
}
