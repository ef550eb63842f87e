//! Browser test double shared by the integration tests

#![allow(dead_code)]

use pdfserve::{BrowserHandle, Error, LaunchConfig, Launcher, PdfOptions, Result};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub const FAKE_PDF: &[u8] = b"%PDF-1.7\n% fake\n%%EOF\n";

/// What the fake browser should do at each step
#[derive(Debug, Clone, Default)]
pub enum Script {
    #[default]
    Succeed,
    FailLaunch,
    NeverIdle,
    FailCapture,
    FailClose,
    /// Hold the load step until the gate opens
    Block(Arc<(Mutex<bool>, std::sync::Condvar)>),
}

#[derive(Debug, Default)]
pub struct Calls {
    pub launched: AtomicUsize,
    pub closed: AtomicUsize,
    pub documents: Mutex<Vec<String>>,
    pub launch_configs: Mutex<Vec<LaunchConfig>>,
    pub pdf_options: Mutex<Vec<PdfOptions>>,
}

impl Calls {
    pub fn launched(&self) -> usize {
        self.launched.load(Ordering::SeqCst)
    }

    pub fn closed(&self) -> usize {
        self.closed.load(Ordering::SeqCst)
    }

    pub fn last_document(&self) -> Option<String> {
        self.documents.lock().unwrap().last().cloned()
    }
}

#[derive(Clone, Default)]
pub struct FakeLauncher {
    pub calls: Arc<Calls>,
    pub script: Script,
}

impl FakeLauncher {
    pub fn new(script: Script) -> Self {
        Self { calls: Arc::new(Calls::default()), script }
    }
}

impl Launcher for FakeLauncher {
    type Browser = FakeBrowser;

    fn launch(&self, config: &LaunchConfig) -> Result<FakeBrowser> {
        self.calls.launch_configs.lock().unwrap().push(config.clone());
        if let Script::FailLaunch = self.script {
            return Err(Error::LaunchError("Failed to launch browser: executable not found".into()));
        }
        self.calls.launched.fetch_add(1, Ordering::SeqCst);
        Ok(FakeBrowser { calls: self.calls.clone(), script: self.script.clone() })
    }
}

pub struct FakeBrowser {
    calls: Arc<Calls>,
    script: Script,
}

impl BrowserHandle for FakeBrowser {
    fn load_document(&mut self, html: &str, timeout: Duration) -> Result<()> {
        self.calls.documents.lock().unwrap().push(html.to_string());
        match &self.script {
            Script::NeverIdle => Err(Error::timeout(timeout)),
            Script::Block(gate) => {
                let (lock, cvar) = &**gate;
                let mut open = lock.lock().unwrap();
                while !*open {
                    open = cvar.wait(open).unwrap();
                }
                Ok(())
            }
            _ => Ok(()),
        }
    }

    fn font_available(&mut self, _family: &str) -> Result<bool> {
        Ok(true)
    }

    fn capture_pdf(&mut self, options: &PdfOptions) -> Result<Vec<u8>> {
        self.calls.pdf_options.lock().unwrap().push(options.clone());
        match self.script {
            Script::FailCapture => Err(Error::RenderError("Printing failed".into())),
            _ => Ok(FAKE_PDF.to_vec()),
        }
    }

    fn close(self) -> Result<()> {
        self.calls.closed.fetch_add(1, Ordering::SeqCst);
        match self.script {
            Script::FailClose => Err(Error::CleanupError("browser already gone".into())),
            _ => Ok(()),
        }
    }
}

pub fn new_gate() -> Arc<(Mutex<bool>, std::sync::Condvar)> {
    Arc::new((Mutex::new(false), std::sync::Condvar::new()))
}

pub fn release(gate: &Arc<(Mutex<bool>, std::sync::Condvar)>) {
    let (lock, cvar) = &**gate;
    *lock.lock().unwrap() = true;
    cvar.notify_all();
}
