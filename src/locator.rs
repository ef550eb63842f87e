//! Browser executable discovery
//!
//! Resolution never fails: when nothing suitable is found the caller falls
//! back to the engine's bundled default (`None`).

use crate::{Mode, ServiceConfig};
use log::{debug, info, warn};
use std::path::{Path, PathBuf};

/// Install locations probed in production, in order of preference.
pub const CHROME_CANDIDATES: &[&str] = &[
    "/usr/bin/google-chrome-stable",
    "/usr/bin/google-chrome",
    "/opt/google/chrome/chrome",
    "/usr/bin/chromium",
    "/usr/bin/chromium-browser",
    "/snap/bin/chromium",
];

type Probe = Box<dyn Fn(&Path) -> bool + Send + Sync>;

/// Resolves which browser executable a render should launch.
pub struct Locator {
    override_path: Option<PathBuf>,
    mode: Mode,
    candidates: Vec<PathBuf>,
    probe: Probe,
}

impl Locator {
    pub fn new(override_path: Option<PathBuf>, mode: Mode) -> Self {
        Self {
            override_path,
            mode,
            candidates: CHROME_CANDIDATES.iter().map(PathBuf::from).collect(),
            probe: Box::new(|p: &Path| p.is_file()),
        }
    }

    pub fn from_config(config: &ServiceConfig) -> Self {
        Self::new(config.chrome_path.clone(), config.mode)
    }

    /// Replace the filesystem check (used by tests).
    pub fn with_probe<F>(mut self, probe: F) -> Self
    where
        F: Fn(&Path) -> bool + Send + Sync + 'static,
    {
        self.probe = Box::new(probe);
        self
    }

    pub fn with_candidates<I, P>(mut self, candidates: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        self.candidates = candidates.into_iter().map(Into::into).collect();
        self
    }

    /// Path of the executable to launch, or `None` for the bundled default.
    pub fn locate(&self, request_id: &str) -> Option<PathBuf> {
        if let Some(path) = &self.override_path {
            if (self.probe)(path) {
                info!("[{}] Using browser executable from override: {}", request_id, path.display());
                return Some(path.clone());
            }
            warn!("[{}] Browser override {} does not exist; ignoring it", request_id, path.display());
        }

        if self.mode != Mode::Production {
            debug!("[{}] Development mode; using bundled browser", request_id);
            return None;
        }

        match self.candidates.iter().find(|c| (self.probe)(c)) {
            Some(found) => {
                info!("[{}] Found browser executable at {}", request_id, found.display());
                Some(found.clone())
            }
            None => {
                warn!("[{}] No installed Chrome/Chromium found; falling back to bundled browser", request_id);
                None
            }
        }
    }
}

/// Resolve the executable for `config` against the real filesystem.
pub fn locate(config: &ServiceConfig, request_id: &str) -> Option<PathBuf> {
    Locator::from_config(config).locate(request_id)
}
