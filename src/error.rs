//! Error types for the PDF service

use thiserror::Error;

/// Result type alias for service operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while serving a render request
#[derive(Error, Debug)]
pub enum Error {
    /// The request is missing required content
    #[error("{0}")]
    ValidationError(String),

    /// The request body could not be decoded
    #[error("Invalid JSON body: {0}")]
    InvalidRequest(String),

    /// The request body exceeded the configured cap
    #[error("Request body exceeds {0} bytes")]
    PayloadTooLarge(usize),

    /// Every render slot is taken
    #[error("Render capacity exhausted ({0} in flight), retry later")]
    Busy(usize),

    /// The browser process could not be started
    #[error("Browser launch failed: {0}")]
    LaunchError(String),

    /// The assembled document could not be loaded into a page
    #[error("Failed to load document: {0}")]
    LoadError(String),

    /// The page did not reach network idleness in time
    #[error("Operation timed out after {0}ms")]
    Timeout(u64),

    /// Page evaluation or PDF capture failed
    #[error("Rendering failed: {0}")]
    RenderError(String),

    /// The browser process could not be closed
    #[error("Browser cleanup failed: {0}")]
    CleanupError(String),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    ConfigError(String),

    /// The HTTP listener failed
    #[error("Server error: {0}")]
    ServerError(String),

    /// CDP-specific error
    #[cfg(feature = "cdp")]
    #[error("CDP error: {0}")]
    CdpError(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Message used when a request carries no HTML
    pub const HTML_REQUIRED: &'static str = "HTML is required";

    pub fn html_required() -> Self {
        Error::ValidationError(Self::HTML_REQUIRED.to_string())
    }

    /// Timeout after `after`, saturating at `u64::MAX` milliseconds
    pub fn timeout(after: std::time::Duration) -> Self {
        Error::Timeout(u64::try_from(after.as_millis()).unwrap_or(u64::MAX))
    }

    /// HTTP status code this error is surfaced with
    pub fn status_code(&self) -> u16 {
        match self {
            Error::ValidationError(_) | Error::InvalidRequest(_) => 400,
            Error::PayloadTooLarge(_) => 413,
            Error::Busy(_) => 503,
            _ => 500,
        }
    }

    /// Whether the failure was the caller's fault
    pub fn is_client_error(&self) -> bool {
        (400..500).contains(&self.status_code())
    }
}

#[cfg(feature = "cdp")]
impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Error::CdpError(err.to_string())
    }
}
