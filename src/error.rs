use thiserror::Error;

#[derive(Error, Debug)]
pub enum ScraperError {
    #[error("browser init failed: {0}")]
    BrowserInit(String),

    #[error("navigation failed: {0}")]
    Navigation(String),

    #[error("timed out: {0}")]
    Timeout(String),

    #[error("element not found: {0}")]
    ElementNotFound(String),

    #[error("script evaluation failed: {0}")]
    JavaScript(String),

    #[error("extraction failed: {0}")]
    Extraction(String),

    #[error("blocked by anti-automation check: {0}")]
    Blocked(String),

    #[error("invalid date '{0}' (expected YYYY-MM-DD)")]
    InvalidDate(String),

    #[error("invalid date range: {start} is after {end}")]
    InvalidDateRange { start: String, end: String },

    #[error("unknown site code '{0}'")]
    UnknownSite(String),

    #[error("file I/O error: {0}")]
    FileIO(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid URL: {0}")]
    Url(#[from] url::ParseError),
}

impl ScraperError {
    /// Errors an adapter swallows for a single item or page before moving on.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            ScraperError::Navigation(_)
                | ScraperError::Timeout(_)
                | ScraperError::ElementNotFound(_)
                | ScraperError::JavaScript(_)
                | ScraperError::Extraction(_)
                | ScraperError::Blocked(_)
                | ScraperError::Url(_)
        )
    }
}
