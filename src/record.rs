//! Publication record types

use chrono::Local;
use serde::{Deserialize, Serialize};

/// Placeholder for a field that could not be extracted.
pub const NOT_AVAILABLE: &str = "N/A";
/// Placeholder date for items whose date could not be read.
pub const UNKNOWN_DATE: &str = "0000-00-00";

/// True for empty strings and the sentinel placeholders.
pub fn is_sentinel(value: &str) -> bool {
    let value = value.trim();
    value.is_empty() || value == NOT_AVAILABLE || value == UNKNOWN_DATE
}

/// One scraped publication
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicationRecord {
    pub source: String,
    pub title: String,
    pub date: String,
    #[serde(rename = "pdf_url", alias = "download_url")]
    pub download_url: String,
    #[serde(default)]
    pub page_url: String,
    #[serde(default)]
    pub collected_at: String,
}

impl PublicationRecord {
    pub fn new(
        source: impl Into<String>,
        title: impl Into<String>,
        date: impl Into<String>,
        download_url: impl Into<String>,
    ) -> Self {
        Self {
            source: source.into(),
            title: title.into(),
            date: date.into(),
            download_url: download_url.into(),
            page_url: String::new(),
            collected_at: Local::now().format("%Y-%m-%dT%H:%M:%S").to_string(),
        }
    }

    pub fn with_page_url(mut self, page_url: impl Into<String>) -> Self {
        self.page_url = page_url.into();
        self
    }

    pub fn with_collected_at(mut self, collected_at: impl Into<String>) -> Self {
        self.collected_at = collected_at.into();
        self
    }

    pub fn has_download_url(&self) -> bool {
        !is_sentinel(&self.download_url)
    }
}
