use std::time::Duration;

use async_trait::async_trait;

use crate::config::ScraperConfig;
use crate::dates::DateWindow;
use crate::error::ScraperError;
use crate::observer::DEFAULT_CAPACITY;
use crate::record::PublicationRecord;
use crate::session::Session;

#[async_trait]
pub trait SiteAdapter: Send {
    /// Display name written into each record's `source`.
    fn site_name(&self) -> &str;

    /// Crawl the site on `session`. Returns how many records were collected
    /// by this call.
    async fn scrape(&mut self, session: &dyn Session) -> Result<usize, ScraperError>;

    /// Records collected so far.
    fn results(&self) -> &[PublicationRecord];

    /// Move the collected records out, leaving the adapter empty.
    fn take_results(&mut self) -> Vec<PublicationRecord>;

    /// Response observer size this adapter wants on its session.
    fn observer_capacity(&self) -> usize {
        DEFAULT_CAPACITY
    }

    /// scrape → close
    async fn execute(&mut self, session: &dyn Session) -> Result<usize, ScraperError> {
        let collected = self.scrape(session).await;
        session.close().await?;
        collected
    }
}

/// State every adapter carries: identity, admission window and its own
/// result list.
#[derive(Debug, Clone)]
pub struct AdapterCore {
    pub site_name: String,
    pub window: DateWindow,
    pub item_limit: Option<usize>,
    pub block_retry_delay: Duration,
    pub results: Vec<PublicationRecord>,
}

impl AdapterCore {
    pub fn new(site_name: impl Into<String>, window: DateWindow) -> Self {
        let defaults = ScraperConfig::default();
        Self {
            site_name: site_name.into(),
            window,
            item_limit: defaults.item_limit,
            block_retry_delay: defaults.block_retry_delay,
            results: Vec::new(),
        }
    }

    pub fn from_config(site_name: impl Into<String>, window: DateWindow, config: &ScraperConfig) -> Self {
        Self {
            item_limit: config.item_limit,
            block_retry_delay: config.block_retry_delay,
            ..Self::new(site_name, window)
        }
    }

    pub fn is_in_period(&self, date_text: &str) -> bool {
        self.window.contains(date_text)
    }

    pub fn is_full(&self) -> bool {
        self.item_limit
            .map_or(false, |limit| self.results.len() >= limit)
    }

    /// Build and keep a record stamped with this adapter's site name.
    pub fn save_result(&mut self, title: &str, date: &str, download_url: &str, page_url: &str) {
        let record = PublicationRecord::new(&self.site_name, title, date, download_url)
            .with_page_url(page_url);
        self.results.push(record);
    }
}
