//! Browser session abstraction
//!
//! Adapters only talk to a [`Session`]. The production implementation drives
//! Chrome through the DevTools protocol ([`ChromeSession`]); tests use an
//! in-memory scripted page.

mod chrome;
#[cfg(test)]
pub(crate) mod mock;

use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::error::ScraperError;
use crate::extract::DownloadStrategy;
use crate::observer::ResponseObserver;

pub use chrome::{ChromeBrowser, ChromeSession};

/// How long click-capture strategies wait for their signal.
pub const CLICK_CAPTURE_WAIT: Duration = Duration::from_secs(5);

#[async_trait]
pub trait Session: Send + Sync {
    /// Navigate and wait for the load to finish.
    async fn goto(&self, url: &str) -> Result<(), ScraperError>;

    /// URL of the page currently loaded.
    async fn current_url(&self) -> Result<String, ScraperError>;

    /// Rendered HTML of the current page.
    async fn content(&self) -> Result<String, ScraperError>;

    /// Click the `index`-th element matching `selector`. `Ok(false)` when
    /// there is no such element.
    async fn click(&self, selector: &str, index: usize) -> Result<bool, ScraperError>;

    /// Run `script` in the page and return its JSON result.
    async fn evaluate(&self, script: &str) -> Result<serde_json::Value, ScraperError>;

    /// Fixed pause. All adapter waits go through here.
    async fn pause(&self, duration: Duration);

    /// Click and return the final URL of the tab the click opened.
    async fn click_for_new_tab(
        &self,
        selector: &str,
        index: usize,
        wait: Duration,
    ) -> Result<Option<String>, ScraperError>;

    /// Click and return the URL of the download the click started.
    async fn click_for_download(
        &self,
        selector: &str,
        index: usize,
        wait: Duration,
    ) -> Result<Option<String>, ScraperError>;

    /// Download-like responses seen by this session.
    fn observer(&self) -> &ResponseObserver;

    /// Dump whatever helps diagnose an unexpected page. No-op by default.
    async fn debug_snapshot(&self, _label: &str) {}

    /// Release the page and anything the session created.
    async fn close(&self) -> Result<(), ScraperError>;
}

/// Run a click-based download strategy against the `index`-th match.
///
/// A new-tab click that opens nothing falls back to the observer, since the
/// click may have started an in-page request instead.
pub async fn capture_download(
    session: &dyn Session,
    strategy: &DownloadStrategy,
    index: usize,
) -> Result<Option<String>, ScraperError> {
    match strategy {
        DownloadStrategy::NewTab { selector } => {
            let mark = session.observer().mark();
            if let Some(url) = session
                .click_for_new_tab(selector, index, CLICK_CAPTURE_WAIT)
                .await?
            {
                return Ok(Some(url));
            }
            debug!("No new tab for {}[{}], checking observed responses", selector, index);
            Ok(session.observer().latest_since(mark))
        }
        DownloadStrategy::DownloadEvent { selector } => {
            session
                .click_for_download(selector, index, CLICK_CAPTURE_WAIT)
                .await
        }
    }
}

/// Navigate to `url` and return its content, retrying once after `delay` if
/// the page contains `block_marker`.
pub async fn goto_with_block_retry(
    session: &dyn Session,
    url: &str,
    block_marker: &str,
    delay: Duration,
) -> Result<String, ScraperError> {
    session.goto(url).await?;
    let content = session.content().await?;
    if !content.contains(block_marker) {
        return Ok(content);
    }

    warn!("Blocked on {}, retrying once after {:?}", url, delay);
    session.pause(delay).await;
    session.goto(url).await?;
    let content = session.content().await?;
    if content.contains(block_marker) {
        return Err(ScraperError::Blocked(url.to_string()));
    }
    Ok(content)
}
