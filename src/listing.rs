//! Shared list-then-detail crawl
//!
//! Most target sites are a paginated list of publications, each optionally
//! pointing to a detail page with the download link. A [`ListingSite`]
//! describes one site (where the list is, how to read a list snapshot, how to
//! resolve an item) and [`run_listing`] drives it:
//!
//! 1. walk list pages up to `max_pages`, filtering items by date and
//!    resolving whatever can be resolved while the list is on screen;
//! 2. visit the detail pages of the remaining admitted items.
//!
//! Paging stops when a page has no items, repeats the previous page's first
//! item, has no next-page control, or `max_pages` is reached.

use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, error, info, warn};

use crate::dates::{normalize_date, UnknownDatePolicy};
use crate::error::ScraperError;
use crate::record::{is_sentinel, PublicationRecord, NOT_AVAILABLE};
use crate::session::Session;
use crate::traits::{AdapterCore, SiteAdapter};

pub const LIST_SETTLE: Duration = Duration::from_millis(2000);
pub const PAGE_SETTLE: Duration = Duration::from_millis(1500);

/// One row of a list page.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListItem {
    pub title: String,
    /// Raw date text as printed on the list, if any.
    pub date: Option<String>,
    pub detail_url: Option<String>,
    pub download_url: Option<String>,
    /// Index of this item's download trigger among all matches of the site's
    /// trigger selector, for click-based strategies.
    pub click_index: Option<usize>,
    /// URL of the list page the item was read from.
    pub page_url: String,
}

impl ListItem {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Default::default()
        }
    }

    pub fn with_date(mut self, date: Option<String>) -> Self {
        self.date = date;
        self
    }

    pub fn with_detail_url(mut self, url: Option<String>) -> Self {
        self.detail_url = url;
        self
    }

    pub fn with_download_url(mut self, url: Option<String>) -> Self {
        self.download_url = url;
        self
    }

    pub fn with_click_index(mut self, index: Option<usize>) -> Self {
        self.click_index = index;
        self
    }

    /// Identity used for repeated-page detection.
    pub fn key(&self) -> String {
        self.detail_url
            .clone()
            .or_else(|| self.download_url.clone())
            .unwrap_or_else(|| format!("{}|{}", self.title, self.date.as_deref().unwrap_or("")))
    }

    pub fn date_text(&self) -> &str {
        self.date.as_deref().unwrap_or(NOT_AVAILABLE)
    }

    /// Canonical date for the record; sentinels pass through as-is.
    pub fn record_date(&self) -> String {
        match self.date.as_deref() {
            Some(raw) => normalize_date(raw).unwrap_or_else(|| {
                if is_sentinel(raw) {
                    raw.trim().to_string()
                } else {
                    NOT_AVAILABLE.to_string()
                }
            }),
            None => NOT_AVAILABLE.to_string(),
        }
    }
}

/// How to reach the following list page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NextPage {
    /// Click the `index`-th match of `selector`.
    Click { selector: String, index: usize },
    /// Run an in-page pagination function, e.g. `goPage(3)`.
    Script(String),
    /// Load a list URL with the page/offset parameter advanced.
    Url(String),
    End,
}

impl NextPage {
    pub fn click(selector: impl Into<String>) -> Self {
        NextPage::Click {
            selector: selector.into(),
            index: 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListPage {
    pub items: Vec<ListItem>,
    pub next: NextPage,
}

#[async_trait]
pub trait ListingSite: Send + Sync {
    /// First list page.
    fn list_url(&self) -> String;

    /// Overrides the adapter's `source` for records from this board.
    fn source_name(&self) -> Option<&str> {
        None
    }

    /// Upper bound on list pages walked.
    fn max_pages(&self) -> usize;

    /// What to do with items whose date cannot be read.
    fn unknown_date_policy(&self) -> UnknownDatePolicy {
        UnknownDatePolicy::Reject
    }

    /// Lists are newest-first: stop at the first item older than the window.
    fn stops_at_older(&self) -> bool {
        false
    }

    /// Drop items that end up without a download URL.
    fn requires_download_url(&self) -> bool {
        false
    }

    /// Pause before each detail-page visit.
    fn detail_delay(&self) -> Duration {
        Duration::ZERO
    }

    /// Read a rendered list page. `page_number` starts at 1.
    fn parse_list(
        &self,
        html: &str,
        page_url: &str,
        page_number: usize,
    ) -> Result<ListPage, ScraperError>;

    /// Whether the item needs its detail page visited.
    fn needs_detail(&self, item: &ListItem) -> bool {
        item.download_url.is_none() && item.detail_url.is_some()
    }

    /// Resolve the download URL while the list page is still loaded.
    async fn resolve_in_list(
        &self,
        _session: &dyn Session,
        item: &ListItem,
    ) -> Result<Option<String>, ScraperError> {
        Ok(item.download_url.clone())
    }

    /// Visit the item's detail page and build its record. `Ok(None)` discards
    /// the item.
    async fn resolve_detail(
        &self,
        _session: &dyn Session,
        _item: &ListItem,
        _core: &AdapterCore,
    ) -> Result<Option<PublicationRecord>, ScraperError> {
        Ok(None)
    }
}

pub(crate) fn build_record(core: &AdapterCore, item: &ListItem, download_url: Option<String>) -> PublicationRecord {
    PublicationRecord::new(
        &core.site_name,
        &item.title,
        item.record_date(),
        download_url.unwrap_or_else(|| NOT_AVAILABLE.to_string()),
    )
    .with_page_url(item.detail_url.clone().unwrap_or_else(|| item.page_url.clone()))
}

fn keep(core: &mut AdapterCore, requires_download_url: bool, record: PublicationRecord) -> bool {
    if requires_download_url && !record.has_download_url() {
        warn!("[{}] no download URL, dropped: {}", core.site_name, record.title);
        return false;
    }
    info!(
        "[{}] collected: {} | {} | {}",
        core.site_name, record.date, record.title, record.download_url
    );
    core.results.push(record);
    true
}

/// Walk `site`'s list pages on `session`, appending admitted records to `core`.
pub async fn run_listing<S>(
    site: &S,
    core: &mut AdapterCore,
    session: &dyn Session,
) -> Result<usize, ScraperError>
where
    S: ListingSite + ?Sized,
{
    let list_url = site.list_url();
    let max_pages = site.max_pages();
    info!("[{}] opening list: {} ({})", core.site_name, list_url, core.window);
    session.goto(&list_url).await?;
    session.pause(LIST_SETTLE).await;

    let mut collected = 0;
    let mut pending: Vec<ListItem> = Vec::new();
    let mut previous_first: Option<String> = None;

    for page_number in 1..=max_pages {
        let page_url = session
            .current_url()
            .await
            .unwrap_or_else(|_| list_url.clone());
        let html = match session.content().await {
            Ok(html) => html,
            Err(e) => {
                warn!("[{}] page {}: could not read content: {}", core.site_name, page_number, e);
                break;
            }
        };
        let mut page = site.parse_list(&html, &page_url, page_number)?;
        drop(html);

        if page.items.is_empty() {
            info!("[{}] page {}: no items, stopping", core.site_name, page_number);
            session.debug_snapshot(&core.site_name).await;
            break;
        }
        let first_key = page.items[0].key();
        if previous_first.as_deref() == Some(first_key.as_str()) {
            info!(
                "[{}] page {} repeats the previous page, stopping",
                core.site_name, page_number
            );
            break;
        }
        previous_first = Some(first_key);
        info!(
            "[{}] page {}/{}: {} items",
            core.site_name,
            page_number,
            max_pages,
            page.items.len()
        );

        let mut reached_older = false;
        for item in page.items.iter_mut() {
            if core.is_full() {
                break;
            }
            if item.page_url.is_empty() {
                item.page_url = page_url.clone();
            }
            let date_text = item.date_text().to_string();
            if site.stops_at_older() && core.window.is_before_start(&date_text) {
                info!("[{}] reached {} (before start), stopping", core.site_name, date_text);
                reached_older = true;
                break;
            }
            if !core.window.admits(&date_text, site.unknown_date_policy()) {
                debug!("[{}] out of period: {} ({})", core.site_name, item.title, date_text);
                continue;
            }
            if site.needs_detail(item) {
                pending.push(item.clone());
                continue;
            }

            match site.resolve_in_list(session, item).await {
                Ok(download_url) => {
                    let record = build_record(core, item, download_url);
                    if keep(core, site.requires_download_url(), record) {
                        collected += 1;
                    }
                }
                Err(e @ ScraperError::Timeout(_)) => {
                    warn!("[{}] {}; skipping the rest of page {}", core.site_name, e, page_number);
                    break;
                }
                Err(e) if e.is_recoverable() => {
                    warn!("[{}] item failed: {}: {}", core.site_name, item.title, e);
                }
                Err(e) => return Err(e),
            }
        }

        if reached_older || core.is_full() || page_number == max_pages {
            break;
        }

        let advanced = match &page.next {
            NextPage::End => false,
            NextPage::Click { selector, index } => match session.click(selector, *index).await {
                Ok(true) => true,
                Ok(false) => false,
                Err(e) => {
                    warn!("[{}] next-page click failed: {}", core.site_name, e);
                    false
                }
            },
            NextPage::Script(script) => match session.evaluate(script).await {
                Ok(_) => true,
                Err(e) => {
                    warn!("[{}] next-page script failed: {}", core.site_name, e);
                    false
                }
            },
            NextPage::Url(url) => match session.goto(url).await {
                Ok(()) => true,
                Err(e) => {
                    warn!("[{}] next-page load failed: {}", core.site_name, e);
                    false
                }
            },
        };
        if !advanced {
            info!("[{}] last page reached ({})", core.site_name, page_number);
            break;
        }
        session.pause(PAGE_SETTLE).await;
    }

    if !pending.is_empty() {
        info!("[{}] visiting {} detail pages", core.site_name, pending.len());
    }
    let total = pending.len();
    for (i, item) in pending.iter().enumerate() {
        if core.is_full() {
            info!("[{}] item limit reached", core.site_name);
            break;
        }
        debug!("[{}] [{}/{}] {}", core.site_name, i + 1, total, item.title);
        let delay = site.detail_delay();
        if !delay.is_zero() {
            session.pause(delay).await;
        }
        match site.resolve_detail(session, item, core).await {
            Ok(Some(record)) => {
                if keep(core, site.requires_download_url(), record) {
                    collected += 1;
                }
            }
            Ok(None) => debug!("[{}] discarded after detail: {}", core.site_name, item.title),
            Err(e) if e.is_recoverable() => {
                warn!("[{}] detail failed: {}: {}", core.site_name, item.title, e);
            }
            Err(e) => return Err(e),
        }
    }

    info!("[{}] {} records collected", core.site_name, collected);
    Ok(collected)
}

/// [`SiteAdapter`] over one or more [`ListingSite`] boards crawled in order.
///
/// A board that fails is logged and the next one still runs; the error is
/// returned only when no board succeeded.
pub struct ListingAdapter {
    boards: Vec<Box<dyn ListingSite>>,
    core: AdapterCore,
    observer_capacity: usize,
}

impl ListingAdapter {
    pub fn new(core: AdapterCore) -> Self {
        Self {
            boards: Vec::new(),
            core,
            observer_capacity: crate::observer::DEFAULT_CAPACITY,
        }
    }

    pub fn with_board(mut self, board: impl ListingSite + 'static) -> Self {
        self.boards.push(Box::new(board));
        self
    }

    pub fn with_observer_capacity(mut self, capacity: usize) -> Self {
        self.observer_capacity = capacity;
        self
    }
}

#[async_trait]
impl SiteAdapter for ListingAdapter {
    fn site_name(&self) -> &str {
        &self.core.site_name
    }

    async fn scrape(&mut self, session: &dyn Session) -> Result<usize, ScraperError> {
        let default_name = self.core.site_name.clone();
        let mut collected = 0;
        let mut succeeded = false;
        let mut first_error = None;

        for board in &self.boards {
            if self.core.is_full() {
                break;
            }
            self.core.site_name = board
                .source_name()
                .map(str::to_string)
                .unwrap_or_else(|| default_name.clone());
            match run_listing(board.as_ref(), &mut self.core, session).await {
                Ok(count) => {
                    collected += count;
                    succeeded = true;
                }
                Err(e) => {
                    error!("[{}] board {} failed: {}", self.core.site_name, board.list_url(), e);
                    first_error.get_or_insert(e);
                }
            }
        }
        self.core.site_name = default_name;

        match first_error {
            Some(e) if !succeeded => Err(e),
            _ => Ok(collected),
        }
    }

    fn results(&self) -> &[PublicationRecord] {
        &self.core.results
    }

    fn take_results(&mut self) -> Vec<PublicationRecord> {
        std::mem::take(&mut self.core.results)
    }

    fn observer_capacity(&self) -> usize {
        self.observer_capacity
    }
}
