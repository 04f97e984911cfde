use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;
use std::task::{Context, Poll};

use tower::Service;
use tracing::info;

use crate::collector::{CollectReport, Collector, DEFAULT_INTEGRATED_PREFIX};
use crate::config::ScraperConfig;
use crate::dates::DateWindow;
use crate::error::ScraperError;
use crate::registry::SiteCode;

/// One collection run.
#[derive(Debug, Clone)]
pub struct CollectRequest {
    pub window: DateWindow,
    /// Sites to scrape. Empty means every registered site.
    pub sites: Vec<SiteCode>,
    pub output_dir: PathBuf,
    pub headless: bool,
    pub item_limit: Option<usize>,
    pub integrated_prefix: String,
}

impl CollectRequest {
    /// Every site, default output settings.
    pub fn new(window: DateWindow) -> Self {
        let defaults = ScraperConfig::default();
        Self {
            window,
            sites: Vec::new(),
            output_dir: defaults.output_dir,
            headless: defaults.headless,
            item_limit: defaults.item_limit,
            integrated_prefix: DEFAULT_INTEGRATED_PREFIX.to_string(),
        }
    }

    /// `start` / `end` as `YYYY-MM-DD`.
    pub fn for_range(start: &str, end: &str) -> Result<Self, ScraperError> {
        Ok(Self::new(DateWindow::parse(start, end)?))
    }

    /// Add one site; duplicates are ignored.
    pub fn with_site(mut self, code: SiteCode) -> Self {
        if !self.sites.contains(&code) {
            self.sites.push(code);
        }
        self
    }

    /// Add several sites in order.
    pub fn with_sites(self, codes: impl IntoIterator<Item = SiteCode>) -> Self {
        codes.into_iter().fold(self, Self::with_site)
    }

    /// Directory that receives the CSV / JSON files.
    pub fn with_output_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.output_dir = path.into();
        self
    }

    /// Run the browser without a window.
    pub fn with_headless(mut self, headless: bool) -> Self {
        self.headless = headless;
        self
    }

    /// Stop each site after this many records.
    pub fn with_item_limit(mut self, limit: Option<usize>) -> Self {
        self.item_limit = limit;
        self
    }

    /// File prefix for multi-site output.
    pub fn with_integrated_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.integrated_prefix = prefix.into();
        self
    }

    /// A single site is saved as `{code}_results_*`; anything else as an
    /// integrated set.
    pub fn single_site(&self) -> Option<SiteCode> {
        match self.sites.as_slice() {
            [code] => Some(*code),
            _ => None,
        }
    }

    /// Comma-separated site codes for logging, `all` when none were named.
    pub fn sites_label(&self) -> String {
        if self.sites.is_empty() {
            return "all".to_string();
        }
        self.sites
            .iter()
            .map(|code| code.as_str())
            .collect::<Vec<_>>()
            .join(",")
    }

    /// The requested sites, or every registered site when none were named.
    pub fn resolved_sites(&self) -> Vec<SiteCode> {
        if self.sites.is_empty() {
            SiteCode::ALL.to_vec()
        } else {
            self.sites.clone()
        }
    }
}

impl From<&CollectRequest> for ScraperConfig {
    fn from(req: &CollectRequest) -> Self {
        ScraperConfig::default()
            .with_output_dir(req.output_dir.clone())
            .with_headless(req.headless)
            .with_item_limit(req.item_limit)
    }
}

/// tower::Service front for [`Collector`].
#[derive(Debug, Clone, Default)]
pub struct CollectService {
    base: Option<ScraperConfig>,
}

impl CollectService {
    /// Each request supplies its own settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Use `config` for everything a request does not set itself.
    pub fn with_config(config: ScraperConfig) -> Self {
        Self { base: Some(config) }
    }

    fn config_for(&self, req: &CollectRequest) -> ScraperConfig {
        match &self.base {
            Some(base) => base
                .clone()
                .with_output_dir(req.output_dir.clone())
                .with_headless(req.headless)
                .with_item_limit(req.item_limit),
            None => req.into(),
        }
    }
}

impl Service<CollectRequest> for CollectService {
    type Response = CollectReport;
    type Error = ScraperError;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: CollectRequest) -> Self::Future {
        info!("Collect request: window={}, sites={}", req.window, req.sites_label());
        let config = self.config_for(&req);

        Box::pin(async move {
            let collector = Collector::new(config).with_integrated_prefix(req.integrated_prefix.clone());
            let report = match req.single_site() {
                Some(code) => collector.run_site(code, req.window).await?,
                None => collector.run_all(&req.resolved_sites(), req.window).await?,
            };

            info!(
                "Collect finished: {} records, saved={:?}",
                report.records.len(),
                report.files.as_ref().map(|files| &files.csv)
            );
            Ok(report)
        })
    }
}
