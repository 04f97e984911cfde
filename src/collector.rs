//! Run orchestration: one site, or many sites on one browser

use std::path::PathBuf;

use async_trait::async_trait;
use tracing::{error, info, warn};

use crate::config::ScraperConfig;
use crate::dates::DateWindow;
use crate::error::ScraperError;
use crate::record::PublicationRecord;
use crate::registry::{self, SiteCode};
use crate::session::{ChromeBrowser, Session};
use crate::sink::{self, OutputKind, SavedFiles};
use crate::traits::SiteAdapter;

/// File prefix of the integrated result set.
pub const DEFAULT_INTEGRATED_PREFIX: &str = "research";

/// Something that can open a fresh browser session.
#[async_trait]
pub trait SessionSource: Send + Sync {
    /// New session whose response observer keeps `observer_capacity` entries.
    async fn open(&self, observer_capacity: usize) -> Result<Box<dyn Session>, ScraperError>;
}

#[async_trait]
impl SessionSource for ChromeBrowser {
    async fn open(&self, observer_capacity: usize) -> Result<Box<dyn Session>, ScraperError> {
        Ok(Box::new(self.new_session(observer_capacity).await?))
    }
}

/// Outcome of one site within a run.
#[derive(Debug, Clone)]
pub struct SiteRun {
    pub site: String,
    pub collected: usize,
    pub error: Option<String>,
}

impl SiteRun {
    pub fn succeeded(&self) -> bool {
        self.error.is_none()
    }
}

#[derive(Debug, Clone)]
pub struct CollectReport {
    pub window: DateWindow,
    pub sites: Vec<SiteRun>,
    /// Deduplicated records of every site that ran.
    pub records: Vec<PublicationRecord>,
    /// `None` when nothing was collected.
    pub files: Option<SavedFiles>,
}

impl CollectReport {
    pub fn failed_sites(&self) -> impl Iterator<Item = &SiteRun> {
        self.sites.iter().filter(|run| !run.succeeded())
    }
}

/// Open a session sized for `adapter`, scrape, close.
pub async fn run_adapter(
    source: &dyn SessionSource,
    adapter: &mut dyn SiteAdapter,
) -> Result<usize, ScraperError> {
    let session = source.open(adapter.observer_capacity()).await?;
    adapter.execute(session.as_ref()).await
}

/// Run `adapters` one after another. A failing adapter is logged and its
/// partial results are still kept.
pub async fn run_sequential(
    source: &dyn SessionSource,
    adapters: Vec<Box<dyn SiteAdapter>>,
) -> (Vec<SiteRun>, Vec<PublicationRecord>) {
    let total = adapters.len();
    let mut runs = Vec::with_capacity(total);
    let mut records = Vec::new();

    for (i, mut adapter) in adapters.into_iter().enumerate() {
        let site = adapter.site_name().to_string();
        info!("[{}/{}] {}", i + 1, total, site);

        let outcome = run_adapter(source, adapter.as_mut()).await;
        let mut collected = adapter.take_results();
        let run = match outcome {
            Ok(_) => {
                info!("{}: {} records", site, collected.len());
                SiteRun {
                    site,
                    collected: collected.len(),
                    error: None,
                }
            }
            Err(e) => {
                error!("{} failed: {}", site, e);
                SiteRun {
                    site,
                    collected: collected.len(),
                    error: Some(e.to_string()),
                }
            }
        };
        records.append(&mut collected);
        runs.push(run);
    }
    (runs, records)
}

pub struct Collector {
    config: ScraperConfig,
    integrated_prefix: String,
}

impl Collector {
    pub fn new(config: ScraperConfig) -> Self {
        Self {
            config,
            integrated_prefix: DEFAULT_INTEGRATED_PREFIX.to_string(),
        }
    }

    /// File prefix for the integrated result set.
    pub fn with_integrated_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.integrated_prefix = prefix.into();
        self
    }

    pub fn config(&self) -> &ScraperConfig {
        &self.config
    }

    fn output_dir(&self) -> PathBuf {
        self.config.output_dir.clone()
    }

    /// Scrape one site and save `{code}_results_*`.
    pub async fn run_site(&self, code: SiteCode, window: DateWindow) -> Result<CollectReport, ScraperError> {
        let browser = ChromeBrowser::launch(&self.config).await?;
        self.run_site_with(&browser, code, window).await
    }

    pub async fn run_site_with(
        &self,
        source: &dyn SessionSource,
        code: SiteCode,
        window: DateWindow,
    ) -> Result<CollectReport, ScraperError> {
        info!("Collecting {} for {}", code.site_name(), window);
        let mut adapter = registry::build(code, window, &self.config);
        run_adapter(source, adapter.as_mut()).await?;
        let collected = adapter.take_results();
        let total = collected.len();
        let records = sink::dedup(collected);
        if records.len() < total {
            info!("{}: dropped {} duplicate records", code, total - records.len());
        }

        let files = self.save(&records, code.as_str(), OutputKind::Results)?;
        Ok(CollectReport {
            window,
            sites: vec![SiteRun {
                site: code.site_name().to_string(),
                collected: total,
                error: None,
            }],
            records,
            files,
        })
    }

    /// Scrape every site in `codes` on one browser and save the
    /// deduplicated union as `{prefix}_integrated_results_*`.
    pub async fn run_all(&self, codes: &[SiteCode], window: DateWindow) -> Result<CollectReport, ScraperError> {
        let browser = ChromeBrowser::launch(&self.config).await?;
        self.run_all_with(&browser, codes, window).await
    }

    pub async fn run_all_with(
        &self,
        source: &dyn SessionSource,
        codes: &[SiteCode],
        window: DateWindow,
    ) -> Result<CollectReport, ScraperError> {
        let adapters = codes
            .iter()
            .map(|code| registry::build(*code, window, &self.config))
            .collect();
        self.collect_with(source, adapters, window).await
    }

    /// Run prebuilt adapters and save their integrated result set.
    pub async fn collect_with(
        &self,
        source: &dyn SessionSource,
        adapters: Vec<Box<dyn SiteAdapter>>,
        window: DateWindow,
    ) -> Result<CollectReport, ScraperError> {
        info!("Integrated collection of {} sites for {}", adapters.len(), window);
        let (sites, records) = run_sequential(source, adapters).await;

        let before = records.len();
        let records = sink::dedup(records);
        if records.len() < before {
            info!("Removed {} duplicate records", before - records.len());
        }

        let failed = sites.iter().filter(|run| !run.succeeded()).count();
        info!(
            "Integrated collection finished: {} records, {}/{} sites failed",
            records.len(),
            failed,
            sites.len()
        );

        let files = self.save(&records, &self.integrated_prefix, OutputKind::Integrated)?;
        Ok(CollectReport {
            window,
            sites,
            records,
            files,
        })
    }

    fn save(
        &self,
        records: &[PublicationRecord],
        prefix: &str,
        kind: OutputKind,
    ) -> Result<Option<SavedFiles>, ScraperError> {
        if records.is_empty() {
            warn!("No records collected for {}; nothing saved", prefix);
            return Ok(None);
        }
        sink::save(records, &self.output_dir(), prefix, kind).map(Some)
    }
}
