//! Publication-list scraper for Korean research and financial institutes
//!
//! - Collects `(title, date, PDF URL)` for a date range from each site
//! - Saves CSV (UTF-8 BOM) and JSON under `output/`
//! - Many sites can run on one browser with their results merged and deduplicated
//!
//! # Single site
//!
//! ```rust,ignore
//! use research_scraper::{Collector, DateWindow, ScraperConfig, SiteCode};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), research_scraper::ScraperError> {
//!     let window = DateWindow::parse("2026-01-01", "2026-01-31")?;
//!     let collector = Collector::new(ScraperConfig::default().with_headless(false));
//!
//!     let report = collector.run_site(SiteCode::Kdi, window).await?;
//!     println!("{} records -> {:?}", report.records.len(), report.files);
//!     Ok(())
//! }
//! ```
//!
//! # Through the tower service
//!
//! ```rust,ignore
//! use research_scraper::{CollectRequest, CollectService, SiteCode};
//! use tower::Service;
//!
//! #[tokio::main]
//! async fn main() {
//!     let mut service = CollectService::new();
//!     let request = CollectRequest::for_range("2026-01-01", "2026-01-31")
//!         .unwrap()
//!         .with_sites([SiteCode::Hf, SiteCode::HanaIf])
//!         .with_output_dir("./output");
//!
//!     let report = service.call(request).await.unwrap();
//!     println!("integrated: {:?}", report.files);
//! }
//! ```

pub mod collector;
pub mod config;
pub mod dates;
pub mod error;
pub mod extract;
pub mod listing;
pub mod observer;
pub mod record;
pub mod registry;
pub mod service;
pub mod session;
pub mod sink;
pub mod sites;
pub mod traits;

pub use collector::{CollectReport, Collector, SessionSource, SiteRun};
pub use config::ScraperConfig;
pub use dates::{is_in_period, DateWindow, UnknownDatePolicy};
pub use error::ScraperError;
pub use listing::{ListingAdapter, ListingSite};
pub use observer::ResponseObserver;
pub use record::{PublicationRecord, NOT_AVAILABLE, UNKNOWN_DATE};
pub use registry::SiteCode;
pub use service::{CollectRequest, CollectService};
pub use session::{ChromeBrowser, ChromeSession, Session};
pub use traits::{AdapterCore, SiteAdapter};
