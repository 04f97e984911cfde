use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::Parser;
use research_scraper::{sink, CollectRequest, CollectService, ScraperError, SiteCode};
use tower::Service;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

/// Collect publication lists (title / date / PDF URL) from Korean research
/// institutes for a date range.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Cli {
    /// Start date, YYYY-MM-DD
    #[arg(value_name = "START", required_unless_present_any = ["start", "list_sites"])]
    start_pos: Option<String>,

    /// End date, YYYY-MM-DD
    #[arg(value_name = "END", required_unless_present_any = ["end", "list_sites"])]
    end_pos: Option<String>,

    #[arg(long, conflicts_with = "start_pos")]
    start: Option<String>,

    #[arg(long, conflicts_with = "end_pos")]
    end: Option<String>,

    /// Site code; repeat for several. Default: every site.
    #[arg(long = "site", value_name = "CODE")]
    sites: Vec<SiteCode>,

    /// Stop each site after this many records
    #[arg(long)]
    limit: Option<usize>,

    /// Where CSV / JSON go. Default: the nearest existing `output/` in the
    /// working directory or up to two parents, else `./output`.
    #[arg(long)]
    output_dir: Option<PathBuf>,

    /// Show the browser window
    #[arg(long)]
    headed: bool,

    /// Print the registered site codes and exit
    #[arg(long)]
    list_sites: bool,
}

impl Cli {
    fn request(&self) -> Result<CollectRequest, ScraperError> {
        let cwd = std::env::current_dir()?;
        self.request_from(&cwd)
    }

    fn request_from(&self, cwd: &Path) -> Result<CollectRequest, ScraperError> {
        let start = self.start.as_deref().or(self.start_pos.as_deref()).unwrap_or_default();
        let end = self.end.as_deref().or(self.end_pos.as_deref()).unwrap_or_default();
        let request = CollectRequest::for_range(start, end)?;
        let output_dir = match &self.output_dir {
            Some(dir) => dir.clone(),
            None => sink::resolve_output_dir(cwd)?,
        };
        Ok(request
            .with_sites(self.sites.iter().copied())
            .with_output_dir(output_dir)
            .with_headless(!self.headed)
            .with_item_limit(self.limit))
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    if cli.list_sites {
        for code in SiteCode::ALL {
            println!("{:<10} {}", code.as_str(), code.site_name());
        }
        return ExitCode::SUCCESS;
    }

    let request = match cli.request() {
        Ok(request) => request,
        Err(e @ (ScraperError::InvalidDate(_) | ScraperError::InvalidDateRange { .. })) => {
            error!("{}", e);
            return ExitCode::from(2);
        }
        Err(e) => {
            error!("Cannot prepare output directory: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let mut service = CollectService::new();
    match service.call(request).await {
        Ok(report) => {
            for run in &report.sites {
                match &run.error {
                    None => info!("{}: {} records", run.site, run.collected),
                    Some(e) => error!("{}: failed ({})", run.site, e),
                }
            }
            let failed = report.failed_sites().count();
            if failed > 0 {
                warn!("{} of {} sites failed", failed, report.sites.len());
            }
            match &report.files {
                Some(files) => println!(
                    "{} records\n  {}\n  {}",
                    report.records.len(),
                    files.csv.display(),
                    files.json.display()
                ),
                None => println!("No records in {}", report.window),
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("Collection failed: {}", e);
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_positional_range() {
        let cli = Cli::try_parse_from(["research-scraper", "2026-01-01", "2026-01-31", "--site", "kdi", "--site", "HF"])
            .unwrap();
        let cwd = tempfile::tempdir().unwrap();
        let req = cli.request_from(cwd.path()).unwrap();
        assert_eq!(req.sites, vec![SiteCode::Kdi, SiteCode::Hf]);
        assert!(req.headless);
        assert_eq!(req.window.to_string(), "2026-01-01 ~ 2026-01-31");
    }

    #[test]
    fn test_flag_range_and_options() {
        let cli = Cli::try_parse_from([
            "research-scraper",
            "--start",
            "2026-01-01",
            "--end",
            "2026-01-31",
            "--limit",
            "5",
            "--headed",
            "--output-dir",
            "/tmp/x",
        ])
        .unwrap();
        let req = cli.request().unwrap();
        assert!(req.sites.is_empty());
        assert!(!req.headless);
        assert_eq!(req.item_limit, Some(5));
        assert_eq!(req.output_dir, PathBuf::from("/tmp/x"));
    }

    #[test]
    fn test_default_output_dir_is_resolved() {
        let root = tempfile::tempdir().unwrap();
        let work = root.path().join("project").join("run");
        std::fs::create_dir_all(&work).unwrap();
        let existing = root.path().join("project").join("output");
        std::fs::create_dir_all(&existing).unwrap();

        let cli = Cli::try_parse_from(["research-scraper", "2026-01-01", "2026-01-31"]).unwrap();
        assert_eq!(cli.output_dir, None);
        assert_eq!(cli.request_from(&work).unwrap().output_dir, existing);

        let elsewhere = root.path().join("a").join("b").join("c");
        std::fs::create_dir_all(&elsewhere).unwrap();
        assert_eq!(cli.request_from(&elsewhere).unwrap().output_dir, elsewhere.join("output"));
        assert!(elsewhere.join("output").is_dir());
    }

    #[test]
    fn test_invalid_input() {
        assert!(Cli::try_parse_from(["research-scraper", "2026-01-01", "2026-01-31", "--site", "nowhere"]).is_err());

        let backwards = Cli::try_parse_from(["research-scraper", "2026-02-01", "2026-01-01"]).unwrap();
        assert!(matches!(backwards.request(), Err(ScraperError::InvalidDateRange { .. })));
    }
}
