//! Scrape one site with a visible browser
//!
//! ```
//! cargo run --example single_site -- hf 2026-01-01 2026-01-31
//! ```

use research_scraper::{Collector, DateWindow, ScraperConfig, SiteCode};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug")),
        )
        .init();

    let mut args = std::env::args().skip(1);
    let code: SiteCode = args.next().unwrap_or_else(|| "hf".to_string()).parse()?;
    let start = args.next().unwrap_or_else(|| "2026-01-01".to_string());
    let end = args.next().unwrap_or_else(|| "2026-01-31".to_string());
    let window = DateWindow::parse(&start, &end)?;

    println!("=== {} ({}) ===", code.site_name(), window);

    let config = ScraperConfig::default()
        .with_headless(false)
        .with_item_limit(Some(10));
    let report = Collector::new(config).run_site(code, window).await?;

    for record in &report.records {
        println!("[{}] {} -> {}", record.date, record.title, record.download_url);
    }
    match report.files {
        Some(files) => println!("Saved: {:?}", files.csv),
        None => println!("Nothing in range"),
    }
    Ok(())
}
