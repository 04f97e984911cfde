use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

#[derive(Debug, Clone)]
pub struct ScraperConfig {
    pub output_dir: PathBuf,
    pub headless: bool,
    /// Per-navigation timeout.
    pub timeout: Duration,
    pub user_agent: String,
    /// Browser binary. Falls back to `CHROME_PATH` / `CHROMIUM_PATH`, then
    /// chromiumoxide's own lookup.
    pub chrome_path: Option<PathBuf>,
    /// Pause before the single retry after an anti-automation block page.
    pub block_retry_delay: Duration,
    /// Stop an adapter once it holds this many records.
    pub item_limit: Option<usize>,
    /// Response observer capacity.
    pub observer_capacity: usize,
    pub debug: bool,
}

impl Default for ScraperConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("./output"),
            headless: true,
            timeout: Duration::from_secs(30),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            chrome_path: None,
            block_retry_delay: Duration::from_secs(15),
            item_limit: None,
            observer_capacity: crate::observer::DEFAULT_CAPACITY,
            debug: false,
        }
    }
}

impl ScraperConfig {
    /// Same as [`Default`].
    pub fn new() -> Self {
        Self::default()
    }

    /// Directory for CSV / JSON output.
    pub fn with_output_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.output_dir = path.into();
        self
    }

    /// Run the browser without a window.
    pub fn with_headless(mut self, headless: bool) -> Self {
        self.headless = headless;
        self
    }

    /// Per-navigation timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// User-Agent sent by every page.
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Use this browser binary instead of the environment lookup.
    pub fn with_chrome_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.chrome_path = Some(path.into());
        self
    }

    /// Pause before retrying a blocked page.
    pub fn with_block_retry_delay(mut self, delay: Duration) -> Self {
        self.block_retry_delay = delay;
        self
    }

    /// Stop each adapter after this many records.
    pub fn with_item_limit(mut self, limit: Option<usize>) -> Self {
        self.item_limit = limit;
        self
    }

    /// Number of responses the observer keeps.
    pub fn with_observer_capacity(mut self, capacity: usize) -> Self {
        self.observer_capacity = capacity;
        self
    }

    /// Dump screenshots and page HTML when a step fails.
    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    /// Configured browser binary, else `CHROME_PATH` / `CHROMIUM_PATH`.
    pub fn resolve_chrome_path(&self) -> Option<PathBuf> {
        self.chrome_path.clone().or_else(|| {
            std::env::var("CHROME_PATH")
                .or_else(|_| std::env::var("CHROMIUM_PATH"))
                .ok()
                .map(PathBuf::from)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_builder() {
        let config = ScraperConfig::new()
            .with_headless(false)
            .with_output_dir("/tmp/out")
            .with_timeout(Duration::from_secs(120))
            .with_block_retry_delay(Duration::from_secs(20))
            .with_item_limit(Some(5))
            .with_observer_capacity(200)
            .with_chrome_path("/usr/bin/chromium")
            .with_user_agent("research-scraper/test")
            .with_debug(true);

        assert!(!config.headless);
        assert_eq!(config.output_dir, PathBuf::from("/tmp/out"));
        assert_eq!(config.timeout, Duration::from_secs(120));
        assert_eq!(config.block_retry_delay, Duration::from_secs(20));
        assert_eq!(config.item_limit, Some(5));
        assert_eq!(config.observer_capacity, 200);
        assert_eq!(config.user_agent, "research-scraper/test");
        assert!(config.debug);
        assert_eq!(
            config.resolve_chrome_path(),
            Some(PathBuf::from("/usr/bin/chromium"))
        );
    }

    #[test]
    fn test_defaults() {
        let config = ScraperConfig::default();
        assert!(config.headless);
        assert_eq!(config.timeout, Duration::from_secs(30));
        assert_eq!(config.block_retry_delay, Duration::from_secs(15));
        assert_eq!(config.item_limit, None);
        assert!(config.user_agent.starts_with("Mozilla/5.0"));
    }
}
