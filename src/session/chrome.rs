use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::browser::{
    EventDownloadWillBegin as BrowserDownloadWillBegin, SetDownloadBehaviorBehavior,
    SetDownloadBehaviorParams,
};
use chromiumoxide::cdp::browser_protocol::network::{EnableParams, EventResponseReceived};
use chromiumoxide::cdp::js_protocol::runtime::EvaluateParams;
use chromiumoxide::page::ScreenshotParams;
use chromiumoxide::Page;
use futures::StreamExt;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::config::ScraperConfig;
use crate::error::ScraperError;
use crate::observer::ResponseObserver;

use super::Session;

const POLL_INTERVAL: Duration = Duration::from_millis(250);

/// One launched Chrome process. Sessions opened from it share its cookies.
pub struct ChromeBrowser {
    browser: Arc<Browser>,
    handler: JoinHandle<()>,
    config: ScraperConfig,
}

impl ChromeBrowser {
    pub async fn launch(config: &ScraperConfig) -> Result<Self, ScraperError> {
        info!("Launching browser (headless={})...", config.headless);

        let unique_id = format!(
            "{}-{}",
            std::process::id(),
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .unwrap_or_default()
                .as_nanos()
        );
        let user_data_dir = std::env::temp_dir().join(format!("research-scraper-{}", unique_id));

        let mut builder = BrowserConfig::builder()
            .user_data_dir(&user_data_dir)
            .window_size(1280, 800)
            .request_timeout(config.timeout)
            .no_sandbox()
            .arg(format!("--user-agent={}", config.user_agent))
            .arg("--disable-blink-features=AutomationControlled")
            .arg("--disable-dev-shm-usage")
            .arg("--disable-gpu");

        if let Some(path) = config.resolve_chrome_path() {
            builder = builder.chrome_executable(path);
        }
        if !config.headless {
            builder = builder.with_head();
        }
        if config.debug {
            builder = builder.arg("--enable-logging=stderr").arg("--v=1");
        }

        let browser_config = builder
            .build()
            .map_err(|e| ScraperError::BrowserInit(format!("browser config: {}", e)))?;

        let (browser, mut handler) = Browser::launch(browser_config)
            .await
            .map_err(|e| ScraperError::BrowserInit(e.to_string()))?;

        let handler = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                debug!("Browser event: {:?}", event);
            }
        });

        info!("Browser launched");
        Ok(Self {
            browser: Arc::new(browser),
            handler,
            config: config.clone(),
        })
    }

    /// Open a page with the response observer and download listener attached.
    pub async fn new_session(&self, observer_capacity: usize) -> Result<ChromeSession, ScraperError> {
        let page = self
            .browser
            .new_page("about:blank")
            .await
            .map_err(|e| ScraperError::BrowserInit(e.to_string()))?;

        page.execute(EnableParams::default())
            .await
            .map_err(|e| ScraperError::BrowserInit(format!("network domain: {}", e)))?;

        // Downloads land in a per-session scratch directory removed on close;
        // only their URLs matter.
        let download_dir = scratch_download_dir();
        std::fs::create_dir_all(&download_dir)?;
        let download_dir = download_dir.canonicalize().unwrap_or(download_dir);
        let download_params = SetDownloadBehaviorParams::builder()
            .behavior(SetDownloadBehaviorBehavior::AllowAndName)
            .download_path(download_dir.to_string_lossy().to_string())
            .events_enabled(true)
            .build()
            .map_err(|e| ScraperError::BrowserInit(format!("download behavior: {}", e)))?;
        page.execute(download_params)
            .await
            .map_err(|e| ScraperError::BrowserInit(format!("download behavior: {}", e)))?;

        let observer = ResponseObserver::new(observer_capacity);
        let downloads: Arc<Mutex<Vec<String>>> = Arc::default();
        let mut tasks = Vec::new();

        let mut responses = page
            .event_listener::<EventResponseReceived>()
            .await
            .map_err(|e| ScraperError::BrowserInit(e.to_string()))?;
        let response_observer = observer.clone();
        tasks.push(tokio::spawn(async move {
            while let Some(event) = responses.next().await {
                if response_observer.record(event.response.status, &event.response.url) {
                    debug!("Observed download response: {}", event.response.url);
                }
            }
        }));

        let mut browser_downloads = page
            .event_listener::<BrowserDownloadWillBegin>()
            .await
            .map_err(|e| ScraperError::BrowserInit(e.to_string()))?;
        let sink = downloads.clone();
        tasks.push(tokio::spawn(async move {
            while let Some(event) = browser_downloads.next().await {
                debug!("Download started: {}", event.url);
                push_download(&sink, &event.url);
            }
        }));

        Ok(ChromeSession {
            page: Arc::new(page),
            browser: self.browser.clone(),
            observer,
            downloads,
            timeout: self.config.timeout,
            debug: self.config.debug,
            tasks: Mutex::new(tasks),
            download_dir,
        })
    }
}

impl Drop for ChromeBrowser {
    fn drop(&mut self) {
        self.handler.abort();
    }
}

static SCRATCH_SEQ: AtomicUsize = AtomicUsize::new(0);

/// Fresh directory under the system temp dir, unique per call.
fn scratch_download_dir() -> PathBuf {
    let nanos = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos();
    let seq = SCRATCH_SEQ.fetch_add(1, Ordering::Relaxed);
    std::env::temp_dir().join(format!(
        "research-scraper-downloads-{}-{}-{}",
        std::process::id(),
        nanos,
        seq
    ))
}

fn remove_scratch_dir(dir: &Path) {
    match std::fs::remove_dir_all(dir) {
        Ok(()) => debug!("Removed download scratch dir {}", dir.display()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!("Could not remove {}: {}", dir.display(), e),
    }
}

fn push_download(sink: &Mutex<Vec<String>>, url: &str) {
    sink.lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
        .push(url.to_string());
}

pub struct ChromeSession {
    page: Arc<Page>,
    browser: Arc<Browser>,
    observer: ResponseObserver,
    downloads: Arc<Mutex<Vec<String>>>,
    timeout: Duration,
    debug: bool,
    tasks: Mutex<Vec<JoinHandle<()>>>,
    download_dir: PathBuf,
}

impl ChromeSession {
    fn download_count(&self) -> usize {
        self.downloads
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }

    fn last_download(&self) -> Option<String> {
        self.downloads
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .last()
            .cloned()
    }

    async fn open_targets(&self) -> Result<HashSet<String>, ScraperError> {
        let pages = self
            .browser
            .pages()
            .await
            .map_err(|e| ScraperError::Navigation(format!("list tabs: {}", e)))?;
        Ok(pages
            .iter()
            .map(|p| AsRef::<str>::as_ref(p.target_id()).to_string())
            .collect())
    }

    /// Poll a freshly opened tab until its URL stops changing.
    async fn settle_tab_url(tab: &Page, deadline: Instant) -> Option<String> {
        let mut last: Option<String> = None;
        while Instant::now() < deadline {
            if let Ok(Some(url)) = tab.url().await {
                if !url.is_empty() && url != "about:blank" {
                    if last.as_deref() == Some(url.as_str()) {
                        return Some(url);
                    }
                    last = Some(url);
                }
            }
            sleep(Duration::from_millis(500)).await;
        }
        last
    }
}

#[async_trait]
impl Session for ChromeSession {
    async fn goto(&self, url: &str) -> Result<(), ScraperError> {
        debug!("goto {}", url);
        match tokio::time::timeout(self.timeout, self.page.goto(url)).await {
            Ok(Ok(_)) => Ok(()),
            Ok(Err(e)) => Err(ScraperError::Navigation(format!("{}: {}", url, e))),
            Err(_) => Err(ScraperError::Timeout(format!(
                "{} not loaded within {:?}",
                url, self.timeout
            ))),
        }
    }

    async fn current_url(&self) -> Result<String, ScraperError> {
        self.page
            .url()
            .await
            .map(|url| url.unwrap_or_default())
            .map_err(|e| ScraperError::JavaScript(e.to_string()))
    }

    async fn content(&self) -> Result<String, ScraperError> {
        self.page
            .content()
            .await
            .map_err(|e| ScraperError::JavaScript(e.to_string()))
    }

    async fn click(&self, selector: &str, index: usize) -> Result<bool, ScraperError> {
        let selector_literal = serde_json::to_string(selector)?;
        let script = format!(
            r#"
            (function() {{
                var els = document.querySelectorAll({selector_literal});
                if (els.length <= {index}) {{
                    return false;
                }}
                els[{index}].click();
                return true;
            }})()
            "#
        );
        let clicked = self.evaluate(&script).await?;
        Ok(clicked.as_bool().unwrap_or(false))
    }

    async fn evaluate(&self, script: &str) -> Result<serde_json::Value, ScraperError> {
        let params = EvaluateParams::builder()
            .expression(script)
            .user_gesture(true)
            .await_promise(true)
            .return_by_value(true)
            .build()
            .map_err(ScraperError::JavaScript)?;
        let result = self
            .page
            .evaluate(params)
            .await
            .map_err(|e| ScraperError::JavaScript(e.to_string()))?;
        Ok(result
            .into_value::<serde_json::Value>()
            .unwrap_or(serde_json::Value::Null))
    }

    async fn pause(&self, duration: Duration) {
        sleep(duration).await;
    }

    async fn click_for_new_tab(
        &self,
        selector: &str,
        index: usize,
        wait: Duration,
    ) -> Result<Option<String>, ScraperError> {
        let before = self.open_targets().await?;
        if !self.click(selector, index).await? {
            return Ok(None);
        }

        let deadline = Instant::now() + wait;
        while Instant::now() < deadline {
            sleep(POLL_INTERVAL).await;
            let pages = self
                .browser
                .pages()
                .await
                .map_err(|e| ScraperError::Navigation(format!("list tabs: {}", e)))?;
            let opened = pages
                .into_iter()
                .find(|p| !before.contains(AsRef::<str>::as_ref(p.target_id())));
            if let Some(tab) = opened {
                let url = Self::settle_tab_url(&tab, deadline).await;
                if let Err(e) = tab.close().await {
                    debug!("Failed to close tab: {}", e);
                }
                return Ok(url);
            }
        }
        Ok(None)
    }

    async fn click_for_download(
        &self,
        selector: &str,
        index: usize,
        wait: Duration,
    ) -> Result<Option<String>, ScraperError> {
        let before = self.download_count();
        if !self.click(selector, index).await? {
            return Ok(None);
        }

        let deadline = Instant::now() + wait;
        while Instant::now() < deadline {
            if self.download_count() > before {
                return Ok(self.last_download());
            }
            sleep(POLL_INTERVAL).await;
        }
        Ok(None)
    }

    fn observer(&self) -> &ResponseObserver {
        &self.observer
    }

    async fn debug_snapshot(&self, label: &str) {
        if !self.debug {
            return;
        }
        let url = self.current_url().await.unwrap_or_default();
        debug!("[{}] observed responses: {:?}", label, self.observer.snapshot());
        if let Ok(screenshot) = self
            .page
            .screenshot(ScreenshotParams::builder().full_page(true).build())
            .await
        {
            use base64::Engine;
            let encoded = base64::engine::general_purpose::STANDARD.encode(&screenshot);
            debug!("[{}] {} screenshot: data:image/png;base64,{}", label, url, encoded);
        }
    }

    async fn close(&self) -> Result<(), ScraperError> {
        for task in self
            .tasks
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .drain(..)
        {
            task.abort();
        }
        if let Err(e) = (*self.page).clone().close().await {
            debug!("Failed to close page: {}", e);
        }
        remove_scratch_dir(&self.download_dir);
        Ok(())
    }
}
