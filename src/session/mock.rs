//! Scripted in-memory session for adapter tests

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::ScraperError;
use crate::extract;
use crate::observer::ResponseObserver;

use super::Session;

/// Effect of clicking an element or evaluating a script.
#[derive(Debug, Clone)]
pub enum ClickAction {
    Navigate(String),
    NewTab(String),
    Download(String),
    Responses(Vec<(i64, String)>),
    /// The click never settles: `ScraperError::Timeout`.
    Hang,
    /// The browser goes away: a non-recoverable error.
    Crash,
}

#[derive(Debug, Default)]
struct State {
    current_url: String,
    current_html: String,
    pages: HashMap<String, VecDeque<String>>,
    visits: Vec<String>,
    pauses: Vec<Duration>,
    closed: bool,
}

pub struct MockSession {
    state: Mutex<State>,
    clicks: HashMap<(Option<String>, String, usize), ClickAction>,
    scripts: HashMap<String, ClickAction>,
    observer: ResponseObserver,
}

impl MockSession {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State::default()),
            clicks: HashMap::new(),
            scripts: HashMap::new(),
            observer: ResponseObserver::default(),
        }
    }

    /// Register content for `url`. Registering the same URL again queues a
    /// later version served on the next visit.
    pub fn page(self, url: &str, html: impl Into<String>) -> Self {
        self.state
            .lock()
            .unwrap()
            .pages
            .entry(url.to_string())
            .or_default()
            .push_back(html.into());
        self
    }

    pub fn on_click(mut self, selector: &str, index: usize, action: ClickAction) -> Self {
        self.clicks.insert((None, selector.to_string(), index), action);
        self
    }

    /// Like [`on_click`](Self::on_click) but only while `page_url` is loaded.
    pub fn on_click_at(mut self, page_url: &str, selector: &str, index: usize, action: ClickAction) -> Self {
        self.clicks
            .insert((Some(page_url.to_string()), selector.to_string(), index), action);
        self
    }

    pub fn on_script(mut self, script: &str, action: ClickAction) -> Self {
        self.scripts.insert(script.to_string(), action);
        self
    }

    pub fn visits(&self) -> Vec<String> {
        self.state.lock().unwrap().visits.clone()
    }

    pub fn pauses(&self) -> Vec<Duration> {
        self.state.lock().unwrap().pauses.clone()
    }

    pub fn is_closed(&self) -> bool {
        self.state.lock().unwrap().closed
    }

    fn load(&self, url: &str) -> Result<(), ScraperError> {
        let mut state = self.state.lock().unwrap();
        let html = {
            let queue = state
                .pages
                .get_mut(url)
                .ok_or_else(|| ScraperError::Navigation(format!("404 {url}")))?;
            if queue.len() > 1 {
                queue.pop_front().unwrap_or_default()
            } else {
                queue.front().cloned().unwrap_or_default()
            }
        };
        state.visits.push(url.to_string());
        state.current_url = url.to_string();
        state.current_html = html;
        Ok(())
    }

    fn has_element(&self, selector: &str, index: usize) -> Result<bool, ScraperError> {
        let html = self.state.lock().unwrap().current_html.clone();
        let sel = extract::selector(selector)?;
        let document = scraper::Html::parse_document(&html);
        let found = document.select(&sel).nth(index).is_some();
        Ok(found)
    }

    /// Apply an action; returns the URL it exposes for capture, if any.
    fn apply(&self, action: &ClickAction) -> Result<Option<String>, ScraperError> {
        match action {
            ClickAction::Navigate(url) => {
                self.load(url)?;
                Ok(None)
            }
            ClickAction::NewTab(url) | ClickAction::Download(url) => Ok(Some(url.clone())),
            ClickAction::Responses(responses) => {
                for (status, url) in responses {
                    self.observer.record(*status, url);
                }
                Ok(None)
            }
            ClickAction::Hang => Err(ScraperError::Timeout("click did not settle".into())),
            ClickAction::Crash => Err(ScraperError::BrowserInit("browser connection lost".into())),
        }
    }

    fn click_action(&self, selector: &str, index: usize) -> Option<&ClickAction> {
        let current = self.state.lock().unwrap().current_url.clone();
        self.clicks
            .get(&(Some(current), selector.to_string(), index))
            .or_else(|| self.clicks.get(&(None, selector.to_string(), index)))
    }
}

#[async_trait]
impl Session for MockSession {
    async fn goto(&self, url: &str) -> Result<(), ScraperError> {
        self.load(url)
    }

    async fn current_url(&self) -> Result<String, ScraperError> {
        Ok(self.state.lock().unwrap().current_url.clone())
    }

    async fn content(&self) -> Result<String, ScraperError> {
        Ok(self.state.lock().unwrap().current_html.clone())
    }

    async fn click(&self, selector: &str, index: usize) -> Result<bool, ScraperError> {
        if !self.has_element(selector, index)? {
            return Ok(false);
        }
        if let Some(action) = self.click_action(selector, index).cloned() {
            self.apply(&action)?;
        }
        Ok(true)
    }

    async fn evaluate(&self, script: &str) -> Result<serde_json::Value, ScraperError> {
        match self.scripts.get(script).cloned() {
            Some(action) => {
                self.apply(&action)?;
                Ok(serde_json::Value::Bool(true))
            }
            None => Ok(serde_json::Value::Null),
        }
    }

    async fn pause(&self, duration: Duration) {
        self.state.lock().unwrap().pauses.push(duration);
    }

    async fn click_for_new_tab(
        &self,
        selector: &str,
        index: usize,
        _wait: Duration,
    ) -> Result<Option<String>, ScraperError> {
        if !self.has_element(selector, index)? {
            return Ok(None);
        }
        match self.click_action(selector, index).cloned() {
            Some(ClickAction::NewTab(url)) => Ok(Some(url)),
            Some(other) => {
                self.apply(&other)?;
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn click_for_download(
        &self,
        selector: &str,
        index: usize,
        _wait: Duration,
    ) -> Result<Option<String>, ScraperError> {
        if !self.has_element(selector, index)? {
            return Ok(None);
        }
        match self.click_action(selector, index).cloned() {
            Some(ClickAction::Download(url)) => Ok(Some(url)),
            Some(other) => {
                self.apply(&other)?;
                Ok(None)
            }
            None => Ok(None),
        }
    }

    fn observer(&self) -> &ResponseObserver {
        &self.observer
    }

    async fn close(&self) -> Result<(), ScraperError> {
        self.state.lock().unwrap().closed = true;
        Ok(())
    }
}
