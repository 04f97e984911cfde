//! Passive network-response observer
//!
//! Some sites never expose the download URL in the DOM; it only shows up as a
//! network request after a button is clicked. The observer keeps a short
//! history of status-200 responses whose URL looks like a file download so an
//! adapter can pick the most recent one right after its click.
//!
//! This is a heuristic. Unrelated background requests that happen to match a
//! keyword can be picked up instead, and nothing ties a response to the
//! element that triggered it. Prefer DOM extraction wherever a site allows it.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};

/// Substrings (lower-case) that mark a response URL as a download candidate.
pub const DOWNLOAD_KEYWORDS: [&str; 6] = [
    ".pdf",
    "download",
    "calldownload",
    "atchfile",
    "filedown",
    "file",
];

pub const DEFAULT_CAPACITY: usize = 100;

/// True when `url` contains any download keyword, ignoring case.
pub fn is_download_candidate(url: &str) -> bool {
    let lower = url.to_lowercase();
    DOWNLOAD_KEYWORDS.iter().any(|k| lower.contains(k))
}

#[derive(Debug, Default)]
struct History {
    entries: VecDeque<(u64, String)>,
    next_seq: u64,
}

/// Bounded ring buffer of matching response URLs. Cheap to clone; clones
/// share the same buffer.
#[derive(Debug, Clone)]
pub struct ResponseObserver {
    capacity: usize,
    inner: Arc<Mutex<History>>,
}

impl Default for ResponseObserver {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl ResponseObserver {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            inner: Arc::new(Mutex::new(History::default())),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    fn lock(&self) -> MutexGuard<'_, History> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Feed one completed response. Returns whether it was kept.
    pub fn record(&self, status: i64, url: &str) -> bool {
        if status != 200 || !is_download_candidate(url) {
            return false;
        }
        let mut history = self.lock();
        let seq = history.next_seq;
        history.next_seq += 1;
        history.entries.push_back((seq, url.to_string()));
        while history.entries.len() > self.capacity {
            history.entries.pop_front();
        }
        true
    }

    /// Sequence number of the next recorded response. Take one before a click
    /// and pass it to [`latest_since`](Self::latest_since).
    pub fn mark(&self) -> u64 {
        self.lock().next_seq
    }

    /// Most recent matching URL.
    pub fn latest(&self) -> Option<String> {
        self.lock().entries.back().map(|(_, url)| url.clone())
    }

    /// Most recent matching URL recorded at or after `mark`.
    pub fn latest_since(&self, mark: u64) -> Option<String> {
        self.lock()
            .entries
            .iter()
            .rev()
            .take_while(|(seq, _)| *seq >= mark)
            .map(|(_, url)| url.clone())
            .next()
    }

    /// Retained URLs, oldest first.
    pub fn snapshot(&self) -> Vec<String> {
        self.lock().entries.iter().map(|(_, url)| url.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keyword_matching() {
        assert!(is_download_candidate("https://x.re.kr/report/A.PDF"));
        assert!(is_download_candidate("https://x.re.kr/cmm/fms/FileDown.do?id=1"));
        assert!(is_download_candidate("https://x.re.kr/atchFile/123"));
        assert!(is_download_candidate("https://eiec.kdi.re.kr/policy/callDownload.do?num=1"));
        assert!(!is_download_candidate("https://x.re.kr/main.css"));
    }

    #[test]
    fn test_only_successful_matches_recorded() {
        let observer = ResponseObserver::new(10);
        assert!(!observer.record(404, "https://x.re.kr/a.pdf"));
        assert!(!observer.record(200, "https://x.re.kr/app.js"));
        assert!(observer.record(200, "https://x.re.kr/a.pdf"));
        assert_eq!(observer.snapshot(), vec!["https://x.re.kr/a.pdf".to_string()]);
    }

    #[test]
    fn test_capacity_drops_oldest() {
        let observer = ResponseObserver::new(3);
        for i in 0..5 {
            observer.record(200, &format!("https://x.re.kr/{i}.pdf"));
        }
        assert_eq!(observer.len(), 3);
        assert_eq!(
            observer.snapshot(),
            vec![
                "https://x.re.kr/2.pdf".to_string(),
                "https://x.re.kr/3.pdf".to_string(),
                "https://x.re.kr/4.pdf".to_string(),
            ]
        );
    }

    #[test]
    fn test_click_correlation_ignores_noise() {
        let observer = ResponseObserver::default();
        observer.record(200, "https://x.re.kr/old/download?id=1");

        let mark = observer.mark();
        // the click: one matching response amid unrelated traffic
        observer.record(200, "https://x.re.kr/analytics.js");
        observer.record(200, "https://x.re.kr/cmm/FileDown.do?id=42");
        observer.record(304, "https://x.re.kr/logo.png");
        observer.record(200, "https://x.re.kr/api/poll");

        assert_eq!(
            observer.latest_since(mark).as_deref(),
            Some("https://x.re.kr/cmm/FileDown.do?id=42")
        );
        assert_eq!(observer.latest(), observer.latest_since(mark));
    }

    #[test]
    fn test_latest_since_without_new_match() {
        let observer = ResponseObserver::default();
        observer.record(200, "https://x.re.kr/a.pdf");
        let mark = observer.mark();
        observer.record(200, "https://x.re.kr/index.html");
        assert_eq!(observer.latest_since(mark), None);
        assert_eq!(observer.latest().as_deref(), Some("https://x.re.kr/a.pdf"));
    }

    #[test]
    fn test_clones_share_buffer() {
        let observer = ResponseObserver::new(5);
        let handle = observer.clone();
        handle.record(200, "https://x.re.kr/b.pdf");
        assert_eq!(observer.len(), 1);
        observer.clear();
        assert!(handle.is_empty());
    }
}
