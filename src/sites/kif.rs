//! Korea Institute of Finance publications
//!
//! The list has no dates. Each detail page is visited; its download button
//! calls `execDownload(_, mid, vid, cno, 'fcd')`, which maps onto the
//! public viewer URL.

use std::collections::HashSet;
use std::time::Duration;

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;

use crate::dates::{normalize_date, UnknownDatePolicy};
use crate::error::ScraperError;
use crate::extract::{
    document_attr, document_text, element_text, first_text, resolve_href, selector,
};
use crate::listing::{build_record, ListItem, ListPage, ListingSite, NextPage};
use crate::record::PublicationRecord;
use crate::session::Session;
use crate::traits::AdapterCore;

pub const BASE_URL: &str = "https://www.kif.re.kr";
pub const SITE_NAME: &str = "한국금융연구원";

static EXEC_DOWNLOAD_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"execDownload\([^,]*,\s*(\d+),\s*(\d+),\s*(\d+),\s*'([^']+)'").unwrap()
});

/// Viewer URL for an `execDownload(...)` handler.
pub fn viewer_url(onclick: &str) -> Option<String> {
    let caps = EXEC_DOWNLOAD_RE.captures(onclick)?;
    Some(format!(
        "{BASE_URL}/kif4/publication/viewer?mid={}&vid={}&cno={}&fcd={}&ft=0",
        &caps[1], &caps[2], &caps[3], &caps[4]
    ))
}

#[derive(Debug, Clone)]
pub struct KifBoard {
    mid: u32,
}

impl KifBoard {
    pub fn new(mid: u32) -> Self {
        Self { mid }
    }
}

impl Default for KifBoard {
    fn default() -> Self {
        Self::new(10)
    }
}

#[async_trait]
impl ListingSite for KifBoard {
    fn list_url(&self) -> String {
        format!("{BASE_URL}/kif4/publication/pub_list?mid={}", self.mid)
    }

    fn max_pages(&self) -> usize {
        1
    }

    fn unknown_date_policy(&self) -> UnknownDatePolicy {
        UnknownDatePolicy::Admit
    }

    fn requires_download_url(&self) -> bool {
        true
    }

    fn parse_list(&self, html: &str, page_url: &str, _page_number: usize) -> Result<ListPage, ScraperError> {
        let link_sel = selector(r#"a[href*="pub_detail"]"#)?;
        let title_sel = selector(".title")?;

        let document = scraper::Html::parse_document(html);
        let mut seen = HashSet::new();
        let mut items = Vec::new();
        for link in document.select(&link_sel) {
            let Some(detail) = link
                .value()
                .attr("href")
                .and_then(|href| resolve_href(page_url, href))
            else {
                continue;
            };
            let title = first_text(&link, &title_sel).unwrap_or_else(|| element_text(&link));
            if title.chars().count() < 3 || !seen.insert(detail.clone()) {
                continue;
            }
            items.push(ListItem::new(title).with_detail_url(Some(detail)));
        }
        Ok(ListPage {
            items,
            next: NextPage::End,
        })
    }

    async fn resolve_detail(
        &self,
        session: &dyn Session,
        item: &ListItem,
        core: &AdapterCore,
    ) -> Result<Option<PublicationRecord>, ScraperError> {
        let Some(url) = item.detail_url.as_deref() else {
            return Ok(None);
        };
        session.goto(url).await?;
        session.pause(Duration::from_secs(2)).await;
        let html = session.content().await?;

        let viewer = document_attr(&html, r#"button[onclick*="execDownload"]"#, "onclick")?
            .and_then(|onclick| viewer_url(&onclick));
        let date = document_text(&html, ".date, .day")?.and_then(|text| normalize_date(&text));

        let mut record = build_record(core, item, viewer);
        if let Some(date) = date {
            if !core.window.contains(&date) {
                return Ok(None);
            }
            record.date = date;
        }
        Ok(Some(record))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dates::DateWindow;
    use crate::listing::run_listing;
    use crate::session::mock::MockSession;

    #[test]
    fn test_viewer_url() {
        assert_eq!(
            viewer_url("execDownload(this, 10, 4521, 7788, 'F001');").as_deref(),
            Some("https://www.kif.re.kr/kif4/publication/viewer?mid=10&vid=4521&cno=7788&fcd=F001&ft=0")
        );
        assert_eq!(viewer_url("execDownload(this)"), None);
    }

    #[tokio::test]
    async fn test_scrape_filters_on_detail_date() {
        let board = KifBoard::default();
        let list = r#"
            <a href="/kif4/publication/pub_detail?mid=10&cno=1"><span class="title">금융 브리프 1호</span></a>
            <a href="/kif4/publication/pub_detail?mid=10&cno=1">더보기</a>
            <a href="/kif4/publication/pub_detail?mid=10&cno=2"><span class="title">지난 보고서</span></a>
            <a href="/kif4/publication/pub_detail?mid=10&cno=3"><span class="title">첨부 없는 글</span></a>
            <a href="/kif4/publication/pub_detail?mid=10&cno=4">날짜 없는 자료</a>"#;
        let detail = |cno: u32, date: &str, button: bool| {
            let button = if button {
                format!(r#"<button onclick="execDownload(this, 10, 90{cno}, {cno}, 'F00{cno}')">PDF</button>"#)
            } else {
                String::new()
            };
            format!(r#"<span class="date">{date}</span>{button}"#)
        };
        let url = |cno: u32| format!("{BASE_URL}/kif4/publication/pub_detail?mid=10&cno={cno}");
        let session = MockSession::new()
            .page(&board.list_url(), list)
            .page(&url(1), detail(1, "2026.01.09", true))
            .page(&url(2), detail(2, "2025.03.09", true))
            .page(&url(3), detail(3, "2026.01.11", false))
            .page(&url(4), detail(4, "", true));
        let window = DateWindow::parse("2026-01-01", "2026-01-31").unwrap();
        let mut core = AdapterCore::new(SITE_NAME, window);

        let collected = run_listing(&board, &mut core, &session).await.unwrap();

        assert_eq!(collected, 2);
        assert_eq!(core.results[0].title, "금융 브리프 1호");
        assert_eq!(core.results[0].date, "2026-01-09");
        assert_eq!(
            core.results[0].download_url,
            "https://www.kif.re.kr/kif4/publication/viewer?mid=10&vid=901&cno=1&fcd=F001&ft=0"
        );
        assert_eq!(core.results[1].title, "날짜 없는 자료");
        assert_eq!(core.results[1].date, "N/A");
        // the duplicate "더보기" link is not visited twice
        assert_eq!(session.visits().len(), 5);
    }
}
