//! Korea Development Institute
//!
//! Two boards: the economic-information material list on `eiec.kdi.re.kr`
//! (detail pages call `callDownload(num, filenum)`) and the research topic
//! list on `www.kdi.re.kr` (download buttons assign `location.href`).
//!
//! The material detail pages answer bursts of requests with a block notice;
//! those visits are retried once after the configured block delay.

use std::time::Duration;

use async_trait::async_trait;
use chrono::Local;
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{info, warn};

use crate::dates::{normalize_date, UnknownDatePolicy};
use crate::error::ScraperError;
use crate::extract::{
    closest, document_attr, element_text, extract_location_href, first_attr, first_text,
    resolve_href, selector,
};
use crate::listing::{build_record, ListItem, ListPage, ListingSite, NextPage};
use crate::record::PublicationRecord;
use crate::session::{goto_with_block_retry, Session};
use crate::traits::AdapterCore;

pub const SITE_NAME: &str = "한국개발연구원";
pub const EIEC_BASE: &str = "https://eiec.kdi.re.kr";
pub const KDI_BASE: &str = "https://www.kdi.re.kr";
pub const BLOCK_MARKER: &str = "정상적인 요청이 아닙니다";

const DETAIL_DELAY: Duration = Duration::from_secs(5);
const DETAIL_SETTLE: Duration = Duration::from_secs(2);

static CALL_DOWNLOAD_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"callDownload\(\s*['"]?(\d+)['"]?\s*,\s*['"]?(\d+)['"]?\s*\)"#).unwrap()
});
static CALL_DOWNLOAD_LINK_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"callDownload\.do\?([^'">\s]+)"#).unwrap());

/// Download endpoint for a material detail page, `dtime` stamped now.
pub fn material_download_url(html: &str) -> Result<Option<String>, ScraperError> {
    if let Some(caps) = CALL_DOWNLOAD_RE.captures(html) {
        let dtime = Local::now().format("%Y%m%d%H%M%S");
        return Ok(Some(format!(
            "{EIEC_BASE}/policy/callDownload.do?num={}&filenum={}&dtime={dtime}",
            &caps[1], &caps[2]
        )));
    }
    if let Some(caps) = CALL_DOWNLOAD_LINK_RE.captures(html) {
        return Ok(Some(format!("{EIEC_BASE}/policy/callDownload.do?{}", &caps[1])));
    }
    let href = document_attr(html, r#"a[href*="callDownload"]"#, "href")?;
    Ok(href.and_then(|href| resolve_href(EIEC_BASE, &href)))
}

/// Economic-information material list (`materialList.do`).
#[derive(Debug, Clone, Default)]
pub struct MaterialBoard;

impl MaterialBoard {
    pub fn page_url(page_number: usize) -> String {
        format!(
            "{EIEC_BASE}/policy/materialList.do?depth1=M0000&depth2=A&search_txt=&topic=&pg={page_number}&pp=20&type=J&device=pc"
        )
    }
}

#[async_trait]
impl ListingSite for MaterialBoard {
    fn list_url(&self) -> String {
        Self::page_url(1)
    }

    fn max_pages(&self) -> usize {
        5
    }

    fn unknown_date_policy(&self) -> UnknownDatePolicy {
        UnknownDatePolicy::Admit
    }

    fn detail_delay(&self) -> Duration {
        DETAIL_DELAY
    }

    fn parse_list(&self, html: &str, page_url: &str, page_number: usize) -> Result<ListPage, ScraperError> {
        let link_sel = selector(r#"li a[href*="materialView"], tr td a[href*="materialView"]"#)?;
        let row_sel = selector("tr, li")?;

        let document = scraper::Html::parse_document(html);
        let mut items = Vec::new();
        for link in document.select(&link_sel) {
            let title = element_text(&link);
            if title.chars().count() < 3 {
                continue;
            }
            let Some(detail) = link
                .value()
                .attr("href")
                .and_then(|href| resolve_href(page_url, href))
            else {
                continue;
            };
            let date = closest(&link, &row_sel).and_then(|row| normalize_date(&element_text(&row)));
            items.push(
                ListItem::new(title)
                    .with_date(date)
                    .with_detail_url(Some(detail)),
            );
        }

        let next = if items.is_empty() {
            NextPage::End
        } else {
            NextPage::Url(Self::page_url(page_number + 1))
        };
        Ok(ListPage { items, next })
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
        let html = goto_with_block_retry(session, url, BLOCK_MARKER, core.block_retry_delay).await?;
        session.pause(DETAIL_SETTLE).await;

        let pdf = material_download_url(&html)?;
        if pdf.is_none() {
            warn!("[{}] no callDownload on {}", core.site_name, url);
        }
        Ok(Some(build_record(core, item, pdf)))
    }
}

/// Research topic list (`topicList?cd=A`), first ten entries.
#[derive(Debug, Clone, Default)]
pub struct TopicBoard;

#[async_trait]
impl ListingSite for TopicBoard {
    fn list_url(&self) -> String {
        format!("{KDI_BASE}/research/topicList?cd=A")
    }

    fn max_pages(&self) -> usize {
        1
    }

    fn unknown_date_policy(&self) -> UnknownDatePolicy {
        UnknownDatePolicy::Admit
    }

    fn parse_list(&self, html: &str, _page_url: &str, _page_number: usize) -> Result<ListPage, ScraperError> {
        let row_sel = selector(".list_type_new > li, .board_list > li")?;
        let link_sel = selector("a.tit, .txt_box > a, dt > a")?;
        let date_sel = selector(".date, span.date, .dt")?;

        let document = scraper::Html::parse_document(html);
        let items = document
            .select(&row_sel)
            .take(10)
            .filter_map(|row| {
                let title = first_text(&row, &link_sel)?;
                let detail = first_attr(&row, &link_sel, "href")
                    .and_then(|href| resolve_href(KDI_BASE, &href))?;
                Some(
                    ListItem::new(title)
                        .with_date(first_text(&row, &date_sel))
                        .with_detail_url(Some(detail)),
                )
            })
            .collect();
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
        session.pause(Duration::from_millis(1500)).await;
        let html = session.content().await?;

        let pdf = {
            let document = scraper::Html::parse_document(&html);
            let button_sel = selector(r#"button[onclick*="/file/download"], a[href*="/file/download"]"#)?;
            document.select(&button_sel).next().and_then(|button| {
                let from_onclick = button
                    .value()
                    .attr("onclick")
                    .and_then(extract_location_href);
                let from_href = || {
                    button
                        .value()
                        .attr("href")
                        .filter(|href| href.contains("/file/download"))
                        .map(str::to_string)
                };
                from_onclick
                    .or_else(from_href)
                    .and_then(|target| resolve_href(KDI_BASE, &target))
            })
        };
        if let Some(pdf) = &pdf {
            info!("[{}] topic download: {}", core.site_name, pdf);
        }
        Ok(Some(build_record(core, item, pdf)))
    }
}
