//! Housing Finance Research Institute (HF) research reports
//!
//! Items without a readable list date are kept as `0000-00-00` and checked
//! again against the first date printed on the detail page.

use async_trait::async_trait;

use crate::dates::{normalize_date, UnknownDatePolicy};
use crate::error::ScraperError;
use crate::extract::{document_attr, first_attr, first_text, resolve_href, selector};
use crate::listing::{build_record, ListItem, ListPage, ListingSite, NextPage};
use crate::record::{PublicationRecord, UNKNOWN_DATE};
use crate::session::Session;
use crate::traits::AdapterCore;

pub const LIST_URL: &str = "https://researcher.hf.go.kr/researcher/sub02/sub02_05.do";
pub const SITE_NAME: &str = "HF";

const PAGE_SIZE: usize = 10;

#[derive(Debug, Clone, Default)]
pub struct HfBoard;

impl HfBoard {
    /// List URL of the 1-based `page_number`; `0` means the first page.
    pub fn page_url(page_number: usize) -> String {
        format!(
            "{LIST_URL}?article.offset={}&articleLimit={PAGE_SIZE}",
            page_number.saturating_sub(1) * PAGE_SIZE
        )
    }
}

#[async_trait]
impl ListingSite for HfBoard {
    fn list_url(&self) -> String {
        LIST_URL.to_string()
    }

    fn max_pages(&self) -> usize {
        20
    }

    fn unknown_date_policy(&self) -> UnknownDatePolicy {
        UnknownDatePolicy::Admit
    }

    fn requires_download_url(&self) -> bool {
        true
    }

    fn parse_list(&self, html: &str, page_url: &str, page_number: usize) -> Result<ListPage, ScraperError> {
        let row_sel = selector("div.research-area")?;
        let title_sel = selector("h4 a")?;
        let info_sel = selector(".info02")?;

        let document = scraper::Html::parse_document(html);
        let items = document
            .select(&row_sel)
            .filter_map(|row| {
                let title = first_text(&row, &title_sel)?;
                let detail = first_attr(&row, &title_sel, "href")
                    .and_then(|href| resolve_href(page_url, &href))?;
                let date = first_text(&row, &info_sel)
                    .and_then(|info| normalize_date(&info))
                    .unwrap_or_else(|| UNKNOWN_DATE.to_string());
                Some(
                    ListItem::new(title)
                        .with_date(Some(date))
                        .with_detail_url(Some(detail)),
                )
            })
            .collect::<Vec<_>>();

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
        session.goto(url).await?;
        let html = session.content().await?;

        let href = match document_attr(&html, "a.pdf", "href")? {
            Some(href) => Some(href),
            None => document_attr(&html, r#"a[href*="mode=download"]"#, "href")?,
        };
        let pdf = href.and_then(|href| resolve_href(LIST_URL, &href));

        let mut record = build_record(core, item, pdf);
        if item.date.as_deref() == Some(UNKNOWN_DATE) {
            if let Some(date) = normalize_date(&html) {
                if !core.window.contains(&date) {
                    return Ok(None);
                }
                record.date = date;
            }
        }
        Ok(Some(record))
    }
}
