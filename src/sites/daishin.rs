//! Daishin Securities REITs / real-estate research
//!
//! Rows carry no structured fields; each report is a file button image whose
//! `alt` text holds the title and a monthly label such as `2026년 01월`.

use async_trait::async_trait;

use crate::dates::{extract_korean_month, normalize_date};
use crate::error::ScraperError;
use crate::extract::{clean_text, closest, element_text, resolve_href, selector};
use crate::listing::{ListItem, ListPage, ListingSite, NextPage};
use crate::record::UNKNOWN_DATE;

pub const BASE_URL: &str = "https://money2.daishin.com";
pub const SITE_NAME: &str = "대신증권";

const PAGER_SELECTOR: &str = ".paging a";
const NEXT_ARROW_SELECTOR: &str = r#".paging a[href*="Next"], .paging .next, img[alt="다음"]"#;

/// Date for a file button label: monthly label first, then a full date.
pub fn label_date(alt: &str) -> String {
    extract_korean_month(alt)
        .or_else(|| normalize_date(alt))
        .unwrap_or_else(|| UNKNOWN_DATE.to_string())
}

/// Title for a file button label, with the trailing "다운로드" removed.
pub fn label_title(alt: &str) -> String {
    clean_text(&alt.replace("다운로드", ""))
}

#[derive(Debug, Clone, Default)]
pub struct DaishinBoard;

#[async_trait]
impl ListingSite for DaishinBoard {
    fn list_url(&self) -> String {
        format!("{BASE_URL}/E5/ResearchCenter/Work/DW_ResearchReits.aspx?m=10904&p=11112&v=11661")
    }

    fn max_pages(&self) -> usize {
        10
    }

    fn requires_download_url(&self) -> bool {
        true
    }

    fn parse_list(&self, html: &str, _page_url: &str, page_number: usize) -> Result<ListPage, ScraperError> {
        let button_sel = selector(r#"img[src*="btn_file"]"#)?;
        let anchor_sel = selector("a")?;
        let pager_sel = selector(PAGER_SELECTOR)?;
        let arrow_sel = selector(NEXT_ARROW_SELECTOR)?;

        let document = scraper::Html::parse_document(html);
        let items = document
            .select(&button_sel)
            .filter_map(|button| {
                let alt = button.value().attr("alt")?;
                let href = closest(&button, &anchor_sel)
                    .and_then(|a| a.value().attr("href"))
                    .and_then(|href| resolve_href(BASE_URL, href));
                Some(
                    ListItem::new(label_title(alt))
                        .with_date(Some(label_date(alt)))
                        .with_download_url(href),
                )
            })
            .collect();

        let wanted = (page_number + 1).to_string();
        let numbered = document
            .select(&pager_sel)
            .position(|a| element_text(&a) == wanted);
        let next = match numbered {
            Some(index) => NextPage::Click {
                selector: PAGER_SELECTOR.to_string(),
                index,
            },
            None if document.select(&arrow_sel).next().is_some() => NextPage::click(NEXT_ARROW_SELECTOR),
            None => NextPage::End,
        };
        Ok(ListPage { items, next })
    }
}
