//! Profile-driven collector for sites without a dedicated adapter
//!
//! Each [`SiteProfile`] names a list URL and three selectors. The first 20
//! title matches are read; date and PDF link are looked up inside the
//! title's nearest row-like container. A PDF link whose `href` is not an
//! obvious file is clicked, taking the new tab's URL or, failing that, the
//! newest download-like response seen after the click.

use async_trait::async_trait;

use crate::dates::UnknownDatePolicy;
use crate::error::ScraperError;
use crate::extract::{closest, element_text, first_text, resolve_href, selector, DownloadStrategy};
use crate::listing::{ListItem, ListPage, ListingAdapter, ListingSite, NextPage};
use crate::session::{capture_download, Session};
use crate::traits::AdapterCore;

pub const SITE_NAME: &str = "동적수집";
pub const OBSERVER_CAPACITY: usize = 200;

const CONTAINER_SELECTOR: &str = r#"tr, li, article, div[class*="item"]"#;
const MAX_ITEMS: usize = 20;
const MAX_TITLE_CHARS: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SiteProfile {
    pub site_name: &'static str,
    pub url: &'static str,
    pub title_selector: &'static str,
    pub date_selector: &'static str,
    pub pdf_selector: &'static str,
}

const GENERIC_TITLE: &str = "h4, h5, .title";
const GENERIC_DATE: &str = "span.date, .date";
const GENERIC_PDF: &str = r#"a[href*="pdf"], a[href*="download"]"#;

const fn generic(site_name: &'static str, url: &'static str) -> SiteProfile {
    SiteProfile {
        site_name,
        url,
        title_selector: GENERIC_TITLE,
        date_selector: GENERIC_DATE,
        pdf_selector: GENERIC_PDF,
    }
}

/// Sites covered only by the dynamic collector.
pub const PROFILES: &[SiteProfile] = &[
    SiteProfile {
        site_name: "서울연구원",
        url: "https://www.si.re.kr/bbs/list.do?key=2024100039",
        title_selector: "h3",
        date_selector: ".date",
        pdf_selector: r#"a[href*="file"]"#,
    },
    SiteProfile {
        site_name: "국토연구원 (라이브러리)",
        url: "https://www.krihs.re.kr/krihsLibraryArticle/articleList.es?mid=a10103010000&pub_kind=1",
        title_selector: "td a",
        date_selector: "td:nth-child(3)",
        pdf_selector: GENERIC_PDF,
    },
    generic("국토연구원 (보드)", "https://www.krihs.re.kr/board.es?mid=a10607000000&bid=0008"),
    generic("LG경영연구원", "https://www.lgbr.co.kr/economy/list.do"),
    generic("한국건설산업연구원 (시장전망)", "https://www.cerik.re.kr/material/prospect"),
    generic("현대경제연구원", "https://www.hri.co.kr/kor/report/report.html?mode=1"),
    generic(
        "우리금융연구소",
        "https://www.wfri.re.kr/ko/web/research_report/research_report.php?search_type=list",
    ),
    generic("KB금융지주", "https://www.kbfg.com/kbresearch/report/reportList.do"),
    generic("IBK경제연구소", "http://research.ibk.co.kr/research/board/economy-news/list"),
    generic("캠코", "https://www.kamco.or.kr/portal/bbs/list.do?ptIdx=282&mId=0701030000"),
    generic("교보리얼코", "https://www.kyoborealco.co.kr/insight/marketreport"),
];

/// Whether an `href` already points at a file rather than a script or page.
pub fn is_direct_file_href(href: &str) -> bool {
    let lower = href.to_lowercase();
    lower.contains("pdf") || lower.contains("download")
}

#[derive(Debug, Clone)]
pub struct DynamicBoard {
    profile: SiteProfile,
}

impl DynamicBoard {
    pub fn new(profile: SiteProfile) -> Self {
        Self { profile }
    }

    fn strategy(&self) -> DownloadStrategy {
        DownloadStrategy::NewTab {
            selector: self.profile.pdf_selector.to_string(),
        }
    }
}

#[async_trait]
impl ListingSite for DynamicBoard {
    fn list_url(&self) -> String {
        self.profile.url.to_string()
    }

    fn source_name(&self) -> Option<&str> {
        Some(self.profile.site_name)
    }

    fn max_pages(&self) -> usize {
        1
    }

    fn unknown_date_policy(&self) -> UnknownDatePolicy {
        UnknownDatePolicy::Admit
    }

    fn parse_list(&self, html: &str, page_url: &str, _page_number: usize) -> Result<ListPage, ScraperError> {
        let title_sel = selector(self.profile.title_selector)?;
        let date_sel = selector(self.profile.date_selector)?;
        let pdf_sel = selector(self.profile.pdf_selector)?;
        let container_sel = selector(CONTAINER_SELECTOR)?;

        let document = scraper::Html::parse_document(html);
        let pdf_ids: Vec<_> = document.select(&pdf_sel).map(|el| el.id()).collect();

        let mut items = Vec::new();
        for title_el in document.select(&title_sel).take(MAX_ITEMS) {
            let title: String = element_text(&title_el).chars().take(MAX_TITLE_CHARS).collect();
            if title.chars().count() < 3 {
                continue;
            }
            let container = closest(&title_el, &container_sel);
            let date = container.as_ref().and_then(|c| first_text(c, &date_sel));
            let link = container.as_ref().and_then(|c| c.select(&pdf_sel).next());

            let mut item = ListItem::new(title).with_date(date);
            if let Some(link) = link {
                match link.value().attr("href") {
                    Some(href) if is_direct_file_href(href) => {
                        item = item.with_download_url(resolve_href(page_url, href));
                    }
                    _ => {
                        let index = pdf_ids.iter().position(|id| *id == link.id());
                        item = item.with_click_index(index);
                    }
                }
            }
            items.push(item);
        }
        Ok(ListPage {
            items,
            next: NextPage::End,
        })
    }

    fn needs_detail(&self, _item: &ListItem) -> bool {
        false
    }

    async fn resolve_in_list(
        &self,
        session: &dyn Session,
        item: &ListItem,
    ) -> Result<Option<String>, ScraperError> {
        if item.download_url.is_some() {
            return Ok(item.download_url.clone());
        }
        match item.click_index {
            Some(index) => capture_download(session, &self.strategy(), index).await,
            None => Ok(None),
        }
    }
}

/// Adapter over `profiles`, one board per profile, sharing one observer of
/// [`OBSERVER_CAPACITY`].
pub fn adapter(core: AdapterCore, profiles: &[SiteProfile]) -> ListingAdapter {
    profiles
        .iter()
        .fold(
            ListingAdapter::new(core).with_observer_capacity(OBSERVER_CAPACITY),
            |adapter, profile| adapter.with_board(DynamicBoard::new(*profile)),
        )
}
