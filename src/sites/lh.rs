//! LH Land & Housing Institute publication boards (LHRI FOCUS, LH INSITE)
//!
//! The list exposes only `searchView('id')` handlers, so detail URLs are
//! rebuilt from the id. The PDF link lives on the detail page.

use async_trait::async_trait;

use crate::error::ScraperError;
use crate::extract::{
    document_attr, first_attr, first_text, parse_script_call, resolve_href, selector,
};
use crate::listing::{build_record, ListItem, ListPage, ListingSite, NextPage};
use crate::record::PublicationRecord;
use crate::session::Session;
use crate::traits::AdapterCore;

pub const BASE_URL: &str = "https://lhri.lh.or.kr";

/// Which LH publication series to crawl.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LhSeries {
    Focus,
    Insite,
}

impl LhSeries {
    fn menu_idx(self) -> &'static str {
        match self {
            LhSeries::Focus => "516",
            LhSeries::Insite => "346",
        }
    }

    fn code(self) -> &'static str {
        match self {
            LhSeries::Focus => "LHRI_FOCUS",
            LhSeries::Insite => "LH_INSITE",
        }
    }

    pub fn site_name(self) -> &'static str {
        match self {
            LhSeries::Focus => "LH",
            LhSeries::Insite => "LH (인사이트)",
        }
    }
}

#[derive(Debug, Clone)]
pub struct LhBoard {
    series: LhSeries,
}

impl LhBoard {
    pub fn new(series: LhSeries) -> Self {
        Self { series }
    }

    pub fn detail_url(&self, id: &str) -> String {
        format!(
            "{BASE_URL}/web/pblictn/PblictnView.do?menuIdx={}&pblictnCode={}&pblictnId={id}",
            self.series.menu_idx(),
            self.series.code()
        )
    }
}

#[async_trait]
impl ListingSite for LhBoard {
    fn list_url(&self) -> String {
        format!(
            "{BASE_URL}/web/pblictn/PblictnList.do?menuIdx={}&pblictnCode={}",
            self.series.menu_idx(),
            self.series.code()
        )
    }

    fn max_pages(&self) -> usize {
        50
    }

    fn stops_at_older(&self) -> bool {
        true
    }

    fn parse_list(&self, html: &str, _page_url: &str, page_number: usize) -> Result<ListPage, ScraperError> {
        let row_sel = selector("ul.journal-list > li")?;
        let title_sel = selector(".textbox .title a")?;
        let date_sel = selector(".infolist .date span:nth-child(2)")?;
        let next_number_sel = selector(&format!(r#"a[onclick*="fn_link_page({})"]"#, page_number + 1))?;
        let next_arrow_sel = selector("a.next, a.btn-next")?;

        let document = scraper::Html::parse_document(html);
        let mut items = Vec::new();
        for row in document.select(&row_sel) {
            let (Some(title), Some(date)) = (first_text(&row, &title_sel), first_text(&row, &date_sel)) else {
                continue;
            };
            let id = first_attr(&row, &title_sel, "onclick")
                .and_then(|onclick| parse_script_call(&onclick, "searchView"))
                .and_then(|args| args.into_iter().next())
                .filter(|id| !id.is_empty() && id.chars().all(|c| c.is_ascii_digit()));
            let Some(id) = id else {
                continue;
            };
            items.push(
                ListItem::new(title)
                    .with_date(Some(date))
                    .with_detail_url(Some(self.detail_url(&id))),
            );
        }

        let next = if document.select(&next_number_sel).next().is_some() {
            NextPage::click(format!(r#"a[onclick*="fn_link_page({})"]"#, page_number + 1))
        } else if document.select(&next_arrow_sel).next().is_some() {
            NextPage::click("a.next, a.btn-next")
        } else {
            NextPage::End
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
        let pdf = document_attr(&html, r#"a[href*="FileDown"]"#, "href")?
            .and_then(|href| resolve_href(BASE_URL, &href));
        Ok(Some(build_record(core, item, pdf)))
    }
}
