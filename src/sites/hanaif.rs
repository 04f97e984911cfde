//! Hana Institute of Finance boards
//!
//! Download buttons call `downloadItem('board', 'seq')`; the file endpoint
//! only needs the `seq`.

use async_trait::async_trait;

use crate::error::ScraperError;
use crate::extract::{first_attr, first_text, parse_script_call, selector};
use crate::listing::{ListItem, ListPage, ListingSite, NextPage};

pub const BASE_URL: &str = "https://www.hanaif.re.kr";
pub const SITE_NAME: &str = "하나금융연구소";

const ROW_SELECTORS: [&str; 2] = ["ul.listType01 > li", ".board_list > li, .list_box > li, tbody > tr"];
const FILE_SELECTOR: &str =
    r#".fileBox a[onclick*="downloadItem"], .file a, a[onclick*="downloadItem"]"#;

/// Rebuild the file endpoint from a `downloadItem(...)` handler.
pub fn download_url_from_onclick(onclick: &str) -> Option<String> {
    let args = parse_script_call(onclick, "downloadItem")?;
    let seq = match args.as_slice() {
        [_, seq] | [seq] => seq,
        _ => return None,
    };
    if seq.is_empty() || !seq.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    Some(format!("{BASE_URL}/dev/hanaifFileDownload.jsp?seq={seq}"))
}

#[derive(Debug, Clone)]
pub struct HanaIfBoard {
    name: &'static str,
    path: &'static str,
}

impl HanaIfBoard {
    pub fn research_reports() -> Self {
        Self {
            name: "연구보고서",
            path: "/boardList.do?menuId=MN1000&tabMenuId=N",
        }
    }

    pub fn focus() -> Self {
        Self {
            name: "하나금융포커스",
            path: "/boardList.do?menuId=MN2000&tabMenuId=MN2100",
        }
    }

    pub fn name(&self) -> &str {
        self.name
    }
}

#[async_trait]
impl ListingSite for HanaIfBoard {
    fn list_url(&self) -> String {
        format!("{BASE_URL}{}", self.path)
    }

    fn max_pages(&self) -> usize {
        10
    }

    fn stops_at_older(&self) -> bool {
        true
    }

    fn requires_download_url(&self) -> bool {
        true
    }

    fn parse_list(&self, html: &str, _page_url: &str, page_number: usize) -> Result<ListPage, ScraperError> {
        let date_sel = selector(".date")?;
        let hidden_title_sel = selector(".hiddenEllips")?;
        let title_sel = selector(".tit")?;
        let file_sel = selector(FILE_SELECTOR)?;
        let next_call = format!("goPage({})", page_number + 1);
        let next_sel = selector(&format!(r#".paging a[href*="{next_call}"]"#))?;

        let document = scraper::Html::parse_document(html);
        let mut items = Vec::new();
        for css in ROW_SELECTORS {
            let row_sel = selector(css)?;
            for row in document.select(&row_sel) {
                let Some(date) = first_text(&row, &date_sel) else {
                    continue;
                };
                let title = first_text(&row, &hidden_title_sel)
                    .or_else(|| first_text(&row, &title_sel))
                    .unwrap_or_else(|| "제목 없음".to_string());
                let download = first_attr(&row, &file_sel, "onclick")
                    .and_then(|onclick| download_url_from_onclick(&onclick));
                items.push(
                    ListItem::new(title)
                        .with_date(Some(date))
                        .with_download_url(download),
                );
            }
            if !items.is_empty() {
                break;
            }
        }

        let next = if document.select(&next_sel).next().is_some() {
            NextPage::Script(next_call)
        } else {
            NextPage::End
        };
        Ok(ListPage { items, next })
    }
}
