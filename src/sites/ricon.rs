//! Korea Research Institute for Construction Policy (RICON) economic indicators
//!
//! The file sits behind `file_download.php` on each detail page. Clicking it
//! may open a viewer tab or start a download; the raw `href` is the last
//! resort.

use async_trait::async_trait;
use scraper::Html;
use tracing::debug;

use crate::dates::{normalize_date, UnknownDatePolicy};
use crate::error::ScraperError;
use crate::extract::{element_text, first_attr, first_text, resolve_href, selector, DownloadStrategy};
use crate::listing::{build_record, ListItem, ListPage, ListingSite, NextPage};
use crate::record::PublicationRecord;
use crate::session::{capture_download, Session};
use crate::traits::AdapterCore;

pub const BASE_URL: &str = "https://www.ricon.re.kr";
pub const LIST_URL: &str = "https://www.ricon.re.kr/board/list.php?group=issue&page=economic_index&cate=9";
pub const SITE_NAME: &str = "대한건설정책연구원";

const ROW_SELECTORS: [&str; 2] = ["table tbody tr, .board_list li, .list_box li", ".board-list > li"];
const DATE_SELECTOR: &str = ".date, td:nth-child(3), td.date";
const DETAIL_SELECTOR: &str = r#"a[href*="view"], a[href*="read"]"#;
const FILE_SELECTOR: &str = r#"a[href*="file_download.php"]"#;
const NEXT_SELECTOR: &str = "a.next, .btn_next";

/// Collapse a doubled scheme such as `https://https://host/...`.
pub fn fix_doubled_scheme(url: &str) -> String {
    match url.strip_prefix("https://https://") {
        Some(rest) => format!("https://{rest}"),
        None => url.to_string(),
    }
}

/// File anchor found on a detail page.
#[derive(Debug, Clone, PartialEq, Eq)]
enum FileLink {
    /// The `file_download.php` anchor.
    Endpoint { href: Option<String> },
    /// Another anchor that looks like a file, `index`-th of all anchors.
    Other { index: usize, href: String },
}

fn find_file_link(html: &str) -> Result<Option<FileLink>, ScraperError> {
    let file_sel = selector(FILE_SELECTOR)?;
    let anchor_sel = selector("a")?;
    let document = Html::parse_document(html);

    if let Some(link) = document.select(&file_sel).next() {
        return Ok(Some(FileLink::Endpoint {
            href: link.value().attr("href").map(str::to_string),
        }));
    }
    let other = document.select(&anchor_sel).enumerate().find_map(|(index, anchor)| {
        let href = anchor.value().attr("href")?.trim();
        if href.is_empty() || href.to_lowercase().starts_with("javascript") {
            return None;
        }
        let looks_like_file = element_text(&anchor).to_lowercase().contains("pdf")
            || href.to_lowercase().contains("download");
        looks_like_file.then(|| FileLink::Other {
            index,
            href: href.to_string(),
        })
    });
    Ok(other)
}

/// A capture attempt that times out or fails recoverably counts as "nothing".
async fn try_capture(
    session: &dyn Session,
    strategy: &DownloadStrategy,
    index: usize,
) -> Result<Option<String>, ScraperError> {
    match capture_download(session, strategy, index).await {
        Ok(found) => Ok(found),
        Err(e) if e.is_recoverable() => {
            debug!("[{}] {:?} gave nothing: {}", SITE_NAME, strategy, e);
            Ok(None)
        }
        Err(e) => Err(e),
    }
}

/// Viewer tab, then download event, then the anchor's own `href`.
async fn capture_file(session: &dyn Session, link: &FileLink) -> Result<Option<String>, ScraperError> {
    let (css, index, href) = match link {
        FileLink::Endpoint { href } => (FILE_SELECTOR, 0, href.as_deref()),
        FileLink::Other { index, href } => ("a", *index, Some(href.as_str())),
    };

    if matches!(link, FileLink::Endpoint { .. }) {
        let tab = DownloadStrategy::NewTab { selector: css.to_string() };
        if let Some(url) = try_capture(session, &tab, index).await? {
            return Ok(Some(url));
        }
    }
    let download = DownloadStrategy::DownloadEvent { selector: css.to_string() };
    if let Some(url) = try_capture(session, &download, index).await? {
        return Ok(Some(url));
    }
    Ok(href.and_then(|href| resolve_href(BASE_URL, href)))
}

#[derive(Debug, Clone, Default)]
pub struct RiconBoard;

#[async_trait]
impl ListingSite for RiconBoard {
    fn list_url(&self) -> String {
        LIST_URL.to_string()
    }

    fn max_pages(&self) -> usize {
        5
    }

    fn unknown_date_policy(&self) -> UnknownDatePolicy {
        UnknownDatePolicy::Admit
    }

    fn requires_download_url(&self) -> bool {
        true
    }

    fn parse_list(&self, html: &str, page_url: &str, page_number: usize) -> Result<ListPage, ScraperError> {
        let date_sel = selector(DATE_SELECTOR)?;
        let anchor_sel = selector("a")?;
        let title_sel = selector(".subject, .title")?;
        let detail_sel = selector(DETAIL_SELECTOR)?;
        let numbered_css = format!(r#"a[onclick*="page={}"]"#, page_number + 1);
        let numbered_sel = selector(&numbered_css)?;
        let next_sel = selector(NEXT_SELECTOR)?;

        let document = Html::parse_document(html);
        let mut items = Vec::new();
        for css in ROW_SELECTORS {
            let row_sel = selector(css)?;
            for row in document.select(&row_sel) {
                let Some(title) = first_text(&row, &anchor_sel).or_else(|| first_text(&row, &title_sel)) else {
                    continue;
                };
                let Some(detail) = first_attr(&row, &detail_sel, "href")
                    .or_else(|| first_attr(&row, &anchor_sel, "href"))
                    .and_then(|href| resolve_href(page_url, &href))
                else {
                    continue;
                };
                let date = first_text(&row, &date_sel)
                    .and_then(|text| normalize_date(&text))
                    .or_else(|| normalize_date(&element_text(&row)));
                items.push(
                    ListItem::new(title)
                        .with_date(date)
                        .with_detail_url(Some(detail)),
                );
            }
            if !items.is_empty() {
                break;
            }
        }

        let next = if document.select(&numbered_sel).next().is_some() {
            NextPage::click(numbered_css)
        } else if document.select(&next_sel).next().is_some() {
            NextPage::click(NEXT_SELECTOR)
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
        let link = find_file_link(&html)?;
        drop(html);

        let pdf = match link {
            Some(link) => capture_file(session, &link).await?,
            None => {
                debug!("[{}] no file link on {}", SITE_NAME, url);
                None
            }
        };
        Ok(Some(build_record(core, item, pdf.map(|url| fix_doubled_scheme(&url)))))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dates::DateWindow;
    use crate::listing::run_listing;
    use crate::session::mock::{ClickAction, MockSession};

    fn row(no: u32, title: &str, date: &str) -> String {
        format!(
            r#"<tr><td>{no}</td><td class="subject"><a href="/board/view.php?no={no}">{title}</a></td><td>{date}</td></tr>"#
        )
    }

    fn detail_url(no: u32) -> String {
        format!("{BASE_URL}/board/view.php?no={no}")
    }

    fn file_anchor(no: u32) -> String {
        format!(r#"<a href="/board/file_download.php?type=board&no={no}&idx=0">첨부파일</a>"#)
    }

    #[test]
    fn test_parse_list() {
        let html = format!(
            r#"<table><tbody>{}{}<tr><td>공지</td><td><a href="javascript:void(0)">휴무 안내</a></td><td>-</td></tr>
               <tr><td>7</td><td><a href="/board/view.php?no=7">조회수가 붙은 날짜</a></td><td>조회 3 / 2026.01.03</td></tr></tbody></table>
               <div class="paging"><a onclick="location.href='?page=2'">2</a></div>"#,
            row(101, "건설경제지표 2026년 1월", "2026.01.15"),
            row(100, "건설경제지표 2025년 12월", "2025-12-15"),
        );

        let page = RiconBoard.parse_list(&html, LIST_URL, 1).unwrap();

        assert_eq!(page.items.len(), 3);
        assert_eq!(page.items[0].title, "건설경제지표 2026년 1월");
        assert_eq!(page.items[0].date.as_deref(), Some("2026-01-15"));
        assert_eq!(page.items[0].detail_url.as_deref(), Some(detail_url(101).as_str()));
        assert_eq!(page.items[2].date.as_deref(), Some("2026-01-03"));
        assert_eq!(page.next, NextPage::click(r#"a[onclick*="page=2"]"#));

        let last = RiconBoard.parse_list(&html, LIST_URL, 2).unwrap();
        assert_eq!(last.next, NextPage::End);
    }

    #[test]
    fn test_board_list_fallback_rows() {
        let html = r##"<ul class="board-list"><li><a href="/board/read.php?no=5">지표 해설</a><span class="date">2026.01.09</span></li></ul>
                      <a class="next" href="#">다음</a>"##;

        let page = RiconBoard.parse_list(html, LIST_URL, 1).unwrap();

        assert_eq!(page.items.len(), 1);
        assert_eq!(
            page.items[0].detail_url.as_deref(),
            Some("https://www.ricon.re.kr/board/read.php?no=5")
        );
        assert_eq!(page.next, NextPage::click(NEXT_SELECTOR));
    }

    #[test]
    fn test_fix_doubled_scheme() {
        assert_eq!(
            fix_doubled_scheme("https://https://www.ricon.re.kr/upload/a.pdf"),
            "https://www.ricon.re.kr/upload/a.pdf"
        );
        assert_eq!(fix_doubled_scheme("https://www.ricon.re.kr/a.pdf"), "https://www.ricon.re.kr/a.pdf");
    }

    #[test]
    fn test_find_file_link() {
        assert_eq!(
            find_file_link(&file_anchor(3)).unwrap(),
            Some(FileLink::Endpoint {
                href: Some("/board/file_download.php?type=board&no=3&idx=0".to_string())
            })
        );
        let other = r#"<a href="/board/list.php">목록</a><a href="javascript:print()">PDF 인쇄</a><a href="/upload/104.pdf">보고서 PDF</a>"#;
        assert_eq!(
            find_file_link(other).unwrap(),
            Some(FileLink::Other {
                index: 2,
                href: "/upload/104.pdf".to_string()
            })
        );
        assert_eq!(find_file_link(r#"<a href="/board/list.php">목록</a>"#).unwrap(), None);
    }

    #[tokio::test]
    async fn test_detail_capture_chain() {
        let list = format!(
            "<table><tbody>{}{}{}{}{}{}</tbody></table>",
            row(101, "뷰어 탭", "2026.01.15"),
            row(102, "다운로드 이벤트", "2026.01.14"),
            row(103, "링크만", "2026.01.13"),
            row(104, "기타 PDF 링크", "2026.01.12"),
            row(105, "첨부 없음", "2026.01.11"),
            row(99, "지난해", "2025.12.20"),
        );
        let other_links = r#"<a href="/board/list.php">목록</a><a href="javascript:print()">PDF 인쇄</a><a href="/upload/104.pdf">보고서 PDF</a>"#;
        let session = MockSession::new()
            .page(LIST_URL, list)
            .page(&detail_url(101), file_anchor(101))
            .page(&detail_url(102), file_anchor(102))
            .page(&detail_url(103), file_anchor(103))
            .page(&detail_url(104), other_links)
            .page(&detail_url(105), "<p>본문만</p>")
            .on_click_at(
                &detail_url(101),
                FILE_SELECTOR,
                0,
                ClickAction::NewTab("https://www.ricon.re.kr/viewer/101.pdf".into()),
            )
            .on_click_at(
                &detail_url(102),
                FILE_SELECTOR,
                0,
                ClickAction::Download("https://www.ricon.re.kr/data/102.pdf".into()),
            )
            .on_click_at(
                &detail_url(104),
                "a",
                2,
                ClickAction::Download("https://https://www.ricon.re.kr/upload/104_final.pdf".into()),
            );
        let window = DateWindow::parse("2026-01-01", "2026-01-31").unwrap();
        let mut core = AdapterCore::new(SITE_NAME, window);

        let collected = run_listing(&RiconBoard, &mut core, &session).await.unwrap();

        assert_eq!(collected, 4);
        let urls: Vec<_> = core.results.iter().map(|r| r.download_url.as_str()).collect();
        assert_eq!(
            urls,
            vec![
                "https://www.ricon.re.kr/viewer/101.pdf",
                "https://www.ricon.re.kr/data/102.pdf",
                "https://www.ricon.re.kr/board/file_download.php?type=board&no=103&idx=0",
                "https://www.ricon.re.kr/upload/104_final.pdf",
            ]
        );
        assert_eq!(core.results[0].page_url, detail_url(101));
        assert!(!session.visits().contains(&detail_url(99)));
        assert!(session.visits().contains(&detail_url(105)));
    }

    #[tokio::test]
    async fn test_timed_out_tab_falls_through_to_href() {
        let list = format!("<table><tbody>{}</tbody></table>", row(201, "느린 뷰어", "2026.01.20"));
        let session = MockSession::new()
            .page(LIST_URL, list)
            .page(&detail_url(201), file_anchor(201))
            .on_click_at(&detail_url(201), FILE_SELECTOR, 0, ClickAction::Hang);
        let window = DateWindow::parse("2026-01-01", "2026-01-31").unwrap();
        let mut core = AdapterCore::new(SITE_NAME, window);

        let collected = run_listing(&RiconBoard, &mut core, &session).await.unwrap();

        assert_eq!(collected, 1);
        assert_eq!(
            core.results[0].download_url,
            "https://www.ricon.re.kr/board/file_download.php?type=board&no=201&idx=0"
        );
    }
}
