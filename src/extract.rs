//! Extraction helpers shared by site adapters
//!
//! Adapters take a rendered HTML snapshot from the session, parse it here and
//! drop the parsed document before the next await point.

use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use url::Url;

use crate::error::ScraperError;

static WHITESPACE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());
static LOCATION_HREF_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"location\.href\s*=\s*['"]([^'"]+)['"]"#).unwrap());

/// Click-based ways of getting a download URL out of a live page.
///
/// Links readable from the snapshot (`href`, `downloadItem(...)` handlers)
/// are resolved by the adapters themselves.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DownloadStrategy {
    /// Click the selector and take the URL of the tab it opens.
    NewTab { selector: String },
    /// Click the selector and take the URL of the download it starts.
    DownloadEvent { selector: String },
}

/// Collapse runs of whitespace and trim.
pub fn clean_text(text: &str) -> String {
    WHITESPACE_RE.replace_all(text.trim(), " ").into_owned()
}

/// Arguments of the first `function(...)` call in `text`, quotes stripped.
///
/// `fn_download('FILE_01', 2)` yields `["FILE_01", "2"]`. A call with an empty
/// argument list yields an empty vec.
pub fn parse_script_call(text: &str, function: &str) -> Option<Vec<String>> {
    let pattern = format!(r"{}\s*\(([^)]*)\)", regex::escape(function));
    let re = Regex::new(&pattern).ok()?;
    let caps = re.captures(text)?;
    let raw = caps.get(1)?.as_str().trim();
    if raw.is_empty() {
        return Some(Vec::new());
    }
    Some(
        raw.split(',')
            .map(|arg| {
                arg.trim()
                    .trim_matches(|c| c == '\'' || c == '"')
                    .trim()
                    .to_string()
            })
            .collect(),
    )
}

/// Target of a `location.href='…'` assignment.
pub fn extract_location_href(text: &str) -> Option<String> {
    LOCATION_HREF_RE
        .captures(text)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

/// Resolve `href` against `base`. Script pseudo-links and bare fragments give `None`.
pub fn resolve_href(base: &str, href: &str) -> Option<String> {
    let href = href.trim();
    if href.is_empty() || href.starts_with('#') || href.to_lowercase().starts_with("javascript:")
    {
        return None;
    }
    resolve_url(base, href).ok()
}

pub fn resolve_url(base: &str, href: &str) -> Result<String, ScraperError> {
    let base = Url::parse(base)?;
    Ok(base.join(href.trim())?.to_string())
}

pub fn selector(css: &str) -> Result<Selector, ScraperError> {
    Selector::parse(css).map_err(|e| ScraperError::Extraction(format!("selector '{css}': {e}")))
}

/// Whitespace-collapsed text of an element.
pub fn element_text(element: &ElementRef<'_>) -> String {
    clean_text(&element.text().collect::<String>())
}

pub fn first_text(scope: &ElementRef<'_>, sel: &Selector) -> Option<String> {
    scope
        .select(sel)
        .map(|el| element_text(&el))
        .find(|text| !text.is_empty())
}

pub fn first_attr(scope: &ElementRef<'_>, sel: &Selector, attr: &str) -> Option<String> {
    scope
        .select(sel)
        .find_map(|el| el.value().attr(attr).map(str::to_string))
}

/// Nearest ancestor (or the element itself) matching `sel`.
pub fn closest<'a>(element: &ElementRef<'a>, sel: &Selector) -> Option<ElementRef<'a>> {
    if sel.matches(element) {
        return Some(*element);
    }
    element
        .ancestors()
        .filter_map(ElementRef::wrap)
        .find(|ancestor| sel.matches(ancestor))
}

/// First attribute value in `html` for elements matching `css`.
pub fn document_attr(html: &str, css: &str, attr: &str) -> Result<Option<String>, ScraperError> {
    let sel = selector(css)?;
    let document = Html::parse_document(html);
    let value = document
        .select(&sel)
        .find_map(|el| el.value().attr(attr).map(str::to_string));
    Ok(value)
}

/// First non-empty text in `html` among elements matching `css`.
pub fn document_text(html: &str, css: &str) -> Result<Option<String>, ScraperError> {
    let sel = selector(css)?;
    let document = Html::parse_document(html);
    let text = document
        .select(&sel)
        .map(|el| element_text(&el))
        .find(|text| !text.is_empty());
    Ok(text)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_text() {
        assert_eq!(clean_text("  주간\n\t 금융   브리프 "), "주간 금융 브리프");
    }

    #[test]
    fn test_parse_script_call() {
        assert_eq!(
            parse_script_call("javascript:downloadItem('36432', \"102714\"); return false;", "downloadItem"),
            Some(vec!["36432".to_string(), "102714".to_string()])
        );
        assert_eq!(
            parse_script_call("fn_link_page(3); return false;", "fn_link_page"),
            Some(vec!["3".to_string()])
        );
        assert_eq!(parse_script_call("goPage()", "goPage"), Some(vec![]));
        assert_eq!(parse_script_call("otherCall(1)", "goPage"), None);
    }

    #[test]
    fn test_parse_script_call_escapes_name() {
        assert_eq!(
            parse_script_call("fn.view(7)", "fn.view"),
            Some(vec!["7".to_string()])
        );
        assert_eq!(parse_script_call("fnxview(7)", "fn.view"), None);
    }

    #[test]
    fn test_location_href() {
        assert_eq!(
            extract_location_href("location.href='/file/download?id=9'"),
            Some("/file/download?id=9".to_string())
        );
        assert_eq!(
            extract_location_href(r#"window.location.href = "https://a.kr/x.pdf";"#),
            Some("https://a.kr/x.pdf".to_string())
        );
        assert_eq!(extract_location_href("history.back()"), None);
    }

    #[test]
    fn test_resolve_href() {
        let base = "https://researcher.hf.go.kr/researcher/sub02/sub02_05.do";
        assert_eq!(
            resolve_href(base, "?mode=download&id=3").as_deref(),
            Some("https://researcher.hf.go.kr/researcher/sub02/sub02_05.do?mode=download&id=3")
        );
        assert_eq!(
            resolve_href(base, "/cmm/fms/FileDown.do?atchFileId=1").as_deref(),
            Some("https://researcher.hf.go.kr/cmm/fms/FileDown.do?atchFileId=1")
        );
        assert_eq!(resolve_href(base, "javascript:void(0)"), None);
        assert_eq!(resolve_href(base, "#"), None);
        assert_eq!(resolve_href(base, ""), None);
        assert!(resolve_url("not a url", "/x").is_err());
    }

    #[test]
    fn test_closest_and_first_helpers() {
        let html = r#"<ul><li class="row"><span class="date">2026.01.02</span>
            <a class="tit" href="/view?id=1"> 제목   하나 </a></li></ul>"#;
        let document = Html::parse_document(html);
        let link_sel = selector("a.tit").unwrap();
        let row_sel = selector("li.row").unwrap();
        let date_sel = selector(".date").unwrap();

        let link = document.select(&link_sel).next().unwrap();
        assert_eq!(element_text(&link), "제목 하나");
        let row = closest(&link, &row_sel).unwrap();
        assert_eq!(first_text(&row, &date_sel).as_deref(), Some("2026.01.02"));
        assert_eq!(first_attr(&row, &link_sel, "href").as_deref(), Some("/view?id=1"));
    }

    #[test]
    fn test_document_queries() {
        let html = r#"<div><a class="pdf" href="?mode=download">PDF</a></div>"#;
        assert_eq!(document_attr(html, "a.next", "href").unwrap(), None);
        assert_eq!(
            document_attr(html, "a.pdf", "href").unwrap().as_deref(),
            Some("?mode=download")
        );
        assert!(selector("a[").is_err());
    }
}
