//! Result sink: dedup, CSV / JSON files, output locations

use std::collections::HashSet;
use std::fmt;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use tracing::info;

use crate::error::ScraperError;
use crate::record::{is_sentinel, PublicationRecord};

/// Column order of every CSV written.
pub const CSV_HEADER: [&str; 6] = ["source", "title", "date", "pdf_url", "page_url", "collected_at"];

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputKind {
    /// One adapter's records.
    Results,
    /// Union of several adapters' records.
    Integrated,
}

impl fmt::Display for OutputKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputKind::Results => f.write_str("results"),
            OutputKind::Integrated => f.write_str("integrated_results"),
        }
    }
}

/// Paths written by [`save`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SavedFiles {
    pub csv: PathBuf,
    pub json: PathBuf,
}

/// Drop records whose download URL was already seen, keeping the first.
/// Records without a real URL are always kept.
pub fn dedup(records: Vec<PublicationRecord>) -> Vec<PublicationRecord> {
    let mut seen = HashSet::new();
    records
        .into_iter()
        .filter(|record| {
            let url = record.download_url.trim();
            is_sentinel(url) || seen.insert(url.to_string())
        })
        .collect()
}

fn ensure_parent(path: &Path) -> Result<(), ScraperError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    Ok(())
}

/// UTF-8 CSV with a byte-order mark and a fixed header.
pub fn write_csv(records: &[PublicationRecord], path: &Path) -> Result<(), ScraperError> {
    ensure_parent(path)?;
    let mut file = BufWriter::new(File::create(path)?);
    file.write_all(UTF8_BOM)?;

    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(file);
    writer.write_record(CSV_HEADER)?;
    for record in records {
        writer.serialize(record)?;
    }
    writer.flush()?;
    Ok(())
}

/// Indented JSON array, non-ASCII kept literal.
pub fn write_json(records: &[PublicationRecord], path: &Path) -> Result<(), ScraperError> {
    ensure_parent(path)?;
    let mut file = BufWriter::new(File::create(path)?);
    serde_json::to_writer_pretty(&mut file, records)?;
    file.write_all(b"\n")?;
    file.flush()?;
    Ok(())
}

/// Read back a CSV written by [`write_csv`] (or any CSV with those columns).
pub fn read_csv(path: &Path) -> Result<Vec<PublicationRecord>, ScraperError> {
    let raw = fs::read(path)?;
    let body = raw.strip_prefix(UTF8_BOM).unwrap_or(&raw[..]);
    let mut reader = csv::Reader::from_reader(body);
    let records = reader
        .deserialize()
        .collect::<Result<Vec<PublicationRecord>, _>>()?;
    Ok(records)
}

pub fn read_json(path: &Path) -> Result<Vec<PublicationRecord>, ScraperError> {
    let raw = fs::read(path)?;
    Ok(serde_json::from_slice(&raw)?)
}

/// `{prefix}_{kind}_{YYYYmmdd_HHMMSS}.{ext}`
pub fn output_file_name(prefix: &str, kind: OutputKind, at: &DateTime<Local>, ext: &str) -> String {
    format!("{prefix}_{kind}_{}.{ext}", at.format("%Y%m%d_%H%M%S"))
}

/// First existing `output/` in `start` or up to two parents; otherwise
/// `start/output`, created.
pub fn resolve_output_dir(start: &Path) -> Result<PathBuf, ScraperError> {
    for dir in start.ancestors().take(3) {
        let candidate = dir.join("output");
        if candidate.is_dir() {
            return Ok(candidate);
        }
    }
    let created = start.join("output");
    fs::create_dir_all(&created)?;
    Ok(created)
}

/// Write `records` as CSV and JSON under `dir`.
pub fn save(
    records: &[PublicationRecord],
    dir: &Path,
    prefix: &str,
    kind: OutputKind,
) -> Result<SavedFiles, ScraperError> {
    fs::create_dir_all(dir)?;
    let now = Local::now();
    let files = SavedFiles {
        csv: dir.join(output_file_name(prefix, kind, &now, "csv")),
        json: dir.join(output_file_name(prefix, kind, &now, "json")),
    };
    write_csv(records, &files.csv)?;
    write_json(records, &files.json)?;
    info!(
        "Saved {} records: {} / {}",
        records.len(),
        files.csv.display(),
        files.json.display()
    );
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::NOT_AVAILABLE;
    use chrono::TimeZone;

    fn record(title: &str, url: &str) -> PublicationRecord {
        PublicationRecord::new("테스트", title, "2026-01-02", url)
            .with_page_url("https://site.kr/list")
            .with_collected_at("2026-01-03T09:00:00")
    }

    #[test]
    fn test_dedup_keeps_first_and_sentinels() {
        let records = vec![
            record("a", "https://site.kr/1.pdf"),
            record("b", NOT_AVAILABLE),
            record("c", "https://site.kr/1.pdf"),
            record("d", ""),
            record("e", "https://site.kr/2.pdf"),
            record("f", NOT_AVAILABLE),
        ];

        let once = dedup(records);
        let titles: Vec<_> = once.iter().map(|r| r.title.as_str()).collect();
        assert_eq!(titles, vec!["a", "b", "d", "e", "f"]);

        let twice = dedup(once.clone());
        assert_eq!(twice, once);
    }

    #[test]
    fn test_dedup_never_merges_sentinel_urls() {
        let records: Vec<_> = (0..5).map(|i| record(&i.to_string(), NOT_AVAILABLE)).collect();
        assert_eq!(dedup(records).len(), 5);
    }

    #[test]
    fn test_csv_round_trip_with_awkward_fields() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("out.csv");
        let records = vec![
            record("쉼표, 있는 제목", "https://site.kr/1.pdf"),
            record("줄\n바꿈 \"따옴표\"", NOT_AVAILABLE),
            record("보통 제목", "https://site.kr/view?a=1&b=2"),
        ];

        write_csv(&records, &path).unwrap();

        let raw = fs::read(&path).unwrap();
        assert!(raw.starts_with(UTF8_BOM));
        let text = String::from_utf8(raw[UTF8_BOM.len()..].to_vec()).unwrap();
        assert!(text.starts_with("source,title,date,pdf_url,page_url,collected_at\n"));

        assert_eq!(read_csv(&path).unwrap(), records);
    }

    #[test]
    fn test_empty_csv_still_has_header() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.csv");
        write_csv(&[], &path).unwrap();
        assert!(read_csv(&path).unwrap().is_empty());
        let text = fs::read_to_string(&path).unwrap();
        assert!(text.contains("source,title,date,pdf_url,page_url,collected_at"));
    }

    #[test]
    fn test_json_is_pretty_and_literal() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.json");
        let records = vec![record("한글 제목", "https://site.kr/1.pdf")];

        write_json(&records, &path).unwrap();

        let text = fs::read_to_string(&path).unwrap();
        assert!(text.contains("한글 제목"));
        assert!(text.contains("\n  {"));
        assert!(text.contains("\"pdf_url\": \"https://site.kr/1.pdf\""));
        assert_eq!(read_json(&path).unwrap(), records);
    }

    #[test]
    fn test_output_file_name() {
        let at = Local.with_ymd_and_hms(2026, 1, 31, 18, 5, 9).unwrap();
        assert_eq!(
            output_file_name("kdi", OutputKind::Results, &at, "csv"),
            "kdi_results_20260131_180509.csv"
        );
        assert_eq!(
            output_file_name("research", OutputKind::Integrated, &at, "json"),
            "research_integrated_results_20260131_180509.json"
        );
    }

    #[test]
    fn test_resolve_output_dir_searches_parents() {
        let root = tempfile::tempdir().unwrap();
        let start = root.path().join("a").join("b");
        fs::create_dir_all(&start).unwrap();

        // nothing yet: created under start
        let created = resolve_output_dir(&start).unwrap();
        assert_eq!(created, start.join("output"));
        fs::remove_dir(&created).unwrap();

        let grandparent_output = root.path().join("output");
        fs::create_dir_all(&grandparent_output).unwrap();
        assert_eq!(resolve_output_dir(&start).unwrap(), grandparent_output);
    }

    #[test]
    fn test_save_writes_both_files() {
        let dir = tempfile::tempdir().unwrap();
        let files = save(
            &[record("a", "https://site.kr/1.pdf")],
            dir.path(),
            "hf",
            OutputKind::Results,
        )
        .unwrap();

        assert!(files.csv.exists());
        assert!(files.json.exists());
        assert_eq!(read_csv(&files.csv).unwrap().len(), 1);
    }
}
