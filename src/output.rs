//! Persistence of a completed crawl to disk.
//!
//! One file per run, named by local timestamp and post id so repeated runs
//! never overwrite each other. JSON keeps the id-keyed mapping; CSV
//! flattens records into one row each, sorted by id so output is stable for
//! a given crawl result.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::ValueEnum;
use tracing::info;

use crate::crawler::ReplyRecord;

/// Output file format for the aggregate result set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Json,
    Csv,
}

impl OutputFormat {
    const fn extension(self) -> &'static str {
        match self {
            Self::Json => "json",
            Self::Csv => "csv",
        }
    }
}

/// CSV column order; must match `record_row`.
const CSV_HEADER: &[&str] = &[
    "id",
    "code",
    "timestamp",
    "like_count",
    "direct_reply_count",
    "repost_count",
    "quote_count",
    "user_id",
    "username",
    "is_verified",
    "profile_pic_url",
    "text",
    "media_type",
    "accessibility_caption",
    "img_urls",
];

/// Write the aggregate result set to `output_dir`, creating it if needed.
///
/// Returns the path of the written file.
///
/// # Errors
///
/// Returns an error if the directory cannot be created or the file cannot
/// be written.
pub async fn save_replies(
    replies: &HashMap<String, ReplyRecord>,
    post_id: &str,
    format: OutputFormat,
    output_dir: &Path,
) -> Result<PathBuf> {
    tokio::fs::create_dir_all(output_dir)
        .await
        .with_context(|| format!("Failed to create output directory: {}", output_dir.display()))?;

    let stamp = chrono::Local::now().format("%Y-%m-%d_%H-%M-%S");
    let path = output_dir.join(format!("{stamp}_{post_id}.{}", format.extension()));

    let contents = match format {
        OutputFormat::Json => render_json(replies)?,
        OutputFormat::Csv => render_csv(replies),
    };

    tokio::fs::write(&path, contents)
        .await
        .with_context(|| format!("Failed to write {}", path.display()))?;

    info!(path = %path.display(), total = replies.len(), "Saved replies");

    Ok(path)
}

fn render_json(replies: &HashMap<String, ReplyRecord>) -> Result<String> {
    // Sort by id so the file is byte-stable for a given result set.
    let ordered: BTreeMap<&String, &ReplyRecord> = replies.iter().collect();
    serde_json::to_string_pretty(&ordered).context("Failed to serialize replies to JSON")
}

fn render_csv(replies: &HashMap<String, ReplyRecord>) -> String {
    let ordered: BTreeMap<&String, &ReplyRecord> = replies.iter().collect();

    let mut out = String::new();
    out.push_str(&CSV_HEADER.join(","));
    out.push('\n');

    for record in ordered.values() {
        let row = record_row(record)
            .iter()
            .map(|field| csv_escape(field))
            .collect::<Vec<_>>()
            .join(",");
        out.push_str(&row);
        out.push('\n');
    }

    out
}

fn record_row(record: &ReplyRecord) -> Vec<String> {
    vec![
        record.id.clone(),
        record.code.clone(),
        record.timestamp.clone(),
        record.like_count.to_string(),
        record.direct_reply_count.to_string(),
        record.repost_count.to_string(),
        record.quote_count.to_string(),
        record.user_id.clone(),
        record.username.clone(),
        record.is_verified.to_string(),
        record.profile_pic_url.clone(),
        record.text.clone().unwrap_or_default(),
        record.media_type.to_string(),
        record.accessibility_caption.clone().unwrap_or_default(),
        record.img_urls.join(";"),
    ]
}

/// Quote a field when it carries a delimiter, quote, or line break.
fn csv_escape(field: &str) -> String {
    if field.contains(['"', ',', '\n', '\r']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_csv_escape_plain() {
        assert_eq!(csv_escape("hello"), "hello");
    }

    #[test]
    fn test_csv_escape_comma() {
        assert_eq!(csv_escape("a,b"), "\"a,b\"");
    }

    #[test]
    fn test_csv_escape_quotes() {
        assert_eq!(csv_escape(r#"say "hi""#), r#""say ""hi""""#);
    }

    #[test]
    fn test_csv_escape_newline() {
        assert_eq!(csv_escape("line1\nline2"), "\"line1\nline2\"");
    }

    #[test]
    fn test_header_matches_row_width() {
        let record = ReplyRecord {
            id: "1".to_string(),
            code: "c".to_string(),
            timestamp: "2024-01-01 00:00:00".to_string(),
            like_count: 0,
            direct_reply_count: 0,
            repost_count: 0,
            quote_count: 0,
            user_id: "u".to_string(),
            username: "name".to_string(),
            is_verified: false,
            profile_pic_url: String::new(),
            text: None,
            media_type: 19,
            accessibility_caption: None,
            img_urls: vec![],
        };
        assert_eq!(record_row(&record).len(), CSV_HEADER.len());
    }
}
