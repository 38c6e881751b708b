//! Per-job fetch index: record types, append-only writer, tolerant reader

pub mod record;
pub mod writer;

pub use record::{FetchStatus, IndexRecord, MAX_ERROR_LEN};
pub use writer::IndexWriter;

use anyhow::{Context, Result};
use std::path::Path;
use tokio::io::{AsyncBufReadExt, BufReader};

/// Read every parseable record from a JSONL index file.
///
/// Blank lines and corrupt lines are skipped with a warning; readers must
/// tolerate both (the writer may have been interrupted mid-line by a crash).
///
/// # Errors
///
/// Returns an error only when the file itself cannot be opened or read.
pub async fn read_index(path: &Path) -> Result<Vec<IndexRecord>> {
    let file = tokio::fs::File::open(path)
        .await
        .with_context(|| format!("opening index file {}", path.display()))?;
    let mut lines = BufReader::new(file).lines();
    let mut records = Vec::new();
    let mut line_no = 0usize;
    while let Some(line) = lines.next_line().await? {
        line_no += 1;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        match serde_json::from_str::<IndexRecord>(line) {
            Ok(record) => records.push(record),
            Err(e) => {
                log::warn!("skipping invalid index line {line_no} in {}: {e}", path.display());
            }
        }
    }
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn reader_skips_blank_and_corrupt_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("job.jsonl");
        let contents = concat!(
            r#"{"original_url":"a","canonical_url":"a","local_path":"","fetch_status":"success"}"#,
            "\n\n",
            "{not json}\n",
            r#"{"original_url":"b","canonical_url":"b","local_path":"","fetch_status":"skipped"}"#,
            "\n\n",
        );
        std::fs::write(&path, contents).unwrap();

        let records = read_index(&path).await.unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].canonical_url, "a");
        assert_eq!(records[1].fetch_status, FetchStatus::Skipped);
    }

    #[tokio::test]
    async fn reader_errors_on_missing_file() {
        assert!(read_index(Path::new("/nonexistent/job.jsonl")).await.is_err());
    }
}
