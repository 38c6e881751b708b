//! Append-only JSONL index writer
//!
//! One writer per job, serialised by an internal mutex. Records are flushed
//! to the OS per append; the file is fsynced once at close, not per record.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tokio::fs::{File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

use super::record::IndexRecord;

pub struct IndexWriter {
    path: PathBuf,
    file: Mutex<File>,
}

impl IndexWriter {
    /// Open (creating or appending to) the index file at `path`.
    ///
    /// # Errors
    ///
    /// Returns an error when the parent directory cannot be created or the
    /// file cannot be opened.
    pub async fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("creating index directory {}", parent.display()))?;
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .await
            .with_context(|| format!("opening index file {}", path.display()))?;
        Ok(Self {
            path: path.to_path_buf(),
            file: Mutex::new(file),
        })
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one record as a single LF-terminated JSON line.
    ///
    /// # Errors
    ///
    /// Returns an error when serialisation or the write fails.
    pub async fn append(&self, record: &IndexRecord) -> Result<()> {
        let mut line = serde_json::to_string(record)
            .with_context(|| format!("serialising index record for {}", record.canonical_url))?;
        line.push('\n');
        let mut file = self.file.lock().await;
        file.write_all(line.as_bytes())
            .await
            .with_context(|| format!("appending to index {}", self.path.display()))?;
        file.flush().await?;
        Ok(())
    }

    /// Flush and fsync the index. Called once when the job's fetch loop has
    /// drained.
    ///
    /// # Errors
    ///
    /// Returns an error when the sync fails.
    pub async fn close(&self) -> Result<()> {
        let file = self.file.lock().await;
        file.sync_all()
            .await
            .with_context(|| format!("syncing index {}", self.path.display()))?;
        Ok(())
    }
}
