//! On-disk layout shared by the crawler, the repo acquirer, and search
//!
//! ```text
//! <root>/
//!   content/<job_id>/<authority>/<slug>-<hash>.<ext>
//!   index/<job_id>.jsonl
//! ```

use std::path::{Path, PathBuf};

/// Resolves job-scoped content and index paths under a storage root.
///
/// A job exclusively owns its content directory and index file for its
/// lifetime; distinct job ids therefore never share files.
#[derive(Debug, Clone)]
pub struct StorageLayout {
    root: PathBuf,
}

impl StorageLayout {
    /// A layout rooted at `root`, normalised to an absolute path so that
    /// containment checks against recorded content paths are meaningful.
    #[must_use]
    pub fn new(root: PathBuf) -> Self {
        let root = if root.is_absolute() {
            root
        } else {
            std::env::current_dir()
                .map(|cwd| cwd.join(&root))
                .unwrap_or(root)
        };
        Self { root }
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Content tree owned by one job.
    #[must_use]
    pub fn content_root(&self, job_id: &str) -> PathBuf {
        self.root.join("content").join(job_id)
    }

    /// Append-only JSONL index owned by one job.
    #[must_use]
    pub fn index_path(&self, job_id: &str) -> PathBuf {
        self.root.join("index").join(format!("{job_id}.jsonl"))
    }

    /// Create the content and index directories for a job.
    ///
    /// # Errors
    ///
    /// Returns an error when a directory cannot be created.
    pub async fn prepare(&self, job_id: &str) -> std::io::Result<()> {
        tokio::fs::create_dir_all(self.content_root(job_id)).await?;
        tokio::fs::create_dir_all(self.root.join("index")).await?;
        Ok(())
    }
}
