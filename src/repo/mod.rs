//! Git repository acquirer
//!
//! Thin wrapper over the system `git` client. Without a `doc_subpath` the
//! repository is shallow-cloned whole; with one, a cone-mode sparse
//! checkout pulls only that subtree so large monorepos are never fully
//! downloaded. Either way, one `success` index row is emitted per
//! documentation file found, so repo jobs are searchable through the same
//! two-phase pipeline as crawled sites.

use log::{info, warn};
use std::fmt;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::io::AsyncReadExt;
use tokio::process::Command;
use tokio_util::sync::CancellationToken;

use crate::config::StorageLayout;
use crate::fetch::content_md5;
use crate::index::{FetchStatus, IndexRecord, IndexWriter};
use crate::urlutil::ensure_contained;

/// Parameters for one repository acquisition.
#[derive(Debug, Clone)]
pub struct RepoRequest {
    pub repo_url: String,
    /// Restrict the checkout and indexing to this subtree of the repository.
    pub doc_subpath: Option<String>,
    /// Re-clone even when a checkout already exists.
    pub force: bool,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct RepoStats {
    pub files_indexed: usize,
}

/// Errors from repository acquisition
#[derive(Debug, Clone)]
pub enum RepoError {
    /// A git command failed
    Git(String),
    /// The job's cancellation token fired
    Cancelled,
    /// Other errors
    Other(String),
}

impl fmt::Display for RepoError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Git(msg) => write!(f, "Git error: {msg}"),
            Self::Cancelled => write!(f, "Repository acquisition was cancelled"),
            Self::Other(msg) => write!(f, "Repository error: {msg}"),
        }
    }
}

impl std::error::Error for RepoError {}

impl From<anyhow::Error> for RepoError {
    fn from(err: anyhow::Error) -> Self {
        Self::Other(format!("{err:#}"))
    }
}

/// File extensions treated as documentation.
const DOC_EXTENSIONS: [&str; 5] = ["md", "rst", "txt", "html", "htm"];

/// Default branches tried by the sparse pull, in order.
const COMMON_BRANCHES: [&str; 2] = ["main", "master"];

/// Check out the repository and index its documentation files.
///
/// # Errors
///
/// Returns `RepoError::Cancelled` when the token fires (the in-flight git
/// subprocess is killed), `Git` when a git command fails, and `Other` for
/// storage problems or a `doc_subpath` that is missing or escapes the
/// checkout.
pub async fn acquire_repo(
    layout: &StorageLayout,
    job_id: &str,
    request: &RepoRequest,
    cancel: &CancellationToken,
) -> Result<RepoStats, RepoError> {
    if cancel.is_cancelled() {
        return Err(RepoError::Cancelled);
    }

    layout
        .prepare(job_id)
        .await
        .map_err(|e| RepoError::Other(format!("preparing job directories: {e}")))?;
    let content_root = layout.content_root(job_id);
    let checkout = content_root.join("repo");

    // Validate the subtree before any git work so a hostile subpath never
    // reaches a git invocation.
    let scan_root = match &request.doc_subpath {
        Some(sub) => {
            let joined = checkout.join(sub);
            ensure_contained(&joined, &checkout)?;
            joined
        }
        None => checkout.clone(),
    };

    if checkout.exists() && request.force {
        tokio::fs::remove_dir_all(&checkout)
            .await
            .map_err(|e| RepoError::Other(format!("removing stale checkout: {e}")))?;
    }

    if !checkout.exists() {
        match &request.doc_subpath {
            Some(sub) => sparse_checkout(&request.repo_url, sub, &checkout, cancel).await?,
            None => full_clone(&request.repo_url, &content_root, &checkout, cancel).await?,
        }
    } else {
        info!("reusing existing checkout at {}", checkout.display());
    }

    if !scan_root.is_dir() {
        return Err(RepoError::Other(format!(
            "doc_subpath '{}' does not exist in the repository",
            request.doc_subpath.as_deref().unwrap_or_default()
        )));
    }

    let files = collect_doc_files(scan_root).await;

    let writer = IndexWriter::open(&layout.index_path(job_id))
        .await
        .map_err(RepoError::from)?;
    let mut stats = RepoStats::default();
    for file in files {
        if cancel.is_cancelled() {
            return Err(RepoError::Cancelled);
        }
        let bytes = match tokio::fs::read(&file).await {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!("skipping unreadable file {}: {e}", file.display());
                continue;
            }
        };
        let url = format!("file://{}", file.display());
        let record = IndexRecord::new(url.clone(), url, FetchStatus::Success)
            .with_local_path(file.display().to_string())
            .with_content_hash(Some(content_md5(&bytes)));
        writer.append(&record).await.map_err(RepoError::from)?;
        stats.files_indexed += 1;
    }
    writer.close().await.map_err(RepoError::from)?;

    info!(
        "repo acquisition for {job_id} indexed {} files",
        stats.files_indexed
    );
    Ok(stats)
}

/// Shallow clone of the whole repository.
async fn full_clone(
    repo_url: &str,
    content_root: &Path,
    checkout: &Path,
    cancel: &CancellationToken,
) -> Result<(), RepoError> {
    info!("cloning {repo_url} into {}", checkout.display());
    let dest = checkout.to_string_lossy().into_owned();
    run_git(
        &["clone", "--depth", "1", repo_url, &dest],
        content_root,
        cancel,
    )
    .await
}

/// Cone-mode sparse checkout of one subtree, pulled shallow from the first
/// default branch that exists. The partially initialised checkout is
/// removed when no branch can be pulled.
async fn sparse_checkout(
    repo_url: &str,
    subpath: &str,
    checkout: &Path,
    cancel: &CancellationToken,
) -> Result<(), RepoError> {
    info!(
        "sparse checkout of '{subpath}' from {repo_url} into {}",
        checkout.display()
    );
    tokio::fs::create_dir_all(checkout)
        .await
        .map_err(|e| RepoError::Other(format!("creating checkout directory: {e}")))?;

    run_git(&["init", "--quiet", "-b", "main"], checkout, cancel).await?;
    run_git(&["remote", "add", "origin", repo_url], checkout, cancel).await?;
    run_git(&["sparse-checkout", "init", "--cone"], checkout, cancel).await?;

    // Cone mode wants forward slashes and no surrounding slashes.
    let pattern = subpath.trim().replace('\\', "/");
    let pattern = pattern.trim_matches('/');
    run_git(&["sparse-checkout", "set", pattern], checkout, cancel).await?;

    let mut last_err = None;
    for branch in COMMON_BRANCHES {
        match run_git(
            &["pull", "--depth", "1", "origin", branch],
            checkout,
            cancel,
        )
        .await
        {
            Ok(()) => return Ok(()),
            Err(RepoError::Cancelled) => return Err(RepoError::Cancelled),
            Err(e) => {
                warn!("sparse pull from branch '{branch}' failed: {e}");
                last_err = Some(e);
            }
        }
    }

    let _ = tokio::fs::remove_dir_all(checkout).await;
    Err(last_err
        .unwrap_or_else(|| RepoError::Git("no default branch could be pulled".to_string())))
}

/// Run one git command, racing it against cancellation. A cancelled
/// command is killed rather than left running.
async fn run_git(args: &[&str], cwd: &Path, cancel: &CancellationToken) -> Result<(), RepoError> {
    let mut child = Command::new("git")
        .args(args)
        .current_dir(cwd)
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| RepoError::Git(format!("failed to spawn git {}: {e}", args.join(" "))))?;

    // Drain stderr concurrently so a chatty command cannot fill the pipe.
    let stderr_pipe = child.stderr.take();
    let stderr_task = tokio::spawn(async move {
        let mut buf = String::new();
        if let Some(mut pipe) = stderr_pipe {
            let _ = pipe.read_to_string(&mut buf).await;
        }
        buf
    });

    let waited = tokio::select! {
        () = cancel.cancelled() => None,
        status = child.wait() => Some(status),
    };

    let Some(status) = waited else {
        if let Err(e) = child.kill().await {
            warn!("failed to kill cancelled git process: {e}");
        }
        return Err(RepoError::Cancelled);
    };

    let status =
        status.map_err(|e| RepoError::Git(format!("waiting for git {}: {e}", args.join(" "))))?;
    let stderr = stderr_task.await.unwrap_or_default();
    if status.success() {
        Ok(())
    } else {
        Err(RepoError::Git(format!(
            "git {} failed: {}",
            args.join(" "),
            stderr.trim()
        )))
    }
}

/// Recursively collect documentation files, skipping `.git`, in a stable
/// sorted order so index order is deterministic.
async fn collect_doc_files(root: PathBuf) -> Vec<PathBuf> {
    let mut files = Vec::new();
    let mut stack = vec![root];
    while let Some(dir) = stack.pop() {
        let Ok(mut entries) = tokio::fs::read_dir(&dir).await else {
            continue;
        };
        while let Ok(Some(entry)) = entries.next_entry().await {
            let path = entry.path();
            if path.is_dir() {
                if path.file_name().map(|n| n == ".git").unwrap_or(false) {
                    continue;
                }
                stack.push(path);
            } else if path
                .extension()
                .and_then(|e| e.to_str())
                .map(|e| DOC_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
                .unwrap_or(false)
            {
                files.push(path);
            }
        }
    }
    files.sort();
    files
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::read_index;

    fn init_fixture_repo(dir: &std::path::Path) {
        let run = |args: &[&str], cwd: &std::path::Path| {
            let output = std::process::Command::new("git")
                .args(args)
                .current_dir(cwd)
                .output()
                .expect("git must be available for repo tests");
            assert!(
                output.status.success(),
                "git {args:?} failed: {}",
                String::from_utf8_lossy(&output.stderr)
            );
        };
        run(&["init", "--quiet"], dir);
        std::fs::create_dir_all(dir.join("docs")).unwrap();
        std::fs::write(dir.join("docs/guide.md"), "# Guide\nalpha beta\n").unwrap();
        std::fs::write(dir.join("docs/api.html"), "<html><body>api</body></html>").unwrap();
        std::fs::write(dir.join("main.rs"), "fn main() {}\n").unwrap();
        std::fs::write(dir.join("README.md"), "top-level readme\n").unwrap();
        run(&["add", "."], dir);
        run(
            &[
                "-c",
                "user.email=test@example.invalid",
                "-c",
                "user.name=test",
                "commit",
                "--quiet",
                "-m",
                "fixture",
            ],
            dir,
        );
    }

    #[tokio::test]
    async fn clones_and_indexes_doc_files_only() {
        let source = tempfile::tempdir().unwrap();
        init_fixture_repo(source.path());
        let storage = tempfile::tempdir().unwrap();
        let layout = StorageLayout::new(storage.path().to_path_buf());

        let stats = acquire_repo(
            &layout,
            "repo-job",
            &RepoRequest {
                repo_url: source.path().display().to_string(),
                doc_subpath: None,
                force: false,
            },
            &CancellationToken::new(),
        )
        .await
        .unwrap();

        // guide.md, api.html, and README.md count; main.rs does not.
        assert_eq!(stats.files_indexed, 3);

        let records = read_index(&layout.index_path("repo-job")).await.unwrap();
        assert_eq!(records.len(), 3);
        for record in &records {
            assert_eq!(record.fetch_status, FetchStatus::Success);
            assert!(record.original_url.starts_with("file://"));
            assert!(std::path::Path::new(&record.local_path).is_file());
            assert!(record.content_hash.is_some());
        }
    }

    #[tokio::test]
    async fn sparse_subpath_checks_out_only_that_subtree() {
        let source = tempfile::tempdir().unwrap();
        init_fixture_repo(source.path());
        let storage = tempfile::tempdir().unwrap();
        let layout = StorageLayout::new(storage.path().to_path_buf());

        let stats = acquire_repo(
            &layout,
            "subpath-job",
            &RepoRequest {
                repo_url: source.path().display().to_string(),
                doc_subpath: Some("docs".to_string()),
                force: false,
            },
            &CancellationToken::new(),
        )
        .await
        .unwrap();
        assert_eq!(stats.files_indexed, 2);

        // The sparse checkout must not have materialised files outside the
        // requested cone (top-level files come along in cone mode, but
        // sibling directories would not; here the marker is main.rs being
        // indexed nowhere).
        let records = read_index(&layout.index_path("subpath-job")).await.unwrap();
        assert!(
            records.iter().all(|r| r.local_path.contains("/docs/")),
            "only the docs subtree may be indexed"
        );
    }

    #[tokio::test]
    async fn escaping_subpaths_are_rejected_before_any_git_work() {
        let storage = tempfile::tempdir().unwrap();
        let layout = StorageLayout::new(storage.path().to_path_buf());

        let err = acquire_repo(
            &layout,
            "escape-job",
            &RepoRequest {
                repo_url: "http://example.invalid/repo.git".to_string(),
                doc_subpath: Some("../outside".to_string()),
                force: false,
            },
            &CancellationToken::new(),
        )
        .await
        .unwrap_err();
        assert!(err.to_string().contains("parent-directory"));
        // No checkout directory may have been created for the rejected job.
        assert!(!layout.content_root("escape-job").join("repo").exists());
    }

    #[tokio::test]
    async fn cancellation_aborts_before_cloning() {
        let storage = tempfile::tempdir().unwrap();
        let layout = StorageLayout::new(storage.path().to_path_buf());

        let cancel = CancellationToken::new();
        cancel.cancel();
        let err = acquire_repo(
            &layout,
            "cancelled-job",
            &RepoRequest {
                repo_url: "http://example.invalid/repo.git".to_string(),
                doc_subpath: None,
                force: false,
            },
            &cancel,
        )
        .await
        .unwrap_err();
        assert!(matches!(err, RepoError::Cancelled));
        assert!(!layout.content_root("cancelled-job").join("repo").exists());
    }
}
