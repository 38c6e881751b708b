//! Job admission, background execution, and status tracking
//!
//! The manager owns every job record for the life of the process. A job is
//! admitted as `pending`, moves to `running` when its worker starts, and
//! makes exactly one terminal transition after its engine returns. Nothing
//! survives a restart; durability is out of scope.

use log::{error, info};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::types::{JobError, JobKind, JobRecord, JobRequest, JobStatus, sanitize_job_id};
use crate::config::{CrawlConfig, FetcherKind, StorageLayout};
use crate::crawl_engine::{CrawlEngine, CrawlError};
use crate::index::MAX_ERROR_LEN;
use crate::repo::{self, RepoError, RepoRequest};

struct JobEntry {
    record: JobRecord,
    cancel: CancellationToken,
    handle: Option<JoinHandle<()>>,
}

type JobMap = Arc<Mutex<HashMap<String, JobEntry>>>;

/// Manager for every job in this process.
#[derive(Clone)]
pub struct JobManager {
    layout: StorageLayout,
    jobs: JobMap,
}

impl JobManager {
    #[must_use]
    pub fn new(layout: StorageLayout) -> Self {
        Self {
            layout,
            jobs: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    #[must_use]
    pub fn layout(&self) -> &StorageLayout {
        &self.layout
    }

    /// Admit a job and start its background worker.
    ///
    /// # Errors
    ///
    /// Rejects requests with missing parameters, unusable ids, and ids
    /// already in use.
    pub async fn submit(&self, request: JobRequest) -> Result<String, JobError> {
        let id = match &request.id {
            Some(raw) => sanitize_job_id(raw)
                .ok_or_else(|| JobError::Invalid(format!("id '{raw}' sanitises to nothing")))?,
            None => uuid::Uuid::new_v4().to_string(),
        };

        match request.kind {
            JobKind::Web | JobKind::Browser => {
                if request.url.as_deref().map(str::trim).unwrap_or("").is_empty() {
                    return Err(JobError::Invalid("url is required for web jobs".into()));
                }
            }
            JobKind::Repo => {
                if request
                    .repo_url
                    .as_deref()
                    .map(str::trim)
                    .unwrap_or("")
                    .is_empty()
                {
                    return Err(JobError::Invalid("repo_url is required for repo jobs".into()));
                }
            }
        }

        let mut jobs = self.jobs.lock().await;
        if jobs.contains_key(&id) {
            return Err(JobError::Duplicate(id));
        }

        let cancel = CancellationToken::new();
        let record = JobRecord::pending(id.clone(), request.kind);
        // Spawned under the map lock, so the worker's first status update
        // waits for this entry to be inserted.
        let handle = tokio::spawn(run_job(
            Arc::clone(&self.jobs),
            self.layout.clone(),
            id.clone(),
            request,
            cancel.clone(),
        ));
        jobs.insert(
            id.clone(),
            JobEntry {
                record,
                cancel,
                handle: Some(handle),
            },
        );
        info!("admitted job {id}");
        Ok(id)
    }

    /// Snapshot of a job's record.
    pub async fn status(&self, id: &str) -> Option<JobRecord> {
        self.jobs.lock().await.get(id).map(|e| e.record.clone())
    }

    /// Cancel a running job. Returns false for unknown ids.
    pub async fn cancel(&self, id: &str) -> bool {
        match self.jobs.lock().await.get(id) {
            Some(entry) => {
                entry.cancel.cancel();
                true
            }
            None => false,
        }
    }

    /// Wait for a job's worker to finish and return the terminal record.
    pub async fn wait(&self, id: &str) -> Option<JobRecord> {
        let handle = {
            let mut jobs = self.jobs.lock().await;
            jobs.get_mut(id)?.handle.take()
        };
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                error!("job {id} worker panicked: {e}");
            }
        }
        self.status(id).await
    }
}

async fn run_job(
    jobs: JobMap,
    layout: StorageLayout,
    id: String,
    request: JobRequest,
    cancel: CancellationToken,
) {
    update(&jobs, &id, |record| {
        record.status = JobStatus::Running;
        record.start_time = Some(chrono::Utc::now());
    })
    .await;

    let outcome = match request.kind {
        JobKind::Web | JobKind::Browser => run_crawl(&layout, &id, &request, cancel).await,
        JobKind::Repo => run_repo(&layout, &id, &request, cancel).await,
    };

    update(&jobs, &id, |record| {
        record.end_time = Some(chrono::Utc::now());
        match outcome {
            Ok(message) => {
                record.status = JobStatus::Completed;
                record.message = Some(message);
            }
            Err((message, detail)) => {
                record.status = JobStatus::Failed;
                record.message = Some(message);
                record.error_detail = detail.map(truncate_detail);
            }
        }
    })
    .await;
}

type JobOutcome = Result<String, (String, Option<String>)>;

async fn run_crawl(
    layout: &StorageLayout,
    id: &str,
    request: &JobRequest,
    cancel: CancellationToken,
) -> JobOutcome {
    let config = match crawl_config_for(layout, id, request) {
        Ok(config) => config,
        Err(e) => return Err(("invalid crawl configuration".to_string(), Some(e))),
    };

    let engine = CrawlEngine::new(config);
    match engine.run(cancel).await {
        Ok(stats) if stats.start_url_failed() => {
            let reason = stats
                .start_url_status
                .and_then(|s| serde_json::to_value(s).ok())
                .and_then(|v| v.as_str().map(str::to_owned))
                .unwrap_or_else(|| "unknown".to_string());
            Err((format!("start URL failed ({reason})"), None))
        }
        Ok(stats) => Ok(format!(
            "crawl completed: {} fetched, {} skipped, {} failed",
            stats.succeeded, stats.skipped, stats.failed
        )),
        Err(CrawlError::Cancelled) => Err(("cancelled".to_string(), None)),
        Err(e) => Err(("crawl failed".to_string(), Some(e.to_string()))),
    }
}

async fn run_repo(
    layout: &StorageLayout,
    id: &str,
    request: &JobRequest,
    cancel: CancellationToken,
) -> JobOutcome {
    let repo_request = RepoRequest {
        repo_url: request.repo_url.clone().unwrap_or_default(),
        doc_subpath: request.doc_subpath.clone(),
        force: request.force,
    };
    match repo::acquire_repo(layout, id, &repo_request, &cancel).await {
        Ok(stats) => Ok(format!(
            "repository acquired: {} files indexed",
            stats.files_indexed
        )),
        Err(RepoError::Cancelled) => Err(("cancelled".to_string(), None)),
        Err(e) => Err((
            "repository acquisition failed".to_string(),
            Some(e.to_string()),
        )),
    }
}

fn crawl_config_for(
    layout: &StorageLayout,
    id: &str,
    request: &JobRequest,
) -> Result<CrawlConfig, String> {
    let url = request.url.clone().unwrap_or_default();
    let mut builder = CrawlConfig::builder()
        .storage_root(layout.root().to_path_buf())
        .start_url(url)
        .job_id(id.to_string())
        .max_depth(request.depth)
        .force(request.force)
        .initial_fetcher(match request.kind {
            JobKind::Browser => FetcherKind::Browser,
            _ => FetcherKind::Http,
        })
        .allow_private_networks(request.allow_private_networks);

    if let Some(secs) = request.timeout_http_secs {
        builder = builder.timeout_http(Duration::from_secs(secs));
    }
    if let Some(secs) = request.timeout_browser_secs {
        builder = builder.timeout_browser(Duration::from_secs(secs));
    }
    if let Some(bytes) = request.max_body_size {
        builder = builder.max_body_size(bytes);
    }
    if let Some(ms) = request.politeness_delay_ms {
        builder = builder.politeness_delay(Duration::from_millis(ms));
    }
    if let Some(policy) = request.fallback {
        builder = builder.fallback_policy(policy);
    }

    builder.build().map_err(|e| format!("{e:#}"))
}

fn truncate_detail(mut detail: String) -> String {
    if detail.len() > MAX_ERROR_LEN {
        let mut cut = MAX_ERROR_LEN;
        while cut > 0 && !detail.is_char_boundary(cut) {
            cut -= 1;
        }
        detail.truncate(cut);
    }
    detail
}

async fn update(jobs: &JobMap, id: &str, apply: impl FnOnce(&mut JobRecord)) {
    let mut jobs = jobs.lock().await;
    match jobs.get_mut(id) {
        Some(entry) => apply(&mut entry.record),
        None => error!("job {id} vanished from the manager"),
    }
}
