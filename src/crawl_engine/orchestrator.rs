//! Main crawl orchestration
//!
//! A single orchestrator task owns the work queue and the visited set;
//! fetch work fans out to spawned tasks bounded by the per-fetcher
//! semaphores. Discovered links flow back through task results, so every
//! enqueue is preceded by a visited-set insert in one place. The queue is
//! bounded; links harvested while it is full wait in a backlog that drains
//! as items are dequeued, which caps queue growth on very large sites.

use dashmap::DashSet;
use futures::StreamExt;
use futures::stream::FuturesUnordered;
use log::{debug, error, info, warn};
use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use url::Url;

use super::politeness::AuthorityPacer;
use super::types::{CrawlError, CrawlStats};
use crate::config::{CrawlConfig, FallbackPolicy, FetcherKind};
use crate::fetch::{
    BrowserFetcher, FetchOutcome, FetchRequest, HttpFetcher, content_md5, decode, heuristics,
    links as link_scan, sweep_temp_files,
};
use crate::index::{FetchStatus, IndexRecord, IndexWriter};
use crate::robots::RobotsPolicy;
use crate::urlutil::{MappedPath, SsrfVerdict, authority, canonicalize, resolve_link, ssrf};
use crate::user_agent_for_job;

/// Recursive same-authority crawl of one start URL into a job-owned
/// content tree and index.
pub struct CrawlEngine {
    config: CrawlConfig,
}

/// State shared between the orchestrator and its fetch tasks.
struct EngineShared {
    config: CrawlConfig,
    content_root: PathBuf,
    robots: RobotsPolicy,
    http: HttpFetcher,
    browser: BrowserFetcher,
    pacer: AuthorityPacer,
    writer: IndexWriter,
    sem_http: Semaphore,
    sem_browser: Semaphore,
    cancel: CancellationToken,
}

/// What one URL's task reports back to the orchestrator.
enum TaskOutput {
    Finished {
        url: Url,
        depth: u32,
        status: FetchStatus,
        links: Vec<String>,
    },
    /// Cancellation fired before the attempt finalised; no row was written.
    Aborted,
}

impl CrawlEngine {
    #[must_use]
    pub fn new(config: CrawlConfig) -> Self {
        Self { config }
    }

    /// Run the crawl to completion (or cancellation).
    ///
    /// Individual URL failures never fail the crawl; they become index
    /// rows. The caller decides the job's terminal state from the returned
    /// stats.
    ///
    /// # Errors
    ///
    /// Returns `CrawlError::Cancelled` when the token fires, configuration
    /// errors for an unusable start URL, and storage errors for an
    /// unusable content root or index file.
    pub async fn run(&self, cancel: CancellationToken) -> Result<CrawlStats, CrawlError> {
        let config = &self.config;
        let job_id = config.job_id().to_string();
        let layout = config.layout();

        let start = canonicalize(config.start_url())
            .map_err(|e| CrawlError::ConfigError(format!("{e:#}")))?;
        let start_authority = authority(&start);

        layout
            .prepare(&job_id)
            .await
            .map_err(|e| CrawlError::StorageError(e.to_string()))?;
        let writer = IndexWriter::open(&layout.index_path(&job_id))
            .await
            .map_err(|e| CrawlError::StorageError(format!("{e:#}")))?;

        let user_agent = user_agent_for_job(&job_id);
        let http = HttpFetcher::new(&user_agent, config.redirect_limit())
            .map_err(|e| CrawlError::Other(format!("{e:#}")))?;
        let robots = RobotsPolicy::new(user_agent.clone(), http.client().clone());

        let shared = Arc::new(EngineShared {
            content_root: layout.content_root(&job_id),
            robots,
            browser: BrowserFetcher::new(user_agent),
            pacer: AuthorityPacer::new(config.politeness_delay()),
            writer,
            sem_http: Semaphore::new(config.max_concurrent_http()),
            sem_browser: Semaphore::new(config.max_concurrent_browser()),
            cancel: cancel.clone(),
            http,
            config: config.clone(),
        });

        info!(
            "starting crawl {job_id}: {start} depth={} fetcher={:?}",
            config.max_depth(),
            config.initial_fetcher()
        );

        let visited: DashSet<String> = DashSet::new();
        visited.insert(start.as_str().to_string());

        let mut queue: VecDeque<(Url, u32)> = VecDeque::new();
        queue.push_back((start.clone(), 0));
        let mut backlog: VecDeque<(Url, u32)> = VecDeque::new();

        let worker_cap = config
            .max_concurrent_http()
            .max(config.max_concurrent_browser());
        let mut active: FuturesUnordered<JoinHandle<TaskOutput>> = FuturesUnordered::new();
        let mut stats = CrawlStats::default();
        let mut cancelled = false;

        loop {
            if !cancelled && shared.cancel.is_cancelled() {
                info!("crawl {job_id} cancelled; draining in-flight fetches");
                cancelled = true;
                queue.clear();
                backlog.clear();
            }

            // Refill the bounded queue from the backlog, then the worker
            // pool from the queue.
            while queue.len() < config.queue_bound() {
                match backlog.pop_front() {
                    Some(item) => queue.push_back(item),
                    None => break,
                }
            }
            while !cancelled && active.len() < worker_cap {
                let Some((url, depth)) = queue.pop_front() else {
                    break;
                };
                let shared = Arc::clone(&shared);
                active.push(tokio::spawn(process_url(shared, url, depth)));
            }

            let Some(joined) = active.next().await else {
                break; // queue drained and nothing in flight
            };
            let output = match joined {
                Ok(output) => output,
                Err(e) => {
                    error!("crawl task panicked: {e}");
                    continue;
                }
            };
            let TaskOutput::Finished {
                url,
                depth,
                status,
                links,
            } = output
            else {
                continue;
            };

            stats.record(status);
            if url == start {
                stats.start_url_status = Some(status);
            }

            if cancelled || depth >= config.max_depth() {
                continue;
            }
            let mut added = 0usize;
            for raw in links {
                let Some(resolved) = resolve_link(&url, &raw) else {
                    continue;
                };
                if authority(&resolved) != start_authority {
                    // Off-authority links are out of scope and dropped
                    // silently, without an index row.
                    continue;
                }
                // Visited insertion happens before the enqueue; a false
                // return means the URL is already queued or done.
                if !visited.insert(resolved.as_str().to_string()) {
                    continue;
                }
                let item = (resolved, depth + 1);
                if queue.len() < config.queue_bound() {
                    queue.push_back(item);
                } else {
                    backlog.push_back(item);
                }
                added += 1;
            }
            debug!("queued {added} new links from {url} at depth {depth}");
        }

        shared.browser.shutdown().await;
        if let Err(e) = shared.writer.close().await {
            warn!("failed to sync index for {job_id}: {e:#}");
        }

        if cancelled {
            sweep_temp_files(&shared.content_root).await;
            return Err(CrawlError::Cancelled);
        }

        info!(
            "crawl {job_id} finished: {} attempted, {} succeeded, {} skipped, {} failed",
            stats.attempted, stats.succeeded, stats.skipped, stats.failed
        );
        Ok(stats)
    }
}

/// Process one URL, racing the pipeline against cancellation.
///
/// The index row is appended after the race so a cancelled attempt writes
/// nothing and a finalised attempt cannot be interrupted mid-line.
async fn process_url(shared: Arc<EngineShared>, url: Url, depth: u32) -> TaskOutput {
    let outcome = tokio::select! {
        () = shared.cancel.cancelled() => return TaskOutput::Aborted,
        outcome = pipeline(&shared, &url) => outcome,
    };

    let status = outcome.status();
    let record = record_for(&url, &outcome);
    if let Err(e) = shared.writer.append(&record).await {
        error!("failed to write index row for {url}: {e:#}");
    }

    let links = if matches!(status, FetchStatus::Success | FetchStatus::Skipped) {
        harvest_links(&url, outcome)
    } else {
        Vec::new()
    };

    TaskOutput::Finished {
        url,
        depth,
        status,
        links,
    }
}

/// The per-URL pipeline: SSRF guard, robots, skip check, politeness,
/// fetch, and the browser fallback. Authority scoping happened at enqueue.
async fn pipeline(shared: &EngineShared, url: &Url) -> FetchOutcome {
    let config = &shared.config;

    match ssrf::check_url(url, config.allow_private_networks()).await {
        SsrfVerdict::Public => {}
        SsrfVerdict::Denied(reason) => {
            return FetchOutcome::failure(FetchStatus::FailedSsrf, reason);
        }
        SsrfVerdict::Unresolvable(reason) => {
            return FetchOutcome::failure(FetchStatus::FailedRequest, reason);
        }
    }

    if !shared.robots.is_allowed(url).await {
        return FetchOutcome::failure(FetchStatus::FailedRobots, "blocked by robots.txt");
    }

    let mapped = MappedPath::new(&shared.content_root, url);

    if !config.force() {
        if let Some(existing) = mapped.existing() {
            match tokio::fs::read(&existing).await {
                Ok(bytes) if !bytes.is_empty() => {
                    let hash = content_md5(&bytes);
                    let body = if existing.extension().map(|e| e == "html").unwrap_or(false) {
                        Some(decode::decode_body(&bytes, None))
                    } else {
                        None
                    };
                    return FetchOutcome {
                        status: Some(FetchStatus::Skipped),
                        http_status: None,
                        content_hash: Some(hash),
                        local_path: None,
                        detected_links: Vec::new(),
                        error_message: Some("file exists and force=false".to_string()),
                        body_html: body,
                    };
                }
                // Unreadable or empty cached body: fall through and
                // re-fetch so depth accounting stays consistent.
                _ => debug!("cached file {} unusable, re-fetching", existing.display()),
            }
        }
    }

    let mut outcome = fetch_with(shared, url, &mapped, config.initial_fetcher()).await;

    if config.initial_fetcher() == FetcherKind::Http
        && outcome.status() == FetchStatus::Success
        && should_upgrade(config, &outcome)
    {
        debug!("upgrading {url} to a browser fetch");
        outcome = fetch_with(shared, url, &mapped, FetcherKind::Browser).await;
    }

    outcome
}

/// Politeness wait, semaphore acquisition, and the fetch itself. The
/// permit drops when this returns, before any link parsing happens.
async fn fetch_with(
    shared: &EngineShared,
    url: &Url,
    mapped: &MappedPath,
    kind: FetcherKind,
) -> FetchOutcome {
    shared.pacer.wait(&authority(url)).await;

    let request = FetchRequest {
        url,
        target: mapped,
        allowed_base: &shared.content_root,
        timeout: match kind {
            FetcherKind::Http => shared.config.timeout_http(),
            FetcherKind::Browser => shared.config.timeout_browser(),
        },
        max_body_size: shared.config.max_body_size(),
    };

    match kind {
        FetcherKind::Http => {
            let Ok(_permit) = shared.sem_http.acquire().await else {
                return FetchOutcome::failure(FetchStatus::FailedOther, "fetch pool closed");
            };
            shared.http.fetch(&request).await
        }
        FetcherKind::Browser => {
            let Ok(_permit) = shared.sem_browser.acquire().await else {
                return FetchOutcome::failure(FetchStatus::FailedOther, "browser pool closed");
            };
            shared.browser.fetch(&request).await
        }
    }
}

fn should_upgrade(config: &CrawlConfig, outcome: &FetchOutcome) -> bool {
    match config.fallback_policy() {
        FallbackPolicy::Never => false,
        FallbackPolicy::Always => true,
        FallbackPolicy::OnJsShell => outcome.body_html.as_deref().is_some_and(|body| {
            heuristics::is_js_shell(
                body,
                config.js_shell_max_len(),
                config.js_shell_max_text_nodes(),
            )
        }),
    }
}

fn record_for(url: &Url, outcome: &FetchOutcome) -> IndexRecord {
    let canonical = url.as_str().to_string();
    let local_path = match outcome.status() {
        FetchStatus::Success => outcome
            .local_path
            .as_ref()
            .map(|p| p.to_string_lossy().into_owned())
            .unwrap_or_default(),
        _ => String::new(),
    };
    IndexRecord::new(canonical.clone(), canonical, outcome.status())
        .with_local_path(local_path)
        .with_content_hash(outcome.content_hash.clone())
        .with_http_status(outcome.http_status)
        .with_error(outcome.error_message.clone())
}

/// Link candidates from a finished attempt. The browser fetcher collects
/// from the live DOM; HTTP and skipped attempts are parsed here, after the
/// fetch permit has been released.
fn harvest_links(url: &Url, outcome: FetchOutcome) -> Vec<String> {
    if !outcome.detected_links.is_empty() {
        return outcome.detected_links;
    }
    match outcome.body_html {
        Some(body) => link_scan::extract_links(&body, url),
        None => Vec::new(),
    }
}
