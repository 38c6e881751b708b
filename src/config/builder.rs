//! Type-safe builder for `CrawlConfig` using the typestate pattern
//!
//! The builder only exposes `build()` once both required fields (storage
//! root and start URL) have been provided, so an unconfigured crawl cannot
//! be constructed at compile time. Remaining fields carry defaults that
//! `build()` validates and clamps.

use anyhow::{Result, anyhow};
use std::marker::PhantomData;
use std::path::PathBuf;
use std::time::Duration;

use super::types::{CrawlConfig, FallbackPolicy, FetcherKind, MAX_BROWSER_CONCURRENCY};

// Type states for the builder
pub struct WithStorageRoot;
pub struct Complete;

pub struct CrawlConfigBuilder<State = ()> {
    storage_root: Option<PathBuf>,
    job_id: Option<String>,
    start_url: Option<String>,
    max_depth: u32,
    force: bool,
    initial_fetcher: FetcherKind,
    fallback_policy: FallbackPolicy,
    timeout_http: Duration,
    timeout_browser: Duration,
    max_body_size: u64,
    politeness_delay: Duration,
    max_concurrent_http: usize,
    max_concurrent_browser: usize,
    queue_bound: usize,
    redirect_limit: usize,
    allow_private_networks: bool,
    js_shell_max_len: usize,
    js_shell_max_text_nodes: usize,
    _phantom: PhantomData<State>,
}

impl CrawlConfigBuilder<()> {
    #[must_use]
    pub fn new() -> Self {
        Self {
            storage_root: None,
            job_id: None,
            start_url: None,
            max_depth: 1,
            force: false,
            initial_fetcher: FetcherKind::Http,
            fallback_policy: FallbackPolicy::Never,
            timeout_http: Duration::from_secs(30),
            timeout_browser: Duration::from_secs(60),
            max_body_size: 10 * 1024 * 1024,
            politeness_delay: Duration::from_millis(0),
            max_concurrent_http: 10,
            max_concurrent_browser: 2,
            queue_bound: 10_000,
            redirect_limit: 10,
            allow_private_networks: false,
            js_shell_max_len: 1024,
            js_shell_max_text_nodes: 3,
            _phantom: PhantomData,
        }
    }

    pub fn storage_root(self, root: impl Into<PathBuf>) -> CrawlConfigBuilder<WithStorageRoot> {
        CrawlConfigBuilder {
            storage_root: Some(root.into()),
            ..self.retype()
        }
    }
}

impl Default for CrawlConfigBuilder<()> {
    fn default() -> Self {
        Self::new()
    }
}

impl CrawlConfigBuilder<WithStorageRoot> {
    pub fn start_url(self, url: impl Into<String>) -> CrawlConfigBuilder<Complete> {
        CrawlConfigBuilder {
            start_url: Some(url.into()),
            ..self.retype()
        }
    }
}

impl<State> CrawlConfigBuilder<State> {
    // Moves every field into a builder of a different state marker.
    fn retype<Next>(self) -> CrawlConfigBuilder<Next> {
        CrawlConfigBuilder {
            storage_root: self.storage_root,
            job_id: self.job_id,
            start_url: self.start_url,
            max_depth: self.max_depth,
            force: self.force,
            initial_fetcher: self.initial_fetcher,
            fallback_policy: self.fallback_policy,
            timeout_http: self.timeout_http,
            timeout_browser: self.timeout_browser,
            max_body_size: self.max_body_size,
            politeness_delay: self.politeness_delay,
            max_concurrent_http: self.max_concurrent_http,
            max_concurrent_browser: self.max_concurrent_browser,
            queue_bound: self.queue_bound,
            redirect_limit: self.redirect_limit,
            allow_private_networks: self.allow_private_networks,
            js_shell_max_len: self.js_shell_max_len,
            js_shell_max_text_nodes: self.js_shell_max_text_nodes,
            _phantom: PhantomData,
        }
    }

    #[must_use]
    pub fn job_id(mut self, id: impl Into<String>) -> Self {
        self.job_id = Some(id.into());
        self
    }

    #[must_use]
    pub fn max_depth(mut self, depth: u32) -> Self {
        self.max_depth = depth;
        self
    }

    #[must_use]
    pub fn force(mut self, force: bool) -> Self {
        self.force = force;
        self
    }

    #[must_use]
    pub fn initial_fetcher(mut self, kind: FetcherKind) -> Self {
        self.initial_fetcher = kind;
        self
    }

    #[must_use]
    pub fn fallback_policy(mut self, policy: FallbackPolicy) -> Self {
        self.fallback_policy = policy;
        self
    }

    #[must_use]
    pub fn timeout_http(mut self, timeout: Duration) -> Self {
        self.timeout_http = timeout;
        self
    }

    #[must_use]
    pub fn timeout_browser(mut self, timeout: Duration) -> Self {
        self.timeout_browser = timeout;
        self
    }

    #[must_use]
    pub fn max_body_size(mut self, bytes: u64) -> Self {
        self.max_body_size = bytes;
        self
    }

    #[must_use]
    pub fn politeness_delay(mut self, delay: Duration) -> Self {
        self.politeness_delay = delay;
        self
    }

    #[must_use]
    pub fn max_concurrent_http(mut self, n: usize) -> Self {
        self.max_concurrent_http = n;
        self
    }

    #[must_use]
    pub fn max_concurrent_browser(mut self, n: usize) -> Self {
        self.max_concurrent_browser = n;
        self
    }

    #[must_use]
    pub fn queue_bound(mut self, n: usize) -> Self {
        self.queue_bound = n;
        self
    }

    #[must_use]
    pub fn redirect_limit(mut self, n: usize) -> Self {
        self.redirect_limit = n;
        self
    }

    #[must_use]
    pub fn allow_private_networks(mut self, allow: bool) -> Self {
        self.allow_private_networks = allow;
        self
    }

    #[must_use]
    pub fn js_shell_max_len(mut self, len: usize) -> Self {
        self.js_shell_max_len = len;
        self
    }

    #[must_use]
    pub fn js_shell_max_text_nodes(mut self, n: usize) -> Self {
        self.js_shell_max_text_nodes = n;
        self
    }
}

impl CrawlConfigBuilder<Complete> {
    /// Validate and produce the final configuration.
    ///
    /// # Errors
    ///
    /// Returns an error when the storage root cannot be made absolute, the
    /// start URL is empty, or a concurrency/queue knob is zero.
    pub fn build(self) -> Result<CrawlConfig> {
        let storage_root = self
            .storage_root
            .ok_or_else(|| anyhow!("storage root is required"))?;
        let storage_root = if storage_root.is_absolute() {
            storage_root
        } else {
            std::env::current_dir()
                .map_err(|e| anyhow!("cannot resolve working directory: {e}"))?
                .join(storage_root)
        };

        let start_url = self
            .start_url
            .ok_or_else(|| anyhow!("start URL is required"))?;
        if start_url.trim().is_empty() {
            return Err(anyhow!("start URL must not be empty"));
        }

        if self.max_concurrent_http == 0 {
            return Err(anyhow!("max_concurrent_http must be at least 1"));
        }
        if self.max_concurrent_browser == 0 {
            return Err(anyhow!("max_concurrent_browser must be at least 1"));
        }
        if self.queue_bound == 0 {
            return Err(anyhow!("queue_bound must be at least 1"));
        }

        let job_id = self
            .job_id
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

        Ok(CrawlConfig {
            storage_root,
            job_id,
            start_url,
            max_depth: self.max_depth,
            force: self.force,
            initial_fetcher: self.initial_fetcher,
            fallback_policy: self.fallback_policy,
            timeout_http: self.timeout_http,
            timeout_browser: self.timeout_browser,
            max_body_size: self.max_body_size,
            politeness_delay: self.politeness_delay,
            max_concurrent_http: self.max_concurrent_http,
            max_concurrent_browser: self.max_concurrent_browser.min(MAX_BROWSER_CONCURRENCY),
            queue_bound: self.queue_bound,
            redirect_limit: self.redirect_limit,
            allow_private_networks: self.allow_private_networks,
            js_shell_max_len: self.js_shell_max_len,
            js_shell_max_text_nodes: self.js_shell_max_text_nodes,
        })
    }
}
