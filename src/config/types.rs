//! Core configuration types for crawl jobs
//!
//! This module contains the main `CrawlConfig` struct and its associated
//! enums that define the parameters of a single acquisition run.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Which fetcher a crawl starts with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum FetcherKind {
    /// Plain HTTP fetch via the shared client.
    #[default]
    Http,
    /// Full browser render via headless Chrome.
    Browser,
}

/// When to upgrade a successful HTTP fetch to a browser-rendered fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum FallbackPolicy {
    /// Never retry with the browser.
    #[default]
    Never,
    /// Retry when the HTTP body looks like an empty client-side app shell.
    OnJsShell,
    /// Retry every successful HTTP fetch with the browser.
    Always,
}

/// Hard ceiling on concurrent browser pages, regardless of configuration.
pub const MAX_BROWSER_CONCURRENCY: usize = 4;

/// Main configuration for a single crawl job.
///
/// Construct through [`CrawlConfig::builder`]; the builder normalises and
/// validates the fields so the engine can rely on them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrawlConfig {
    /// Root directory holding `content/` and `index/`.
    ///
    /// **INVARIANT:** always an absolute path (normalised in the builder),
    /// so containment checks against it are meaningful.
    pub(crate) storage_root: PathBuf,
    pub(crate) job_id: String,
    pub(crate) start_url: String,
    pub(crate) max_depth: u32,
    pub(crate) force: bool,
    pub(crate) initial_fetcher: FetcherKind,
    pub(crate) fallback_policy: FallbackPolicy,
    pub(crate) timeout_http: Duration,
    pub(crate) timeout_browser: Duration,
    pub(crate) max_body_size: u64,
    pub(crate) politeness_delay: Duration,
    pub(crate) max_concurrent_http: usize,
    pub(crate) max_concurrent_browser: usize,
    pub(crate) queue_bound: usize,
    pub(crate) redirect_limit: usize,

    /// Allow fetching hosts that resolve to private or loopback addresses.
    ///
    /// Only meant for test fixtures served from localhost; leave off for
    /// anything that takes URLs from the outside.
    pub(crate) allow_private_networks: bool,

    /// Bodies at or above this length are never treated as JS shells.
    pub(crate) js_shell_max_len: usize,
    /// Maximum non-whitespace text nodes outside the app root for a JS shell.
    pub(crate) js_shell_max_text_nodes: usize,
}

impl CrawlConfig {
    #[must_use]
    pub fn builder() -> super::builder::CrawlConfigBuilder {
        super::builder::CrawlConfigBuilder::new()
    }

    #[must_use]
    pub fn storage_root(&self) -> &Path {
        &self.storage_root
    }

    #[must_use]
    pub fn job_id(&self) -> &str {
        &self.job_id
    }

    #[must_use]
    pub fn start_url(&self) -> &str {
        &self.start_url
    }

    #[must_use]
    pub fn max_depth(&self) -> u32 {
        self.max_depth
    }

    #[must_use]
    pub fn force(&self) -> bool {
        self.force
    }

    #[must_use]
    pub fn initial_fetcher(&self) -> FetcherKind {
        self.initial_fetcher
    }

    #[must_use]
    pub fn fallback_policy(&self) -> FallbackPolicy {
        self.fallback_policy
    }

    #[must_use]
    pub fn timeout_http(&self) -> Duration {
        self.timeout_http
    }

    #[must_use]
    pub fn timeout_browser(&self) -> Duration {
        self.timeout_browser
    }

    #[must_use]
    pub fn max_body_size(&self) -> u64 {
        self.max_body_size
    }

    #[must_use]
    pub fn politeness_delay(&self) -> Duration {
        self.politeness_delay
    }

    #[must_use]
    pub fn max_concurrent_http(&self) -> usize {
        self.max_concurrent_http
    }

    #[must_use]
    pub fn max_concurrent_browser(&self) -> usize {
        self.max_concurrent_browser
    }

    #[must_use]
    pub fn queue_bound(&self) -> usize {
        self.queue_bound
    }

    #[must_use]
    pub fn redirect_limit(&self) -> usize {
        self.redirect_limit
    }

    #[must_use]
    pub fn allow_private_networks(&self) -> bool {
        self.allow_private_networks
    }

    #[must_use]
    pub fn js_shell_max_len(&self) -> usize {
        self.js_shell_max_len
    }

    #[must_use]
    pub fn js_shell_max_text_nodes(&self) -> usize {
        self.js_shell_max_text_nodes
    }

    /// Storage layout derived from this config's root.
    #[must_use]
    pub fn layout(&self) -> super::layout::StorageLayout {
        super::layout::StorageLayout::new(self.storage_root.clone())
    }
}
