//! Robots exclusion policy, cached per authority for the life of a job
//!
//! Each authority's `robots.txt` is fetched at most once per job under
//! normal conditions. A 200 caches the body for matching; 4xx (except 429)
//! means the site publishes no rules and is cached as allow-all; 429, 5xx,
//! and network errors are treated as allow-all but marked transient so the
//! file is re-tried at most once per minute instead of on every URL.

use dashmap::DashMap;
use log::{debug, warn};
use robotstxt::DefaultMatcher;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use url::Url;

use crate::urlutil::authority;

/// Minimum gap between robots.txt re-fetches after a transient failure.
const TRANSIENT_RETRY_AFTER: Duration = Duration::from_secs(60);

#[derive(Debug, Clone)]
struct RobotsEntry {
    /// Parsed-on-demand robots.txt body; `None` means allow-all.
    body: Option<String>,
    fetched_at: Instant,
    /// Entry came from a 429/5xx/network failure and may be re-fetched.
    transient: bool,
}

impl RobotsEntry {
    fn expired(&self) -> bool {
        self.transient && self.fetched_at.elapsed() >= TRANSIENT_RETRY_AFTER
    }
}

/// Per-job robots policy.
///
/// The per-authority mutex means concurrent workers asking about the same
/// authority wait for a single fetch rather than racing their own.
pub struct RobotsPolicy {
    user_agent: String,
    client: reqwest::Client,
    cache: DashMap<String, Arc<Mutex<Option<RobotsEntry>>>>,
}

impl RobotsPolicy {
    #[must_use]
    pub fn new(user_agent: String, client: reqwest::Client) -> Self {
        Self {
            user_agent,
            client,
            cache: DashMap::new(),
        }
    }

    /// Whether this job's user agent may fetch `url`.
    pub async fn is_allowed(&self, url: &Url) -> bool {
        let auth = authority(url);
        let slot = self
            .cache
            .entry(auth.clone())
            .or_insert_with(|| Arc::new(Mutex::new(None)))
            .clone();

        let mut entry = slot.lock().await;
        let needs_fetch = match entry.as_ref() {
            None => true,
            Some(cached) => cached.expired(),
        };
        if needs_fetch {
            *entry = Some(self.fetch_rules(url, &auth).await);
        }

        match entry.as_ref().and_then(|e| e.body.as_deref()) {
            Some(body) => {
                let mut matcher = DefaultMatcher::default();
                matcher.one_agent_allowed_by_robots(body, &self.user_agent, url.as_str())
            }
            None => true,
        }
    }

    async fn fetch_rules(&self, url: &Url, auth: &str) -> RobotsEntry {
        let robots_url = format!("{}://{auth}/robots.txt", url.scheme());
        debug!("fetching robots.txt from {robots_url}");

        let response = self
            .client
            .get(&robots_url)
            .timeout(Duration::from_secs(15))
            .send()
            .await;

        let now = Instant::now();
        match response {
            Ok(resp) if resp.status().is_success() => match resp.text().await {
                Ok(body) => RobotsEntry {
                    body: Some(body),
                    fetched_at: now,
                    transient: false,
                },
                Err(e) => {
                    warn!("failed reading robots.txt body for {auth}: {e}; allowing");
                    RobotsEntry {
                        body: None,
                        fetched_at: now,
                        transient: true,
                    }
                }
            },
            Ok(resp)
                if resp.status().is_client_error()
                    && resp.status() != reqwest::StatusCode::TOO_MANY_REQUESTS =>
            {
                debug!(
                    "robots.txt absent for {auth} ({}); allowing all",
                    resp.status()
                );
                RobotsEntry {
                    body: None,
                    fetched_at: now,
                    transient: false,
                }
            }
            Ok(resp) => {
                warn!(
                    "robots.txt fetch for {auth} returned {}; allowing with back-off",
                    resp.status()
                );
                RobotsEntry {
                    body: None,
                    fetched_at: now,
                    transient: true,
                }
            }
            Err(e) => {
                warn!("robots.txt fetch failed for {auth}: {e}; allowing with back-off");
                RobotsEntry {
                    body: None,
                    fetched_at: now,
                    transient: true,
                }
            }
        }
    }
}
