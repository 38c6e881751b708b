//! Browser-rendered fetcher
//!
//! Drives headless Chrome over CDP. The browser process is launched lazily
//! on first use and shared for the rest of the job; the engine bounds
//! concurrent pages with its own semaphore. The serialised document
//! (`document.documentElement.outerHTML`) is the body, and link candidates
//! come from the live DOM so client-rendered links are seen.

use anyhow::{Context, Result};
use chromiumoxide::browser::{Browser, BrowserConfig};
use futures::StreamExt;
use log::{debug, warn};
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

use super::{FetchOutcome, FetchRequest, content_md5, save_atomic};
use crate::index::FetchStatus;
use crate::urlutil::ensure_contained;

/// Collects candidate link URLs from the rendered DOM, applying the same
/// filter as the HTTP-side extractor: the raw attribute decides whether a
/// link is navigational (empty, fragment-only, and `javascript:`/`mailto:`/
/// `data:`/`tel:` values are dropped), while the element property supplies
/// the page-resolved absolute URL.
const LINK_SCRIPT: &str = r"
(() => {
  const urls = [];
  const skipped = /^(javascript:|mailto:|data:|tel:)/i;
  const push = (raw, resolved) => {
    if (!raw) { return; }
    const trimmed = raw.trim();
    if (!trimmed || trimmed.startsWith('#') || skipped.test(trimmed)) { return; }
    if (resolved) { urls.push(resolved); }
  };
  document.querySelectorAll('a[href]').forEach((el) => push(el.getAttribute('href'), el.href));
  document.querySelectorAll('frame[src], iframe[src], script[src]').forEach((el) => push(el.getAttribute('src'), el.src));
  return urls;
})()
";

pub struct BrowserFetcher {
    user_agent: String,
    browser: Mutex<Option<Arc<Browser>>>,
    handler_task: Mutex<Option<JoinHandle<()>>>,
}

impl BrowserFetcher {
    #[must_use]
    pub fn new(user_agent: String) -> Self {
        Self {
            user_agent,
            browser: Mutex::new(None),
            handler_task: Mutex::new(None),
        }
    }

    /// Launch (or reuse) the shared browser process.
    async fn browser(&self) -> Result<Arc<Browser>> {
        let mut slot = self.browser.lock().await;
        if let Some(browser) = slot.as_ref() {
            return Ok(Arc::clone(browser));
        }

        let config = BrowserConfig::builder()
            .arg(format!("--user-agent={}", self.user_agent))
            .arg("--no-first-run")
            .arg("--no-default-browser-check")
            .arg("--disable-background-networking")
            .arg("--mute-audio")
            .arg("--hide-scrollbars")
            .build()
            .map_err(|e| anyhow::anyhow!("failed to build browser config: {e}"))?;

        let (browser, mut handler) = Browser::launch(config)
            .await
            .context("failed to launch browser")?;

        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    debug!("browser handler event error: {e}");
                }
            }
            debug!("browser handler task finished");
        });

        let browser = Arc::new(browser);
        *slot = Some(Arc::clone(&browser));
        *self.handler_task.lock().await = Some(handler_task);
        Ok(browser)
    }

    /// Close the browser process if one was launched.
    pub async fn shutdown(&self) {
        let taken = self.browser.lock().await.take();
        if let Some(arc) = taken {
            match Arc::try_unwrap(arc) {
                Ok(mut browser) => {
                    if let Err(e) = browser.close().await {
                        warn!("failed to close browser: {e}");
                    }
                    let _ = browser.wait().await;
                }
                Err(_) => {
                    warn!("browser still referenced at shutdown; letting drop clean up");
                }
            }
        }
        if let Some(task) = self.handler_task.lock().await.take() {
            task.abort();
        }
    }

    /// Fetch one URL through the browser. Never panics; every path returns
    /// an outcome.
    pub async fn fetch(&self, req: &FetchRequest<'_>) -> FetchOutcome {
        if let Err(e) = ensure_contained(req.target.dir(), req.allowed_base) {
            return FetchOutcome::failure(FetchStatus::FailedOther, e.to_string());
        }

        let browser = match self.browser().await {
            Ok(browser) => browser,
            Err(e) => {
                return FetchOutcome::failure(
                    FetchStatus::FailedOther,
                    format!("browser unavailable: {e:#}"),
                );
            }
        };

        let page = match browser.new_page("about:blank").await {
            Ok(page) => page,
            Err(e) => {
                return FetchOutcome::failure(
                    FetchStatus::FailedOther,
                    format!("failed to open page: {e}"),
                );
            }
        };

        let rendered = tokio::time::timeout(req.timeout, async {
            page.goto(req.url.as_str())
                .await
                .map_err(|e| anyhow::anyhow!("navigation failed: {e}"))?;
            page.wait_for_navigation()
                .await
                .map_err(|e| anyhow::anyhow!("page load failed: {e}"))?;
            let html = page
                .content()
                .await
                .map_err(|e| anyhow::anyhow!("could not serialise document: {e}"))?;
            let links: Vec<String> = page
                .evaluate(LINK_SCRIPT)
                .await
                .map_err(|e| anyhow::anyhow!("link collection failed: {e}"))?
                .into_value()
                .unwrap_or_default();
            Ok::<_, anyhow::Error>((html, links))
        })
        .await;

        if let Err(e) = page.close().await {
            debug!("failed to close page for {}: {e}", req.url);
        }

        let (html, links) = match rendered {
            Err(_) => {
                return FetchOutcome::failure(
                    FetchStatus::FailedRequest,
                    format!("browser navigation timed out after {:?}", req.timeout),
                );
            }
            Ok(Err(e)) => {
                return FetchOutcome::failure(FetchStatus::FailedRequest, format!("{e:#}"));
            }
            Ok(Ok(rendered)) => rendered,
        };

        let body = html.as_bytes();
        if body.len() as u64 > req.max_body_size {
            return FetchOutcome::failure(
                FetchStatus::FailedToobig,
                format!("rendered body exceeds limit {}", req.max_body_size),
            );
        }

        if super::heuristics::looks_paywalled(&html) {
            return FetchOutcome::failure(
                FetchStatus::FailedPaywall,
                "page looks like a login or paywall interstitial",
            );
        }

        let target_path = req.target.with_ext("html");
        let hash = content_md5(body);
        if let Err(e) = save_atomic(body, &target_path, req.allowed_base).await {
            warn!("failed to save {} to {}: {e:#}", req.url, target_path.display());
            return FetchOutcome::failure(FetchStatus::FailedOther, format!("save failed: {e:#}"));
        }

        let mut seen = HashSet::new();
        let detected_links = links
            .into_iter()
            .filter(|link| seen.insert(link.clone()))
            .collect();

        FetchOutcome {
            status: Some(FetchStatus::Success),
            http_status: None,
            content_hash: Some(hash),
            local_path: Some(target_path),
            detected_links,
            error_message: None,
            body_html: Some(html),
        }
    }
}
