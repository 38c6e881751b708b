//! Lightweight HTTP fetcher
//!
//! Streams the response body with the size cap enforced mid-stream, decodes
//! HTML with charset sniffing, applies the paywall heuristic, and writes
//! saved bytes via an atomic rename. Redirects are followed by the shared
//! client up to the configured hop limit; a chain that ends outside the
//! requested authority is a failed request, not a save.

use anyhow::{Context, Result};
use futures::StreamExt;
use log::{debug, warn};

use super::{FetchOutcome, FetchRequest, content_md5, save_atomic};
use crate::index::FetchStatus;
use crate::urlutil::{authority, ensure_contained, ext_for_content_type};

pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    /// Build the fetcher with the per-job client.
    ///
    /// # Errors
    ///
    /// Returns an error when the TLS backend cannot be initialised.
    pub fn new(user_agent: &str, redirect_limit: usize) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(user_agent)
            .redirect(reqwest::redirect::Policy::limited(redirect_limit))
            .build()
            .context("building HTTP client")?;
        Ok(Self { client })
    }

    #[must_use]
    pub fn client(&self) -> &reqwest::Client {
        &self.client
    }

    /// Fetch one URL. Never panics; every path returns an outcome.
    pub async fn fetch(&self, req: &FetchRequest<'_>) -> FetchOutcome {
        if let Err(e) = ensure_contained(req.target.dir(), req.allowed_base) {
            return FetchOutcome::failure(FetchStatus::FailedOther, e.to_string());
        }

        let response = match self
            .client
            .get(req.url.as_str())
            .timeout(req.timeout)
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) if e.is_timeout() => {
                return FetchOutcome::failure(
                    FetchStatus::FailedRequest,
                    format!("request timed out: {e}"),
                );
            }
            Err(e) => {
                return FetchOutcome::failure(
                    FetchStatus::FailedRequest,
                    format!("request error: {e}"),
                );
            }
        };

        let http_status = Some(response.status().as_u16());

        // The client follows redirects internally, so the final URL must be
        // re-checked: a chain that left the authority is not saved.
        let final_authority = authority(response.url());
        if final_authority != authority(req.url) {
            return FetchOutcome::failure(
                FetchStatus::FailedRequest,
                format!("redirect chain left the authority (ended at {})", response.url()),
            )
            .with_http_status(http_status);
        }

        if !response.status().is_success() {
            return FetchOutcome::failure(
                FetchStatus::FailedRequest,
                format!("HTTP error {}", response.status()),
            )
            .with_http_status(http_status);
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_owned);

        if let Some(declared) = response.content_length() {
            if declared > req.max_body_size {
                return FetchOutcome::failure(
                    FetchStatus::FailedToobig,
                    format!(
                        "declared length {declared} exceeds limit {}",
                        req.max_body_size
                    ),
                )
                .with_http_status(http_status);
            }
        }

        let mut body: Vec<u8> = Vec::new();
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = match chunk {
                Ok(chunk) => chunk,
                Err(e) => {
                    return FetchOutcome::failure(
                        FetchStatus::FailedRequest,
                        format!("body read error: {e}"),
                    )
                    .with_http_status(http_status);
                }
            };
            if body.len() as u64 + chunk.len() as u64 > req.max_body_size {
                return FetchOutcome::failure(
                    FetchStatus::FailedToobig,
                    format!("body exceeds limit {}", req.max_body_size),
                )
                .with_http_status(http_status);
            }
            body.extend_from_slice(&chunk);
        }

        let is_html = content_type
            .as_deref()
            .map(|ct| ct.contains("html"))
            .unwrap_or(false);

        let body_html = if is_html {
            let charset = content_type
                .as_deref()
                .and_then(super::decode::charset_from_content_type);
            Some(super::decode::decode_body(&body, charset))
        } else {
            None
        };

        if let Some(text) = &body_html {
            if super::heuristics::looks_paywalled(text) {
                return FetchOutcome::failure(
                    FetchStatus::FailedPaywall,
                    "page looks like a login or paywall interstitial",
                )
                .with_http_status(http_status);
            }
        }

        let ext = ext_for_content_type(content_type.as_deref());
        let target_path = req.target.with_ext(ext);
        let hash = content_md5(&body);

        if let Err(e) = save_atomic(&body, &target_path, req.allowed_base).await {
            warn!("failed to save {} to {}: {e:#}", req.url, target_path.display());
            return FetchOutcome::failure(FetchStatus::FailedOther, format!("save failed: {e:#}"))
                .with_http_status(http_status);
        }
        debug!("saved {} ({} bytes) to {}", req.url, body.len(), target_path.display());

        FetchOutcome {
            status: Some(FetchStatus::Success),
            http_status,
            content_hash: Some(hash),
            local_path: Some(target_path),
            detected_links: Vec::new(),
            error_message: None,
            body_html,
        }
    }
}
