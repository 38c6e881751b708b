//! Tests for the type-safe configuration builder

use std::time::Duration;

use docscrape::{CrawlConfig, FallbackPolicy, FetcherKind};
use tempfile::TempDir;

#[test]
fn builder_requires_storage_root_and_start_url() {
    // These should not compile if uncommented - the typestate only
    // exposes build() once both required fields are set.
    // let config = CrawlConfig::builder().build();
    // let config = CrawlConfig::builder().storage_root("/tmp").build();

    let temp_dir = TempDir::new().unwrap();
    let config = CrawlConfig::builder()
        .storage_root(temp_dir.path().to_path_buf())
        .start_url("https://example.com/docs")
        .build()
        .unwrap();

    assert_eq!(config.storage_root(), temp_dir.path());
    assert_eq!(config.start_url(), "https://example.com/docs");
}

#[test]
fn optional_fields_have_documented_defaults() {
    let temp_dir = TempDir::new().unwrap();
    let config = CrawlConfig::builder()
        .storage_root(temp_dir.path().to_path_buf())
        .start_url("https://example.com")
        .build()
        .unwrap();

    assert_eq!(config.max_depth(), 1);
    assert!(!config.force());
    assert_eq!(config.initial_fetcher(), FetcherKind::Http);
    assert_eq!(config.fallback_policy(), FallbackPolicy::Never);
    assert_eq!(config.timeout_http(), Duration::from_secs(30));
    assert_eq!(config.timeout_browser(), Duration::from_secs(60));
    assert_eq!(config.max_body_size(), 10 * 1024 * 1024);
    assert_eq!(config.max_concurrent_http(), 10);
    assert_eq!(config.max_concurrent_browser(), 2);
    assert_eq!(config.queue_bound(), 10_000);
    assert_eq!(config.redirect_limit(), 10);
    assert!(!config.allow_private_networks());
    assert_eq!(config.js_shell_max_len(), 1024);
    assert_eq!(config.js_shell_max_text_nodes(), 3);
}

#[test]
fn browser_concurrency_is_clamped_to_the_ceiling() {
    let temp_dir = TempDir::new().unwrap();
    let config = CrawlConfig::builder()
        .storage_root(temp_dir.path().to_path_buf())
        .start_url("https://example.com")
        .max_concurrent_browser(16)
        .build()
        .unwrap();
    assert_eq!(config.max_concurrent_browser(), 4);
}

#[test]
fn zero_concurrency_is_rejected() {
    let temp_dir = TempDir::new().unwrap();
    assert!(
        CrawlConfig::builder()
            .storage_root(temp_dir.path().to_path_buf())
            .start_url("https://example.com")
            .max_concurrent_http(0)
            .build()
            .is_err()
    );
    assert!(
        CrawlConfig::builder()
            .storage_root(temp_dir.path().to_path_buf())
            .start_url("https://example.com")
            .queue_bound(0)
            .build()
            .is_err()
    );
}

#[test]
fn blank_start_url_is_rejected() {
    let temp_dir = TempDir::new().unwrap();
    assert!(
        CrawlConfig::builder()
            .storage_root(temp_dir.path().to_path_buf())
            .start_url("   ")
            .build()
            .is_err()
    );
}

#[test]
fn relative_storage_roots_become_absolute() {
    let config = CrawlConfig::builder()
        .storage_root("relative-data")
        .start_url("https://example.com")
        .build()
        .unwrap();
    assert!(config.storage_root().is_absolute());
    assert!(config.layout().root().is_absolute());
}

#[test]
fn generated_job_ids_are_distinct() {
    let temp_dir = TempDir::new().unwrap();
    let a = CrawlConfig::builder()
        .storage_root(temp_dir.path().to_path_buf())
        .start_url("https://example.com")
        .build()
        .unwrap();
    let b = CrawlConfig::builder()
        .storage_root(temp_dir.path().to_path_buf())
        .start_url("https://example.com")
        .build()
        .unwrap();
    assert_ne!(a.job_id(), b.job_id());
}
