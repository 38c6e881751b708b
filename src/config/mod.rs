//! Crawl configuration and storage layout

pub mod builder;
pub mod layout;
pub mod types;

pub use builder::CrawlConfigBuilder;
pub use layout::StorageLayout;
pub use types::{CrawlConfig, FallbackPolicy, FetcherKind, MAX_BROWSER_CONCURRENCY};
