pub mod config;
pub mod crawl_engine;
pub mod fetch;
pub mod index;
pub mod jobs;
pub mod repo;
pub mod robots;
pub mod search;
pub mod urlutil;

pub use config::{CrawlConfig, FallbackPolicy, FetcherKind, StorageLayout};
pub use crawl_engine::{CrawlEngine, CrawlError, CrawlStats};
pub use index::{FetchStatus, IndexRecord, IndexWriter};
pub use jobs::{JobKind, JobManager, JobRecord, JobRequest, JobStatus};
pub use search::{SearchError, SearchRequest, SearchResultItem, perform_search};

/// User agent reported to servers and matched against robots.txt rules.
///
/// The job id is appended so site operators can correlate crawl traffic
/// with a specific acquisition run.
#[must_use]
pub fn user_agent_for_job(job_id: &str) -> String {
    format!("docscrape/0.1 ({job_id})")
}
