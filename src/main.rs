//! docscrape command line front-end
//!
//! Runs an acquisition job to completion or searches a finished job's
//! archive. Exit codes: 0 success, 2 invalid arguments (clap's default),
//! 3 job failed, 4 job not found.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use std::process::ExitCode;

use docscrape::{
    FallbackPolicy, JobKind, JobManager, JobRequest, JobStatus, SearchError, SearchRequest,
    StorageLayout, perform_search,
};

#[derive(Parser)]
#[command(name = "docscrape", version, about = "Documentation acquisition and search")]
struct Cli {
    /// Storage root holding content/ and index/
    #[arg(long, default_value = "./data", global = true)]
    root: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Crawl a site into a job-scoped archive
    Crawl {
        /// Start URL (crawling stays on its authority)
        url: String,
        #[arg(long, default_value_t = 1)]
        depth: u32,
        /// Re-fetch URLs whose content files already exist
        #[arg(long)]
        force: bool,
        /// Start with the browser fetcher instead of plain HTTP
        #[arg(long)]
        browser: bool,
        /// When to upgrade an HTTP fetch to a browser render
        #[arg(long, value_enum, default_value_t = FallbackArg::Never)]
        fallback: FallbackArg,
        /// Job id (generated when absent)
        #[arg(long)]
        id: Option<String>,
        /// Per-attempt HTTP timeout in seconds
        #[arg(long)]
        timeout_http: Option<u64>,
        /// Per-attempt browser timeout in seconds
        #[arg(long)]
        timeout_browser: Option<u64>,
        /// Maximum body size in bytes
        #[arg(long)]
        max_body_size: Option<u64>,
        /// Minimum gap between fetches to one authority, in milliseconds
        #[arg(long)]
        politeness_ms: Option<u64>,
    },
    /// Acquire documentation from a Git repository
    Repo {
        repo_url: String,
        /// Documentation subtree inside the repository
        #[arg(long)]
        subpath: Option<String>,
        #[arg(long)]
        id: Option<String>,
        /// Re-clone even when a checkout exists
        #[arg(long)]
        force: bool,
    },
    /// Search a finished job's archive
    Search {
        job_id: String,
        /// Keywords that must all appear in a file (phase 1)
        #[arg(long = "scan", num_args = 0..)]
        scan_keywords: Vec<String>,
        /// CSS selector for extraction (phase 2)
        #[arg(long)]
        selector: String,
        /// Keywords that must all appear in an extracted fragment
        #[arg(long = "extract", num_args = 0..)]
        extract_keywords: Vec<String>,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum FallbackArg {
    Never,
    JsShell,
    Always,
}

impl From<FallbackArg> for FallbackPolicy {
    fn from(arg: FallbackArg) -> Self {
        match arg {
            FallbackArg::Never => FallbackPolicy::Never,
            FallbackArg::JsShell => FallbackPolicy::OnJsShell,
            FallbackArg::Always => FallbackPolicy::Always,
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    env_logger::init();
    let cli = Cli::parse();
    let layout = StorageLayout::new(cli.root.clone());

    match cli.command {
        Command::Crawl {
            url,
            depth,
            force,
            browser,
            fallback,
            id,
            timeout_http,
            timeout_browser,
            max_body_size,
            politeness_ms,
        } => {
            let mut request = JobRequest::web(url, depth);
            request.kind = if browser { JobKind::Browser } else { JobKind::Web };
            request.force = force;
            request.id = id;
            request.timeout_http_secs = timeout_http;
            request.timeout_browser_secs = timeout_browser;
            request.max_body_size = max_body_size;
            request.politeness_delay_ms = politeness_ms;
            request.fallback = Some(fallback.into());
            run_job(layout, request).await
        }
        Command::Repo {
            repo_url,
            subpath,
            id,
            force,
        } => {
            let mut request = JobRequest::repo(repo_url);
            request.doc_subpath = subpath;
            request.id = id;
            request.force = force;
            run_job(layout, request).await
        }
        Command::Search {
            job_id,
            scan_keywords,
            selector,
            extract_keywords,
        } => {
            let request = SearchRequest {
                job_id,
                scan_keywords,
                selector,
                extract_keywords,
            };
            match perform_search(&layout, &request).await {
                Ok(results) => {
                    for item in results {
                        match serde_json::to_string(&item) {
                            Ok(line) => println!("{line}"),
                            Err(e) => eprintln!("serialisation error: {e}"),
                        }
                    }
                    ExitCode::SUCCESS
                }
                Err(e @ SearchError::JobNotFound(_)) => {
                    eprintln!("{e}");
                    ExitCode::from(4)
                }
                Err(e @ SearchError::InvalidSelector { .. }) => {
                    eprintln!("{e}");
                    ExitCode::from(2)
                }
                Err(e) => {
                    eprintln!("search failed: {e}");
                    ExitCode::from(3)
                }
            }
        }
    }
}

async fn run_job(layout: StorageLayout, request: JobRequest) -> ExitCode {
    let manager = JobManager::new(layout);
    let id = match manager.submit(request).await {
        Ok(id) => id,
        Err(e) => {
            eprintln!("{e}");
            return ExitCode::from(2);
        }
    };

    let Some(record) = manager.wait(&id).await else {
        eprintln!("job {id} disappeared");
        return ExitCode::from(3);
    };

    match serde_json::to_string_pretty(&record) {
        Ok(json) => println!("{json}"),
        Err(e) => eprintln!("serialisation error: {e}"),
    }
    if record.status == JobStatus::Completed {
        ExitCode::SUCCESS
    } else {
        ExitCode::from(3)
    }
}
