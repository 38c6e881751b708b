//! End-to-end crawl tests against a local HTTP fixture server
//!
//! The fixtures serve from 127.0.0.1, so every request enables the
//! private-network override that exists for exactly this purpose.

use std::time::Duration;

use docscrape::index::read_index;
use docscrape::{
    FetchStatus, JobManager, JobRequest, JobStatus, SearchRequest, StorageLayout, perform_search,
};
use tempfile::TempDir;
use wiremock::matchers::{method, path, path_regex};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn html(body: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_raw(body.to_string(), "text/html")
}

struct Harness {
    _storage: TempDir,
    manager: JobManager,
}

fn harness() -> Harness {
    let storage = TempDir::new().unwrap();
    let manager = JobManager::new(StorageLayout::new(storage.path().to_path_buf()));
    Harness {
        _storage: storage,
        manager,
    }
}

fn request(url: String, depth: u32, id: &str) -> JobRequest {
    let mut request = JobRequest::web(url, depth);
    request.id = Some(id.to_string());
    request.allow_private_networks = true;
    request
}

fn content_files(root: &std::path::Path) -> Vec<std::path::PathBuf> {
    let mut files = Vec::new();
    let mut stack = vec![root.to_path_buf()];
    while let Some(dir) = stack.pop() {
        let Ok(entries) = std::fs::read_dir(&dir) else {
            continue;
        };
        for entry in entries.flatten() {
            let path = entry.path();
            if path.is_dir() {
                stack.push(path);
            } else {
                files.push(path);
            }
        }
    }
    files
}

#[tokio::test]
async fn single_page_crawl_and_search_round_trip() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/a"))
        .respond_with(html(
            "<html><head><title>T</title></head><body><p>hello world</p></body></html>",
        ))
        .mount(&server)
        .await;

    let h = harness();
    let id = h
        .manager
        .submit(request(format!("{}/a", server.uri()), 0, "single"))
        .await
        .unwrap();
    let record = h.manager.wait(&id).await.unwrap();
    assert_eq!(record.status, JobStatus::Completed, "{record:?}");
    assert!(record.start_time.is_some() && record.end_time.is_some());

    let records = read_index(&h.manager.layout().index_path(&id)).await.unwrap();
    assert_eq!(records.len(), 1);
    let row = &records[0];
    assert_eq!(row.fetch_status, FetchStatus::Success);
    assert_eq!(row.http_status, Some(200));
    assert!(!row.local_path.is_empty());

    // The saved file exists and its MD5 matches the recorded hash.
    let bytes = std::fs::read(&row.local_path).unwrap();
    assert!(!bytes.is_empty());
    assert_eq!(
        docscrape::fetch::content_md5(&bytes),
        row.content_hash.clone().unwrap()
    );

    let results = perform_search(
        h.manager.layout(),
        &SearchRequest {
            job_id: id,
            scan_keywords: vec!["hello".to_string()],
            selector: "title".to_string(),
            extract_keywords: vec![],
        },
    )
    .await
    .unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].extracted_text, "T");
    assert_eq!(results[0].selector_matched, "title");
}

#[tokio::test]
async fn depth_zero_fetches_only_the_start_url() {
    let server = MockServer::start().await;
    let links: String = (0..100)
        .map(|i| format!("<a href=\"/l{i}\">{i}</a>"))
        .collect();
    Mock::given(method("GET"))
        .and(path("/a"))
        .respond_with(html(&format!("<html><body>{links}</body></html>")))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path_regex(r"^/l\d+$"))
        .respond_with(html("<html><body>leaf</body></html>"))
        .mount(&server)
        .await;

    let h = harness();
    let id = h
        .manager
        .submit(request(format!("{}/a", server.uri()), 0, "depth0"))
        .await
        .unwrap();
    let record = h.manager.wait(&id).await.unwrap();
    assert_eq!(record.status, JobStatus::Completed);

    let records = read_index(&h.manager.layout().index_path(&id)).await.unwrap();
    assert_eq!(records.len(), 1, "no links may be fetched at depth 0");
}

#[tokio::test]
async fn depth_one_fetches_every_unique_link_once() {
    let server = MockServer::start().await;
    // 100 links with one duplicate entry and one fragment variant; all
    // collapse to 100 unique canonical URLs.
    let mut links: String = (0..100)
        .map(|i| format!("<a href=\"/l{i}\">{i}</a>"))
        .collect();
    links.push_str("<a href=\"/l0\">dup</a><a href=\"/l1#frag\">frag</a>");
    Mock::given(method("GET"))
        .and(path("/a"))
        .respond_with(html(&format!("<html><body>{links}</body></html>")))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path_regex(r"^/l\d+$"))
        .respond_with(html("<html><body>leaf</body></html>"))
        .mount(&server)
        .await;

    let h = harness();
    let id = h
        .manager
        .submit(request(format!("{}/a", server.uri()), 1, "depth1"))
        .await
        .unwrap();
    let record = h.manager.wait(&id).await.unwrap();
    assert_eq!(record.status, JobStatus::Completed);

    let records = read_index(&h.manager.layout().index_path(&id)).await.unwrap();
    assert_eq!(records.len(), 101);

    // Every canonical URL appears exactly once.
    let mut urls: Vec<&str> = records.iter().map(|r| r.canonical_url.as_str()).collect();
    urls.sort_unstable();
    let before = urls.len();
    urls.dedup();
    assert_eq!(before, urls.len(), "a URL was fetched more than once");
}

#[tokio::test]
async fn off_authority_links_are_dropped_silently() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/a"))
        .respond_with(html(
            "<html><body>\
             <a href=\"/b\">in scope</a>\
             <a href=\"http://other.test/c\">out of scope</a>\
             </body></html>",
        ))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/b"))
        .respond_with(html("<html><body>b</body></html>"))
        .mount(&server)
        .await;

    let h = harness();
    let id = h
        .manager
        .submit(request(format!("{}/a", server.uri()), 1, "scope"))
        .await
        .unwrap();
    let record = h.manager.wait(&id).await.unwrap();
    assert_eq!(record.status, JobStatus::Completed);

    let records = read_index(&h.manager.layout().index_path(&id)).await.unwrap();
    assert_eq!(records.len(), 2, "only /a and /b may have rows");
    assert!(
        records.iter().all(|r| !r.canonical_url.contains("other.test")),
        "off-authority URL must not appear in the index at all"
    );
}

#[tokio::test]
async fn robots_denial_fails_the_start_url_and_the_job() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/robots.txt"))
        .respond_with(
            ResponseTemplate::new(200).set_body_string("User-agent: *\nDisallow: /\n"),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/a"))
        .respond_with(html("<html><body>should never be fetched</body></html>"))
        .expect(0)
        .mount(&server)
        .await;

    let h = harness();
    let id = h
        .manager
        .submit(request(format!("{}/a", server.uri()), 0, "robots"))
        .await
        .unwrap();
    let record = h.manager.wait(&id).await.unwrap();
    assert_eq!(record.status, JobStatus::Failed);

    let records = read_index(&h.manager.layout().index_path(&id)).await.unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].fetch_status, FetchStatus::FailedRobots);
    assert!(records[0].local_path.is_empty());

    let content_root = h.manager.layout().content_root(&id);
    assert!(content_files(&content_root).is_empty(), "nothing may be saved");
}

#[tokio::test]
async fn oversized_body_is_failed_toobig_with_no_file() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/big"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(vec![b'x'; 1025], "text/html"))
        .mount(&server)
        .await;

    let h = harness();
    let mut req = request(format!("{}/big", server.uri()), 0, "toobig");
    req.max_body_size = Some(1024);
    let id = h.manager.submit(req).await.unwrap();
    let record = h.manager.wait(&id).await.unwrap();
    assert_eq!(record.status, JobStatus::Failed);

    let records = read_index(&h.manager.layout().index_path(&id)).await.unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].fetch_status, FetchStatus::FailedToobig);
    assert!(content_files(&h.manager.layout().content_root(&id)).is_empty());
}

#[tokio::test]
async fn existing_file_is_skipped_without_force() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/a"))
        .respond_with(html("<html><body>stable body</body></html>"))
        .mount(&server)
        .await;

    let storage = TempDir::new().unwrap();
    let layout = StorageLayout::new(storage.path().to_path_buf());

    // First crawl saves the file.
    let first = JobManager::new(layout.clone());
    let id = first
        .submit(request(format!("{}/a", server.uri()), 0, "rerun"))
        .await
        .unwrap();
    let record = first.wait(&id).await.unwrap();
    assert_eq!(record.status, JobStatus::Completed);

    let records = read_index(&layout.index_path(&id)).await.unwrap();
    let saved_hash = records[0].content_hash.clone().unwrap();

    // Second run under a fresh manager reuses the id and must skip.
    let second = JobManager::new(layout.clone());
    let id2 = second
        .submit(request(format!("{}/a", server.uri()), 0, "rerun"))
        .await
        .unwrap();
    let record = second.wait(&id2).await.unwrap();
    assert_eq!(record.status, JobStatus::Completed);

    let records = read_index(&layout.index_path(&id2)).await.unwrap();
    assert_eq!(records.len(), 2);
    let skip = &records[1];
    assert_eq!(skip.fetch_status, FetchStatus::Skipped);
    assert_eq!(skip.content_hash.clone().unwrap(), saved_hash);
    assert!(skip.local_path.is_empty());
}

#[tokio::test]
async fn concurrent_jobs_own_disjoint_files() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/a"))
        .respond_with(html(
            "<html><body><a href=\"/b\">b</a></body></html>",
        ))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/b"))
        .respond_with(html("<html><body>b</body></html>"))
        .mount(&server)
        .await;

    let h = harness();
    let url = format!("{}/a", server.uri());
    let one = h
        .manager
        .submit(request(url.clone(), 1, "job-one"))
        .await
        .unwrap();
    let two = h
        .manager
        .submit(request(url, 1, "job-two"))
        .await
        .unwrap();

    let (r1, r2) = tokio::join!(h.manager.wait(&one), h.manager.wait(&two));
    assert_eq!(r1.unwrap().status, JobStatus::Completed);
    assert_eq!(r2.unwrap().status, JobStatus::Completed);

    let layout = h.manager.layout();
    let rows1 = read_index(&layout.index_path(&one)).await.unwrap();
    let rows2 = read_index(&layout.index_path(&two)).await.unwrap();
    assert_eq!(rows1.len(), 2);
    assert_eq!(rows2.len(), 2);

    // Each job's successful paths live under its own content root.
    for (id, rows) in [(&one, &rows1), (&two, &rows2)] {
        let root = layout.content_root(id);
        for row in rows.iter().filter(|r| r.fetch_status == FetchStatus::Success) {
            assert!(
                std::path::Path::new(&row.local_path).starts_with(&root),
                "{} not under {}",
                row.local_path,
                root.display()
            );
        }
    }
}

#[tokio::test]
async fn cancellation_fails_the_job_and_leaves_no_temp_files() {
    let server = MockServer::start().await;
    let links: String = (0..50)
        .map(|i| format!("<a href=\"/slow{i}\">{i}</a>"))
        .collect();
    Mock::given(method("GET"))
        .and(path("/a"))
        .respond_with(html(&format!("<html><body>{links}</body></html>")))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path_regex(r"^/slow\d+$"))
        .respond_with(
            html("<html><body>slow leaf</body></html>").set_delay(Duration::from_millis(300)),
        )
        .mount(&server)
        .await;

    let h = harness();
    let id = h
        .manager
        .submit(request(format!("{}/a", server.uri()), 1, "cancelled"))
        .await
        .unwrap();

    tokio::time::sleep(Duration::from_millis(500)).await;
    assert!(h.manager.cancel(&id).await);
    let record = h.manager.wait(&id).await.unwrap();
    assert_eq!(record.status, JobStatus::Failed);
    assert_eq!(record.message.as_deref(), Some("cancelled"));

    // Far fewer than the full 51 rows, every one well-formed JSON, and no
    // orphaned temp files.
    let records = read_index(&h.manager.layout().index_path(&id)).await.unwrap();
    assert!(records.len() < 51);
    let leftovers: Vec<_> = content_files(&h.manager.layout().content_root(&id))
        .into_iter()
        .filter(|p| {
            p.file_name()
                .map(|n| n.to_string_lossy().starts_with(".docscrape-tmp-"))
                .unwrap_or(false)
        })
        .collect();
    assert!(leftovers.is_empty(), "orphan temp files: {leftovers:?}");
}

#[tokio::test]
async fn redirect_within_authority_is_followed() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/old"))
        .respond_with(
            ResponseTemplate::new(301).insert_header("location", "/new"),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/new"))
        .respond_with(html("<html><body>moved here</body></html>"))
        .mount(&server)
        .await;

    let h = harness();
    let id = h
        .manager
        .submit(request(format!("{}/old", server.uri()), 0, "redirect"))
        .await
        .unwrap();
    let record = h.manager.wait(&id).await.unwrap();
    assert_eq!(record.status, JobStatus::Completed);

    let records = read_index(&h.manager.layout().index_path(&id)).await.unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].fetch_status, FetchStatus::Success);
}
