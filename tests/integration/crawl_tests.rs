//! Integration tests for the crawler
//!
//! These tests use wiremock to create a mock site and a mock embedding
//! backend and run the full crawl cycle end-to-end against a temporary store.

use crate::support::{
    embedding_server, fetched_paths, job, page, request, request_count, test_config,
};
use site_index::crawler::{crawl, run_crawl_request, Coordinator};
use site_index::search::search_index;
use site_index::state::PageState;
use site_index::store::{RunStatus, SqliteVectorStore, VectorStore};
use site_index::ProviderKind;
use std::collections::HashSet;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
async fn test_single_page_budget_ignores_self_link() {
    let site = MockServer::start().await;
    let embeddings = embedding_server().await;
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(crate::support::html(
            r#"<h1>Welcome</h1><p>Only page.</p><a href="/">Home</a><a href="/other">Other</a>"#,
        ))
        .expect(1)
        .mount(&site)
        .await;
    Mock::given(method("GET"))
        .and(path("/other"))
        .respond_with(crate::support::html("<p>Never fetched</p>"))
        .expect(0)
        .mount(&site)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let config = test_config(&embeddings.uri());
    let mut req = request(&site.uri(), dir.path());
    req.max_pages = Some(1);
    let job = req.into_job(&config).unwrap();

    let summary = crawl(job, &config, CancellationToken::new()).await.unwrap();

    assert_eq!(summary.pages_crawled, 1);
    assert_eq!(summary.pages_failed, 0);
    assert!(summary.chunks_created >= 1);
    assert_eq!(summary.embeddings_created, summary.chunks_created);
}

#[tokio::test]
async fn test_seed_404_is_page_failure() {
    let site = MockServer::start().await;
    let embeddings = embedding_server().await;
    // Unmatched requests get a 404 from wiremock

    let dir = tempfile::tempdir().unwrap();
    let config = test_config(&embeddings.uri());
    let response = run_crawl_request(
        request(&format!("{}/missing", site.uri()), dir.path()),
        &config,
        CancellationToken::new(),
    )
    .await;

    assert!(response.success);
    assert!(response.error.is_none());
    assert_eq!(response.pages_crawled, 1);
    assert_eq!(response.pages_failed, 1);
    assert_eq!(response.embeddings_created, 0);
    assert!(response.content_summary.starts_with("No content indexed"));
    assert_eq!(request_count(&embeddings).await, 0);
}

#[tokio::test]
async fn test_same_domain_skips_external_links() {
    let site = MockServer::start().await;
    let embeddings = embedding_server().await;
    let port = site.address().port();

    // localhost is a different registrable domain than the 127.0.0.1 seed
    let mut links = String::new();
    for i in 1..=5 {
        links.push_str(&format!(r#"<a href="/page{}">Page {}</a>"#, i, i));
    }
    for i in 1..=3 {
        links.push_str(&format!(
            r#"<a href="http://localhost:{}/external{}">External {}</a>"#,
            port, i, i
        ));
    }
    page(&site, "/", &format!("<p>Seed page</p>{}", links)).await;
    for i in 1..=5 {
        page(
            &site,
            &format!("/page{}", i),
            &format!("<p>Content of internal page number {}</p>", i),
        )
        .await;
    }
    for i in 1..=3 {
        Mock::given(method("GET"))
            .and(path(format!("/external{}", i)))
            .respond_with(crate::support::html("<p>external</p>"))
            .expect(0)
            .mount(&site)
            .await;
    }

    let dir = tempfile::tempdir().unwrap();
    let config = test_config(&embeddings.uri());
    let job = job(&site.uri(), dir.path(), &config);

    let summary = crawl(job, &config, CancellationToken::new()).await.unwrap();

    assert_eq!(summary.pages_crawled, 6);
    assert_eq!(summary.pages_failed, 0);
    assert_eq!(summary.page_states.get(&PageState::Processed), Some(&6));
    assert_eq!(summary.depth_breakdown.get(&0), Some(&1));
    assert_eq!(summary.depth_breakdown.get(&1), Some(&5));

    let fetched = fetched_paths(&site).await;
    assert_eq!(fetched.len(), 6);
    let unique: HashSet<_> = fetched.iter().collect();
    assert_eq!(unique.len(), fetched.len(), "a URL was fetched twice");
    assert!(fetched.iter().all(|p| !p.starts_with("/external")));
}

#[tokio::test]
async fn test_page_budget_is_never_exceeded() {
    let site = MockServer::start().await;
    let embeddings = embedding_server().await;

    let links: String = (1..=20)
        .map(|i| format!(r#"<a href="/p{}">p{}</a>"#, i, i))
        .collect();
    page(&site, "/", &links).await;
    for i in 1..=20 {
        page(&site, &format!("/p{}", i), &format!("<p>page {}</p>", i)).await;
    }

    let dir = tempfile::tempdir().unwrap();
    let mut config = test_config(&embeddings.uri());
    config.crawler.max_concurrent_fetches = 8;
    let mut req = request(&site.uri(), dir.path());
    req.max_pages = Some(7);

    let response = run_crawl_request(req, &config, CancellationToken::new()).await;

    assert!(response.success);
    assert_eq!(response.pages_crawled, 7);
    assert_eq!(fetched_paths(&site).await.len(), 7);
}

#[tokio::test]
async fn test_unknown_provider_fails_before_fetching() {
    let site = MockServer::start().await;
    let embeddings = embedding_server().await;
    Mock::given(method("GET"))
        .respond_with(crate::support::html("<p>x</p>"))
        .expect(0)
        .mount(&site)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let config = test_config(&embeddings.uri());
    let mut req = request(&site.uri(), dir.path());
    req.provider = Some("cohere".to_string());

    let response = run_crawl_request(req, &config, CancellationToken::new()).await;

    assert!(!response.success);
    assert_eq!(response.pages_crawled, 0);
    assert!(response.error.unwrap().contains("cohere"));
    assert_eq!(request_count(&site).await, 0);
}

#[tokio::test]
async fn test_invalid_seed_is_config_error() {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config("http://127.0.0.1:1");

    let response = run_crawl_request(
        request("ftp://example.com/", dir.path()),
        &config,
        CancellationToken::new(),
    )
    .await;

    assert!(!response.success);
    assert!(response.error.is_some());
}

#[tokio::test]
async fn test_recrawl_creates_no_new_embeddings() {
    let site = MockServer::start().await;
    let embeddings = embedding_server().await;
    page(
        &site,
        "/",
        r#"<p>Stable landing text.</p><a href="/about">About</a>"#,
    )
    .await;
    page(&site, "/about", "<p>About us, unchanged between crawls.</p>").await;

    let dir = tempfile::tempdir().unwrap();
    let config = test_config(&embeddings.uri());

    let first = crawl(
        job(&site.uri(), dir.path(), &config),
        &config,
        CancellationToken::new(),
    )
    .await
    .unwrap();
    assert_eq!(first.pages_crawled, 2);
    assert!(first.embeddings_created > 0);
    let calls_after_first = request_count(&embeddings).await;

    let second = crawl(
        job(&site.uri(), dir.path(), &config),
        &config,
        CancellationToken::new(),
    )
    .await
    .unwrap();

    assert_eq!(second.pages_crawled, 2);
    assert_eq!(second.chunks_created, first.chunks_created);
    assert_eq!(second.embeddings_created, 0);
    assert_eq!(second.chunks_unchanged, second.chunks_created);
    assert_eq!(request_count(&embeddings).await, calls_after_first);

    let store = SqliteVectorStore::open(dir.path()).unwrap();
    let stats = store.stats().unwrap();
    assert_eq!(stats.total_chunks, first.embeddings_created);
    assert_eq!(stats.runs, 2);
}

#[tokio::test]
async fn test_embedding_outage_keeps_pages() {
    let site = MockServer::start().await;
    let embeddings = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/embeddings"))
        .respond_with(ResponseTemplate::new(500).set_body_string("backend down"))
        .mount(&embeddings)
        .await;
    page(&site, "/", r#"<p>Seed text</p><a href="/next">Next</a>"#).await;
    page(&site, "/next", "<p>Second page text</p>").await;

    let dir = tempfile::tempdir().unwrap();
    let config = test_config(&embeddings.uri());

    let summary = crawl(
        job(&site.uri(), dir.path(), &config),
        &config,
        CancellationToken::new(),
    )
    .await
    .unwrap();

    assert_eq!(summary.pages_crawled, 2);
    assert_eq!(summary.pages_failed, 0);
    assert_eq!(summary.embeddings_created, 0);
    assert_eq!(summary.embeddings_failed, summary.chunks_created);
    assert!(summary
        .errors
        .iter()
        .any(|e| e.starts_with("embedding batch")));
}

#[tokio::test]
async fn test_non_html_page_is_skipped() {
    let site = MockServer::start().await;
    let embeddings = embedding_server().await;
    page(
        &site,
        "/",
        r#"<p>Downloads</p><a href="/manual.pdf">Manual</a>"#,
    )
    .await;
    Mock::given(method("GET"))
        .and(path("/manual.pdf"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_raw(b"%PDF-1.4".to_vec(), "application/pdf"),
        )
        .mount(&site)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let config = test_config(&embeddings.uri());

    let summary = crawl(
        job(&site.uri(), dir.path(), &config),
        &config,
        CancellationToken::new(),
    )
    .await
    .unwrap();

    assert_eq!(summary.pages_crawled, 2);
    assert_eq!(summary.pages_failed, 1);
    assert_eq!(
        summary.page_states.get(&PageState::ContentMismatch),
        Some(&1)
    );
}

#[tokio::test]
async fn test_depth_limit() {
    let site = MockServer::start().await;
    let embeddings = embedding_server().await;
    page(&site, "/", r#"<p>root</p><a href="/a">A</a>"#).await;
    page(&site, "/a", r#"<p>level one</p><a href="/b">B</a>"#).await;
    Mock::given(method("GET"))
        .and(path("/b"))
        .respond_with(crate::support::html("<p>level two</p>"))
        .expect(0)
        .mount(&site)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let mut config = test_config(&embeddings.uri());
    config.crawler.max_depth = 1;

    let summary = crawl(
        job(&site.uri(), dir.path(), &config),
        &config,
        CancellationToken::new(),
    )
    .await
    .unwrap();

    assert_eq!(summary.pages_crawled, 2);
}

#[tokio::test]
async fn test_cancellation_returns_partial_summary() {
    let site = MockServer::start().await;
    let embeddings = embedding_server().await;
    for i in 0..10 {
        Mock::given(method("GET"))
            .and(path(format!("/p{}", i)))
            .respond_with(
                crate::support::html(&format!(
                    r#"<p>chain page {}</p><a href="/p{}">next</a>"#,
                    i,
                    i + 1
                ))
                .set_delay(Duration::from_millis(150)),
            )
            .mount(&site)
            .await;
    }

    let dir = tempfile::tempdir().unwrap();
    let mut config = test_config(&embeddings.uri());
    config.crawler.max_concurrent_fetches = 1;
    config.crawler.max_depth = 20;

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(400)).await;
        trigger.cancel();
    });

    let summary = crawl(
        job(&format!("{}/p0", site.uri()), dir.path(), &config),
        &config,
        cancel,
    )
    .await
    .unwrap();

    assert!(summary.cancelled);
    assert!(summary.pages_crawled >= 1);
    assert!(summary.pages_crawled < 10);
    assert!(summary.describe().starts_with("Crawl cancelled"));

    let store = SqliteVectorStore::open(dir.path()).unwrap();
    let runs = store.recent_runs(1).unwrap();
    assert_eq!(runs[0].status, RunStatus::Cancelled);
    assert_eq!(runs[0].pages_crawled, summary.pages_crawled);
}

#[tokio::test]
async fn test_store_path_unusable_aborts() {
    let site = MockServer::start().await;
    let embeddings = embedding_server().await;
    Mock::given(method("GET"))
        .respond_with(crate::support::html("<p>x</p>"))
        .expect(0)
        .mount(&site)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("not-a-directory");
    std::fs::write(&file, b"plain file").unwrap();

    let config = test_config(&embeddings.uri());
    let response = run_crawl_request(request(&site.uri(), &file), &config, CancellationToken::new()).await;

    assert!(!response.success);
    assert!(response.error.is_some());
}

#[tokio::test]
async fn test_crawled_content_is_searchable() {
    let site = MockServer::start().await;
    let embeddings = embedding_server().await;
    page(&site, "/", "<p>Short</p>").await;

    let dir = tempfile::tempdir().unwrap();
    let config = test_config(&embeddings.uri());
    let job = job(&site.uri(), dir.path(), &config);
    let store_path = job.store_path.clone();

    let summary = Coordinator::new(job, &config)
        .unwrap()
        .with_config_hash("abc123")
        .run(CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(summary.embeddings_created, 1);

    let hits = search_index(&config, ProviderKind::OpenAi, &store_path, "Short", 3)
        .await
        .unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].text, "Short");
    assert!(hits[0].score > 0.99);

    let store = SqliteVectorStore::open(&store_path).unwrap();
    let runs = store.recent_runs(1).unwrap();
    assert_eq!(runs[0].config_hash.as_deref(), Some("abc123"));
}
