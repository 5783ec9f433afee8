//! Shared fixtures for the integration tests

use site_index::config::{Config, CrawlJob, CrawlRequest};
use std::path::Path;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

/// Answers OpenAI-style embedding requests with one vector per input
///
/// The vector depends on the input length so different chunks get
/// different vectors.
pub struct EchoEmbeddings;

impl Respond for EchoEmbeddings {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        let body: serde_json::Value = serde_json::from_slice(&request.body).unwrap();
        let data: Vec<serde_json::Value> = body["input"]
            .as_array()
            .map(|inputs| {
                inputs
                    .iter()
                    .enumerate()
                    .map(|(i, text)| {
                        let len = text.as_str().map(str::len).unwrap_or(0) as f32;
                        serde_json::json!({ "index": i, "embedding": [1.0, len, 0.25] })
                    })
                    .collect()
            })
            .unwrap_or_default();
        ResponseTemplate::new(200).set_body_json(serde_json::json!({ "data": data }))
    }
}

/// Starts a mock OpenAI-compatible embeddings endpoint
pub async fn embedding_server() -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/embeddings"))
        .respond_with(EchoEmbeddings)
        .mount(&server)
        .await;
    server
}

/// Configuration pointing the OpenAI backend at `embedding_base`, with fast retries
pub fn test_config(embedding_base: &str) -> Config {
    let mut config = Config::default();
    config.crawler.max_pages = 10;
    config.crawler.max_retries = 0;
    config.crawler.retry_base_delay_ms = 1;
    config.crawler.retry_max_delay_ms = 2;
    config.user_agent.crawler_name = "TestBot".to_string();
    config.embedding.provider = "openai".to_string();
    config.embedding.api_base = Some(embedding_base.to_string());
    config.embedding.api_key = Some("test-key".to_string());
    config.embedding.max_retries = 1;
    config.embedding.retry_base_delay_ms = 1;
    config
}

/// A crawl request for `seed` persisting into `store`
pub fn request(seed: &str, store: &Path) -> CrawlRequest {
    let mut request = CrawlRequest::new(seed);
    request.persist_location = Some(store.to_string_lossy().to_string());
    request
}

pub fn job(seed: &str, store: &Path, config: &Config) -> CrawlJob {
    request(seed, store).into_job(config).unwrap()
}

/// An HTML response with the given body markup
pub fn html(body: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_raw(
        format!("<html><body>{}</body></html>", body),
        "text/html; charset=utf-8",
    )
}

/// Mounts an HTML page at `route`
pub async fn page(server: &MockServer, route: &str, body: &str) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(html(body))
        .mount(server)
        .await;
}

/// Paths of all GET requests a server received
pub async fn fetched_paths(server: &MockServer) -> Vec<String> {
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .iter()
        .filter(|r| r.method.to_string() == "GET")
        .map(|r| r.url.path().to_string())
        .collect()
}

/// Number of requests a server received
pub async fn request_count(server: &MockServer) -> usize {
    server.received_requests().await.map(|r| r.len()).unwrap_or(0)
}
