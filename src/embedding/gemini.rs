use super::{post_json, Endpoint, EmbeddingError};
use serde::{Deserialize, Serialize};

/// Backend for the Gemini `batchEmbedContents` API
///
/// Calls `POST {base}/v1beta/models/{model}:batchEmbedContents`, passing the
/// key in the `x-goog-api-key` header.
#[derive(Debug, Clone)]
pub struct GeminiProvider {
    endpoint: Endpoint,
}

#[derive(Debug, Serialize)]
struct BatchRequest<'a> {
    requests: Vec<EmbedContentRequest<'a>>,
}

#[derive(Debug, Serialize)]
struct EmbedContentRequest<'a> {
    model: String,
    content: Content<'a>,
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    parts: Vec<Part<'a>>,
}

#[derive(Debug, Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Debug, Deserialize)]
struct BatchResponse {
    #[serde(default)]
    embeddings: Vec<ContentEmbedding>,
}

#[derive(Debug, Deserialize)]
struct ContentEmbedding {
    values: Vec<f32>,
}

impl GeminiProvider {
    pub(crate) fn new(mut endpoint: Endpoint) -> Self {
        // Accept both "text-embedding-004" and "models/text-embedding-004"
        if let Some(bare) = endpoint.model.strip_prefix("models/") {
            endpoint.model = bare.to_string();
        }
        Self { endpoint }
    }

    pub fn model(&self) -> &str {
        &self.endpoint.model
    }

    fn build_request<'a>(&self, texts: &'a [String]) -> BatchRequest<'a> {
        let model = format!("models/{}", self.endpoint.model);
        BatchRequest {
            requests: texts
                .iter()
                .map(|text| EmbedContentRequest {
                    model: model.clone(),
                    content: Content {
                        parts: vec![Part { text }],
                    },
                })
                .collect(),
        }
    }

    pub(crate) async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        let url = format!(
            "{}/v1beta/models/{}:batchEmbedContents",
            self.endpoint.base, self.endpoint.model
        );

        let mut request = self.endpoint.client.post(&url);
        if let Some(key) = &self.endpoint.api_key {
            request = request.header("x-goog-api-key", key);
        }

        let body = self.build_request(texts);
        let response: BatchResponse = post_json("gemini", request, &body).await?;

        Ok(response.embeddings.into_iter().map(|e| e.values).collect())
    }
}
