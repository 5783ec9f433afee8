use super::{post_json, Endpoint, EmbeddingError};
use serde::{Deserialize, Serialize};

/// Backend for a local Ollama server (`POST {base}/api/embed`)
#[derive(Debug, Clone)]
pub struct OllamaProvider {
    endpoint: Endpoint,
}

#[derive(Debug, Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Debug, Deserialize)]
struct EmbedResponse {
    embeddings: Vec<Vec<f32>>,
}

impl OllamaProvider {
    pub(crate) fn new(endpoint: Endpoint) -> Self {
        Self { endpoint }
    }

    pub fn model(&self) -> &str {
        &self.endpoint.model
    }

    pub(crate) async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        let url = format!("{}/api/embed", self.endpoint.base);
        let request = self.endpoint.client.post(&url);
        let body = EmbedRequest {
            model: &self.endpoint.model,
            input: texts,
        };

        let response: EmbedResponse = post_json("ollama", request, &body).await?;
        Ok(response.embeddings)
    }
}
