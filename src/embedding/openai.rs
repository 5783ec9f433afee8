use super::{post_json, Endpoint, EmbeddingError, ProviderKind};
use serde::{Deserialize, Serialize};

/// Backend for the OpenAI embeddings wire format
///
/// Calls `POST {base}/v1/embeddings` with a bearer token. Mistral exposes the
/// same format, so both providers share this type.
#[derive(Debug, Clone)]
pub struct OpenAiCompatible {
    kind: ProviderKind,
    endpoint: Endpoint,
}

#[derive(Debug, Serialize)]
struct EmbeddingsRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Debug, Deserialize)]
struct EmbeddingsResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
    #[serde(default)]
    index: Option<usize>,
}

impl OpenAiCompatible {
    pub(crate) fn new(kind: ProviderKind, endpoint: Endpoint) -> Self {
        Self { kind, endpoint }
    }

    pub fn model(&self) -> &str {
        &self.endpoint.model
    }

    pub(crate) async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        let provider = self.kind.as_str();
        let url = format!("{}/v1/embeddings", self.endpoint.base);

        let mut request = self.endpoint.client.post(&url);
        if let Some(key) = &self.endpoint.api_key {
            request = request.bearer_auth(key);
        }

        let body = EmbeddingsRequest {
            model: &self.endpoint.model,
            input: texts,
        };
        let response: EmbeddingsResponse = post_json(provider, request, &body).await?;

        Ok(into_ordered_vectors(response.data))
    }
}

/// Orders response items by their `index` field when every item carries one
fn into_ordered_vectors(mut data: Vec<EmbeddingData>) -> Vec<Vec<f32>> {
    if data.iter().all(|d| d.index.is_some()) {
        data.sort_by_key(|d| d.index);
    }
    data.into_iter().map(|d| d.embedding).collect()
}
