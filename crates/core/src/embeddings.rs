use crate::error::IngestError;
use crate::retry;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use url::Url;

pub const DEFAULT_EMBEDDING_MODEL: &str = "text-embedding-3-small";

/// One remote embedding call per implementation; batching and degradation
/// live in [`embed_chunks`] so fakes stay trivial.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, IngestError>;
}

/// Wire settings for the hosted embedding endpoint.
#[derive(Debug, Clone)]
pub struct EmbeddingConfig {
    pub endpoint: Url,
    pub api_key: String,
    pub model: String,
}

impl EmbeddingConfig {
    pub fn new(
        endpoint: &str,
        api_key: impl Into<String>,
        model: impl Into<String>,
    ) -> Result<Self, IngestError> {
        let endpoint = Url::parse(endpoint)
            .map_err(|error| IngestError::InvalidConfig(format!("embedding endpoint: {error}")))?;
        Ok(Self {
            endpoint,
            api_key: api_key.into(),
            model: model.into(),
        })
    }
}

/// Batch submission and degradation policy, independent of the wire client.
#[derive(Debug, Clone, Copy)]
pub struct BatchPolicy {
    pub batch_size: usize,
    /// Pause between consecutive batches to respect provider rate limits.
    pub batch_delay: Duration,
    /// Pause before the single retry of a failed batch.
    pub retry_delay: Duration,
}

impl Default for BatchPolicy {
    fn default() -> Self {
        Self {
            batch_size: 20,
            batch_delay: Duration::from_millis(50),
            retry_delay: Duration::from_millis(500),
        }
    }
}

#[derive(Debug, Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingDatum>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingDatum {
    embedding: Vec<f32>,
}

/// Client for an OpenAI-style `/embeddings` endpoint.
pub struct HttpEmbeddingClient {
    config: EmbeddingConfig,
    client: reqwest::Client,
}

impl HttpEmbeddingClient {
    pub fn new(config: EmbeddingConfig) -> Self {
        Self {
            config,
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl EmbeddingProvider for HttpEmbeddingClient {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, IngestError> {
        let response = self
            .client
            .post(self.config.endpoint.clone())
            .bearer_auth(&self.config.api_key)
            .json(&EmbeddingRequest {
                model: &self.config.model,
                input: texts,
            })
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(IngestError::Embedding(format!(
                "endpoint returned {}",
                response.status()
            )));
        }

        let parsed: EmbeddingResponse = response.json().await?;
        if parsed.data.len() != texts.len() {
            return Err(IngestError::Embedding(format!(
                "expected {} vectors, got {}",
                texts.len(),
                parsed.data.len()
            )));
        }

        Ok(parsed.data.into_iter().map(|datum| datum.embedding).collect())
    }
}

/// Embed every chunk, batch by batch. A batch that fails its call and its
/// single retry contributes empty vectors instead of failing the document;
/// the output always has one entry per input chunk.
pub async fn embed_chunks<P>(provider: &P, texts: &[String], policy: BatchPolicy) -> Vec<Vec<f32>>
where
    P: EmbeddingProvider + ?Sized,
{
    let mut vectors = Vec::with_capacity(texts.len());
    let batch_size = policy.batch_size.max(1);

    for (index, batch) in texts.chunks(batch_size).enumerate() {
        if index > 0 {
            tokio::time::sleep(policy.batch_delay).await;
        }

        match retry::bounded(2, policy.retry_delay, || provider.embed(batch)).await {
            Ok(batch_vectors) => vectors.extend(batch_vectors),
            Err(error) => {
                tracing::warn!(
                    batch = index,
                    size = batch.len(),
                    %error,
                    "embedding batch failed twice, persisting chunks without vectors"
                );
                vectors.extend(batch.iter().map(|_| Vec::new()));
            }
        }
    }

    vectors
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;
    use serde_json::json;

    fn client_for(server: &MockServer) -> HttpEmbeddingClient {
        let config = EmbeddingConfig::new(
            &server.url("/v1/embeddings"),
            "test-key",
            DEFAULT_EMBEDDING_MODEL,
        )
        .expect("valid endpoint");
        HttpEmbeddingClient::new(config)
    }

    fn texts(count: usize) -> Vec<String> {
        (0..count).map(|n| format!("chunk number {n}")).collect()
    }

    #[tokio::test]
    async fn parses_vectors_in_input_order() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST).path("/v1/embeddings");
                then.status(200).json_body(json!({
                    "data": [
                        { "embedding": [0.1, 0.2] },
                        { "embedding": [0.3, 0.4] }
                    ]
                }));
            })
            .await;

        let vectors = client_for(&server).embed(&texts(2)).await.expect("embed");
        mock.assert_async().await;
        assert_eq!(vectors, vec![vec![0.1, 0.2], vec![0.3, 0.4]]);
    }

    #[tokio::test]
    async fn length_mismatch_is_an_error() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/v1/embeddings");
                then.status(200)
                    .json_body(json!({ "data": [ { "embedding": [0.5] } ] }));
            })
            .await;

        let result = client_for(&server).embed(&texts(3)).await;
        assert!(matches!(result, Err(IngestError::Embedding(_))));
    }

    #[tokio::test]
    async fn failed_batch_degrades_to_empty_vectors() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST).path("/v1/embeddings");
                then.status(500);
            })
            .await;

        let policy = BatchPolicy {
            batch_size: 2,
            batch_delay: Duration::from_millis(1),
            retry_delay: Duration::from_millis(1),
        };
        let input = texts(3);
        let vectors = embed_chunks(&client_for(&server), &input, policy).await;

        assert_eq!(vectors.len(), input.len());
        assert!(vectors.iter().all(Vec::is_empty));
        // two batches, each tried twice
        assert_eq!(mock.hits_async().await, 4);
    }
}
