#[cfg(test)]
mod tests;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};
use url::Url;

use crate::config::{Config, TOKEN_ENV_VAR};
use crate::http::{HttpClient, endpoint};

/// Output size of `sentence-transformers/all-MiniLM-L6-v2`
pub const DEFAULT_EMBEDDING_DIMENSION: u32 = 384;

/// Vector for one input text. Placeholders are all-zero vectors produced when
/// the remote service could not embed the text.
#[derive(Debug, Clone, PartialEq)]
pub enum Embedding {
    Computed(Vec<f32>),
    Placeholder(Vec<f32>),
}

impl Embedding {
    #[inline]
    pub fn placeholder(dimension: usize) -> Self {
        Self::Placeholder(vec![0.0; dimension])
    }

    #[inline]
    pub fn values(&self) -> &[f32] {
        match self {
            Self::Computed(values) | Self::Placeholder(values) => values,
        }
    }

    #[inline]
    pub fn into_values(self) -> Vec<f32> {
        match self {
            Self::Computed(values) | Self::Placeholder(values) => values,
        }
    }

    #[inline]
    pub fn is_placeholder(&self) -> bool {
        matches!(self, Self::Placeholder(_))
    }
}

/// Shapes the feature-extraction pipeline is known to return
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum FeatureExtractionResponse {
    /// One pooled vector
    Vector(Vec<f32>),
    /// One pooled vector per input, or token vectors of a single input
    Matrix(Vec<Vec<f32>>),
    /// Token vectors per input
    Tokens(Vec<Vec<Vec<f32>>>),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum EmbeddingError {
    #[error("Response contained no vectors")]
    Empty,
    #[error("Expected {expected} vectors but received {actual}")]
    CountMismatch { expected: usize, actual: usize },
    #[error("Token vectors have inconsistent lengths")]
    Ragged,
    #[error("Expected vectors of dimension {expected} but received {actual}")]
    DimensionMismatch { expected: usize, actual: usize },
}

/// Turn any known response shape into exactly `expected` pooled vectors.
///
/// A flat vector counts as one input. A matrix is one vector per input, except
/// that it is mean-pooled into one vector when a single input was sent and
/// several rows came back. A 3-D array is mean-pooled per input.
#[inline]
pub fn normalize_feature_extraction(
    response: FeatureExtractionResponse,
    expected: usize,
) -> Result<Vec<Vec<f32>>, EmbeddingError> {
    let vectors = match response {
        FeatureExtractionResponse::Vector(vector) => {
            if vector.is_empty() {
                return Err(EmbeddingError::Empty);
            }
            vec![vector]
        }
        FeatureExtractionResponse::Matrix(rows) => {
            if expected == 1 && rows.len() > 1 {
                vec![mean_pool(&rows)?]
            } else {
                rows
            }
        }
        FeatureExtractionResponse::Tokens(inputs) => inputs
            .iter()
            .map(|tokens| mean_pool(tokens))
            .collect::<Result<Vec<_>, _>>()?,
    };

    if vectors.len() != expected {
        return Err(EmbeddingError::CountMismatch {
            expected,
            actual: vectors.len(),
        });
    }
    if vectors.iter().any(Vec::is_empty) {
        return Err(EmbeddingError::Empty);
    }

    Ok(vectors)
}

fn mean_pool(rows: &[Vec<f32>]) -> Result<Vec<f32>, EmbeddingError> {
    let first = rows.first().ok_or(EmbeddingError::Empty)?;
    let width = first.len();
    if rows.iter().any(|row| row.len() != width) {
        return Err(EmbeddingError::Ragged);
    }

    let mut pooled = vec![0.0f32; width];
    for row in rows {
        for (sum, value) in pooled.iter_mut().zip(row) {
            *sum += value;
        }
    }
    let count = rows.len() as f32;
    for sum in &mut pooled {
        *sum /= count;
    }
    Ok(pooled)
}

#[derive(Debug, Serialize)]
struct FeatureExtractionRequest<'a> {
    inputs: Inputs<'a>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum Inputs<'a> {
    Single(&'a str),
    Batch(&'a [String]),
}

#[derive(Debug, Clone)]
enum Backend {
    Remote { http: HttpClient, url: Url },
    Unavailable { reason: String },
}

/// Client for the hosted feature-extraction pipeline.
///
/// Embedding never fails: texts that cannot be embedded get placeholder
/// vectors and the degradation is logged.
#[derive(Debug, Clone)]
pub struct EmbeddingClient {
    backend: Backend,
    model: String,
    dimension: usize,
    batch_size: usize,
}

impl EmbeddingClient {
    #[inline]
    pub fn new(config: &Config) -> Self {
        let inference = &config.inference;
        let backend = match (&inference.api_token, Self::endpoint_url(config)) {
            (None, _) => Backend::Unavailable {
                reason: format!("Missing {TOKEN_ENV_VAR} in environment"),
            },
            (Some(_), Err(e)) => Backend::Unavailable {
                reason: format!("{e:#}"),
            },
            (Some(token), Ok(url)) => Backend::Remote {
                http: HttpClient::new(token.clone(), inference),
                url,
            },
        };

        Self {
            backend,
            model: inference.embedding_model.clone(),
            dimension: inference.embedding_dimension as usize,
            batch_size: (inference.batch_size as usize).max(1),
        }
    }

    /// Swap the transport, keeping the endpoint. Has no effect on a client
    /// that has no credentials.
    #[inline]
    pub fn with_http_client(mut self, client: HttpClient) -> Self {
        if let Backend::Remote { http, .. } = &mut self.backend {
            *http = client;
        }
        self
    }

    fn endpoint_url(config: &Config) -> Result<Url> {
        let base = config.inference.base_url()?;
        let path = format!(
            "hf-inference/models/{}/pipeline/feature-extraction",
            config.inference.embedding_model
        );
        endpoint(&base, &path).context("Failed to build embedding URL")
    }

    #[inline]
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Number of texts sent per request
    #[inline]
    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    #[inline]
    pub fn model(&self) -> &str {
        &self.model
    }

    #[inline]
    pub fn is_available(&self) -> bool {
        matches!(self.backend, Backend::Remote { .. })
    }

    /// Embed `texts` in batches, returning exactly one embedding per text in
    /// input order.
    #[inline]
    pub fn embed(&self, texts: &[String]) -> Vec<Embedding> {
        if texts.is_empty() {
            return Vec::new();
        }

        let (http, url) = match &self.backend {
            Backend::Remote { http, url } => (http, url),
            Backend::Unavailable { reason } => {
                warn!(
                    degraded = texts.len(),
                    reason = %reason,
                    "Embedding service unavailable, using placeholder vectors"
                );
                return self.placeholders(texts.len());
            }
        };

        debug!(
            "Embedding {} texts with {} in batches of {}",
            texts.len(),
            self.model,
            self.batch_size
        );

        let mut embeddings = Vec::with_capacity(texts.len());
        for batch in texts.chunks(self.batch_size) {
            match self.embed_batch(http, url, batch) {
                Ok(vectors) => embeddings.extend(vectors.into_iter().map(Embedding::Computed)),
                Err(e) => {
                    warn!(
                        degraded = batch.len(),
                        reason = %format!("{e:#}"),
                        "Embedding batch failed, using placeholder vectors"
                    );
                    embeddings.extend(self.placeholders(batch.len()));
                }
            }
        }

        embeddings
    }

    /// Embed a single text, typically a query.
    #[inline]
    pub fn embed_one(&self, text: &str) -> Embedding {
        self.embed(&[text.to_string()])
            .into_iter()
            .next()
            .unwrap_or_else(|| Embedding::placeholder(self.dimension))
    }

    fn embed_batch(&self, http: &HttpClient, url: &Url, batch: &[String]) -> Result<Vec<Vec<f32>>> {
        let inputs = match batch {
            [single] => Inputs::Single(single),
            _ => Inputs::Batch(batch),
        };
        let response_text = http
            .post_json(url, &FeatureExtractionRequest { inputs })
            .context("Feature extraction request failed")?;

        let response: FeatureExtractionResponse = serde_json::from_str(&response_text)
            .context("Failed to parse feature extraction response")?;
        let vectors = normalize_feature_extraction(response, batch.len())?;

        if let Some(bad) = vectors.iter().find(|v| v.len() != self.dimension) {
            return Err(EmbeddingError::DimensionMismatch {
                expected: self.dimension,
                actual: bad.len(),
            }
            .into());
        }

        Ok(vectors)
    }

    fn placeholders(&self, count: usize) -> Vec<Embedding> {
        vec![Embedding::placeholder(self.dimension); count]
    }
}
