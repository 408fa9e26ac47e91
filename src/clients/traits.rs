use async_trait::async_trait;
use thiserror::Error;

use crate::clusters::{ClusterSummary, Span};
use crate::schemas::SourceArticle;

/// Sampling parameters for one generation call.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GenerationParams {
    pub max_tokens: u32,
    pub temperature: f32,
}

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("transport error: {0}")]
    Transport(String),
    #[error("api error {status}: {body}")]
    Api { status: u16, body: String },
    #[error("rate limited or over quota: {0}")]
    Quota(String),
    #[error("empty response from model")]
    EmptyResponse,
    #[error("missing credentials: {0}")]
    MissingCredentials(String),
    #[error("stream error: {0}")]
    Stream(String),
}

/// Produces the full text of one model completion.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(
        &self,
        system: &str,
        user: &str,
        params: GenerationParams,
    ) -> Result<String, ClientError>;
}

/// Produces the narrative summary of one analysed article.
///
/// Implementations never fail: on error they return a fixed fallback sentence.
#[async_trait]
pub trait Summarizer: Send + Sync {
    async fn summarize(&self, title: &str, spans: &[Span], summary: &ClusterSummary) -> String;
}

/// Supplies the ordered article collection for a query.
#[async_trait]
pub trait ArticleSource: Send + Sync {
    async fn fetch(&self, query: &str, limit: usize) -> Result<Vec<SourceArticle>, ClientError>;
}
