//! Article source backed by a JSON file of pre-fetched search results.

use std::path::PathBuf;

use async_trait::async_trait;
use serde::Deserialize;

use crate::clients::traits::{ArticleSource, ClientError};
use crate::schemas::SourceArticle;

/// Accepts either a bare array or a search response with an `articles` field.
#[derive(Deserialize)]
#[serde(untagged)]
enum ArticleFile {
    List(Vec<SourceArticle>),
    Wrapped { articles: Vec<SourceArticle> },
}

#[derive(Debug, Clone)]
pub struct JsonFileSource {
    path: PathBuf,
}

impl JsonFileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl ArticleSource for JsonFileSource {
    async fn fetch(&self, query: &str, limit: usize) -> Result<Vec<SourceArticle>, ClientError> {
        let raw = tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|e| ClientError::Transport(format!("read {}: {}", self.path.display(), e)))?;
        let file: ArticleFile = serde_json::from_str(&raw).map_err(|e| ClientError::Api {
            status: 0,
            body: format!("invalid article file {}: {}", self.path.display(), e),
        })?;
        let articles = match file {
            ArticleFile::List(articles) | ArticleFile::Wrapped { articles } => articles,
        };
        tracing::debug!(
            "Loaded {} articles from {} for query {:?}",
            articles.len(),
            self.path.display(),
            query
        );

        Ok(articles
            .into_iter()
            .take(limit)
            .enumerate()
            .map(|(index, mut article)| {
                if article.id.trim().is_empty() {
                    article.id = format!("article_{}", index);
                }
                article
            })
            .collect())
    }
}
