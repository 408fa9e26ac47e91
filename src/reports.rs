//! Saved reports behind an opaque key-value store.

use std::collections::BTreeMap;
use std::path::PathBuf;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::error::{ClusterLensError, Result};
use crate::schemas::{OverallAnalysis, SearchResults, TopicAnalysis};

/// A named snapshot of one run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SavedReport {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub original_topic: String,
    #[serde(default)]
    pub transformed_query: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub search_results: Option<SearchResults>,
    pub thought_cluster_analysis: OverallAnalysis,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl SavedReport {
    /// New report with a fresh id. Blank tags are dropped and the rest trimmed.
    pub fn new(name: &str, analysis: OverallAnalysis) -> Result<Self> {
        let name = name.trim();
        if name.is_empty() {
            return Err(ClusterLensError::Validation {
                message: "report name must not be empty".to_string(),
            });
        }
        Ok(Self {
            id: uuid::Uuid::new_v4().to_string(),
            name: name.to_string(),
            description: None,
            original_topic: String::new(),
            transformed_query: String::new(),
            search_results: None,
            thought_cluster_analysis: analysis,
            created_at: Utc::now(),
            tags: Vec::new(),
        })
    }

    pub fn from_topic(name: &str, topic: TopicAnalysis) -> Result<Self> {
        let mut report = Self::new(name, topic.thought_cluster_analysis)?;
        report.original_topic = topic.original_topic;
        report.transformed_query = topic.transformed_query;
        report.search_results = Some(topic.search_results);
        Ok(report)
    }

    pub fn with_description(mut self, description: &str) -> Self {
        let description = description.trim();
        self.description = (!description.is_empty()).then(|| description.to_string());
        self
    }

    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.tags = tags
            .into_iter()
            .map(|t| t.as_ref().trim().to_string())
            .filter(|t| !t.is_empty())
            .collect();
        self
    }
}

/// Key-value persistence for reports. Keys are report ids.
#[async_trait]
pub trait ReportStore: Send + Sync {
    async fn save(&self, report: &SavedReport) -> Result<()>;
    async fn load(&self, id: &str) -> Result<Option<SavedReport>>;
    /// All reports, newest first.
    async fn list(&self) -> Result<Vec<SavedReport>>;
    /// Returns whether a report was removed.
    async fn delete(&self, id: &str) -> Result<bool>;
}

/// One `<id>.json` file per report in a directory.
#[derive(Debug, Clone)]
pub struct JsonDirReportStore {
    dir: PathBuf,
}

impl JsonDirReportStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path_for(&self, id: &str) -> Result<PathBuf> {
        if id.is_empty() || !id.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_') {
            return Err(ClusterLensError::Validation {
                message: format!("invalid report id {:?}", id),
            });
        }
        Ok(self.dir.join(format!("{}.json", id)))
    }
}

#[async_trait]
impl ReportStore for JsonDirReportStore {
    async fn save(&self, report: &SavedReport) -> Result<()> {
        let path = self.path_for(&report.id)?;
        tokio::fs::create_dir_all(&self.dir).await?;
        let body = serde_json::to_vec_pretty(report)?;
        // write-then-rename so readers never see a half-written report
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, body).await?;
        tokio::fs::rename(&tmp, &path).await?;
        tracing::debug!("Saved report {} to {}", report.id, path.display());
        Ok(())
    }

    async fn load(&self, id: &str) -> Result<Option<SavedReport>> {
        let path = self.path_for(id)?;
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn list(&self) -> Result<Vec<SavedReport>> {
        let mut entries = match tokio::fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        let mut reports = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let bytes = tokio::fs::read(&path).await?;
            match serde_json::from_slice::<SavedReport>(&bytes) {
                Ok(report) => reports.push(report),
                Err(e) => tracing::warn!("Skipping unreadable report {}: {}", path.display(), e),
            }
        }
        sort_newest_first(&mut reports);
        Ok(reports)
    }

    async fn delete(&self, id: &str) -> Result<bool> {
        let path = self.path_for(id)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }
}

/// In-process store, mostly for tests and one-shot runs.
#[derive(Debug, Default)]
pub struct MemoryReportStore {
    reports: Mutex<BTreeMap<String, SavedReport>>,
}

impl MemoryReportStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ReportStore for MemoryReportStore {
    async fn save(&self, report: &SavedReport) -> Result<()> {
        self.reports
            .lock()
            .await
            .insert(report.id.clone(), report.clone());
        Ok(())
    }

    async fn load(&self, id: &str) -> Result<Option<SavedReport>> {
        Ok(self.reports.lock().await.get(id).cloned())
    }

    async fn list(&self) -> Result<Vec<SavedReport>> {
        let mut reports: Vec<SavedReport> = self.reports.lock().await.values().cloned().collect();
        sort_newest_first(&mut reports);
        Ok(reports)
    }

    async fn delete(&self, id: &str) -> Result<bool> {
        Ok(self.reports.lock().await.remove(id).is_some())
    }
}

fn sort_newest_first(reports: &mut [SavedReport]) {
    reports.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| a.id.cmp(&b.id)));
}
