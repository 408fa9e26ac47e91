//! Per-article orchestration: annotate, parse, aggregate, summarise.
//!
//! Articles are visited in input order. A failure in one article is recorded
//! as its outcome and never stops the run; only failing to obtain the
//! article collection (or the search query for it) is a run-level error.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures_util::FutureExt;
use futures_util::future::join_all;
use tokio::sync::Semaphore;
use tracing::{debug, error, info, warn};

use crate::clients::{ArticleSource, GenerationParams, Summarizer, TextGenerator};
use crate::clusters::{aggregate, coverage, overall_aggregate, parse_annotations_with_report};
use crate::config::Config;
use crate::error::{ClusterLensError, Result};
use crate::prompts::{QUERY_SYSTEM_PROMPT, annotation_user_prompt, query_user_prompt};
use crate::schemas::{ArticleAnalysis, OverallAnalysis, SearchResults, SourceArticle, TopicAnalysis};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    InsufficientContent { chars: usize, min: usize },
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SkipReason::InsufficientContent { chars, min } => {
                write!(f, "insufficient content ({} < {} chars)", chars, min)
            }
        }
    }
}

/// Lifecycle of one article within a run.
///
/// `Pending -> Skipped` or `Pending -> Analyzing -> Completed | Failed`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArticleState {
    Pending,
    Analyzing,
    Skipped(SkipReason),
    Completed,
    Failed(String),
}

impl ArticleState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ArticleState::Skipped(_) | ArticleState::Completed | ArticleState::Failed(_)
        )
    }

    pub fn can_transition_to(&self, next: &ArticleState) -> bool {
        matches!(
            (self, next),
            (ArticleState::Pending, ArticleState::Skipped(_))
                | (ArticleState::Pending, ArticleState::Analyzing)
                | (ArticleState::Analyzing, ArticleState::Completed)
                | (ArticleState::Analyzing, ArticleState::Failed(_))
        )
    }
}

/// Terminal result for one article.
#[derive(Debug, Clone)]
pub enum ArticleOutcome {
    Skipped {
        article_id: String,
        reason: SkipReason,
    },
    Completed(ArticleAnalysis),
    Failed {
        article_id: String,
        reason: String,
    },
}

impl ArticleOutcome {
    pub fn state(&self) -> ArticleState {
        match self {
            ArticleOutcome::Skipped { reason, .. } => ArticleState::Skipped(reason.clone()),
            ArticleOutcome::Completed(_) => ArticleState::Completed,
            ArticleOutcome::Failed { reason, .. } => ArticleState::Failed(reason.clone()),
        }
    }
}

/// The states one article passed through during a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArticleTrace {
    article_id: String,
    history: Vec<ArticleState>,
    current: ArticleState,
}

impl ArticleTrace {
    pub fn new(article_id: impl Into<String>) -> Self {
        Self {
            article_id: article_id.into(),
            history: Vec::new(),
            current: ArticleState::Pending,
        }
    }

    pub fn article_id(&self) -> &str {
        &self.article_id
    }

    pub fn current(&self) -> &ArticleState {
        &self.current
    }

    /// Every state visited, starting with `Pending` and ending with `current`.
    pub fn path(&self) -> Vec<ArticleState> {
        let mut path = self.history.clone();
        path.push(self.current.clone());
        path
    }

    /// Move to `next` if the lifecycle allows it. Returns whether it moved.
    pub fn advance(&mut self, next: ArticleState) -> bool {
        if !self.current.can_transition_to(&next) {
            warn!(
                "Rejected state change for article {}: {:?} -> {:?}",
                self.article_id, self.current, next
            );
            return false;
        }
        debug!("Article {}: {:?} -> {:?}", self.article_id, self.current, next);
        let previous = std::mem::replace(&mut self.current, next);
        self.history.push(previous);
        true
    }
}

/// Everything a run produced, including articles that did not make it.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub analysis: OverallAnalysis,
    /// One trace per input article, in input order.
    pub articles: Vec<ArticleTrace>,
}

impl RunReport {
    pub fn count(&self, predicate: impl Fn(&ArticleState) -> bool) -> usize {
        self.articles.iter().filter(|t| predicate(t.current())).count()
    }

    pub fn state_of(&self, article_id: &str) -> Option<&ArticleState> {
        self.articles
            .iter()
            .find(|t| t.article_id() == article_id)
            .map(ArticleTrace::current)
    }

    pub fn skipped(&self) -> usize {
        self.count(|s| matches!(s, ArticleState::Skipped(_)))
    }

    pub fn failed(&self) -> usize {
        self.count(|s| matches!(s, ArticleState::Failed(_)))
    }
}

/// Knobs for one pipeline instance.
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub min_content_chars: usize,
    pub pacing: Duration,
    pub max_concurrency: usize,
    pub num_results: usize,
    pub annotation: GenerationParams,
    pub query: GenerationParams,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

impl PipelineSettings {
    pub fn from_config(cfg: &Config) -> Self {
        Self {
            min_content_chars: cfg.pipeline.min_content_chars,
            pacing: cfg.pipeline.pacing(),
            max_concurrency: cfg.pipeline.max_concurrency.max(1),
            num_results: cfg.pipeline.num_results,
            annotation: cfg.generation.params(),
            query: cfg.query.params(),
        }
    }
}

/// Assemble the run result from completed analyses.
pub fn reduce_overall(completed: Vec<ArticleAnalysis>) -> OverallAnalysis {
    let overall_cluster_summary = overall_aggregate(completed.iter().map(|a| &a.cluster_summary));
    OverallAnalysis {
        total_articles_analyzed: completed.len(),
        overall_cluster_summary,
        article_analyses: completed,
    }
}

/// One analysis pipeline. Each run owns its accumulators, so a single
/// instance can serve concurrent runs.
pub struct Pipeline {
    generator: Arc<dyn TextGenerator>,
    summarizer: Arc<dyn Summarizer>,
    instruction: String,
    settings: PipelineSettings,
}

impl Pipeline {
    pub fn new(
        generator: Arc<dyn TextGenerator>,
        summarizer: Arc<dyn Summarizer>,
        instruction: impl Into<String>,
        settings: PipelineSettings,
    ) -> Self {
        Self {
            generator,
            summarizer,
            instruction: instruction.into(),
            settings,
        }
    }

    pub fn settings(&self) -> &PipelineSettings {
        &self.settings
    }

    /// Analyse `articles` and return only the overall result.
    pub async fn analyze(&self, articles: &[SourceArticle]) -> OverallAnalysis {
        self.run(articles).await.analysis
    }

    /// Analyse `articles`, keeping every article's terminal state.
    pub async fn run(&self, articles: &[SourceArticle]) -> RunReport {
        let started = Instant::now();
        info!(
            "Starting thought-cluster analysis for {} articles (concurrency={})",
            articles.len(),
            self.settings.max_concurrency
        );

        let results = if self.settings.max_concurrency > 1 {
            self.run_gated(articles).await
        } else {
            self.run_sequential(articles).await
        };

        let mut traces = Vec::with_capacity(results.len());
        let mut completed = Vec::new();
        for (outcome, trace) in results {
            if let ArticleOutcome::Completed(analysis) = outcome {
                completed.push(analysis);
            }
            traces.push(trace);
        }
        let unfinished = traces.iter().filter(|t| !t.current().is_terminal()).count();
        if unfinished > 0 {
            error!("{} articles ended the run without a terminal state", unfinished);
        }

        let report = RunReport {
            analysis: reduce_overall(completed),
            articles: traces,
        };
        info!(
            "Thought-cluster analysis complete - analyzed={}, skipped={}, failed={}, duration={:.2}s",
            report.analysis.total_articles_analyzed,
            report.skipped(),
            report.failed(),
            started.elapsed().as_secs_f32()
        );
        report
    }

    async fn run_sequential(&self, articles: &[SourceArticle]) -> Vec<(ArticleOutcome, ArticleTrace)> {
        let mut results = Vec::with_capacity(articles.len());
        let mut model_called = false;
        for article in articles {
            let mut trace = ArticleTrace::new(article.id.as_str());
            if let Some(outcome) = self.check_skip(article) {
                trace.advance(outcome.state());
                results.push((outcome, trace));
                continue;
            }
            if model_called && !self.settings.pacing.is_zero() {
                tokio::time::sleep(self.settings.pacing).await;
            }
            model_called = true;
            trace.advance(ArticleState::Analyzing);
            let outcome = self.analyze_guarded(article).await;
            trace.advance(outcome.state());
            results.push((outcome, trace));
        }
        results
    }

    /// Bounded-concurrency variant. A permit is held through the pacing delay
    /// so at most `max_concurrency` calls start per pacing interval.
    async fn run_gated(&self, articles: &[SourceArticle]) -> Vec<(ArticleOutcome, ArticleTrace)> {
        let gate = Semaphore::new(self.settings.max_concurrency);
        let tasks = articles.iter().map(|article| {
            let gate = &gate;
            async move {
                let mut trace = ArticleTrace::new(article.id.as_str());
                if let Some(outcome) = self.check_skip(article) {
                    trace.advance(outcome.state());
                    return (outcome, trace);
                }
                let _permit = match gate.acquire().await {
                    Ok(permit) => permit,
                    Err(e) => {
                        trace.advance(ArticleState::Analyzing);
                        let outcome = self.failed(article, format!("concurrency gate closed: {}", e));
                        trace.advance(outcome.state());
                        return (outcome, trace);
                    }
                };
                trace.advance(ArticleState::Analyzing);
                let outcome = self.analyze_guarded(article).await;
                trace.advance(outcome.state());
                if !self.settings.pacing.is_zero() {
                    tokio::time::sleep(self.settings.pacing).await;
                }
                (outcome, trace)
            }
        });
        // join_all keeps input order
        join_all(tasks).await
    }

    fn check_skip(&self, article: &SourceArticle) -> Option<ArticleOutcome> {
        let chars = article.content_chars();
        if chars >= self.settings.min_content_chars {
            return None;
        }
        let reason = SkipReason::InsufficientContent {
            chars,
            min: self.settings.min_content_chars,
        };
        warn!("Skipping article {:?} - {}", article.title, reason);
        Some(ArticleOutcome::Skipped {
            article_id: article.id.clone(),
            reason,
        })
    }

    /// Runs [`Self::analyze_article`], turning a panic in a collaborator into
    /// a `Failed` outcome for this article only.
    async fn analyze_guarded(&self, article: &SourceArticle) -> ArticleOutcome {
        match AssertUnwindSafe(self.analyze_article(article)).catch_unwind().await {
            Ok(outcome) => outcome,
            Err(payload) => {
                let message = payload
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| payload.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "unknown panic".to_string());
                self.failed(article, format!("analysis panicked: {}", message))
            }
        }
    }

    async fn analyze_article(&self, article: &SourceArticle) -> ArticleOutcome {
        info!("Analyzing article: {:?}", article.title);
        let started = Instant::now();
        let user = annotation_user_prompt(&article.title, &article.content);

        let raw = match self
            .generator
            .generate(&self.instruction, &user, self.settings.annotation)
            .await
        {
            Ok(text) if !text.trim().is_empty() => text,
            Ok(_) => return self.failed(article, "no analysis text received".to_string()),
            Err(e) => return self.failed(article, e.to_string()),
        };
        debug!("Received {} chars of annotated text for {:?}", raw.len(), article.title);

        let (spans, parse) = parse_annotations_with_report(&raw);
        debug!(
            "Parsed {:?}: records={}, spans={}, dropped_records={}, dropped_tags={}, unmatched_chars={}",
            article.title,
            parse.matched_records,
            parse.emitted_spans,
            parse.dropped_records,
            parse.dropped_tags,
            parse.unmatched_chars
        );

        let cluster_summary = aggregate(&spans);
        let stats = coverage(&spans, Some(article.content_chars()));
        debug!(
            "Coverage for {:?}: {:.1}% ({}/{} chars, {}/{} spans)",
            article.title,
            stats.coverage_percentage,
            stats.biased_character_count,
            stats.total_character_count,
            stats.biased_span_count,
            stats.total_span_count
        );

        let narrative_summary = self
            .summarizer
            .summarize(&article.title, &spans, &cluster_summary)
            .await;

        info!(
            "Completed analysis for {:?} - spans={}, categories={}, duration={:.2}s",
            article.title,
            spans.len(),
            cluster_summary.len(),
            started.elapsed().as_secs_f32()
        );
        ArticleOutcome::Completed(ArticleAnalysis {
            article_id: article.id.clone(),
            title: article.title.clone(),
            url: article.url.clone(),
            spans,
            cluster_summary,
            narrative_summary,
        })
    }

    fn failed(&self, article: &SourceArticle, reason: String) -> ArticleOutcome {
        warn!("Error analyzing article {:?}: {}", article.title, reason);
        ArticleOutcome::Failed {
            article_id: article.id.clone(),
            reason,
        }
    }

    /// Rewrite a user topic into a search query.
    pub async fn transform_query(&self, topic: &str) -> Result<String> {
        let prompt = query_user_prompt(topic);
        let text = self
            .generator
            .generate(QUERY_SYSTEM_PROMPT, &prompt, self.settings.query)
            .await
            .map_err(|e| ClusterLensError::QueryTransform {
                message: e.to_string(),
            })?;
        let query = text.trim();
        if query.is_empty() {
            return Err(ClusterLensError::QueryTransform {
                message: "model returned an empty query".to_string(),
            });
        }
        Ok(query.to_string())
    }

    /// Full topic run: rewrite the topic, retrieve articles, analyse them.
    pub async fn analyze_topic(&self, topic: &str, source: &dyn ArticleSource) -> Result<TopicAnalysis> {
        let topic = topic.trim();
        if topic.is_empty() {
            return Err(ClusterLensError::Validation {
                message: "Topic is required".to_string(),
            });
        }
        info!("Analyzing topic: {:?}", topic);

        let query = self.transform_query(topic).await.inspect_err(|e| {
            error!("Query transformation failed for {:?}: {}", topic, e);
        })?;
        info!("Transformed query: {:?}", query);

        let articles = source
            .fetch(&query, self.settings.num_results)
            .await
            .map_err(|e| {
                error!("Article retrieval failed for {:?}: {}", query, e);
                ClusterLensError::Retrieval {
                    message: e.to_string(),
                }
            })?;

        let report = self.run(&articles).await;
        Ok(TopicAnalysis {
            original_topic: topic.to_string(),
            transformed_query: query.clone(),
            search_results: SearchResults {
                query,
                total_results: articles.len(),
                articles,
            },
            thought_cluster_analysis: report.analysis,
        })
    }
}
