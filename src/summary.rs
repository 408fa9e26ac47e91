//! Narrative summaries with fixed fallbacks. A failed summary never fails the article.

use std::sync::Arc;

use async_trait::async_trait;

use crate::clients::{GenerationParams, Summarizer, TextGenerator};
use crate::clusters::{ClusterSummary, Span};
use crate::prompts::{SUMMARY_SYSTEM_PROMPT, summary_user_prompt};

pub const NO_BIASES_SUMMARY: &str = "No significant cognitive biases detected in this article.";
pub const EMPTY_SUMMARY_FALLBACK: &str = "Unable to generate bias summary.";
pub const FAILED_SUMMARY_FALLBACK: &str = "Error generating bias summary for this article.";

/// Summarizer that asks a text generator for a short narrative.
pub struct ModelSummarizer {
    generator: Arc<dyn TextGenerator>,
    params: GenerationParams,
}

impl ModelSummarizer {
    pub fn new(generator: Arc<dyn TextGenerator>, params: GenerationParams) -> Self {
        Self { generator, params }
    }
}

#[async_trait]
impl Summarizer for ModelSummarizer {
    async fn summarize(&self, title: &str, spans: &[Span], summary: &ClusterSummary) -> String {
        if spans.is_empty() || summary.is_empty() {
            return NO_BIASES_SUMMARY.to_string();
        }

        let prompt = summary_user_prompt(title, spans, summary);
        match self
            .generator
            .generate(SUMMARY_SYSTEM_PROMPT, &prompt, self.params)
            .await
        {
            Ok(text) if !text.trim().is_empty() => text.trim().to_string(),
            Ok(_) => EMPTY_SUMMARY_FALLBACK.to_string(),
            Err(e) => {
                tracing::warn!("Summary generation failed for {:?}: {}", title, e);
                FAILED_SUMMARY_FALLBACK.to_string()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clients::ClientError;
    use crate::clusters::{aggregate, parse_annotations};
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Scripted {
        reply: Option<&'static str>,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl TextGenerator for Scripted {
        async fn generate(
            &self,
            system: &str,
            _user: &str,
            _params: GenerationParams,
        ) -> Result<String, ClientError> {
            assert_eq!(system, SUMMARY_SYSTEM_PROMPT);
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.reply
                .map(str::to_string)
                .ok_or_else(|| ClientError::Quota("slow down".into()))
        }
    }

    fn summarizer(reply: Option<&'static str>) -> (ModelSummarizer, Arc<Scripted>) {
        let generator = Arc::new(Scripted {
            reply,
            calls: AtomicUsize::new(0),
        });
        let params = GenerationParams {
            max_tokens: 100,
            temperature: 0.3,
        };
        (ModelSummarizer::new(generator.clone(), params), generator)
    }

    #[tokio::test]
    async fn returns_trimmed_model_text() {
        let (s, _) = summarizer(Some("  Mostly anchoring.\n"));
        let spans = parse_annotations("x<anchoring_bias:0.5>");
        let out = s.summarize("T", &spans, &aggregate(&spans)).await;
        assert_eq!(out, "Mostly anchoring.");
    }

    #[tokio::test]
    async fn no_spans_skips_the_model() {
        let (s, generator) = summarizer(Some("unused"));
        let out = s.summarize("T", &[], &ClusterSummary::new()).await;
        assert_eq!(out, NO_BIASES_SUMMARY);
        assert_eq!(generator.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn failures_fall_back() {
        let spans = parse_annotations("x<a:1>");
        let (failing, _) = summarizer(None);
        assert_eq!(
            failing.summarize("T", &spans, &aggregate(&spans)).await,
            FAILED_SUMMARY_FALLBACK
        );
        let (blank, _) = summarizer(Some("   "));
        assert_eq!(
            blank.summarize("T", &spans, &aggregate(&spans)).await,
            EMPTY_SUMMARY_FALLBACK
        );
    }
}
