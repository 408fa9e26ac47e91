pub mod clients;
pub mod clusters;
pub mod config;
pub mod error;
pub mod pipeline;
pub mod prompts;
pub mod reports;
pub mod schemas;
pub mod summary;

use std::sync::Arc;

use anyhow::Context;

use crate::clients::{AnthropicClient, TextGenerator};
use crate::config::Config;
use crate::pipeline::{Pipeline, PipelineSettings};
use crate::summary::ModelSummarizer;

/// Wire up a pipeline backed by the Anthropic API from configuration.
pub fn build_pipeline(config: &Config) -> anyhow::Result<Pipeline> {
    let client = AnthropicClient::new(&config.generation, config.runtime.anthropic_api_key.clone())
        .context("Failed to create Anthropic client")?;
    let summary_client: Arc<dyn TextGenerator> = Arc::new(client.with_model(config.summary_model()));
    let summarizer = Arc::new(ModelSummarizer::new(summary_client, config.summary.params()));
    let instruction = config.generation.annotation_instruction()?;

    Ok(Pipeline::new(
        Arc::new(client),
        summarizer,
        instruction,
        PipelineSettings::from_config(config),
    ))
}
