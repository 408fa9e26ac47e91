use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::clients::GenerationParams;

/// Main configuration structure loaded from cluster_lens.toml and environment variables
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    pub pipeline: PipelineConfig,
    pub generation: GenerationConfig,
    pub summary: SummaryConfig,
    pub query: QueryConfig,
    /// Runtime configuration loaded from environment variables
    #[serde(skip)]
    pub runtime: RuntimeConfig,
}

/// Per-article loop behaviour
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Articles with fewer content characters are skipped before any model call
    pub min_content_chars: usize,
    /// Fixed delay before each article's model call after the first
    pub pacing_ms: u64,
    /// 1 = sequential; higher values run articles behind a bounded gate
    pub max_concurrency: usize,
    /// Articles requested from the retrieval collaborator per topic
    pub num_results: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            min_content_chars: 100,
            pacing_ms: 500,
            max_concurrency: 1,
            num_results: 20,
        }
    }
}

impl PipelineConfig {
    pub fn pacing(&self) -> Duration {
        Duration::from_millis(self.pacing_ms)
    }
}

/// Annotation model endpoint and sampling
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct GenerationConfig {
    pub base_url: String,
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f32,
    /// Whole-request timeout; 0 disables it
    pub timeout_ms: u64,
    /// Optional file replacing the built-in annotation instruction
    pub system_prompt_path: Option<PathBuf>,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.anthropic.com".to_string(),
            model: "claude-sonnet-4-20250514".to_string(),
            max_tokens: 64_000,
            temperature: 0.3,
            timeout_ms: 0,
            system_prompt_path: None,
        }
    }
}

impl GenerationConfig {
    pub fn params(&self) -> GenerationParams {
        GenerationParams {
            max_tokens: self.max_tokens,
            temperature: self.temperature,
        }
    }

    /// The annotation system instruction, from `system_prompt_path` if set.
    pub fn annotation_instruction(&self) -> anyhow::Result<String> {
        match &self.system_prompt_path {
            Some(path) => {
                let text = std::fs::read_to_string(path).map_err(|e| {
                    anyhow::anyhow!("Failed to load system prompt {}: {}", path.display(), e)
                })?;
                if text.trim().is_empty() {
                    anyhow::bail!("System prompt file {} is empty", path.display());
                }
                Ok(text)
            }
            None => Ok(crate::prompts::ANNOTATION_SYSTEM_PROMPT.to_string()),
        }
    }
}

/// Narrative summary call
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SummaryConfig {
    /// Falls back to the generation model when unset
    pub model: Option<String>,
    pub max_tokens: u32,
    pub temperature: f32,
}

impl Default for SummaryConfig {
    fn default() -> Self {
        Self {
            model: None,
            max_tokens: 1000,
            temperature: 0.3,
        }
    }
}

impl SummaryConfig {
    pub fn params(&self) -> GenerationParams {
        GenerationParams {
            max_tokens: self.max_tokens,
            temperature: self.temperature,
        }
    }
}

/// Topic to search-query rewrite
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct QueryConfig {
    pub max_tokens: u32,
    pub temperature: f32,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            max_tokens: 200,
            temperature: 0.7,
        }
    }
}

impl QueryConfig {
    pub fn params(&self) -> GenerationParams {
        GenerationParams {
            max_tokens: self.max_tokens,
            temperature: self.temperature,
        }
    }
}

/// Runtime configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    pub anthropic_api_key: Option<String>,
    pub log_level: String,
    pub reports_dir: PathBuf,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            anthropic_api_key: None,
            log_level: "cluster_lens=info".to_string(),
            reports_dir: PathBuf::from("reports"),
        }
    }
}

impl RuntimeConfig {
    pub fn load_from_env() -> Self {
        let mut cfg = Self::default();
        cfg.anthropic_api_key = std::env::var("ANTHROPIC_API_KEY")
            .ok()
            .filter(|k| !k.trim().is_empty());
        if let Ok(level) = std::env::var("CLUSTER_LENS_LOG") {
            cfg.log_level = level;
        }
        if let Ok(dir) = std::env::var("CLUSTER_LENS_REPORTS_DIR") {
            cfg.reports_dir = PathBuf::from(dir);
        }
        cfg
    }
}

impl Config {
    /// Load configuration from TOML file and environment variables
    /// Uses CLUSTER_LENS_CONFIG environment variable or defaults to "cluster_lens.toml"
    pub fn load() -> anyhow::Result<Self> {
        if let Ok(env_path) = std::env::var("CLUSTER_LENS_ENV_FILE") {
            let _ = dotenvy::from_path(env_path);
        } else {
            let _ = dotenvy::dotenv();
        }

        let config_path = std::env::var("CLUSTER_LENS_CONFIG")
            .unwrap_or_else(|_| "cluster_lens.toml".to_string());

        let mut config: Config = if let Ok(content) = std::fs::read_to_string(&config_path) {
            toml::from_str(&content)?
        } else {
            tracing::warn!("Config file {} not found, using defaults", config_path);
            Self::default()
        };

        config.apply_env_overrides();
        config.runtime = RuntimeConfig::load_from_env();
        config.validate()?;
        Ok(config)
    }

    fn apply_env_overrides(&mut self) {
        if let Some(min) = env_parse::<usize>("CLUSTER_LENS_MIN_CONTENT_CHARS") {
            self.pipeline.min_content_chars = min;
        }
        if let Some(pacing) = env_parse::<u64>("CLUSTER_LENS_PACING_MS") {
            self.pipeline.pacing_ms = pacing;
        }
        if let Some(conc) = env_parse::<usize>("CLUSTER_LENS_MAX_CONCURRENCY") {
            self.pipeline.max_concurrency = conc;
        }
        if let Ok(model) = std::env::var("CLUSTER_LENS_MODEL") {
            tracing::debug!("CLUSTER_LENS_MODEL env override applied");
            self.generation.model = model;
        }
        if let Ok(url) = std::env::var("ANTHROPIC_BASE_URL") {
            tracing::debug!("ANTHROPIC_BASE_URL env override applied");
            self.generation.base_url = url;
        }
    }

    /// Validate and clamp values
    pub fn validate(&mut self) -> anyhow::Result<()> {
        if self.pipeline.max_concurrency == 0 {
            self.pipeline.max_concurrency = 1;
        } else if self.pipeline.max_concurrency > 16 {
            tracing::warn!(
                "max_concurrency {} exceeds max 16, clamping to 16",
                self.pipeline.max_concurrency
            );
            self.pipeline.max_concurrency = 16;
        }
        if self.generation.model.trim().is_empty() {
            anyhow::bail!("generation.model must not be empty");
        }
        if !self.generation.base_url.starts_with("http://")
            && !self.generation.base_url.starts_with("https://")
        {
            anyhow::bail!(
                "generation.base_url '{}' must start with http:// or https://",
                self.generation.base_url
            );
        }
        for (name, t) in [
            ("generation.temperature", self.generation.temperature),
            ("summary.temperature", self.summary.temperature),
            ("query.temperature", self.query.temperature),
        ] {
            if !(0.0..=1.0).contains(&t) {
                anyhow::bail!("{} must be between 0.0 and 1.0, got {}", name, t);
            }
        }
        if self.generation.max_tokens == 0 || self.summary.max_tokens == 0 || self.query.max_tokens == 0 {
            anyhow::bail!("max_tokens must be greater than 0");
        }
        Ok(())
    }

    /// Model used for narrative summaries
    pub fn summary_model(&self) -> &str {
        self.summary.model.as_deref().unwrap_or(&self.generation.model)
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.parse::<T>().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_pipeline_constants() {
        let config = Config::default();
        assert_eq!(config.pipeline.min_content_chars, 100);
        assert_eq!(config.pipeline.pacing(), Duration::from_millis(500));
        assert_eq!(config.pipeline.max_concurrency, 1);
        assert_eq!(config.summary_model(), config.generation.model);
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let config: Config = toml::from_str(
            r#"
            [pipeline]
            pacing_ms = 50

            [summary]
            model = "claude-haiku-4-5"
            "#,
        )
        .unwrap();
        assert_eq!(config.pipeline.pacing_ms, 50);
        assert_eq!(config.pipeline.min_content_chars, 100);
        assert_eq!(config.summary_model(), "claude-haiku-4-5");
        assert_eq!(config.generation.max_tokens, 64_000);
    }

    #[test]
    fn validate_clamps_and_rejects() {
        let mut config = Config::default();
        config.pipeline.max_concurrency = 0;
        config.validate().unwrap();
        assert_eq!(config.pipeline.max_concurrency, 1);

        config.summary.temperature = 1.5;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.generation.base_url = "api.anthropic.com".into();
        assert!(config.validate().is_err());
    }

    #[test]
    fn instruction_defaults_to_builtin_prompt() {
        let generation = GenerationConfig::default();
        let text = generation.annotation_instruction().unwrap();
        assert_eq!(text, crate::prompts::ANNOTATION_SYSTEM_PROMPT);
    }

    #[test]
    fn instruction_file_override() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("prompt.md");
        std::fs::write(&path, "Tag every sentence.").unwrap();
        let generation = GenerationConfig {
            system_prompt_path: Some(path),
            ..GenerationConfig::default()
        };
        assert_eq!(generation.annotation_instruction().unwrap(), "Tag every sentence.");

        let missing = GenerationConfig {
            system_prompt_path: Some(dir.path().join("nope.md")),
            ..GenerationConfig::default()
        };
        assert!(missing.annotation_instruction().is_err());
    }
}
