use crate::models::ResearchOptions;
use crate::types::{AppError, AppResult};
use serde::Deserialize;
use std::env;
use std::path::Path;

const ENV_PREFIX: &str = "DEEP_RESEARCH";

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub llm: LLMConfig,
    pub steel: SteelConfig,
    pub research: ResearchConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LLMConfig {
    pub provider: String,
    pub model: String,
    pub openai_api_key: String,
    pub anthropic_api_key: String,
    pub openai_base_url: String,
    pub anthropic_base_url: String,
    pub temperature: f32,
}

impl LLMConfig {
    /// API key for the configured provider, if one is set
    pub fn active_api_key(&self) -> Option<String> {
        let key = match self.provider.as_str() {
            "anthropic" => &self.anthropic_api_key,
            _ => &self.openai_api_key,
        };
        if key.is_empty() {
            None
        } else {
            Some(key.clone())
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SteelConfig {
    pub api_key: String,
    pub base_url: String,
    /// Results page scraped for every search, the query goes in `q`
    pub search_url: String,
    pub retry_attempts: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ResearchConfig {
    pub depth: u32,
    pub breadth: u32,
    pub max_sources: usize,
    pub summary_tokens: u32,
    pub max_results_per_query: usize,
    pub timeout_secs: u64,
    pub refiner: RefinerConfig,
}

impl ResearchConfig {
    pub fn options(&self) -> ResearchOptions {
        ResearchOptions {
            depth: self.depth,
            breadth: self.breadth,
            max_sources: self.max_sources,
            summary_tokens: self.summary_tokens,
            max_results_per_query: self.max_results_per_query,
            timeout_secs: self.timeout_secs,
        }
    }
}

/// Thresholds used by the refiner's word-overlap heuristics
#[derive(Debug, Clone, Deserialize)]
pub struct RefinerConfig {
    /// Overlap above which a new query counts as already issued
    pub query_similarity: f64,
    /// Overlap above which a learning counts as already known
    pub learning_similarity: f64,
    /// Share of novel learnings below which returns are diminishing
    pub min_novelty: f64,
    /// Learnings needed before diminishing returns are checked
    pub min_learnings: usize,
}

impl Default for RefinerConfig {
    fn default() -> Self {
        Self {
            query_similarity: 0.7,
            learning_similarity: 0.6,
            min_novelty: 0.3,
            min_learnings: 10,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    pub filter: String,
    pub directory: Option<String>,
    pub file_prefix: String,
}

impl Config {
    /// Defaults, then the optional config file, then `DEEP_RESEARCH__*`
    /// variables, then the conventional provider variables.
    pub fn load(path: Option<&Path>) -> AppResult<Self> {
        dotenvy::dotenv().ok();

        let mut builder = ::config::Config::builder()
            .set_default("llm.provider", "openai")
            .and_then(|b| b.set_default("llm.model", "gpt-4o"))
            .and_then(|b| b.set_default("llm.openai_api_key", ""))
            .and_then(|b| b.set_default("llm.anthropic_api_key", ""))
            .and_then(|b| b.set_default("llm.openai_base_url", "https://api.openai.com/v1"))
            .and_then(|b| b.set_default("llm.anthropic_base_url", "https://api.anthropic.com"))
            .and_then(|b| b.set_default("llm.temperature", 0.3))
            .and_then(|b| b.set_default("steel.api_key", ""))
            .and_then(|b| b.set_default("steel.base_url", "https://api.steel.dev"))
            .and_then(|b| b.set_default("steel.search_url", "https://www.google.com/search"))
            .and_then(|b| b.set_default("steel.retry_attempts", 3))
            .and_then(|b| b.set_default("research.depth", 3))
            .and_then(|b| b.set_default("research.breadth", 3))
            .and_then(|b| b.set_default("research.max_sources", 60))
            .and_then(|b| b.set_default("research.summary_tokens", 500))
            .and_then(|b| b.set_default("research.max_results_per_query", 5))
            .and_then(|b| b.set_default("research.timeout_secs", 60))
            .and_then(|b| b.set_default("research.refiner.query_similarity", 0.7))
            .and_then(|b| b.set_default("research.refiner.learning_similarity", 0.6))
            .and_then(|b| b.set_default("research.refiner.min_novelty", 0.3))
            .and_then(|b| b.set_default("research.refiner.min_learnings", 10))
            .and_then(|b| b.set_default("logging.filter", "steel_deep_research=info"))
            .and_then(|b| b.set_default("logging.file_prefix", "deep-research.log"))
            .map_err(|e| AppError::Config(e.to_string()))?;

        if let Some(path) = path {
            builder = builder.add_source(::config::File::from(path).required(true));
        }

        builder = builder
            .add_source(
                ::config::Environment::with_prefix(ENV_PREFIX)
                    .try_parsing(true)
                    .prefix_separator("__")
                    .separator("__"),
            )
            .set_override_option("llm.openai_api_key", env::var("OPENAI_API_KEY").ok())
            .and_then(|b| {
                b.set_override_option("llm.anthropic_api_key", env::var("ANTHROPIC_API_KEY").ok())
            })
            .and_then(|b| b.set_override_option("llm.provider", env::var("LLM_PROVIDER").ok()))
            .and_then(|b| b.set_override_option("llm.model", env::var("LLM_MODEL").ok()))
            .and_then(|b| b.set_override_option("steel.api_key", env::var("STEEL_API_KEY").ok()))
            .map_err(|e| AppError::Config(e.to_string()))?;

        let config: Config = builder
            .build()
            .and_then(|c| c.try_deserialize())
            .map_err(|e| AppError::Config(e.to_string()))?;

        config.check()?;
        Ok(config)
    }

    fn check(&self) -> AppResult<()> {
        if crate::types::LLMProvider::from_id(&self.llm.provider).is_none() {
            return Err(AppError::Config(format!(
                "unsupported LLM provider: {}",
                self.llm.provider
            )));
        }
        let thresholds = [
            self.research.refiner.query_similarity,
            self.research.refiner.learning_similarity,
            self.research.refiner.min_novelty,
        ];
        if thresholds.iter().any(|t| !(0.0..=1.0).contains(t)) {
            return Err(AppError::Config(
                "refiner thresholds must be within [0, 1]".to_string(),
            ));
        }
        Ok(())
    }
}
