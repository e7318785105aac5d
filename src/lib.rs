// Steel Deep Research - iterative research agent over LLM providers and Steel

pub mod agents;
pub mod config;
pub mod events;
pub mod llm;
pub mod models;
pub mod search;
pub mod types;
pub mod utils;

#[cfg(any(test, feature = "test-support"))]
pub mod test_support;

// Re-exports for convenience
pub use agents::DeepResearchAgent;
pub use config::Config;
pub use events::{ResearchEvent, RunContext};
pub use models::{ResearchOptions, ResearchReport};
// Note: Import specific items from types module instead of glob to avoid name conflicts
// e.g., use steel_deep_research::types::{LLMRequest, LLMResponse, AppResult};
