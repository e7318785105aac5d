// LLM abstraction layer

pub mod provider;
pub mod openai;
pub mod anthropic;
pub mod sse;
pub mod structured;

pub use provider::*;
pub use structured::extract_json;
