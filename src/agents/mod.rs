//! Agent System
//!
//! The research agents and the loop that drives them:
//!
//! - **Planning Agent**: Streams a strategic plan and extracts the first queries
//! - **Search Agent**: Searches, scrapes and summarizes pages through the browser service
//! - **Evaluation Agent**: Extracts learnings and judges completeness
//! - **Refiner**: Decides whether to continue and deduplicates follow-up queries
//! - **Synthesis Agent**: Writes the cited report
//!
//! ## Pipeline Overview
//!
//! ```text
//!  User Query
//!      │
//!      ▼
//! ┌─────────────┐
//! │  Planning   │  → Initial sub-queries
//! │   Agent     │
//! └─────────────┘
//!      │
//!      ▼
//! ┌─────────────┐
//! │   Search    │  → Summarized sources (sequential)   ◄──┐
//! │   Agent     │                                         │
//! └─────────────┘                                         │
//!      │                                                  │
//!      ▼                                                  │
//! ┌─────────────┐                                         │
//! │ Evaluation  │  → Learnings, coverage, directions      │
//! │   Agent     │                                         │
//! └─────────────┘                                         │
//!      │                                                  │
//!      ▼                                                  │
//! ┌─────────────┐                                         │
//! │  Refiner    │  → Continue with new queries ───────────┘
//! └─────────────┘
//!      │ stop
//!      ▼
//! ┌─────────────┐
//! │  Synthesis  │  → Cited report
//! │   Agent     │
//! └─────────────┘
//! ```

pub mod evaluation;
pub mod orchestrator;
pub mod planning;
pub mod prompts;
pub mod refinement;
pub mod search;
pub mod synthesis;

// Re-export main components
pub use evaluation::EvaluationAgent;
pub use orchestrator::DeepResearchAgent;
pub use planning::PlanningAgent;
pub use refinement::Refiner;
pub use search::{SearchAgent, SearchOptions};
pub use synthesis::{Synthesis, SynthesisAgent};
