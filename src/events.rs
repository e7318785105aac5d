//! Research events and the per-run context
//!
//! Every component receives a [`RunContext`] explicitly. The context carries the
//! run's session id and an optional channel on which typed [`ResearchEvent`]s
//! are published for whoever is watching (the CLI, a UI, a test).

use serde::Serialize;
use tokio::sync::mpsc;
use tracing::debug;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResearchPhase {
    Planning,
    Searching,
    Evaluating,
    Refining,
    Synthesizing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolKind {
    Search,
    Scrape,
    Summarize,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ResearchEvent {
    Progress {
        session_id: Uuid,
        phase: ResearchPhase,
        message: String,
        current_depth: u32,
        max_depth: u32,
    },
    PlanToken {
        session_id: Uuid,
        text: String,
    },
    ToolCall {
        session_id: Uuid,
        call_id: Uuid,
        tool: ToolKind,
        input: String,
    },
    ToolResult {
        session_id: Uuid,
        call_id: Uuid,
        tool: ToolKind,
        success: bool,
        output: String,
    },
    Error {
        session_id: Uuid,
        message: String,
    },
    Completed {
        session_id: Uuid,
        report_id: String,
        sources: usize,
    },
}

impl ResearchEvent {
    pub fn session_id(&self) -> Uuid {
        match self {
            ResearchEvent::Progress { session_id, .. }
            | ResearchEvent::PlanToken { session_id, .. }
            | ResearchEvent::ToolCall { session_id, .. }
            | ResearchEvent::ToolResult { session_id, .. }
            | ResearchEvent::Error { session_id, .. }
            | ResearchEvent::Completed { session_id, .. } => *session_id,
        }
    }
}

/// Per-run state threaded through every component call
#[derive(Debug, Clone)]
pub struct RunContext {
    session_id: Uuid,
    events: Option<mpsc::UnboundedSender<ResearchEvent>>,
}

impl Default for RunContext {
    fn default() -> Self {
        Self::new()
    }
}

impl RunContext {
    /// A context whose events go nowhere
    pub fn new() -> Self {
        Self {
            session_id: Uuid::new_v4(),
            events: None,
        }
    }

    /// A context plus the receiving end of its event channel
    pub fn with_channel() -> (Self, mpsc::UnboundedReceiver<ResearchEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            Self {
                session_id: Uuid::new_v4(),
                events: Some(tx),
            },
            rx,
        )
    }

    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    fn emit(&self, event: ResearchEvent) {
        if let Some(tx) = &self.events {
            if tx.send(event).is_err() {
                debug!(session_id = %self.session_id, "Event receiver dropped");
            }
        }
    }

    pub fn progress(
        &self,
        phase: ResearchPhase,
        message: impl Into<String>,
        current_depth: u32,
        max_depth: u32,
    ) {
        self.emit(ResearchEvent::Progress {
            session_id: self.session_id,
            phase,
            message: message.into(),
            current_depth,
            max_depth,
        });
    }

    pub fn plan_token(&self, text: &str) {
        self.emit(ResearchEvent::PlanToken {
            session_id: self.session_id,
            text: text.to_string(),
        });
    }

    /// Announce a tool call; the returned id pairs it with its result
    pub fn tool_call(&self, tool: ToolKind, input: impl Into<String>) -> Uuid {
        let call_id = Uuid::new_v4();
        self.emit(ResearchEvent::ToolCall {
            session_id: self.session_id,
            call_id,
            tool,
            input: input.into(),
        });
        call_id
    }

    pub fn tool_result(
        &self,
        call_id: Uuid,
        tool: ToolKind,
        success: bool,
        output: impl Into<String>,
    ) {
        self.emit(ResearchEvent::ToolResult {
            session_id: self.session_id,
            call_id,
            tool,
            success,
            output: output.into(),
        });
    }

    pub fn error(&self, message: impl Into<String>) {
        self.emit(ResearchEvent::Error {
            session_id: self.session_id,
            message: message.into(),
        });
    }

    pub fn completed(&self, report_id: &str, sources: usize) {
        self.emit(ResearchEvent::Completed {
            session_id: self.session_id,
            report_id: report_id.to_string(),
            sources,
        });
    }
}
