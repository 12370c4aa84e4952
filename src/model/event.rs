use serde::{Deserialize, Serialize};
use serde_json::Value;
use time::OffsetDateTime;

/// Closed tag set for the Orchestrator's progress stream (spec.md §6).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    Started,
    Thinking,
    Hypothesizing,
    Searching,
    SearchComplete,
    Analyzing,
    AnalysisComplete,
    Judging,
    JudgeComplete,
    Looping,
    Synthesizing,
    Streaming,
    Progress,
    Complete,
    Error,
}

/// One item in the Orchestrator's single-consumer Event stream. Strictly
/// ordered, never reordered or buffered past the consumer (spec.md §4.5).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    #[serde(rename = "type")]
    pub kind: EventKind,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    pub iteration: u32,
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
}

impl Event {
    pub fn new(kind: EventKind, message: impl Into<String>, iteration: u32) -> Self {
        Self {
            kind,
            message: message.into(),
            data: None,
            iteration,
            timestamp: OffsetDateTime::now_utc(),
        }
    }

    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }
}
