//! Event types flowing from the engine to the controller and from the
//! controller to the output sink.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::mpsc;

use crate::automation::state::PlanStep;

/// Step-progress events, discriminated by `type`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProgressEvent {
    Planning,
    PlanReady {
        steps: Vec<PlanStep>,
    },
    PlanError {
        error: String,
    },
    #[serde(rename_all = "camelCase")]
    StepStart {
        step_index: usize,
    },
    #[serde(rename_all = "camelCase")]
    StepDone {
        step_index: usize,
        #[serde(default)]
        stdout: String,
        #[serde(default)]
        exit_code: i32,
    },
    #[serde(rename_all = "camelCase")]
    StepFailed {
        step_index: usize,
        error: String,
        #[serde(default)]
        stderr: String,
    },
    #[serde(rename_all = "camelCase")]
    AllDone {
        total_count: usize,
        #[serde(default)]
        skill_results: Vec<Value>,
    },
}

/// What an engine emits while it runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EngineEvent {
    Token { text: String },
    Progress { event: ProgressEvent },
}

/// Sender handed to the engine for the duration of one execution.
pub type EngineEvents = mpsc::UnboundedSender<EngineEvent>;

/// What the controller surfaces to its consumer.
#[derive(Debug, Clone, PartialEq)]
pub enum OutputEvent {
    Token(String),
    Progress(ProgressEvent),
    Question {
        question: String,
        options: Vec<String>,
    },
    Completed {
        summary: String,
    },
    Error {
        message: String,
    },
    /// Exactly one per submitted prompt, always last.
    StreamEnd,
}

impl OutputEvent {
    /// Plain-text rendering for a terminal consumer.
    pub fn render(&self) -> String {
        match self {
            OutputEvent::Token(text) => text.clone(),
            OutputEvent::Progress(p) => format!("\n{}", render_progress(p)),
            OutputEvent::Question { question, options } => {
                let mut out = format!("\n? {}", question);
                for (i, opt) in options.iter().enumerate() {
                    out.push_str(&format!("\n  {}. {}", i + 1, opt));
                }
                out
            }
            OutputEvent::Completed { summary } => format!("\n{}", summary),
            OutputEvent::Error { message } => format!("\nerror: {}", message),
            OutputEvent::StreamEnd => "\n".to_string(),
        }
    }
}

fn render_progress(event: &ProgressEvent) -> String {
    match event {
        ProgressEvent::Planning => "[planning]".to_string(),
        ProgressEvent::PlanReady { steps } => {
            let names: Vec<&str> = steps.iter().map(|s| s.skill.as_str()).collect();
            format!("[plan] {} steps: {}", steps.len(), names.join(" -> "))
        }
        ProgressEvent::PlanError { error } => format!("[plan error] {}", error),
        ProgressEvent::StepStart { step_index } => format!("[step {}] started", step_index + 1),
        ProgressEvent::StepDone { step_index, exit_code, .. } => {
            format!("[step {}] done (exit {})", step_index + 1, exit_code)
        }
        ProgressEvent::StepFailed { step_index, error, .. } => {
            format!("[step {}] failed: {}", step_index + 1, error)
        }
        ProgressEvent::AllDone { total_count, .. } => format!("[done] {} steps", total_count),
    }
}
