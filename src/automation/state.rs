//! Automation state as exchanged with the execution engine.
//!
//! The same struct is the engine's input and its output. On the way out
//! the engine fills in trace, intent, timing and, when it needs the user,
//! `pending_question`.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One step of a generated plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanStep {
    pub index: usize,
    pub skill: String,
    #[serde(default)]
    pub description: String,
}

/// A blocking question raised by the engine.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PendingQuestion {
    pub question: String,
    pub options: Vec<String>,
    pub failed_skill: Option<String>,
    pub failed_step_index: Option<usize>,
    pub reason: Option<String>,
}

/// The user's answer, packaged for a replan.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RecoveryContext {
    pub failed_skill: Option<String>,
    pub failed_step_index: Option<usize>,
    pub failure_reason: Option<String>,
    pub user_suggestion: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecoveryAction {
    Replan,
}

/// Identity block sent with every execution.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ExecutionContext {
    pub session_id: Option<String>,
    pub user_id: String,
    pub source: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AutomationState {
    pub message: String,
    pub selected_text: String,
    pub context: ExecutionContext,

    pub trace: Vec<Value>,
    pub intent: Option<String>,
    pub skill_plan: Option<Vec<PlanStep>>,
    pub plan_cursor: usize,
    pub pending_question: Option<PendingQuestion>,

    pub recovery_context: Option<RecoveryContext>,
    pub recovery_action: Option<RecoveryAction>,
    pub failed_step: Option<usize>,
    pub step_retry_count: u32,

    pub plan_error: Option<String>,
    pub resolved_session_id: Option<String>,
    pub elapsed_ms: Option<u64>,
}

/// What the engine hands back.
pub type FinalState = AutomationState;

impl AutomationState {
    /// A fresh request for `message`.
    pub fn fresh(message: &str, selected_text: &str, context: ExecutionContext) -> Self {
        Self {
            message: message.to_string(),
            selected_text: selected_text.to_string(),
            context,
            ..Self::default()
        }
    }

    /// Forget the failure that raised the last question.
    pub fn clear_failure(&mut self) {
        self.pending_question = None;
        self.failed_step = None;
        self.recovery_context = None;
        self.recovery_action = None;
        self.step_retry_count = 0;
    }
}

/// Snapshot of a state that is waiting on the user.
#[derive(Debug, Clone, PartialEq)]
pub struct PausedAutomation {
    pub state: AutomationState,
    /// Questions already answered for this automation.
    pub rounds: u32,
}

impl PausedAutomation {
    pub fn question(&self) -> Option<&PendingQuestion> {
        self.state.pending_question.as_ref()
    }
}
