//! Automation domain: the single entry point for "process this prompt".
//!
//! - **state**: engine input/output state, paused snapshot
//! - **reply**: abort / skip / free-form answer classification
//! - **events**: progress, engine and output event types
//! - **engine**: the `ExecutionEngine` seam and the RPC-hosted engine
//!
//! The controller owns the session id and at most one paused automation.
//! A prompt arriving while paused is read as the answer to the pending
//! question; otherwise it starts a fresh execution.

pub mod engine;
pub mod events;
pub mod reply;
pub mod state;

pub use engine::{ExecutionEngine, RemoteEngine};
pub use events::{EngineEvent, EngineEvents, OutputEvent, ProgressEvent};
pub use state::{AutomationState, PausedAutomation, PendingQuestion};

use std::sync::{Arc, Mutex};
use std::time::Instant;
use tokio::sync::mpsc;

use crate::clipboard::ClipboardLedger;
use crate::config::AutomationConfig;
use crate::screen_text;
use reply::Reply;
use state::{ExecutionContext, RecoveryAction, RecoveryContext};

/// One user submission.
#[derive(Debug, Clone, Default)]
pub struct Prompt {
    pub message: String,
    pub highlights: Vec<String>,
    /// Raw recognized screen text, if a region was captured.
    pub screen_text: Option<String>,
}

impl Prompt {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            ..Self::default()
        }
    }

    /// Highlights plus the processed screen text, separated by blank lines.
    pub fn selected_text(&self) -> String {
        let mut parts: Vec<String> = self
            .highlights
            .iter()
            .map(|h| h.trim())
            .filter(|h| !h.is_empty())
            .map(str::to_string)
            .collect();
        if let Some(raw) = &self.screen_text {
            let artifact = screen_text::process(raw);
            if !artifact.is_empty() {
                parts.push(artifact.to_highlight());
            }
        }
        parts.join("\n\n")
    }
}

pub struct AutomationController {
    engine: Arc<dyn ExecutionEngine>,
    ledger: Arc<Mutex<ClipboardLedger>>,
    output: mpsc::UnboundedSender<OutputEvent>,
    config: AutomationConfig,
    session_id: Option<String>,
    paused: Option<PausedAutomation>,
}

impl AutomationController {
    pub fn new(
        engine: Arc<dyn ExecutionEngine>,
        ledger: Arc<Mutex<ClipboardLedger>>,
        output: mpsc::UnboundedSender<OutputEvent>,
        config: AutomationConfig,
    ) -> Self {
        Self {
            engine,
            ledger,
            output,
            config,
            session_id: None,
            paused: None,
        }
    }

    pub fn session_id(&self) -> Option<&str> {
        self.session_id.as_deref()
    }

    pub fn paused(&self) -> Option<&PausedAutomation> {
        self.paused.as_ref()
    }

    fn emit(&self, event: OutputEvent) {
        if self.output.send(event).is_err() {
            log::debug!("[AUTOMATION] Output sink closed");
        }
    }

    fn context(&self) -> ExecutionContext {
        ExecutionContext {
            session_id: self.session_id.clone(),
            user_id: self.config.user_id.clone(),
            source: self.config.source.clone(),
        }
    }

    /// Process one prompt end to end. Failures are reported to the output
    /// sink, never returned. Always finishes with exactly one `StreamEnd`.
    pub async fn submit(&mut self, prompt: Prompt) {
        self.ledger
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .record_submission(&prompt.message, Instant::now());

        let previous = self.paused.take();
        let (state, rounds) = self.prepare(&prompt, previous.as_ref());
        let resuming = state.recovery_action.is_some() || rounds > 0;

        log::info!(
            "[AUTOMATION] Executing ({}), cursor {}, session {:?}",
            if resuming { "resume" } else { "fresh" },
            state.plan_cursor,
            self.session_id
        );

        let started = Instant::now();
        let (tx, rx) = mpsc::unbounded_channel();
        let (result, plan_error_streamed) =
            tokio::join!(self.engine.execute(state, tx), forward(rx, &self.output));

        match result {
            Ok(done) => {
                log::info!(
                    "[AUTOMATION] Settled in {}ms (intent {:?})",
                    started.elapsed().as_millis(),
                    done.intent
                );
                self.settle(done, rounds, plan_error_streamed);
            }
            Err(e) => {
                log::error!("[AUTOMATION] Execution failed: {}", e);
                if resuming {
                    self.paused = previous;
                }
                self.emit(OutputEvent::Error {
                    message: e.to_string(),
                });
            }
        }

        self.emit(OutputEvent::StreamEnd);
    }

    /// Build the state for this prompt. The second value counts questions
    /// answered so far for the automation being resumed.
    fn prepare(
        &self,
        prompt: &Prompt,
        paused: Option<&PausedAutomation>,
    ) -> (AutomationState, u32) {
        let fresh = || {
            AutomationState::fresh(&prompt.message, &prompt.selected_text(), self.context())
        };

        let Some(paused) = paused else {
            return (fresh(), 0);
        };

        if let Some(max) = self.config.max_resume_rounds {
            if paused.rounds >= max {
                log::warn!(
                    "[AUTOMATION] Resume limit ({}) reached; starting a fresh request",
                    max
                );
                return (fresh(), 0);
            }
        }

        let options = paused
            .question()
            .map(|q| q.options.clone())
            .unwrap_or_default();

        match reply::classify(&prompt.message, &options) {
            Reply::Abort => {
                log::info!("[AUTOMATION] Paused automation discarded");
                (fresh(), 0)
            }
            Reply::Skip => {
                let mut state = paused.state.clone();
                state.plan_cursor += 1;
                state.clear_failure();
                state.context = self.context();
                log::info!("[AUTOMATION] Skipping to step {}", state.plan_cursor);
                (state, paused.rounds + 1)
            }
            Reply::Answer(answer) => {
                let mut state = paused.state.clone();
                let question = state.pending_question.take().unwrap_or_default();
                state.recovery_context = Some(RecoveryContext {
                    failed_skill: question.failed_skill,
                    failed_step_index: question.failed_step_index.or(state.failed_step),
                    failure_reason: question.reason,
                    user_suggestion: answer,
                });
                state.recovery_action = Some(RecoveryAction::Replan);
                state.skill_plan = None;
                state.plan_cursor = 0;
                state.failed_step = None;
                state.step_retry_count = 0;
                state.context = self.context();
                log::info!("[AUTOMATION] Replanning with user answer");
                (state, paused.rounds + 1)
            }
        }
    }

    fn settle(&mut self, done: AutomationState, rounds: u32, plan_error_streamed: bool) {
        if let Some(id) = done.resolved_session_id.clone() {
            if self.session_id.as_deref() != Some(id.as_str()) {
                log::info!("[AUTOMATION] Session id now {}", id);
            }
            self.session_id = Some(id);
        }

        if let Some(q) = done.pending_question.clone() {
            log::info!("[AUTOMATION] Paused on question: {}", q.question);
            self.paused = Some(PausedAutomation { state: done, rounds });
            self.emit(OutputEvent::Question {
                question: q.question,
                options: q.options,
            });
            return;
        }

        if let Some(error) = done.plan_error.clone() {
            if !plan_error_streamed {
                self.emit(OutputEvent::Progress(ProgressEvent::PlanError { error }));
            }
            return;
        }

        self.emit(OutputEvent::Completed {
            summary: summarize(&done),
        });
    }
}

/// Forward engine events in order until the engine drops its sender.
/// Returns whether a plan error went by.
async fn forward(
    mut rx: mpsc::UnboundedReceiver<EngineEvent>,
    output: &mpsc::UnboundedSender<OutputEvent>,
) -> bool {
    let mut plan_error = false;
    while let Some(event) = rx.recv().await {
        let out = match event {
            EngineEvent::Token { text } => OutputEvent::Token(text),
            EngineEvent::Progress { event } => {
                plan_error |= matches!(event, ProgressEvent::PlanError { .. });
                OutputEvent::Progress(event)
            }
        };
        let _ = output.send(out);
    }
    plan_error
}

fn summarize(done: &AutomationState) -> String {
    let steps = done.skill_plan.as_ref().map(Vec::len).unwrap_or(0);
    let mut summary = match steps {
        0 => "Done".to_string(),
        1 => "Completed 1 step".to_string(),
        n => format!("Completed {} steps", n),
    };
    if let Some(ms) = done.elapsed_ms {
        summary.push_str(&format!(" in {}ms", ms));
    }
    summary
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ClipboardPolicy;
    use crate::error::{Error, Result};
    use async_trait::async_trait;
    use super::state::PlanStep;
    use std::collections::VecDeque;

    /// Replays canned results and records every state it was given.
    struct Scripted {
        results: Mutex<VecDeque<Result<AutomationState>>>,
        seen: Mutex<Vec<AutomationState>>,
    }

    impl Scripted {
        fn new(results: Vec<Result<AutomationState>>) -> Arc<Self> {
            Arc::new(Self {
                results: Mutex::new(results.into()),
                seen: Mutex::new(Vec::new()),
            })
        }

        fn seen(&self) -> Vec<AutomationState> {
            self.seen.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl ExecutionEngine for Scripted {
        async fn execute(
            &self,
            state: AutomationState,
            events: EngineEvents,
        ) -> Result<AutomationState> {
            self.seen.lock().unwrap().push(state.clone());
            let _ = events.send(EngineEvent::Token { text: "working".into() });
            self.results
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Ok(state))
        }
    }

    fn paused_result() -> AutomationState {
        AutomationState {
            message: "tidy downloads".into(),
            skill_plan: Some(vec![
                PlanStep { index: 0, skill: "list".into(), description: String::new() },
                PlanStep { index: 1, skill: "move".into(), description: String::new() },
                PlanStep { index: 2, skill: "report".into(), description: String::new() },
            ]),
            plan_cursor: 1,
            failed_step: Some(1),
            step_retry_count: 2,
            pending_question: Some(PendingQuestion {
                question: "Where should files go?".into(),
                options: vec!["A".into(), "B".into(), "C".into()],
                failed_skill: Some("move".into()),
                failed_step_index: Some(1),
                reason: Some("target missing".into()),
            }),
            resolved_session_id: Some("sess-1".into()),
            ..AutomationState::default()
        }
    }

    fn controller(
        engine: Arc<Scripted>,
        config: AutomationConfig,
    ) -> (AutomationController, mpsc::UnboundedReceiver<OutputEvent>) {
        let ledger = Arc::new(Mutex::new(ClipboardLedger::new(ClipboardPolicy::default())));
        let (tx, rx) = mpsc::unbounded_channel();
        (AutomationController::new(engine, ledger, tx, config), rx)
    }

    fn drain(rx: &mut mpsc::UnboundedReceiver<OutputEvent>) -> Vec<OutputEvent> {
        let mut out = Vec::new();
        while let Ok(e) = rx.try_recv() {
            out.push(e);
        }
        out
    }

    #[tokio::test]
    async fn question_pauses_and_suppresses_completion() {
        let engine = Scripted::new(vec![Ok(paused_result())]);
        let (mut ctl, mut rx) = controller(engine, AutomationConfig::default());
        ctl.submit(Prompt::new("tidy downloads")).await;

        let events = drain(&mut rx);
        assert_eq!(events.first(), Some(&OutputEvent::Token("working".into())));
        assert!(events.iter().any(|e| matches!(e, OutputEvent::Question { options, .. } if options.len() == 3)));
        assert!(!events.iter().any(|e| matches!(e, OutputEvent::Completed { .. })));
        assert_eq!(events.last(), Some(&OutputEvent::StreamEnd));
        assert_eq!(events.iter().filter(|e| **e == OutputEvent::StreamEnd).count(), 1);
        assert!(ctl.paused().is_some());
        assert_eq!(ctl.session_id(), Some("sess-1"));
    }

    #[tokio::test]
    async fn numeric_answer_replans_with_option() {
        let engine = Scripted::new(vec![Ok(paused_result()), Ok(AutomationState::default())]);
        let (mut ctl, _rx) = controller(engine.clone(), AutomationConfig::default());
        ctl.submit(Prompt::new("tidy downloads")).await;
        ctl.submit(Prompt::new("2")).await;

        let resumed = &engine.seen()[1];
        assert_eq!(resumed.recovery_action, Some(RecoveryAction::Replan));
        let rc = resumed.recovery_context.as_ref().unwrap();
        assert_eq!(rc.user_suggestion, "B");
        assert_eq!(rc.failed_skill.as_deref(), Some("move"));
        assert_eq!(rc.failed_step_index, Some(1));
        assert!(resumed.skill_plan.is_none());
        assert_eq!(resumed.plan_cursor, 0);
        assert!(resumed.pending_question.is_none());
        assert_eq!(resumed.context.session_id.as_deref(), Some("sess-1"));
        assert!(ctl.paused().is_none());
    }

    #[tokio::test]
    async fn skip_advances_cursor_by_one() {
        let engine = Scripted::new(vec![Ok(paused_result()), Ok(AutomationState::default())]);
        let (mut ctl, _rx) = controller(engine.clone(), AutomationConfig::default());
        ctl.submit(Prompt::new("tidy downloads")).await;
        ctl.submit(Prompt::new("skip")).await;

        let resumed = &engine.seen()[1];
        assert_eq!(resumed.plan_cursor, 2);
        assert!(resumed.pending_question.is_none());
        assert!(resumed.failed_step.is_none());
        assert_eq!(resumed.step_retry_count, 0);
        assert!(resumed.recovery_action.is_none());
        assert_eq!(resumed.skill_plan.as_ref().map(Vec::len), Some(3));
    }

    #[tokio::test]
    async fn abort_starts_fresh() {
        let engine = Scripted::new(vec![Ok(paused_result()), Ok(AutomationState::default())]);
        let (mut ctl, _rx) = controller(engine.clone(), AutomationConfig::default());
        ctl.submit(Prompt::new("tidy downloads")).await;
        ctl.submit(Prompt::new("abort")).await;

        let fresh = &engine.seen()[1];
        assert_eq!(fresh.message, "abort");
        assert!(fresh.recovery_action.is_none());
        assert!(fresh.skill_plan.is_none());
        assert_eq!(fresh.plan_cursor, 0);
    }

    #[tokio::test]
    async fn failed_resume_restores_snapshot() {
        let engine = Scripted::new(vec![
            Ok(paused_result()),
            Err(Error::Engine("backend down".into())),
        ]);
        let (mut ctl, mut rx) = controller(engine, AutomationConfig::default());
        ctl.submit(Prompt::new("tidy downloads")).await;
        drain(&mut rx);
        ctl.submit(Prompt::new("use ~/Archive")).await;

        let events = drain(&mut rx);
        assert!(events.iter().any(|e| matches!(e, OutputEvent::Error { message } if message.contains("backend down"))));
        assert_eq!(events.last(), Some(&OutputEvent::StreamEnd));
        let paused = ctl.paused().unwrap();
        assert_eq!(paused.state.plan_cursor, 1);
        assert_eq!(paused.rounds, 0);
        assert_eq!(ctl.session_id(), Some("sess-1"));
    }

    #[tokio::test]
    async fn resume_limit_forces_fresh_request() {
        let engine = Scripted::new(vec![
            Ok(paused_result()),
            Ok(paused_result()),
            Ok(AutomationState::default()),
        ]);
        let config = AutomationConfig {
            max_resume_rounds: Some(1),
            ..AutomationConfig::default()
        };
        let (mut ctl, _rx) = controller(engine.clone(), config);
        ctl.submit(Prompt::new("tidy downloads")).await;
        ctl.submit(Prompt::new("skip")).await;
        ctl.submit(Prompt::new("skip")).await;

        let seen = engine.seen();
        assert_eq!(seen[1].plan_cursor, 2);
        assert_eq!(seen[2].message, "skip");
        assert_eq!(seen[2].plan_cursor, 0);
        assert!(seen[2].skill_plan.is_none());
    }

    #[tokio::test]
    async fn plan_error_surfaces_as_progress() {
        let failed = AutomationState {
            plan_error: Some("no skill matches".into()),
            ..AutomationState::default()
        };
        let engine = Scripted::new(vec![Ok(failed)]);
        let (mut ctl, mut rx) = controller(engine, AutomationConfig::default());
        ctl.submit(Prompt::new("do the impossible")).await;

        let events = drain(&mut rx);
        assert!(events.contains(&OutputEvent::Progress(ProgressEvent::PlanError {
            error: "no skill matches".into()
        })));
        assert!(!events.iter().any(|e| matches!(e, OutputEvent::Completed { .. })));
        assert_eq!(events.last(), Some(&OutputEvent::StreamEnd));
    }

    #[test]
    fn selected_text_joins_highlights_and_screen_text() {
        let prompt = Prompt {
            message: "explain".into(),
            highlights: vec!["  first highlight ".into(), "   ".into()],
            screen_text: Some("[INFO] see main.rs\nuse std::fs;".into()),
        };
        assert_eq!(
            prompt.selected_text(),
            "first highlight\n\nFiles: main.rs\n\nuse std::fs;\n\nsee"
        );
    }

    /// Streams a token, works for a long while, streams another.
    struct Slow;

    #[async_trait]
    impl ExecutionEngine for Slow {
        async fn execute(
            &self,
            state: AutomationState,
            events: EngineEvents,
        ) -> Result<AutomationState> {
            let _ = events.send(EngineEvent::Token { text: "a".into() });
            tokio::time::sleep(std::time::Duration::from_secs(120)).await;
            let _ = events.send(EngineEvent::Token { text: "b".into() });
            Ok(state)
        }
    }

    #[tokio::test(start_paused = true)]
    async fn long_running_engine_keeps_event_order() {
        let ledger = Arc::new(Mutex::new(ClipboardLedger::new(ClipboardPolicy::default())));
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut ctl =
            AutomationController::new(Arc::new(Slow), ledger, tx, AutomationConfig::default());
        ctl.submit(Prompt::new("long job")).await;

        assert_eq!(
            drain(&mut rx),
            vec![
                OutputEvent::Token("a".into()),
                OutputEvent::Token("b".into()),
                OutputEvent::Completed { summary: "Done".into() },
                OutputEvent::StreamEnd,
            ]
        );
    }
}
