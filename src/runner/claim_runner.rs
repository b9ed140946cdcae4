//! The claim runner: a bounded Think → Act → Observe loop over one claim
//!
//! Each cycle asks the reasoner for a decision, dispatches it through the
//! action registry, and folds the result back into `ClaimState`. The runner
//! owns the control contract: stage ordering, the reserved `finish` marker,
//! the iteration budget, per-call timeouts, and cancellation between cycles.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::domain::{
    ActionResult, ClaimState, ClaimStatus, Decision, RunOutcome, StageData, StepRecord,
};
use crate::error::{ClaimflowError, Result};
use crate::id::short_id;
use crate::pipeline::ActionRegistry;
use crate::reasoner::{ClaimSummary, Reasoner};

/// Per-run budgets. Failed cycles consume iteration budget too.
#[derive(Debug, Clone)]
pub struct RunnerConfig {
    /// Most cycles one run may consume, successful or not
    pub max_iterations: u32,
    /// Budget for a single oracle call
    pub think_timeout: Duration,
    /// Budget for a single action dispatch
    pub act_timeout: Duration,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            max_iterations: 10,
            think_timeout: Duration::from_secs(90),
            act_timeout: Duration::from_secs(300),
        }
    }
}

/// The driver's execution phase within one cycle, separate from the claim's
/// stage marker. Phases never overlap.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Thinking,
    Acting,
    Observing,
    Terminated,
}

impl Phase {
    fn as_str(&self) -> &'static str {
        match self {
            Phase::Thinking => "thinking",
            Phase::Acting => "acting",
            Phase::Observing => "observing",
            Phase::Terminated => "terminated",
        }
    }
}

/// How one cycle ended, for the outer loop
enum CycleEnd {
    /// Cycle recorded a successful observation; keep looping
    Continue,
    /// Reasoner acknowledged completion in order
    Finished,
    /// The cycle failed the claim; the reason becomes the run outcome
    Failed(String),
}

/// Drives one claim through the Think → Act → Observe loop.
pub struct ClaimRunner {
    reasoner: Arc<dyn Reasoner>,
    registry: Arc<ActionRegistry>,
    config: RunnerConfig,
}

impl ClaimRunner {
    pub fn new(reasoner: Arc<dyn Reasoner>, registry: Arc<ActionRegistry>) -> Self {
        Self::with_config(reasoner, registry, RunnerConfig::default())
    }

    pub fn with_config(
        reasoner: Arc<dyn Reasoner>,
        registry: Arc<ActionRegistry>,
        config: RunnerConfig,
    ) -> Self {
        Self {
            reasoner,
            registry,
            config,
        }
    }

    pub fn config(&self) -> &RunnerConfig {
        &self.config
    }

    /// Run the claim to an outcome without external cancellation.
    pub async fn run(&self, state: &mut ClaimState) -> RunOutcome {
        self.run_with_cancel(state, Arc::new(AtomicBool::new(false)))
            .await
    }

    /// Run the claim to an outcome, checking `cancel` between cycles.
    ///
    /// A cycle already in flight is never interrupted; cancellation lands
    /// on the next cycle boundary.
    pub async fn run_with_cancel(
        &self,
        state: &mut ClaimState,
        cancel: Arc<AtomicBool>,
    ) -> RunOutcome {
        // A run always starts from a fresh claim. Anything else is refused
        // without mutating the state or consuming a cycle.
        if state.status != ClaimStatus::Created {
            warn!(claim_id = %state.claim_id, status = %state.status, "refusing to run a non-fresh claim");
            return RunOutcome::Failed(format!(
                "claim must start at created, is at {}",
                state.status
            ));
        }

        info!(
            claim_id = %state.claim_id,
            documents = state.documents.len(),
            max_iterations = self.config.max_iterations,
            "starting claim run"
        );

        let outcome = loop {
            if cancel.load(Ordering::Relaxed) {
                break RunOutcome::Cancelled;
            }
            if state.iteration_count >= self.config.max_iterations {
                break RunOutcome::IterationLimitExceeded;
            }
            match self.cycle(state).await {
                CycleEnd::Continue => {}
                CycleEnd::Finished => break RunOutcome::Completed,
                CycleEnd::Failed(reason) => break RunOutcome::Failed(reason),
            }
        };

        match &outcome {
            RunOutcome::Completed => {
                info!(
                    claim_id = %state.claim_id,
                    phase = Phase::Terminated.as_str(),
                    iterations = state.iteration_count,
                    "claim run completed"
                );
            }
            RunOutcome::Cancelled => {
                info!(
                    claim_id = %state.claim_id,
                    phase = Phase::Terminated.as_str(),
                    status = %state.status,
                    iterations = state.iteration_count,
                    "claim run cancelled"
                );
            }
            RunOutcome::Failed(reason) => {
                warn!(
                    claim_id = %state.claim_id,
                    phase = Phase::Terminated.as_str(),
                    iterations = state.iteration_count,
                    %reason,
                    "claim run failed"
                );
            }
            RunOutcome::IterationLimitExceeded => {
                warn!(
                    claim_id = %state.claim_id,
                    phase = Phase::Terminated.as_str(),
                    status = %state.status,
                    max_iterations = self.config.max_iterations,
                    "iteration budget exhausted before completion"
                );
            }
        }

        outcome
    }

    /// One Think → Act → Observe cycle. Exactly one audit record is
    /// appended on every path out of here.
    async fn cycle(&self, state: &mut ClaimState) -> CycleEnd {
        debug!(
            claim = %short_id(&state.claim_id),
            cycle = state.iteration_count + 1,
            phase = Phase::Thinking.as_str(),
            status = %state.status,
            "asking the oracle for the next action"
        );

        let decision = match self.think(state).await {
            Ok(decision) => decision,
            Err(err) => {
                state.record_step(StepRecord::undecided(err.to_string()));
                state.fail();
                return CycleEnd::Failed(err.to_string());
            }
        };

        // finish is loop control, not a capability. Checked before the
        // ordering gate: an early finish is premature, not out of sequence.
        if decision.action.is_finish() {
            return self.acknowledge_finish(state, decision);
        }

        if let Err(err) = self.admit(state, &decision) {
            state.record_step(StepRecord::rejected(&decision, err.to_string()));
            state.fail();
            return CycleEnd::Failed(err.to_string());
        }

        debug!(
            claim = %short_id(&state.claim_id),
            cycle = state.iteration_count + 1,
            phase = Phase::Acting.as_str(),
            action = %decision.action,
            "dispatching"
        );

        let result = match self.act(state, &decision).await {
            Ok(result) => result,
            Err(err) => {
                state.record_step(StepRecord::rejected(&decision, err.to_string()));
                state.fail();
                return CycleEnd::Failed(err.to_string());
            }
        };

        debug!(
            claim = %short_id(&state.claim_id),
            cycle = state.iteration_count + 1,
            phase = Phase::Observing.as_str(),
            action = %decision.action,
            success = result.success,
            "folding the result into state"
        );

        self.observe(state, decision, result)
    }

    /// Think: ask the oracle for the next decision, bounded by the think
    /// timeout.
    async fn think(&self, state: &ClaimState) -> Result<Decision> {
        let summary = ClaimSummary::of(state);
        match timeout(
            self.config.think_timeout,
            self.reasoner.decide(&summary, &state.history),
        )
        .await
        {
            Ok(decision) => decision,
            Err(_) => Err(ClaimflowError::Reasoning(format!(
                "oracle call exceeded {}s",
                self.config.think_timeout.as_secs()
            ))),
        }
    }

    /// Gate a decision before dispatch: stage ordering first, then the
    /// processor's input requirements.
    fn admit(&self, state: &ClaimState, decision: &Decision) -> Result<()> {
        if !decision.action.in_order_at(state.status) {
            return Err(ClaimflowError::Sequence {
                action: decision.action.to_string(),
                required: decision.action.prerequisite().to_string(),
                actual: state.status.to_string(),
            });
        }
        self.registry
            .validate_input(decision.action, &decision.action_input)
    }

    /// Act: dispatch through the registry, bounded by the act timeout.
    ///
    /// Transport and service faults fold into a failed `ActionResult`; a
    /// dispatch timeout is a failed result too, never an escaping error.
    /// Contract violations and processor breaches propagate instead.
    async fn act(&self, state: &ClaimState, decision: &Decision) -> Result<ActionResult> {
        let dispatched = timeout(
            self.config.act_timeout,
            self.registry
                .dispatch(decision.action, state, &decision.action_input),
        )
        .await;

        match dispatched {
            Ok(Ok(result)) => Ok(result),
            Ok(Err(err))
                if err.is_contract_violation()
                    || matches!(err, ClaimflowError::Processor { .. }) =>
            {
                Err(err)
            }
            Ok(Err(err)) => {
                warn!(
                    claim_id = %state.claim_id,
                    action = %decision.action,
                    error = %err,
                    "action failed; folding into the observation"
                );
                Ok(ActionResult::fail(err.to_string()))
            }
            Err(_) => Ok(ActionResult::fail(format!(
                "{} timed out after {}s",
                decision.action,
                self.config.act_timeout.as_secs()
            ))),
        }
    }

    /// Observe: fold a successful payload into state, advance the stage
    /// marker, and append the cycle's audit record.
    ///
    /// A failed result is recorded and fails the claim; retries of flaky
    /// capabilities belong inside the adapters, not to this loop.
    fn observe(&self, state: &mut ClaimState, decision: Decision, result: ActionResult) -> CycleEnd {
        if !result.success {
            let reason = result
                .error
                .clone()
                .unwrap_or_else(|| "processor reported failure without detail".to_string());
            state.record_step(StepRecord::observed(&decision, &result));
            state.fail();
            return CycleEnd::Failed(format!("{} failed: {reason}", decision.action));
        }

        match StageData::from_value(&result.data) {
            Ok(data) => {
                state.absorb(data);
                state.advance_to(decision.action.completed_status());
            }
            Err(err) => {
                let breach = ClaimflowError::Processor {
                    action: decision.action.to_string(),
                    message: format!("success payload violated the stage contract: {err}"),
                };
                state.record_step(StepRecord::rejected(&decision, breach.to_string()));
                state.fail();
                return CycleEnd::Failed(breach.to_string());
            }
        }

        state.record_step(StepRecord::observed(&decision, &result));
        CycleEnd::Continue
    }

    /// Acknowledge the reserved completion marker, or reject it as premature
    /// when the output stage has not completed.
    fn acknowledge_finish(&self, state: &mut ClaimState, decision: Decision) -> CycleEnd {
        if state.status.rank() < ClaimStatus::OutputDone.rank() {
            let err = ClaimflowError::PrematureFinish(state.status.to_string());
            state.record_step(StepRecord::rejected(&decision, err.to_string()));
            state.fail();
            return CycleEnd::Failed(err.to_string());
        }

        state.record_step(StepRecord::finished(&decision));
        state.advance_to(ClaimStatus::Finished);
        CycleEnd::Finished
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::path::PathBuf;
    use std::sync::Mutex;
    use std::sync::atomic::AtomicU32;

    use async_trait::async_trait;
    use serde_json::{Value, json};

    use crate::domain::{Action, DocumentRef, DocumentStage, FieldValue, Verdict, VerdictOutcome};
    use crate::pipeline::{FinishMarker, Processor};
    use crate::reasoner::ScriptedReasoner;

    /// Processor that replays canned replies, then repeats a fallback.
    struct CannedProcessor {
        replies: Mutex<VecDeque<Result<ActionResult>>>,
        fallback: ActionResult,
    }

    impl CannedProcessor {
        fn always(result: ActionResult) -> Self {
            Self {
                replies: Mutex::new(VecDeque::new()),
                fallback: result,
            }
        }

        fn once(reply: Result<ActionResult>, fallback: ActionResult) -> Self {
            Self {
                replies: Mutex::new(VecDeque::from([reply])),
                fallback,
            }
        }
    }

    #[async_trait]
    impl Processor for CannedProcessor {
        async fn execute(&self, _state: &ClaimState, _input: &Value) -> Result<ActionResult> {
            let mut replies = self.replies.lock().expect("replies lock");
            match replies.pop_front() {
                Some(reply) => reply,
                None => Ok(self.fallback.clone()),
            }
        }
    }

    /// Processor that counts its invocations and always succeeds.
    struct CountingProcessor {
        calls: AtomicU32,
        payload: ActionResult,
    }

    impl CountingProcessor {
        fn new(payload: ActionResult) -> Self {
            Self {
                calls: AtomicU32::new(0),
                payload,
            }
        }

        fn calls(&self) -> u32 {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Processor for CountingProcessor {
        async fn execute(&self, _state: &ClaimState, _input: &Value) -> Result<ActionResult> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.payload.clone())
        }
    }

    /// Processor whose input contract requires a language field.
    struct NeedyProcessor;

    #[async_trait]
    impl Processor for NeedyProcessor {
        fn required_input(&self) -> &'static [&'static str] {
            &["language"]
        }

        async fn execute(&self, _state: &ClaimState, _input: &Value) -> Result<ActionResult> {
            Ok(ActionResult::ok(Value::Null))
        }
    }

    /// Processor that never answers within any useful budget.
    struct SleepyProcessor;

    #[async_trait]
    impl Processor for SleepyProcessor {
        async fn execute(&self, _state: &ClaimState, _input: &Value) -> Result<ActionResult> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(ActionResult::ok(Value::Null))
        }
    }

    /// Reasoner that never answers within any useful budget.
    struct SleepyReasoner;

    #[async_trait]
    impl Reasoner for SleepyReasoner {
        async fn decide(
            &self,
            _summary: &ClaimSummary,
            _history: &[StepRecord],
        ) -> Result<Decision> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(Decision::new(Action::Ingest, "too late"))
        }
    }

    /// Reasoner that trips the cancel flag after answering.
    struct CancellingReasoner {
        inner: ScriptedReasoner,
        cancel: Arc<AtomicBool>,
    }

    #[async_trait]
    impl Reasoner for CancellingReasoner {
        async fn decide(&self, summary: &ClaimSummary, history: &[StepRecord]) -> Result<Decision> {
            let decision = self.inner.decide(summary, history).await?;
            self.cancel.store(true, Ordering::Relaxed);
            Ok(decision)
        }
    }

    /// A plausible successful payload for each pipeline stage.
    fn stage_payload(action: Action) -> ActionResult {
        let data = match action {
            Action::Ingest => StageData::default()
                .with_documents(vec![DocumentRef::raw("a.pdf").with_sha256("aaa111")]),
            Action::Preprocess => StageData::default().with_documents(vec![DocumentRef::derived(
                "a.pdf",
                DocumentStage::Preprocessed,
            )]),
            Action::Extract => StageData::default().with_documents(vec![DocumentRef::derived(
                "a_0.txt",
                DocumentStage::Extracted,
            )]),
            Action::Analyze => StageData::default()
                .with_field("patient_name", FieldValue::text("Jane Doe"))
                .with_field("amount_total", FieldValue::money(12050, "EUR")),
            Action::Decide => StageData::default().with_verdict(Verdict {
                outcome: VerdictOutcome::Approve,
                rationale: "complete and consistent".to_string(),
                score: 1.0,
            }),
            Action::Output | Action::Finish => StageData::default(),
        };
        ActionResult::ok(data.into_value().expect("stage payload"))
    }

    /// Registry with a canned processor behind every pipeline action.
    fn full_registry() -> Arc<ActionRegistry> {
        Arc::new(registry_builder())
    }

    /// Full registry with one action's processor substituted.
    fn registry_with(action: Action, processor: Arc<dyn Processor>) -> Arc<ActionRegistry> {
        Arc::new(registry_builder().register(action, processor))
    }

    fn registry_builder() -> ActionRegistry {
        let mut registry = ActionRegistry::new();
        for action in [
            Action::Ingest,
            Action::Preprocess,
            Action::Extract,
            Action::Analyze,
            Action::Decide,
            Action::Output,
        ] {
            registry = registry.register(
                action,
                Arc::new(CannedProcessor::always(stage_payload(action))),
            );
        }
        registry.register(Action::Finish, Arc::new(FinishMarker))
    }

    fn fresh_state() -> ClaimState {
        ClaimState::new("clm-run", vec![PathBuf::from("a.pdf")])
    }

    /// Script naming the six pipeline stages in order, without finish.
    fn in_order_prefix() -> Vec<Decision> {
        vec![
            Decision::new(Action::Ingest, "validate files"),
            Decision::new(Action::Preprocess, "split and OCR"),
            Decision::new(Action::Extract, "pull entities"),
            Decision::new(Action::Analyze, "structure fields"),
            Decision::new(Action::Decide, "adjudicate"),
            Decision::new(Action::Output, "write reports"),
        ]
    }

    #[test]
    fn test_runner_config_default() {
        let config = RunnerConfig::default();
        assert_eq!(config.max_iterations, 10);
        assert_eq!(config.think_timeout, Duration::from_secs(90));
        assert_eq!(config.act_timeout, Duration::from_secs(300));
    }

    #[tokio::test]
    async fn test_full_run_completes_in_seven_cycles() {
        let runner = ClaimRunner::new(Arc::new(ScriptedReasoner::in_order()), full_registry());
        let mut state = fresh_state();

        let outcome = runner.run(&mut state).await;

        assert_eq!(outcome, RunOutcome::Completed);
        assert_eq!(state.status, ClaimStatus::Finished);
        assert_eq!(state.iteration_count, 7);
        assert_eq!(state.history.len(), 7);
        assert!(state.history.iter().all(|s| s.success));

        let actions: Vec<Option<Action>> = state.history.iter().map(|s| s.action).collect();
        assert_eq!(
            actions,
            vec![
                Some(Action::Ingest),
                Some(Action::Preprocess),
                Some(Action::Extract),
                Some(Action::Analyze),
                Some(Action::Decide),
                Some(Action::Output),
                Some(Action::Finish),
            ]
        );

        // Stage payloads were folded in along the way
        assert_eq!(state.documents[0].sha256.as_deref(), Some("aaa111"));
        assert_eq!(state.documents_at(DocumentStage::Preprocessed).len(), 1);
        assert_eq!(state.documents_at(DocumentStage::Extracted).len(), 1);
        assert!(state.extracted_fields.contains_key("patient_name"));
        assert_eq!(state.verdict.unwrap().outcome, VerdictOutcome::Approve);
    }

    #[tokio::test]
    async fn test_status_never_regresses_on_the_happy_path() {
        let runner = ClaimRunner::new(Arc::new(ScriptedReasoner::in_order()), full_registry());
        let mut state = fresh_state();

        runner.run(&mut state).await;

        // Each recorded cycle advanced the stage by exactly one
        let expected = [
            ClaimStatus::Ingested,
            ClaimStatus::Preprocessed,
            ClaimStatus::Extracted,
            ClaimStatus::Analyzed,
            ClaimStatus::Decided,
            ClaimStatus::OutputDone,
            ClaimStatus::Finished,
        ];
        for (step, status) in state.history.iter().zip(expected) {
            assert_eq!(step.action.map(|a| a.completed_status()), Some(status));
        }
    }

    #[tokio::test]
    async fn test_failing_processor_fails_the_run() {
        let extract = Arc::new(CannedProcessor::always(ActionResult::fail(
            "OCR service returned no text",
        )));
        let runner = ClaimRunner::new(
            Arc::new(ScriptedReasoner::new(in_order_prefix())),
            registry_with(Action::Extract, extract),
        );
        let mut state = fresh_state();

        let outcome = runner.run(&mut state).await;

        match outcome {
            RunOutcome::Failed(reason) => {
                assert!(reason.contains("extract failed"));
                assert!(reason.contains("OCR service returned no text"));
            }
            other => panic!("expected failure, got {other}"),
        }
        assert_eq!(state.status, ClaimStatus::Failed);
        assert_eq!(state.history.len(), 3);

        // The failing step is the last audit entry
        let last = state.last_step().expect("failing record");
        assert_eq!(last.action, Some(Action::Extract));
        assert!(!last.success);
        assert_eq!(last.observation, "OCR service returned no text");
    }

    #[tokio::test]
    async fn test_out_of_order_action_never_reaches_the_processor() {
        let decide = Arc::new(CountingProcessor::new(stage_payload(Action::Decide)));
        let reasoner = ScriptedReasoner::new(vec![Decision::new(Action::Decide, "skip ahead")]);
        let runner = ClaimRunner::new(
            Arc::new(reasoner),
            registry_with(Action::Decide, Arc::clone(&decide) as Arc<dyn Processor>),
        );
        let mut state = fresh_state();

        let outcome = runner.run(&mut state).await;

        match outcome {
            RunOutcome::Failed(reason) => {
                assert!(reason.contains("Sequence error"));
                assert!(reason.contains("decide requires analyzed"));
            }
            other => panic!("expected failure, got {other}"),
        }
        assert_eq!(state.status, ClaimStatus::Failed);
        assert_eq!(state.history.len(), 1);
        assert!(!state.history[0].success);
        assert_eq!(state.history[0].action, Some(Action::Decide));
        assert_eq!(decide.calls(), 0);
    }

    #[tokio::test]
    async fn test_reasoner_exhaustion_fails_with_undecided_record() {
        let reasoner = ScriptedReasoner::new(vec![Decision::new(Action::Ingest, "start")]);
        let runner = ClaimRunner::new(Arc::new(reasoner), full_registry());
        let mut state = fresh_state();

        let outcome = runner.run(&mut state).await;

        match outcome {
            RunOutcome::Failed(reason) => assert!(reason.contains("Reasoning error")),
            other => panic!("expected failure, got {other}"),
        }
        assert_eq!(state.status, ClaimStatus::Failed);
        assert_eq!(state.history.len(), 2);

        let last = state.last_step().expect("undecided record");
        assert!(last.action.is_none());
        assert!(!last.success);
    }

    #[tokio::test]
    async fn test_unregistered_action_is_unknown() {
        let registry = Arc::new(ActionRegistry::new().register(
            Action::Ingest,
            Arc::new(CannedProcessor::always(stage_payload(Action::Ingest))),
        ));
        let reasoner = ScriptedReasoner::new(vec![
            Decision::new(Action::Ingest, "start"),
            Decision::new(Action::Preprocess, "next"),
        ]);
        let runner = ClaimRunner::new(Arc::new(reasoner), registry);
        let mut state = fresh_state();

        let outcome = runner.run(&mut state).await;

        match outcome {
            RunOutcome::Failed(reason) => assert!(reason.contains("Unknown action: preprocess")),
            other => panic!("expected failure, got {other}"),
        }
        assert_eq!(state.status, ClaimStatus::Failed);
        assert_eq!(state.history.len(), 2);
    }

    #[tokio::test]
    async fn test_missing_required_input_is_a_reasoning_error() {
        let runner = ClaimRunner::new(
            Arc::new(ScriptedReasoner::new(vec![Decision::new(
                Action::Ingest,
                "no input",
            )])),
            registry_with(Action::Ingest, Arc::new(NeedyProcessor)),
        );
        let mut state = fresh_state();

        let outcome = runner.run(&mut state).await;

        match outcome {
            RunOutcome::Failed(reason) => {
                assert!(reason.contains("Reasoning error"));
                assert!(reason.contains("language"));
            }
            other => panic!("expected failure, got {other}"),
        }
        assert_eq!(state.status, ClaimStatus::Failed);
    }

    #[tokio::test]
    async fn test_iteration_budget_bounds_a_stuck_run() {
        let reasoner = ScriptedReasoner::repeating(Decision::new(Action::Ingest, "again"));
        let runner = ClaimRunner::new(Arc::new(reasoner), full_registry());
        let mut state = fresh_state();

        let outcome = runner.run(&mut state).await;

        assert_eq!(outcome, RunOutcome::IterationLimitExceeded);
        assert_eq!(state.iteration_count, 10);
        assert_eq!(state.history.len(), 10);
        // Budget exhaustion leaves the claim where it was, not failed
        assert_eq!(state.status, ClaimStatus::Ingested);
        assert!(state.verdict.is_none());
    }

    #[tokio::test]
    async fn test_completion_on_the_final_budgeted_cycle_still_wins() {
        let mut script = vec![
            Decision::new(Action::Ingest, "again"),
            Decision::new(Action::Ingest, "again"),
            Decision::new(Action::Ingest, "again"),
        ];
        script.extend(in_order_prefix().into_iter().skip(1));
        script.push(Decision::new(Action::Finish, "done"));
        assert_eq!(script.len(), 9);

        let config = RunnerConfig {
            max_iterations: 9,
            ..RunnerConfig::default()
        };
        let runner = ClaimRunner::with_config(
            Arc::new(ScriptedReasoner::new(script)),
            full_registry(),
            config,
        );
        let mut state = fresh_state();

        let outcome = runner.run(&mut state).await;

        assert_eq!(outcome, RunOutcome::Completed);
        assert_eq!(state.iteration_count, 9);
        assert_eq!(state.status, ClaimStatus::Finished);
    }

    #[tokio::test]
    async fn test_premature_finish_is_rejected() {
        let script = vec![
            Decision::new(Action::Ingest, "validate files"),
            Decision::new(Action::Finish, "declare victory early"),
        ];
        let runner = ClaimRunner::new(Arc::new(ScriptedReasoner::new(script)), full_registry());
        let mut state = fresh_state();

        let outcome = runner.run(&mut state).await;

        match outcome {
            RunOutcome::Failed(reason) => {
                assert!(reason.contains("Premature finish"));
                assert!(reason.contains("ingested"));
            }
            other => panic!("expected failure, got {other}"),
        }
        assert_eq!(state.status, ClaimStatus::Failed);
        assert_eq!(state.history.len(), 2);

        let last = state.last_step().expect("rejected finish record");
        assert_eq!(last.action, Some(Action::Finish));
        assert!(!last.success);
    }

    #[tokio::test]
    async fn test_cancellation_before_the_first_cycle() {
        let runner = ClaimRunner::new(Arc::new(ScriptedReasoner::in_order()), full_registry());
        let mut state = fresh_state();
        let cancel = Arc::new(AtomicBool::new(true));

        let outcome = runner.run_with_cancel(&mut state, cancel).await;

        assert_eq!(outcome, RunOutcome::Cancelled);
        assert_eq!(state.status, ClaimStatus::Created);
        assert!(state.history.is_empty());
    }

    #[tokio::test]
    async fn test_cancellation_between_cycles() {
        let cancel = Arc::new(AtomicBool::new(false));
        let reasoner = CancellingReasoner {
            inner: ScriptedReasoner::in_order(),
            cancel: Arc::clone(&cancel),
        };
        let runner = ClaimRunner::new(Arc::new(reasoner), full_registry());
        let mut state = fresh_state();

        let outcome = runner.run_with_cancel(&mut state, cancel).await;

        assert_eq!(outcome, RunOutcome::Cancelled);
        // The first cycle ran whole; the flag landed on the next boundary
        assert_eq!(state.history.len(), 1);
        assert_eq!(state.status, ClaimStatus::Ingested);
    }

    #[tokio::test]
    async fn test_think_timeout_is_a_reasoning_failure() {
        let config = RunnerConfig {
            think_timeout: Duration::from_millis(10),
            ..RunnerConfig::default()
        };
        let runner = ClaimRunner::with_config(Arc::new(SleepyReasoner), full_registry(), config);
        let mut state = fresh_state();

        let outcome = runner.run(&mut state).await;

        match outcome {
            RunOutcome::Failed(reason) => assert!(reason.contains("oracle call exceeded")),
            other => panic!("expected failure, got {other}"),
        }
        assert_eq!(state.status, ClaimStatus::Failed);
        assert!(!state.last_step().expect("undecided record").success);
    }

    #[tokio::test]
    async fn test_act_timeout_is_a_failed_observation() {
        let config = RunnerConfig {
            act_timeout: Duration::from_millis(10),
            ..RunnerConfig::default()
        };
        let reasoner = ScriptedReasoner::new(vec![Decision::new(Action::Ingest, "validate")]);
        let runner = ClaimRunner::with_config(
            Arc::new(reasoner),
            registry_with(Action::Ingest, Arc::new(SleepyProcessor)),
            config,
        );
        let mut state = fresh_state();

        let outcome = runner.run(&mut state).await;

        match outcome {
            RunOutcome::Failed(reason) => {
                assert!(reason.contains("ingest failed"));
                assert!(reason.contains("timed out"));
            }
            other => panic!("expected failure, got {other}"),
        }
        assert_eq!(state.status, ClaimStatus::Failed);
        assert_eq!(state.history.len(), 1);
        assert!(state.history[0].observation.contains("timed out"));
    }

    #[tokio::test]
    async fn test_service_error_is_recorded_in_the_observation() {
        let ingest = Arc::new(CannedProcessor::once(
            Err(ClaimflowError::Api {
                status: 503,
                message: "service warming up".to_string(),
            }),
            stage_payload(Action::Ingest),
        ));
        let reasoner = ScriptedReasoner::new(vec![Decision::new(Action::Ingest, "validate")]);
        let runner = ClaimRunner::new(Arc::new(reasoner), registry_with(Action::Ingest, ingest));
        let mut state = fresh_state();

        let outcome = runner.run(&mut state).await;

        match outcome {
            RunOutcome::Failed(reason) => assert!(reason.contains("API error 503")),
            other => panic!("expected failure, got {other}"),
        }
        assert_eq!(state.status, ClaimStatus::Failed);
        assert_eq!(state.history.len(), 1);
        assert_eq!(state.history[0].action, Some(Action::Ingest));
        assert!(state.history[0].observation.contains("API error 503"));
    }

    #[tokio::test]
    async fn test_processor_fault_terminates_the_run() {
        let ingest = Arc::new(CannedProcessor::once(
            Err(ClaimflowError::Processor {
                action: "ingest".to_string(),
                message: "fingerprint engine crashed".to_string(),
            }),
            stage_payload(Action::Ingest),
        ));
        let reasoner = ScriptedReasoner::new(vec![Decision::new(Action::Ingest, "validate files")]);
        let runner = ClaimRunner::new(Arc::new(reasoner), registry_with(Action::Ingest, ingest));
        let mut state = fresh_state();

        let outcome = runner.run(&mut state).await;

        match outcome {
            RunOutcome::Failed(reason) => assert!(reason.contains("Processor error in ingest")),
            other => panic!("expected failure, got {other}"),
        }
        assert_eq!(state.status, ClaimStatus::Failed);
        assert_eq!(state.history.len(), 1);
    }

    #[tokio::test]
    async fn test_malformed_success_payload_is_a_processor_breach() {
        let ingest = Arc::new(CannedProcessor::always(ActionResult::ok(json!({
            "fields": "not a map"
        }))));
        let reasoner = ScriptedReasoner::new(vec![Decision::new(Action::Ingest, "validate files")]);
        let runner = ClaimRunner::new(Arc::new(reasoner), registry_with(Action::Ingest, ingest));
        let mut state = fresh_state();

        let outcome = runner.run(&mut state).await;

        match outcome {
            RunOutcome::Failed(reason) => {
                assert!(reason.contains("Processor error in ingest"));
                assert!(reason.contains("stage contract"));
            }
            other => panic!("expected failure, got {other}"),
        }
        assert_eq!(state.status, ClaimStatus::Failed);
        assert_eq!(state.history.len(), 1);
    }

    #[tokio::test]
    async fn test_run_requires_a_fresh_claim() {
        let runner = ClaimRunner::new(Arc::new(ScriptedReasoner::in_order()), full_registry());

        let mut advanced = fresh_state();
        advanced.advance_to(ClaimStatus::Ingested);
        let outcome = runner.run(&mut advanced).await;
        match outcome {
            RunOutcome::Failed(reason) => {
                assert!(reason.contains("must start at created"));
                assert!(reason.contains("ingested"));
            }
            other => panic!("expected failure, got {other}"),
        }
        assert!(advanced.history.is_empty());
        assert_eq!(advanced.status, ClaimStatus::Ingested);

        let mut failed = fresh_state();
        failed.fail();
        let outcome = runner.run(&mut failed).await;
        assert!(matches!(outcome, RunOutcome::Failed(_)));
        assert!(failed.history.is_empty());
    }

    #[tokio::test]
    async fn test_history_and_iteration_count_stay_in_sync_on_failure_paths() {
        // Sequence violation path
        let runner = ClaimRunner::new(
            Arc::new(ScriptedReasoner::new(vec![Decision::new(
                Action::Output,
                "skip",
            )])),
            full_registry(),
        );
        let mut state = fresh_state();
        runner.run(&mut state).await;
        assert_eq!(state.history.len() as u32, state.iteration_count);

        // Failed observation path
        let runner = ClaimRunner::new(
            Arc::new(ScriptedReasoner::new(vec![Decision::new(
                Action::Ingest,
                "validate",
            )])),
            registry_with(
                Action::Ingest,
                Arc::new(CannedProcessor::always(ActionResult::fail("disk gone"))),
            ),
        );
        let mut state = fresh_state();
        runner.run(&mut state).await;
        assert_eq!(state.history.len() as u32, state.iteration_count);
    }
}
