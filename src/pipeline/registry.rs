//! Action registry: the set of capabilities a claim run may invoke.
//!
//! The registry is the single source of truth for which actions exist. The
//! runner consults it during Act to reject decisions naming unregistered
//! actions and to validate the decision's input before dispatch.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Value, json};

use super::Processor;
use crate::domain::{ALL_ACTIONS, Action, ActionResult, ClaimState};
use crate::error::{ClaimflowError, Result};

/// Maps each [`Action`] to the processor that implements it.
pub struct ActionRegistry {
    processors: HashMap<Action, Arc<dyn Processor>>,
}

impl ActionRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            processors: HashMap::new(),
        }
    }

    /// Register a processor for an action, replacing any existing one.
    pub fn register(mut self, action: Action, processor: Arc<dyn Processor>) -> Self {
        self.processors.insert(action, processor);
        self
    }

    /// Whether a processor is registered for the action.
    pub fn contains(&self, action: Action) -> bool {
        self.processors.contains_key(&action)
    }

    /// Registered actions in pipeline order.
    pub fn actions(&self) -> Vec<Action> {
        ALL_ACTIONS
            .iter()
            .copied()
            .filter(|a| self.processors.contains_key(a))
            .collect()
    }

    /// Check the decision's input against the processor's required fields.
    ///
    /// A missing field is a reasoning error: the oracle proposed an action
    /// without the input that action needs, and the processor is never run.
    pub fn validate_input(&self, action: Action, input: &Value) -> Result<()> {
        let processor = self
            .processors
            .get(&action)
            .ok_or_else(|| ClaimflowError::UnknownAction(action.to_string()))?;

        for field in processor.required_input() {
            if input.get(field).is_none() {
                return Err(ClaimflowError::Reasoning(format!(
                    "action '{action}' requires input field '{field}'"
                )));
            }
        }

        Ok(())
    }

    /// Dispatch the action to its processor.
    pub async fn dispatch(&self, action: Action, state: &ClaimState, input: &Value) -> Result<ActionResult> {
        let processor = self
            .processors
            .get(&action)
            .ok_or_else(|| ClaimflowError::UnknownAction(action.to_string()))?;

        processor.execute(state, input).await
    }
}

impl Default for ActionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Placeholder processor for the `finish` action.
///
/// `finish` is a loop-control signal, not a capability: the runner terminates
/// the claim before dispatching it. Registering a marker keeps the registry
/// covering every action the oracle may propose, so registry lookups never
/// treat `finish` as unknown.
pub struct FinishMarker;

#[async_trait]
impl Processor for FinishMarker {
    async fn execute(&self, _state: &ClaimState, _input: &Value) -> Result<ActionResult> {
        Ok(ActionResult::ok(json!({ "note": "finish performs no processing" })))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    struct StubProcessor {
        required: &'static [&'static str],
        payload: Value,
    }

    #[async_trait]
    impl Processor for StubProcessor {
        fn required_input(&self) -> &'static [&'static str] {
            self.required
        }

        async fn execute(&self, _state: &ClaimState, _input: &Value) -> Result<ActionResult> {
            Ok(ActionResult::ok(self.payload.clone()))
        }
    }

    fn test_state() -> ClaimState {
        ClaimState::new("clm-test", vec![PathBuf::from("a.pdf")])
    }

    #[test]
    fn test_empty_registry() {
        let registry = ActionRegistry::new();
        assert!(!registry.contains(Action::Ingest));
        assert!(registry.actions().is_empty());
    }

    #[test]
    fn test_register_and_contains() {
        let registry = ActionRegistry::new().register(
            Action::Ingest,
            Arc::new(StubProcessor {
                required: &[],
                payload: Value::Null,
            }),
        );

        assert!(registry.contains(Action::Ingest));
        assert!(!registry.contains(Action::Extract));
    }

    #[test]
    fn test_actions_in_pipeline_order() {
        let registry = ActionRegistry::new()
            .register(
                Action::Decide,
                Arc::new(StubProcessor {
                    required: &[],
                    payload: Value::Null,
                }),
            )
            .register(
                Action::Ingest,
                Arc::new(StubProcessor {
                    required: &[],
                    payload: Value::Null,
                }),
            );

        assert_eq!(registry.actions(), vec![Action::Ingest, Action::Decide]);
    }

    #[test]
    fn test_validate_input_unknown_action() {
        let registry = ActionRegistry::new();
        let result = registry.validate_input(Action::Extract, &json!({}));

        assert!(matches!(result, Err(ClaimflowError::UnknownAction(_))));
    }

    #[test]
    fn test_validate_input_missing_field() {
        let registry = ActionRegistry::new().register(
            Action::Extract,
            Arc::new(StubProcessor {
                required: &["language"],
                payload: Value::Null,
            }),
        );

        let result = registry.validate_input(Action::Extract, &json!({}));

        match result {
            Err(ClaimflowError::Reasoning(msg)) => {
                assert!(msg.contains("language"));
                assert!(msg.contains("extract"));
            }
            other => panic!("expected reasoning error, got {:?}", other.is_ok()),
        }
    }

    #[test]
    fn test_validate_input_field_present() {
        let registry = ActionRegistry::new().register(
            Action::Extract,
            Arc::new(StubProcessor {
                required: &["language"],
                payload: Value::Null,
            }),
        );

        let result = registry.validate_input(Action::Extract, &json!({ "language": "en" }));
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_dispatch_unknown_action() {
        let registry = ActionRegistry::new();
        let result = registry.dispatch(Action::Analyze, &test_state(), &json!({})).await;

        assert!(matches!(result, Err(ClaimflowError::UnknownAction(_))));
    }

    #[tokio::test]
    async fn test_dispatch_runs_processor() {
        let registry = ActionRegistry::new().register(
            Action::Ingest,
            Arc::new(StubProcessor {
                required: &[],
                payload: json!({ "validated": 1 }),
            }),
        );

        let result = registry
            .dispatch(Action::Ingest, &test_state(), &json!({}))
            .await
            .unwrap();

        assert!(result.success);
        assert_eq!(result.data["validated"], 1);
    }

    #[tokio::test]
    async fn test_finish_marker_is_noop() {
        let marker = FinishMarker;
        let result = marker.execute(&test_state(), &json!({})).await.unwrap();

        assert!(result.success);
        assert!(result.error.is_none());
    }
}
