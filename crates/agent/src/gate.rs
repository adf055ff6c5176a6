use std::sync::Arc;

use concierge_core::audit::{AuditCategory, AuditContext, AuditOutcome, AuditSink};
use concierge_core::domain::confirmation::{CommittedAction, PendingConfirmation};
use concierge_core::domain::tool::{ArgumentError, ToolArguments};
use concierge_core::errors::TurnError;
use concierge_core::store::{SessionStore, StoreError};
use serde_json::Value;
use thiserror::Error;

use crate::tools::{Tool, ToolRegistry};

/// A tool call as requested by the completion service, before validation.
#[derive(Clone, Debug, PartialEq)]
pub struct ToolCallRequest {
    pub tool_name: String,
    pub arguments: Value,
}

impl ToolCallRequest {
    pub fn new(tool_name: impl Into<String>, arguments: Value) -> Self {
        Self { tool_name: tool_name.into(), arguments }
    }

    pub fn from_pending(pending: &PendingConfirmation) -> Self {
        Self::new(pending.tool_name.clone(), pending.proposed_arguments.to_json())
    }
}

/// Whether the caller asserts the user already confirmed this exact call. Only the agent
/// runtime sets `Asserted`, and only after matching the user's reply to a pending proposal.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Confirmation {
    Unconfirmed,
    Asserted,
}

#[derive(Clone, Debug, PartialEq)]
pub enum GateOutcome {
    Executed { arguments: ToolArguments, result: String },
    ConfirmationRequired { pending: PendingConfirmation, message: String },
    /// `replayed` is set when the call repeated the last committed action and nothing ran.
    Committed { action: CommittedAction, replayed: bool },
}

#[derive(Clone, Debug, Error, PartialEq)]
pub enum GateError {
    #[error("unknown tool `{0}`")]
    UnknownTool(String),
    #[error("invalid arguments for `{tool_name}`: {source}")]
    InvalidArguments { tool_name: String, source: ArgumentError },
    #[error("confirmation for `{tool_name}` does not match the pending proposal")]
    ConfirmationMismatch { tool_name: String, arguments: ToolArguments },
    #[error("tool `{tool_name}` failed: {reason}")]
    ToolExecutionFailed { tool_name: String, arguments: ToolArguments, reason: String },
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl GateError {
    /// The turn-scoped failure this gate error stands for. Argument problems have none: they
    /// go back to the completion service as a rejected call.
    pub fn turn_error(&self) -> Option<TurnError> {
        match self {
            Self::ConfirmationMismatch { tool_name, .. } => {
                Some(TurnError::ConfirmationMismatch { tool_name: tool_name.clone() })
            }
            Self::ToolExecutionFailed { tool_name, reason, .. } => {
                Some(TurnError::ToolExecutionFailed {
                    tool_name: tool_name.clone(),
                    reason: reason.clone(),
                })
            }
            Self::Store(error) => Some(error.clone().into()),
            Self::UnknownTool(_) | Self::InvalidArguments { .. } => None,
        }
    }
}

/// Propose → confirm → commit for side-effecting tools; pass-through for the rest.
pub struct ToolGate {
    registry: Arc<ToolRegistry>,
    store: Arc<dyn SessionStore>,
    audit: Arc<dyn AuditSink>,
}

impl ToolGate {
    pub fn new(
        registry: Arc<ToolRegistry>,
        store: Arc<dyn SessionStore>,
        audit: Arc<dyn AuditSink>,
    ) -> Self {
        Self { registry, store, audit }
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    pub async fn invoke(
        &self,
        request: &ToolCallRequest,
        confirmation: Confirmation,
        context: &AuditContext,
    ) -> Result<GateOutcome, GateError> {
        let Some(tool) = self.registry.get(&request.tool_name) else {
            self.audit.emit(
                context
                    .event("gate.arguments_rejected", AuditCategory::Tool, AuditOutcome::Rejected)
                    .with_metadata("tool_name", request.tool_name.clone())
                    .with_metadata("reason", "unknown_tool"),
            );
            return Err(GateError::UnknownTool(request.tool_name.clone()));
        };

        let arguments = match tool.spec().parameters.validate(&request.arguments) {
            Ok(arguments) => arguments,
            Err(source) => {
                self.audit.emit(
                    context
                        .event(
                            "gate.arguments_rejected",
                            AuditCategory::Tool,
                            AuditOutcome::Rejected,
                        )
                        .with_metadata("tool_name", request.tool_name.clone())
                        .with_metadata("reason", source.to_string()),
                );
                return Err(GateError::InvalidArguments {
                    tool_name: request.tool_name.clone(),
                    source,
                });
            }
        };

        if !tool.spec().side_effecting {
            return self.execute_read_only(tool, arguments, context).await;
        }

        match confirmation {
            Confirmation::Unconfirmed => self.propose(tool, arguments, context).await,
            Confirmation::Asserted => self.commit(tool, arguments, context).await,
        }
    }

    async fn execute_read_only(
        &self,
        tool: &dyn Tool,
        arguments: ToolArguments,
        context: &AuditContext,
    ) -> Result<GateOutcome, GateError> {
        let tool_name = tool.spec().name.clone();
        match tool.execute(&arguments).await {
            Ok(result) => {
                self.audit.emit(
                    context
                        .event("gate.tool_executed", AuditCategory::Tool, AuditOutcome::Success)
                        .with_metadata("tool_name", tool_name),
                );
                Ok(GateOutcome::Executed { arguments, result })
            }
            Err(error) => Err(self.execution_failed(tool_name, arguments, error.0, context)),
        }
    }

    async fn propose(
        &self,
        tool: &dyn Tool,
        arguments: ToolArguments,
        context: &AuditContext,
    ) -> Result<GateOutcome, GateError> {
        let tool_name = tool.spec().name.clone();
        let message = tool.confirmation_prompt(&arguments);
        let existing = self.store.pending_confirmation(&context.session_id).await?;

        match existing.as_ref() {
            Some(pending) if pending.matches(&tool_name, &arguments) => {
                return Ok(GateOutcome::ConfirmationRequired { pending: pending.clone(), message });
            }
            Some(_) => {}
            // Asking again for the action that was just committed must not open a new proposal.
            None => {
                let replayed = self.replay_last_commit(&tool_name, &arguments, context).await;
                if let Some(replayed) = replayed {
                    return Ok(replayed);
                }
            }
        }

        let pending = PendingConfirmation::new(tool_name.clone(), arguments);
        self.store.set_pending_confirmation(&context.session_id, Some(pending.clone())).await?;

        let mut event = context
            .event("gate.confirmation_proposed", AuditCategory::Confirmation, AuditOutcome::Success)
            .with_metadata("tool_name", tool_name)
            .with_metadata("proposal_id", pending.proposal_id.0.clone());
        if let Some(superseded) = existing {
            event = event.with_metadata("superseded_proposal_id", superseded.proposal_id.0);
        }
        self.audit.emit(event);

        Ok(GateOutcome::ConfirmationRequired { pending, message })
    }

    async fn commit(
        &self,
        tool: &dyn Tool,
        arguments: ToolArguments,
        context: &AuditContext,
    ) -> Result<GateOutcome, GateError> {
        let tool_name = tool.spec().name.clone();
        let pending = self.store.pending_confirmation(&context.session_id).await?;

        match pending {
            Some(pending) if pending.matches(&tool_name, &arguments) => {
                let summary = match tool.execute(&arguments).await {
                    Ok(summary) => summary,
                    Err(error) => {
                        return Err(self.execution_failed(tool_name, arguments, error.0, context))
                    }
                };

                let action = CommittedAction::commit(&pending, summary);
                self.store.record_commit(&context.session_id, action.clone()).await?;
                self.audit.emit(
                    context
                        .event("gate.action_committed", AuditCategory::Tool, AuditOutcome::Success)
                        .with_metadata("tool_name", tool_name)
                        .with_metadata("proposal_id", pending.proposal_id.0.clone())
                        .with_metadata("action_id", action.action_id.0.clone()),
                );
                Ok(GateOutcome::Committed { action, replayed: false })
            }
            Some(_) => Err(self.mismatch(tool_name, arguments, context)),
            None => match self.replay_last_commit(&tool_name, &arguments, context).await {
                Some(replayed) => Ok(replayed),
                None => Err(self.mismatch(tool_name, arguments, context)),
            },
        }
    }

    /// Returns the session's most recent commit when it is the same call, without running
    /// the tool again.
    async fn replay_last_commit(
        &self,
        tool_name: &str,
        arguments: &ToolArguments,
        context: &AuditContext,
    ) -> Option<GateOutcome> {
        let action = self
            .store
            .find(&context.session_id)
            .await
            .and_then(|session| session.last_committed_action().cloned())
            .filter(|action| action.matches(tool_name, arguments))?;

        self.audit.emit(
            context
                .event("gate.action_replayed", AuditCategory::Confirmation, AuditOutcome::Success)
                .with_metadata("tool_name", tool_name.to_string())
                .with_metadata("action_id", action.action_id.0.clone()),
        );
        Some(GateOutcome::Committed { action, replayed: true })
    }

    fn mismatch(
        &self,
        tool_name: String,
        arguments: ToolArguments,
        context: &AuditContext,
    ) -> GateError {
        self.audit.emit(
            context
                .event(
                    "gate.confirmation_mismatch",
                    AuditCategory::Confirmation,
                    AuditOutcome::Rejected,
                )
                .with_metadata("tool_name", tool_name.clone()),
        );
        GateError::ConfirmationMismatch { tool_name, arguments }
    }

    fn execution_failed(
        &self,
        tool_name: String,
        arguments: ToolArguments,
        reason: String,
        context: &AuditContext,
    ) -> GateError {
        self.audit.emit(
            context
                .event("gate.tool_failed", AuditCategory::Tool, AuditOutcome::Failed)
                .with_metadata("tool_name", tool_name.clone())
                .with_metadata("reason", reason.clone()),
        );
        GateError::ToolExecutionFailed { tool_name, arguments, reason }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use async_trait::async_trait;
    use concierge_core::audit::{AuditContext, InMemoryAuditSink};
    use concierge_core::domain::session::SessionId;
    use concierge_core::domain::tool::{ParamType, ParameterSchema, ToolArguments, ToolSpec};
    use concierge_core::store::{InMemorySessionStore, SessionStore};
    use serde_json::json;

    use super::{Confirmation, GateError, GateOutcome, ToolCallRequest, ToolGate};
    use crate::tools::{Tool, ToolError, ToolRegistry};

    struct CountingTool {
        spec: ToolSpec,
        calls: Arc<AtomicUsize>,
        fail: bool,
    }

    #[async_trait]
    impl Tool for CountingTool {
        fn spec(&self) -> &ToolSpec {
            &self.spec
        }

        async fn execute(&self, arguments: &ToolArguments) -> Result<String, ToolError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(ToolError::new("issuer offline"));
            }
            Ok(format!("done: {arguments}"))
        }
    }

    struct Fixture {
        gate: ToolGate,
        store: Arc<InMemorySessionStore>,
        audit: InMemoryAuditSink,
        apply_calls: Arc<AtomicUsize>,
        lookup_calls: Arc<AtomicUsize>,
        context: AuditContext,
    }

    async fn fixture(apply_fails: bool) -> Fixture {
        let apply_calls = Arc::new(AtomicUsize::new(0));
        let lookup_calls = Arc::new(AtomicUsize::new(0));
        let registry = ToolRegistry::default()
            .with(CountingTool {
                spec: ToolSpec::new(
                    "apply_card",
                    "apply",
                    ParameterSchema::new().required("card_name", ParamType::String, "card"),
                )
                .side_effecting(),
                calls: Arc::clone(&apply_calls),
                fail: apply_fails,
            })
            .with(CountingTool {
                spec: ToolSpec::new(
                    "recommend_card",
                    "recommend",
                    ParameterSchema::new().required_one_of(
                        "spending_category",
                        "category",
                        &["travel", "fuel"],
                    ),
                ),
                calls: Arc::clone(&lookup_calls),
                fail: false,
            });

        let store = Arc::new(InMemorySessionStore::default());
        let audit = InMemoryAuditSink::default();
        let session_id = SessionId::from("S-1");
        store.get(&session_id).await;

        let gate = ToolGate::new(
            Arc::new(registry),
            store.clone() as Arc<dyn SessionStore>,
            Arc::new(audit.clone()),
        );
        Fixture {
            gate,
            store,
            audit,
            apply_calls,
            lookup_calls,
            context: AuditContext::new(session_id, "req-1", "agent:recommend"),
        }
    }

    fn apply(card: &str) -> ToolCallRequest {
        ToolCallRequest::new("apply_card", json!({ "card_name": card }))
    }

    async fn propose(fx: &Fixture, card: &str) {
        let outcome = fx.gate.invoke(&apply(card), Confirmation::Unconfirmed, &fx.context).await;
        assert!(matches!(outcome, Ok(GateOutcome::ConfirmationRequired { .. })));
    }

    #[tokio::test]
    async fn read_only_tools_execute_immediately() {
        let fx = fixture(false).await;
        let outcome = fx
            .gate
            .invoke(
                &ToolCallRequest::new("recommend_card", json!({"spending_category": "travel"})),
                Confirmation::Unconfirmed,
                &fx.context,
            )
            .await
            .expect("lookup succeeds");

        assert!(matches!(outcome, GateOutcome::Executed { .. }));
        assert_eq!(fx.lookup_calls.load(Ordering::SeqCst), 1);
        assert_eq!(fx.audit.events_of_type("gate.tool_executed").len(), 1);
    }

    #[tokio::test]
    async fn side_effecting_call_is_proposed_not_executed() {
        let fx = fixture(false).await;
        let outcome = fx
            .gate
            .invoke(&apply("Card A"), Confirmation::Unconfirmed, &fx.context)
            .await
            .expect("proposal succeeds");

        let GateOutcome::ConfirmationRequired { pending, message } = outcome else {
            panic!("expected a confirmation request");
        };
        assert!(message.contains("apply_card"));
        assert_eq!(fx.apply_calls.load(Ordering::SeqCst), 0);
        assert_eq!(
            fx.store.pending_confirmation(&fx.context.session_id).await.expect("session"),
            Some(pending)
        );
    }

    #[tokio::test]
    async fn repeated_identical_proposal_keeps_the_proposal_id() {
        let fx = fixture(false).await;
        let first = fx.gate.invoke(&apply("Card A"), Confirmation::Unconfirmed, &fx.context).await;
        let second = fx.gate.invoke(&apply("Card A"), Confirmation::Unconfirmed, &fx.context).await;

        let (
            Ok(GateOutcome::ConfirmationRequired { pending: first, .. }),
            Ok(GateOutcome::ConfirmationRequired { pending: second, .. }),
        ) = (first, second)
        else {
            panic!("expected two confirmation requests");
        };
        assert_eq!(first.proposal_id, second.proposal_id);
        assert_eq!(fx.audit.events_of_type("gate.confirmation_proposed").len(), 1);
    }

    #[tokio::test]
    async fn confirmed_call_commits_once_and_clears_pending() {
        let fx = fixture(false).await;
        propose(&fx, "Card A").await;

        let outcome = fx
            .gate
            .invoke(&apply("Card A"), Confirmation::Asserted, &fx.context)
            .await
            .expect("commit");

        let GateOutcome::Committed { action, replayed } = outcome else {
            panic!("expected a commit");
        };
        assert!(!replayed);
        assert_eq!(action.tool_name, "apply_card");
        assert_eq!(fx.apply_calls.load(Ordering::SeqCst), 1);
        assert!(fx
            .store
            .pending_confirmation(&fx.context.session_id)
            .await
            .expect("session")
            .is_none());

        let proposed = fx.audit.events_of_type("gate.confirmation_proposed");
        let committed = fx.audit.events_of_type("gate.action_committed");
        assert_eq!(
            proposed[0].metadata.get("proposal_id"),
            committed[0].metadata.get("proposal_id")
        );
    }

    #[tokio::test]
    async fn superseded_proposal_cannot_be_confirmed() {
        let fx = fixture(false).await;
        fx.gate.invoke(&apply("Card A"), Confirmation::Unconfirmed, &fx.context).await.expect("A");
        fx.gate.invoke(&apply("Card B"), Confirmation::Unconfirmed, &fx.context).await.expect("B");

        let error = fx
            .gate
            .invoke(&apply("Card A"), Confirmation::Asserted, &fx.context)
            .await
            .expect_err("A was superseded");

        assert!(matches!(
            error,
            GateError::ConfirmationMismatch { ref tool_name, .. } if tool_name == "apply_card"
        ));
        assert_eq!(fx.apply_calls.load(Ordering::SeqCst), 0);
        assert_eq!(fx.audit.events_of_type("gate.confirmation_mismatch").len(), 1);
        let proposed = fx.audit.events_of_type("gate.confirmation_proposed");
        assert!(proposed[1].metadata.contains_key("superseded_proposal_id"));
    }

    #[tokio::test]
    async fn confirmation_without_any_proposal_is_a_mismatch() {
        let fx = fixture(false).await;
        let error = fx
            .gate
            .invoke(&apply("Card A"), Confirmation::Asserted, &fx.context)
            .await
            .expect_err("nothing was proposed");

        assert!(matches!(error, GateError::ConfirmationMismatch { .. }));
        assert_eq!(fx.apply_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn reconfirming_a_committed_action_replays_it() {
        let fx = fixture(false).await;
        propose(&fx, "Card A").await;
        let first = fx.gate.invoke(&apply("Card A"), Confirmation::Asserted, &fx.context).await;
        let second = fx.gate.invoke(&apply("Card A"), Confirmation::Asserted, &fx.context).await;

        let (
            Ok(GateOutcome::Committed { action: first, .. }),
            Ok(GateOutcome::Committed { action: second, replayed }),
        ) = (first, second)
        else {
            panic!("expected commit then replay");
        };
        assert!(replayed);
        assert_eq!(first.action_id, second.action_id);
        assert_eq!(fx.apply_calls.load(Ordering::SeqCst), 1);

        let session = fx.store.get(&fx.context.session_id).await;
        assert_eq!(session.transcript.committed_actions().count(), 1);
    }

    #[tokio::test]
    async fn invalid_arguments_are_rejected_before_proposal() {
        let fx = fixture(false).await;
        let error = fx
            .gate
            .invoke(
                &ToolCallRequest::new("apply_card", json!({ "card": "Card A" })),
                Confirmation::Unconfirmed,
                &fx.context,
            )
            .await
            .expect_err("wrong parameter name");

        assert!(matches!(error, GateError::InvalidArguments { .. }));
        assert!(fx
            .store
            .pending_confirmation(&fx.context.session_id)
            .await
            .expect("session")
            .is_none());
    }

    #[tokio::test]
    async fn failed_execution_keeps_the_proposal_pending() {
        let fx = fixture(true).await;
        propose(&fx, "Card A").await;

        let error = fx
            .gate
            .invoke(&apply("Card A"), Confirmation::Asserted, &fx.context)
            .await
            .expect_err("tool fails");

        assert!(matches!(
            error,
            GateError::ToolExecutionFailed { ref reason, .. } if reason == "issuer offline"
        ));
        assert!(fx
            .store
            .pending_confirmation(&fx.context.session_id)
            .await
            .expect("session")
            .is_some());
        assert_eq!(fx.audit.events_of_type("gate.tool_failed").len(), 1);
    }

    #[tokio::test]
    async fn asking_again_for_the_committed_action_replays_instead_of_proposing() {
        let fx = fixture(false).await;
        propose(&fx, "Card A").await;
        let committed = fx.gate.invoke(&apply("Card A"), Confirmation::Asserted, &fx.context).await;
        assert!(matches!(committed, Ok(GateOutcome::Committed { replayed: false, .. })));

        let outcome = fx
            .gate
            .invoke(&apply("Card A"), Confirmation::Unconfirmed, &fx.context)
            .await
            .expect("replay");

        assert!(matches!(outcome, GateOutcome::Committed { replayed: true, .. }));
        assert_eq!(fx.apply_calls.load(Ordering::SeqCst), 1);
        assert!(fx
            .store
            .pending_confirmation(&fx.context.session_id)
            .await
            .expect("session")
            .is_none());
        assert_eq!(fx.audit.events_of_type("gate.confirmation_proposed").len(), 1);

        let other = fx
            .gate
            .invoke(&apply("Card B"), Confirmation::Unconfirmed, &fx.context)
            .await
            .expect("new proposal");
        assert!(matches!(other, GateOutcome::ConfirmationRequired { .. }));
    }

    #[tokio::test]
    async fn gate_failures_carry_their_turn_error_class() {
        let fx = fixture(true).await;
        propose(&fx, "Card A").await;

        let failed = fx
            .gate
            .invoke(&apply("Card A"), Confirmation::Asserted, &fx.context)
            .await
            .expect_err("tool fails");
        let mismatch = fx
            .gate
            .invoke(&apply("Card B"), Confirmation::Asserted, &fx.context)
            .await
            .expect_err("B was never proposed");
        let unknown = GateError::UnknownTool("wire_money".to_string());

        assert_eq!(
            failed.turn_error().map(|error| error.error_class()),
            Some("tool_execution_failed")
        );
        assert_eq!(
            mismatch.turn_error().map(|error| error.error_class()),
            Some("confirmation_mismatch")
        );
        assert_eq!(unknown.turn_error(), None);
    }

    #[tokio::test]
    async fn unknown_tools_are_reported() {
        let fx = fixture(false).await;
        let error = fx
            .gate
            .invoke(
                &ToolCallRequest::new("wire_money", json!({})),
                Confirmation::Asserted,
                &fx.context,
            )
            .await
            .expect_err("not registered");

        assert_eq!(error, GateError::UnknownTool("wire_money".to_string()));
    }
}
