use std::sync::Arc;
use std::time::Duration;

use concierge_core::audit::{AuditCategory, AuditContext, AuditOutcome, AuditSink};
use concierge_core::config::AgentConfig;
use concierge_core::domain::descriptor::DomainId;
use concierge_core::domain::exchange::TurnResponse;
use concierge_core::domain::session::{SessionId, ToolOutcome, ToolRecord, Turn, TurnStatus};
use concierge_core::domain::tool::{ToolArguments, ToolSpec};
use concierge_core::errors::TurnError;
use concierge_core::store::{SessionLocks, SessionStore};
use uuid::Uuid;

use crate::conversation::{ConfirmationClassifier, ConfirmationReply};
use crate::gate::{Confirmation, GateError, GateOutcome, ToolCallRequest, ToolGate};
use crate::llm::{CompletionRequest, CompletionResult, CompletionService};
use crate::tools::ToolRegistry;

pub const FALLBACK_REPLY: &str =
    "Sorry, I wasn't able to finish that request. Please try again or rephrase it.";

#[derive(Clone, Debug)]
pub struct RuntimeConfig {
    pub domain: DomainId,
    pub max_iterations: u32,
    pub completion_timeout: Duration,
    pub system_instruction: String,
}

impl RuntimeConfig {
    /// A configured instruction replaces the domain profile's default one.
    pub fn from_agent_config(config: &AgentConfig, default_instruction: &str) -> Self {
        Self {
            domain: DomainId(config.domain.clone()),
            max_iterations: config.max_iterations,
            completion_timeout: Duration::from_secs(config.completion_timeout_secs),
            system_instruction: config
                .system_instruction
                .clone()
                .unwrap_or_else(|| default_instruction.to_string()),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TurnReply {
    pub session_id: SessionId,
    pub domain: DomainId,
    pub reply: String,
    pub status: TurnStatus,
    pub iterations: u32,
    pub correlation_id: String,
}

impl TurnReply {
    pub fn into_response(self) -> TurnResponse {
        TurnResponse {
            session_id: self.session_id,
            domain: self.domain,
            reply: self.reply,
            status: self.status,
        }
    }
}

enum Step {
    Continue,
    Finish { reply: String, status: TurnStatus },
}

/// Runs one domain's turn loop: completion → optional gated tool call → completion, until
/// the completion service answers with text or the iteration budget is spent.
pub struct AgentRuntime {
    config: RuntimeConfig,
    store: Arc<dyn SessionStore>,
    completion: Arc<dyn CompletionService>,
    gate: ToolGate,
    catalog: Vec<ToolSpec>,
    locks: SessionLocks,
    classifier: ConfirmationClassifier,
    audit: Arc<dyn AuditSink>,
}

impl AgentRuntime {
    pub fn new(
        config: RuntimeConfig,
        registry: Arc<ToolRegistry>,
        store: Arc<dyn SessionStore>,
        completion: Arc<dyn CompletionService>,
        audit: Arc<dyn AuditSink>,
    ) -> Self {
        let catalog = registry.catalog();
        let gate = ToolGate::new(registry, Arc::clone(&store), Arc::clone(&audit));
        Self {
            config,
            store,
            completion,
            gate,
            catalog,
            locks: SessionLocks::default(),
            classifier: ConfirmationClassifier::default(),
            audit,
        }
    }

    pub fn domain(&self) -> &DomainId {
        &self.config.domain
    }

    pub fn store(&self) -> &Arc<dyn SessionStore> {
        &self.store
    }

    pub fn locks(&self) -> &SessionLocks {
        &self.locks
    }

    pub async fn handle_turn(
        &self,
        session_id: &SessionId,
        text: &str,
    ) -> Result<TurnReply, TurnError> {
        let correlation_id = Uuid::new_v4().to_string();
        let context = AuditContext::new(
            session_id.clone(),
            correlation_id.clone(),
            format!("agent:{}", self.config.domain),
        );

        let _turn_guard = self.locks.acquire(session_id).await;
        self.store.get(session_id).await;
        let pending = self.store.pending_confirmation(session_id).await?;
        self.store.append_turn(session_id, Turn::user(text)).await?;

        tracing::info!(
            event_name = "agent.turn_started",
            correlation_id = %correlation_id,
            session_id = %session_id,
            domain = %self.config.domain,
            pending_confirmation = pending.is_some(),
            "handling turn"
        );

        if let Some(pending) = pending {
            match self.classifier.classify(text) {
                ConfirmationReply::Affirm => {
                    let request = ToolCallRequest::from_pending(&pending);
                    let result =
                        self.gate.invoke(&request, Confirmation::Asserted, &context).await;
                    let result = match result {
                        // Pending state changed underneath us; ask again for the same call.
                        Err(GateError::ConfirmationMismatch { .. }) => {
                            self.gate.invoke(&request, Confirmation::Unconfirmed, &context).await
                        }
                        other => other,
                    };
                    if let Step::Finish { reply, status } =
                        self.apply_gate_result(&request.tool_name, result, &context).await?
                    {
                        return self.finish(session_id, reply, status, 0, &context).await;
                    }
                }
                reply => {
                    self.store.set_pending_confirmation(session_id, None).await?;
                    let event_type = if reply == ConfirmationReply::Decline {
                        "agent.confirmation_declined"
                    } else {
                        "agent.confirmation_discarded"
                    };
                    self.audit.emit(
                        context
                            .event(event_type, AuditCategory::Confirmation, AuditOutcome::Rejected)
                            .with_metadata("tool_name", pending.tool_name.clone())
                            .with_metadata("proposal_id", pending.proposal_id.0.clone()),
                    );
                }
            }
        }

        for iteration in 1..=self.config.max_iterations {
            let session = self.store.get(session_id).await;
            let request = CompletionRequest {
                transcript: &session.transcript,
                tools: &self.catalog,
                system_instruction: &self.config.system_instruction,
            };

            let completion = match tokio::time::timeout(
                self.config.completion_timeout,
                self.completion.complete(request),
            )
            .await
            {
                Ok(Ok(completion)) => completion,
                Ok(Err(error)) => {
                    tracing::warn!(
                        event_name = "agent.completion_failed",
                        correlation_id = %correlation_id,
                        session_id = %session_id,
                        kind = ?error.kind,
                        error = %error,
                        "completion service failed"
                    );
                    return self.fail(session_id, iteration, &context).await;
                }
                Err(_) => {
                    tracing::warn!(
                        event_name = "agent.completion_timeout",
                        correlation_id = %correlation_id,
                        session_id = %session_id,
                        timeout_secs = self.config.completion_timeout.as_secs(),
                        "completion service timed out"
                    );
                    return self.fail(session_id, iteration, &context).await;
                }
            };

            match completion {
                CompletionResult::Text(reply) => {
                    return self
                        .finish(session_id, reply, TurnStatus::Completed, iteration, &context)
                        .await;
                }
                CompletionResult::ToolCall { tool_name, arguments } => {
                    let request = ToolCallRequest::new(tool_name, arguments);
                    let result =
                        self.gate.invoke(&request, Confirmation::Unconfirmed, &context).await;
                    if let Step::Finish { reply, status } =
                        self.apply_gate_result(&request.tool_name, result, &context).await?
                    {
                        return self.finish(session_id, reply, status, iteration, &context).await;
                    }
                }
            }
        }

        let error = TurnError::TurnBudgetExceeded { limit: self.config.max_iterations };
        tracing::error!(
            event_name = "agent.turn_budget_exceeded",
            correlation_id = %correlation_id,
            session_id = %session_id,
            error_class = error.error_class(),
            error = %error,
            "turn did not converge"
        );
        self.fail(session_id, self.config.max_iterations, &context).await
    }

    async fn fail(
        &self,
        session_id: &SessionId,
        iterations: u32,
        context: &AuditContext,
    ) -> Result<TurnReply, TurnError> {
        self.finish(session_id, FALLBACK_REPLY.to_string(), TurnStatus::Failed, iterations, context)
            .await
    }

    /// Records the gate's result as a transcript annotation and decides whether the turn
    /// ends here. Commits are annotated by the store as part of the commit itself.
    async fn apply_gate_result(
        &self,
        tool_name: &str,
        result: Result<GateOutcome, GateError>,
        context: &AuditContext,
    ) -> Result<Step, TurnError> {
        let session_id = &context.session_id;
        if let Some(error) = result.as_ref().err().and_then(GateError::turn_error) {
            tracing::warn!(
                event_name = "agent.tool_call_failed",
                correlation_id = %context.correlation_id,
                session_id = %session_id,
                tool_name,
                error_class = error.error_class(),
                error = %error,
                "tool call did not complete"
            );
        }

        let (record, step) = match result {
            Ok(GateOutcome::Executed { arguments, result }) => (
                Some(ToolRecord {
                    tool_name: tool_name.to_string(),
                    arguments,
                    outcome: ToolOutcome::Executed { result },
                }),
                Step::Continue,
            ),
            Ok(GateOutcome::ConfirmationRequired { pending, message }) => (
                Some(ToolRecord {
                    tool_name: tool_name.to_string(),
                    arguments: pending.proposed_arguments,
                    outcome: ToolOutcome::ConfirmationRequested {
                        proposal_id: pending.proposal_id.0,
                        message: message.clone(),
                    },
                }),
                Step::Finish { reply: message, status: TurnStatus::InputRequired },
            ),
            Ok(GateOutcome::Committed { replayed: false, .. }) => (None, Step::Continue),
            Ok(GateOutcome::Committed { action, replayed: true }) => (
                Some(ToolRecord {
                    tool_name: tool_name.to_string(),
                    arguments: action.arguments,
                    outcome: ToolOutcome::Executed {
                        result: format!(
                            "already completed earlier (action {}): {}",
                            action.action_id.0, action.result_summary
                        ),
                    },
                }),
                Step::Continue,
            ),
            Err(GateError::Store(error)) => return Err(error.into()),
            Err(GateError::ToolExecutionFailed { arguments, reason, .. }) => (
                Some(ToolRecord {
                    tool_name: tool_name.to_string(),
                    arguments,
                    outcome: ToolOutcome::Failed { error: reason },
                }),
                Step::Continue,
            ),
            Err(GateError::ConfirmationMismatch { arguments, .. }) => (
                Some(ToolRecord {
                    tool_name: tool_name.to_string(),
                    arguments,
                    outcome: ToolOutcome::Rejected {
                        reason: "the call does not match the pending proposal".to_string(),
                    },
                }),
                Step::Continue,
            ),
            Err(error @ (GateError::UnknownTool(_) | GateError::InvalidArguments { .. })) => (
                Some(ToolRecord {
                    tool_name: tool_name.to_string(),
                    arguments: ToolArguments::new(),
                    outcome: ToolOutcome::Rejected { reason: error.to_string() },
                }),
                Step::Continue,
            ),
        };

        if let Some(record) = record {
            self.store.append_turn(session_id, Turn::tool_annotation(record)).await?;
        }
        Ok(step)
    }

    async fn finish(
        &self,
        session_id: &SessionId,
        reply: String,
        status: TurnStatus,
        iterations: u32,
        context: &AuditContext,
    ) -> Result<TurnReply, TurnError> {
        self.store.append_turn(session_id, Turn::agent(reply.clone())).await?;

        let outcome = match status {
            TurnStatus::Completed | TurnStatus::InputRequired => AuditOutcome::Success,
            TurnStatus::Failed => AuditOutcome::Failed,
        };
        self.audit.emit(
            context
                .event("agent.turn_completed", AuditCategory::Turn, outcome)
                .with_metadata("status", status.as_str())
                .with_metadata("iterations", iterations.to_string()),
        );
        tracing::info!(
            event_name = "agent.turn_completed",
            correlation_id = %context.correlation_id,
            session_id = %session_id,
            domain = %self.config.domain,
            status = status.as_str(),
            iterations,
            "turn completed"
        );

        Ok(TurnReply {
            session_id: session_id.clone(),
            domain: self.config.domain.clone(),
            reply,
            status,
            iterations,
            correlation_id: context.correlation_id.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use async_trait::async_trait;
    use concierge_core::audit::InMemoryAuditSink;
    use concierge_core::domain::descriptor::DomainId;
    use concierge_core::domain::session::{SessionId, TurnRole, TurnStatus};
    use concierge_core::store::{InMemorySessionStore, SessionStore};
    use serde_json::{json, Value};

    use super::{AgentRuntime, RuntimeConfig, FALLBACK_REPLY};
    use crate::domains::cards;
    use crate::llm::{
        CompletionError, CompletionRequest, CompletionResult, CompletionService,
    };

    /// Replays a fixed script; answers "ok" once the script runs out.
    #[derive(Default)]
    struct Scripted {
        script: Mutex<VecDeque<CompletionResult>>,
        calls: AtomicUsize,
    }

    impl Scripted {
        fn new(script: Vec<CompletionResult>) -> Self {
            Self { script: Mutex::new(script.into()), calls: AtomicUsize::new(0) }
        }
    }

    #[async_trait]
    impl CompletionService for Scripted {
        async fn complete(
            &self,
            _request: CompletionRequest<'_>,
        ) -> Result<CompletionResult, CompletionError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let next = match self.script.lock() {
                Ok(mut script) => script.pop_front(),
                Err(poisoned) => poisoned.into_inner().pop_front(),
            };
            Ok(next.unwrap_or_else(|| CompletionResult::Text("ok".to_string())))
        }
    }

    struct AlwaysToolCall(AtomicUsize);

    #[async_trait]
    impl CompletionService for AlwaysToolCall {
        async fn complete(
            &self,
            _request: CompletionRequest<'_>,
        ) -> Result<CompletionResult, CompletionError> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok(tool_call("recommend_card", json!({"spending_category": "travel"})))
        }
    }

    struct Stalled;

    #[async_trait]
    impl CompletionService for Stalled {
        async fn complete(
            &self,
            _request: CompletionRequest<'_>,
        ) -> Result<CompletionResult, CompletionError> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(CompletionResult::Text("too late".to_string()))
        }
    }

    fn tool_call(name: &str, arguments: Value) -> CompletionResult {
        CompletionResult::ToolCall { tool_name: name.to_string(), arguments }
    }

    fn text(reply: &str) -> CompletionResult {
        CompletionResult::Text(reply.to_string())
    }

    fn config(max_iterations: u32) -> RuntimeConfig {
        RuntimeConfig {
            domain: DomainId::from("recommend"),
            max_iterations,
            completion_timeout: Duration::from_millis(200),
            system_instruction: "You recommend cards.".to_string(),
        }
    }

    fn runtime(
        completion: Arc<dyn CompletionService>,
        max_iterations: u32,
    ) -> (AgentRuntime, Arc<InMemorySessionStore>, InMemoryAuditSink) {
        let store = Arc::new(InMemorySessionStore::default());
        let audit = InMemoryAuditSink::default();
        let runtime = AgentRuntime::new(
            config(max_iterations),
            Arc::new(cards::registry()),
            store.clone() as Arc<dyn SessionStore>,
            completion,
            Arc::new(audit.clone()),
        );
        (runtime, store, audit)
    }

    #[tokio::test]
    async fn free_text_reply_appends_exactly_one_user_and_one_agent_turn() {
        let (runtime, store, _) =
            runtime(Arc::new(Scripted::new(vec![text("Hello! How can I help?")])), 5);
        let session = SessionId::from("S-1");

        let reply = runtime.handle_turn(&session, "hi").await.expect("turn succeeds");

        assert_eq!(reply.status, TurnStatus::Completed);
        assert_eq!(reply.reply, "Hello! How can I help?");
        let transcript = store.get(&session).await.transcript;
        let roles = transcript.turns().iter().map(|turn| turn.role).collect::<Vec<_>>();
        assert_eq!(roles, vec![TurnRole::User, TurnRole::Agent]);
    }

    #[tokio::test]
    async fn tool_results_are_phrased_by_the_completion_service() {
        let completion = Arc::new(Scripted::new(vec![
            tool_call("recommend_card", json!({"spending_category": "travel"})),
            text("I suggest the Voyager card."),
        ]));
        let (runtime, store, _) = runtime(completion.clone(), 5);
        let session = SessionId::from("S-1");

        let reply = runtime.handle_turn(&session, "travel card please").await.expect("turn");

        assert_eq!(reply.reply, "I suggest the Voyager card.");
        assert_eq!(reply.iterations, 2);
        assert_eq!(completion.calls.load(Ordering::SeqCst), 2);
        let transcript = store.get(&session).await.transcript;
        assert_eq!(transcript.len(), 3);
        assert!(transcript.turns()[1].is_annotation());
        assert!(!transcript.turns()[2].is_annotation());
    }

    #[tokio::test]
    async fn side_effecting_call_ends_turn_with_verbatim_confirmation_request() {
        let completion = Arc::new(Scripted::new(vec![tool_call(
            "apply_card",
            json!({"card_name": "Voyager Travel Card"}),
        )]));
        let (runtime, store, _) = runtime(completion.clone(), 5);
        let session = SessionId::from("S-1");

        let reply = runtime.handle_turn(&session, "apply for it").await.expect("turn");

        assert_eq!(reply.status, TurnStatus::InputRequired);
        assert!(reply.reply.contains("Voyager Travel Card"));
        assert_eq!(completion.calls.load(Ordering::SeqCst), 1);
        assert!(store.pending_confirmation(&session).await.expect("session").is_some());
    }

    #[tokio::test]
    async fn affirmative_reply_commits_the_pending_call() {
        let completion = Arc::new(Scripted::new(vec![
            tool_call("apply_card", json!({"card_name": "Voyager Travel Card"})),
            text("Your application was submitted."),
        ]));
        let (runtime, store, audit) = runtime(completion, 5);
        let session = SessionId::from("S-1");

        runtime.handle_turn(&session, "apply for it").await.expect("proposal turn");
        let reply = runtime.handle_turn(&session, "yes, confirm").await.expect("confirm turn");

        assert_eq!(reply.status, TurnStatus::Completed);
        assert_eq!(reply.reply, "Your application was submitted.");
        let state = store.get(&session).await;
        assert!(state.pending_confirmation.is_none());
        assert_eq!(state.transcript.committed_actions().count(), 1);
        assert_eq!(audit.events_of_type("gate.action_committed").len(), 1);
    }

    #[tokio::test]
    async fn question_about_the_proposal_does_not_commit_it() {
        let completion = Arc::new(Scripted::new(vec![
            tool_call("apply_card", json!({"card_name": "Voyager Travel Card"})),
            text("The annual fee is 95,000 won."),
        ]));
        let (runtime, store, audit) = runtime(completion, 5);
        let session = SessionId::from("S-1");

        runtime.handle_turn(&session, "apply for it").await.expect("proposal turn");
        let reply =
            runtime.handle_turn(&session, "연회비가 얼마예요?").await.expect("question turn");

        assert_eq!(reply.status, TurnStatus::Completed);
        let state = store.get(&session).await;
        assert_eq!(state.transcript.committed_actions().count(), 0);
        assert!(state.pending_confirmation.is_none());
        assert!(audit.events_of_type("gate.action_committed").is_empty());
        assert_eq!(audit.events_of_type("agent.confirmation_discarded").len(), 1);
    }

    #[tokio::test]
    async fn repeated_request_after_commit_replays_without_executing_again() {
        let completion = Arc::new(Scripted::new(vec![
            tool_call("apply_card", json!({"card_name": "Voyager Travel Card"})),
            text("Your application was submitted."),
            tool_call("apply_card", json!({"card_name": "Voyager Travel Card"})),
            text("You already applied for that card."),
        ]));
        let (runtime, store, audit) = runtime(completion, 5);
        let session = SessionId::from("S-1");

        runtime.handle_turn(&session, "apply for it").await.expect("proposal turn");
        runtime.handle_turn(&session, "yes, confirm").await.expect("confirm turn");
        let reply = runtime.handle_turn(&session, "yes").await.expect("repeat turn");

        assert_eq!(reply.status, TurnStatus::Completed);
        assert_eq!(reply.reply, "You already applied for that card.");
        let state = store.get(&session).await;
        assert!(state.pending_confirmation.is_none());
        assert_eq!(state.transcript.committed_actions().count(), 1);
        assert_eq!(audit.events_of_type("gate.action_committed").len(), 1);
        assert_eq!(audit.events_of_type("gate.action_replayed").len(), 1);
        assert_eq!(audit.events_of_type("gate.confirmation_proposed").len(), 1);
    }

    #[tokio::test]
    async fn declining_discards_the_pending_call() {
        let completion = Arc::new(Scripted::new(vec![
            tool_call("apply_card", json!({"card_name": "Voyager Travel Card"})),
            text("No problem, I won't apply."),
        ]));
        let (runtime, store, audit) = runtime(completion, 5);
        let session = SessionId::from("S-1");

        runtime.handle_turn(&session, "apply for it").await.expect("proposal turn");
        let reply = runtime.handle_turn(&session, "no, cancel").await.expect("decline turn");

        assert_eq!(reply.status, TurnStatus::Completed);
        let state = store.get(&session).await;
        assert!(state.pending_confirmation.is_none());
        assert_eq!(state.transcript.committed_actions().count(), 0);
        assert_eq!(audit.events_of_type("agent.confirmation_declined").len(), 1);
    }

    #[tokio::test]
    async fn completion_layer_cannot_commit_without_user_confirmation() {
        let completion = Arc::new(Scripted::new(vec![
            tool_call("apply_card", json!({"card_name": "Voyager Travel Card"})),
            tool_call("apply_card", json!({"card_name": "Voyager Travel Card"})),
        ]));
        let (runtime, store, _) = runtime(completion, 5);
        let session = SessionId::from("S-1");

        runtime.handle_turn(&session, "apply for it").await.expect("first turn");
        let reply = runtime.handle_turn(&session, "tell me more").await.expect("second turn");

        assert_eq!(reply.status, TurnStatus::InputRequired);
        assert_eq!(store.get(&session).await.transcript.committed_actions().count(), 0);
    }

    #[tokio::test]
    async fn always_tool_calling_stub_hits_the_turn_budget() {
        let completion = Arc::new(AlwaysToolCall(AtomicUsize::new(0)));
        let (runtime, store, _) = runtime(completion.clone(), 3);
        let session = SessionId::from("S-1");

        let reply = runtime.handle_turn(&session, "loop forever").await.expect("turn returns");

        assert_eq!(reply.status, TurnStatus::Failed);
        assert_eq!(reply.reply, FALLBACK_REPLY);
        assert_eq!(completion.0.load(Ordering::SeqCst), 3);
        let transcript = store.get(&session).await.transcript;
        assert_eq!(transcript.last().map(|turn| turn.text.as_str()), Some(FALLBACK_REPLY));
    }

    #[tokio::test]
    async fn completion_timeout_returns_fallback() {
        let (runtime, _, _) = runtime(Arc::new(Stalled), 3);
        let reply =
            runtime.handle_turn(&SessionId::from("S-1"), "hello").await.expect("turn returns");

        assert_eq!(reply.status, TurnStatus::Failed);
        assert_eq!(reply.reply, FALLBACK_REPLY);
    }

    #[tokio::test]
    async fn invalid_tool_arguments_are_fed_back_to_the_completion_service() {
        let completion = Arc::new(Scripted::new(vec![
            tool_call("recommend_card", json!({"spending_category": "groceries"})),
            text("Which category do you spend most on?"),
        ]));
        let (runtime, store, _) = runtime(completion, 5);
        let session = SessionId::from("S-1");

        let reply = runtime.handle_turn(&session, "recommend something").await.expect("turn");

        assert_eq!(reply.status, TurnStatus::Completed);
        let transcript = store.get(&session).await.transcript;
        assert!(transcript.turns()[1].text.starts_with("tool call rejected"));
    }
}
