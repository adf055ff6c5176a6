use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::confirmation::{CommittedAction, PendingConfirmation};
use crate::domain::descriptor::DomainId;
use crate::domain::tool::ToolArguments;

#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(pub String);

impl SessionId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SessionId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnRole {
    User,
    Agent,
}

/// What happened to a tool call requested during a turn.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ToolOutcome {
    Executed { result: String },
    ConfirmationRequested { proposal_id: String, message: String },
    Committed { action: CommittedAction },
    Rejected { reason: String },
    Failed { error: String },
}

impl ToolOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Executed { .. } => "executed",
            Self::ConfirmationRequested { .. } => "confirmation_requested",
            Self::Committed { .. } => "committed",
            Self::Rejected { .. } => "rejected",
            Self::Failed { .. } => "failed",
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Self::Rejected { .. } | Self::Failed { .. })
    }

    /// Text handed back to the completion service as the tool result.
    pub fn result_text(&self) -> String {
        match self {
            Self::Executed { result } => result.clone(),
            Self::ConfirmationRequested { message, .. } => message.clone(),
            Self::Committed { action } => action.result_summary.clone(),
            Self::Rejected { reason } => format!("tool call rejected: {reason}"),
            Self::Failed { error } => format!("tool execution failed: {error}"),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ToolRecord {
    pub tool_name: String,
    pub arguments: ToolArguments,
    pub outcome: ToolOutcome,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Turn {
    pub role: TurnRole,
    pub text: String,
    pub tool: Option<ToolRecord>,
    pub recorded_at: DateTime<Utc>,
}

impl Turn {
    pub fn user(text: impl Into<String>) -> Self {
        Self { role: TurnRole::User, text: text.into(), tool: None, recorded_at: Utc::now() }
    }

    pub fn agent(text: impl Into<String>) -> Self {
        Self { role: TurnRole::Agent, text: text.into(), tool: None, recorded_at: Utc::now() }
    }

    /// Internal agent-side annotation carrying a tool call and its outcome.
    pub fn tool_annotation(record: ToolRecord) -> Self {
        Self {
            role: TurnRole::Agent,
            text: record.outcome.result_text(),
            tool: Some(record),
            recorded_at: Utc::now(),
        }
    }

    pub fn is_annotation(&self) -> bool {
        self.tool.is_some()
    }
}

/// Ordered conversation history. Turns can be appended but never edited or removed.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Transcript {
    turns: Vec<Turn>,
}

impl Transcript {
    pub fn append(&mut self, turn: Turn) {
        self.turns.push(turn);
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub fn last(&self) -> Option<&Turn> {
        self.turns.last()
    }

    pub fn is_prefix_of(&self, other: &Transcript) -> bool {
        other.turns.starts_with(&self.turns)
    }

    pub fn committed_actions(&self) -> impl Iterator<Item = &CommittedAction> {
        self.turns.iter().filter_map(|turn| match turn.tool.as_ref().map(|tool| &tool.outcome) {
            Some(ToolOutcome::Committed { action }) => Some(action),
            _ => None,
        })
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub id: SessionId,
    pub target_domain: Option<DomainId>,
    pub transcript: Transcript,
    pub pending_confirmation: Option<PendingConfirmation>,
    pub created_at: DateTime<Utc>,
    pub last_active_at: DateTime<Utc>,
}

impl Session {
    pub fn new(id: SessionId) -> Self {
        let now = Utc::now();
        Self {
            id,
            target_domain: None,
            transcript: Transcript::default(),
            pending_confirmation: None,
            created_at: now,
            last_active_at: now,
        }
    }

    pub fn last_committed_action(&self) -> Option<&CommittedAction> {
        self.transcript.committed_actions().last()
    }
}

/// Outcome class of a turn as reported across the router boundary.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnStatus {
    Completed,
    InputRequired,
    Failed,
}

impl TurnStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Completed => "completed",
            Self::InputRequired => "input_required",
            Self::Failed => "failed",
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::domain::confirmation::{CommittedAction, PendingConfirmation};
    use crate::domain::tool::{ArgValue, ToolArguments};

    use super::{Session, SessionId, ToolOutcome, ToolRecord, Transcript, Turn, TurnRole};

    #[test]
    fn transcript_prefix_holds_after_appends() {
        let mut transcript = Transcript::default();
        transcript.append(Turn::user("hello"));
        let before = transcript.clone();

        transcript.append(Turn::agent("hi there"));

        assert!(before.is_prefix_of(&transcript));
        assert!(!transcript.is_prefix_of(&before));
        assert_eq!(transcript.turns()[0].role, TurnRole::User);
    }

    #[test]
    fn committed_actions_are_read_from_annotations() {
        let arguments = ToolArguments::new().with("card_name", ArgValue::from("Card A"));
        let pending = PendingConfirmation::new("apply_card", arguments.clone());
        let action = CommittedAction::commit(&pending, "application accepted");

        let mut session = Session::new(SessionId::from("S-1"));
        session.transcript.append(Turn::user("apply"));
        session.transcript.append(Turn::tool_annotation(ToolRecord {
            tool_name: "apply_card".to_string(),
            arguments,
            outcome: ToolOutcome::Committed { action: action.clone() },
        }));
        session.transcript.append(Turn::agent("done"));

        assert_eq!(session.last_committed_action(), Some(&action));
        assert!(session.transcript.turns()[1].is_annotation());
        assert_eq!(session.transcript.turns()[1].text, "application accepted");
    }

    #[test]
    fn error_outcomes_are_prefixed_for_the_completion_service() {
        let outcome = ToolOutcome::Failed { error: "upstream timeout".to_string() };
        assert!(outcome.is_error());
        assert_eq!(outcome.result_text(), "tool execution failed: upstream timeout");
        assert_eq!(outcome.as_str(), "failed");
    }
}
