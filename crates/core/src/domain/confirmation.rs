use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::tool::ToolArguments;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProposalId(pub String);

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ActionId(pub String);

/// A side-effecting tool call that was proposed to the user and not yet committed.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PendingConfirmation {
    pub proposal_id: ProposalId,
    pub tool_name: String,
    pub proposed_arguments: ToolArguments,
    pub created_at: DateTime<Utc>,
}

impl PendingConfirmation {
    pub fn new(tool_name: impl Into<String>, proposed_arguments: ToolArguments) -> Self {
        Self {
            proposal_id: ProposalId(Uuid::new_v4().to_string()),
            tool_name: tool_name.into(),
            proposed_arguments,
            created_at: Utc::now(),
        }
    }

    /// Exact match on tool name, by-value match on arguments.
    pub fn matches(&self, tool_name: &str, arguments: &ToolArguments) -> bool {
        self.tool_name == tool_name && &self.proposed_arguments == arguments
    }
}

/// Immutable record of a side-effecting tool call that actually ran.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CommittedAction {
    pub action_id: ActionId,
    pub proposal_id: ProposalId,
    pub tool_name: String,
    pub arguments: ToolArguments,
    pub result_summary: String,
    pub committed_at: DateTime<Utc>,
}

impl CommittedAction {
    /// Mints the action id. Call once per successful execution.
    pub fn commit(pending: &PendingConfirmation, result_summary: impl Into<String>) -> Self {
        Self {
            action_id: ActionId(Uuid::new_v4().to_string()),
            proposal_id: pending.proposal_id.clone(),
            tool_name: pending.tool_name.clone(),
            arguments: pending.proposed_arguments.clone(),
            result_summary: result_summary.into(),
            committed_at: Utc::now(),
        }
    }

    pub fn matches(&self, tool_name: &str, arguments: &ToolArguments) -> bool {
        self.tool_name == tool_name && &self.arguments == arguments
    }
}
