//! Agent runtime for one specialized domain.
//!
//! A turn runs a bounded loop against the completion service. Tool calls go through the
//! [`gate::ToolGate`], which executes read-only tools directly and turns side-effecting
//! ones into a proposal the user has to confirm. The completion service can never assert
//! that confirmation itself: the runtime matches the user's reply to the pending proposal.

pub mod conversation;
pub mod domains;
pub mod gate;
pub mod llm;
pub mod runtime;
pub mod tools;

pub use gate::{Confirmation, GateError, GateOutcome, ToolCallRequest, ToolGate};
pub use llm::{CompletionError, CompletionResult, CompletionService, OpenAiCompatibleClient};
pub use runtime::{AgentRuntime, RuntimeConfig, TurnReply};
pub use tools::{Tool, ToolError, ToolRegistry};
