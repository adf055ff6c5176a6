use thiserror::Error;

use crate::domain::descriptor::DomainId;
use crate::domain::session::SessionId;

/// Failures scoped to a single conversational turn.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum TurnError {
    #[error("session `{0}` was not found; it may have been purged")]
    SessionNotFound(SessionId),
    #[error("confirmation for tool `{tool_name}` does not match the pending proposal")]
    ConfirmationMismatch { tool_name: String },
    #[error("turn did not converge within {limit} completion iterations")]
    TurnBudgetExceeded { limit: u32 },
    #[error("domain `{domain}` is unavailable: {reason}")]
    DomainUnavailable { domain: DomainId, reason: String },
    #[error("tool `{tool_name}` failed: {reason}")]
    ToolExecutionFailed { tool_name: String, reason: String },
}

impl TurnError {
    pub fn error_class(&self) -> &'static str {
        match self {
            Self::SessionNotFound(_) => "session_not_found",
            Self::ConfirmationMismatch { .. } => "confirmation_mismatch",
            Self::TurnBudgetExceeded { .. } => "turn_budget_exceeded",
            Self::DomainUnavailable { .. } => "domain_unavailable",
            Self::ToolExecutionFailed { .. } => "tool_execution_failed",
        }
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ApplicationError {
    #[error(transparent)]
    Turn(#[from] TurnError),
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum InterfaceError {
    #[error("bad request: {message}")]
    BadRequest { message: String, correlation_id: String },
    #[error("conversation expired: {message}")]
    ConversationExpired { message: String, correlation_id: String },
    #[error("service unavailable: {message}")]
    ServiceUnavailable { message: String, correlation_id: String },
    #[error("internal error: {message}")]
    Internal { message: String, correlation_id: String },
}

impl InterfaceError {
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::BadRequest { .. } => {
                "The request could not be processed. Check inputs and try again."
            }
            Self::ConversationExpired { .. } => {
                "This conversation has expired. Please start a new conversation."
            }
            Self::ServiceUnavailable { .. } => {
                "The service is temporarily unavailable. Please retry shortly."
            }
            Self::Internal { .. } => "Sorry, something went wrong while handling your request.",
        }
    }

    pub fn error_class(&self) -> &'static str {
        match self {
            Self::BadRequest { .. } => "bad_request",
            Self::ConversationExpired { .. } => "conversation_expired",
            Self::ServiceUnavailable { .. } => "service_unavailable",
            Self::Internal { .. } => "internal",
        }
    }

    pub fn correlation_id(&self) -> &str {
        match self {
            Self::BadRequest { correlation_id, .. }
            | Self::ConversationExpired { correlation_id, .. }
            | Self::ServiceUnavailable { correlation_id, .. }
            | Self::Internal { correlation_id, .. } => correlation_id,
        }
    }
}

impl ApplicationError {
    pub fn into_interface(self, correlation_id: impl Into<String>) -> InterfaceError {
        let correlation_id = correlation_id.into();
        let mut mapped = InterfaceError::from(self);
        match &mut mapped {
            InterfaceError::BadRequest { correlation_id: id, .. }
            | InterfaceError::ConversationExpired { correlation_id: id, .. }
            | InterfaceError::ServiceUnavailable { correlation_id: id, .. }
            | InterfaceError::Internal { correlation_id: id, .. } => *id = correlation_id,
        }
        mapped
    }
}

impl From<ApplicationError> for InterfaceError {
    fn from(value: ApplicationError) -> Self {
        let unassigned = || "unassigned".to_owned();
        match value {
            ApplicationError::Turn(error @ TurnError::SessionNotFound(_)) => {
                Self::ConversationExpired {
                    message: error.to_string(),
                    correlation_id: unassigned(),
                }
            }
            ApplicationError::Turn(error @ TurnError::DomainUnavailable { .. }) => {
                Self::ServiceUnavailable {
                    message: error.to_string(),
                    correlation_id: unassigned(),
                }
            }
            ApplicationError::Turn(error @ TurnError::ConfirmationMismatch { .. }) => {
                Self::BadRequest { message: error.to_string(), correlation_id: unassigned() }
            }
            ApplicationError::Turn(error) => {
                Self::Internal { message: error.to_string(), correlation_id: unassigned() }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::domain::descriptor::DomainId;
    use crate::domain::session::SessionId;
    use crate::errors::{ApplicationError, InterfaceError, TurnError};

    #[test]
    fn purged_session_maps_to_restart_request() {
        let interface = ApplicationError::from(TurnError::SessionNotFound(SessionId::from("S-9")))
            .into_interface("req-1");

        assert!(matches!(
            interface,
            InterfaceError::ConversationExpired { ref correlation_id, .. } if correlation_id == "req-1"
        ));
        assert!(interface.user_message().contains("start a new conversation"));
    }

    #[test]
    fn unavailable_domain_maps_to_service_unavailable() {
        let interface = ApplicationError::from(TurnError::DomainUnavailable {
            domain: DomainId::from("recommend"),
            reason: "connection refused".to_string(),
        })
        .into_interface("req-2");

        assert!(matches!(interface, InterfaceError::ServiceUnavailable { .. }));
        assert_eq!(interface.error_class(), "service_unavailable");
        assert_eq!(
            interface.user_message(),
            "The service is temporarily unavailable. Please retry shortly."
        );
    }

    #[test]
    fn budget_exhaustion_maps_to_generic_internal_message() {
        let interface = ApplicationError::from(TurnError::TurnBudgetExceeded { limit: 4 })
            .into_interface("req-3");

        assert!(matches!(interface, InterfaceError::Internal { .. }));
        assert_eq!(interface.correlation_id(), "req-3");
        assert!(!interface.user_message().contains("iterations"));
    }

    #[test]
    fn turn_errors_expose_stable_error_classes() {
        assert_eq!(
            TurnError::ConfirmationMismatch { tool_name: "apply_card".to_string() }.error_class(),
            "confirmation_mismatch"
        );
        assert_eq!(
            TurnError::ToolExecutionFailed {
                tool_name: "apply_card".to_string(),
                reason: "boom".to_string()
            }
            .error_class(),
            "tool_execution_failed"
        );
    }
}
