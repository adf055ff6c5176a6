use serde::{Deserialize, Serialize};

use crate::domain::descriptor::DomainId;
use crate::domain::session::{SessionId, TurnStatus};

/// Router → agent runtime request body (`POST /v1/turns`).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TurnRequest {
    pub session_id: SessionId,
    pub text: String,
}

/// Agent runtime → router response body, also returned verbatim to callers.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TurnResponse {
    pub session_id: SessionId,
    pub domain: DomainId,
    pub reply: String,
    pub status: TurnStatus,
}

/// Error body shared by both HTTP surfaces.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error_class: String,
    pub reply: String,
    pub correlation_id: String,
}
