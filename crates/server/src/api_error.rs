use axum::{http::StatusCode, Json};
use concierge_core::domain::exchange::ErrorBody;
use concierge_core::errors::{ApplicationError, InterfaceError};

pub type ApiError = (StatusCode, Json<ErrorBody>);

pub fn status_for(error: &InterfaceError) -> StatusCode {
    match error {
        InterfaceError::BadRequest { .. } => StatusCode::BAD_REQUEST,
        // The router's transport reads 410 as "the agent no longer has this session".
        InterfaceError::ConversationExpired { .. } => StatusCode::GONE,
        InterfaceError::ServiceUnavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
        InterfaceError::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

pub fn into_api_error(error: impl Into<ApplicationError>, correlation_id: &str) -> ApiError {
    let interface = error.into().into_interface(correlation_id);
    let body = ErrorBody {
        error_class: interface.error_class().to_string(),
        reply: interface.user_message().to_string(),
        correlation_id: interface.correlation_id().to_string(),
    };
    (status_for(&interface), Json(body))
}

pub fn bad_request(message: &str, correlation_id: &str) -> ApiError {
    let interface = InterfaceError::BadRequest {
        message: message.to_string(),
        correlation_id: correlation_id.to_string(),
    };
    (
        StatusCode::BAD_REQUEST,
        Json(ErrorBody {
            error_class: interface.error_class().to_string(),
            reply: message.to_string(),
            correlation_id: correlation_id.to_string(),
        }),
    )
}
