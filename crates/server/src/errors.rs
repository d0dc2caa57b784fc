use axum::{http::StatusCode, Json};
use brokerdesk_core::InterfaceError;
use serde::Serialize;
use tracing::warn;

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ErrorBody {
    pub error: &'static str,
    pub correlation_id: String,
}

pub type ApiError = (StatusCode, Json<ErrorBody>);

/// User-safe rendering of an interface error. The internal message is logged,
/// never returned.
pub fn api_error(error: &InterfaceError) -> ApiError {
    let status = match error {
        InterfaceError::BadRequest { .. } => StatusCode::BAD_REQUEST,
        InterfaceError::ServiceUnavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
        InterfaceError::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
    };

    warn!(
        event_name = "system.http.error",
        correlation_id = %error.correlation_id(),
        status = status.as_u16(),
        error = %error,
        "request rejected"
    );

    let body = ErrorBody {
        error: error.user_message(),
        correlation_id: error.correlation_id().to_string(),
    };
    (status, Json(body))
}
