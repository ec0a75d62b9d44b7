use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use voya_approval::ApprovalError;

/// Maps the approval error taxonomy onto HTTP statuses. Not-found codes
/// become 404, capacity conflicts 409, exhausted retries 503; anything
/// infrastructural is logged and answered generically.
pub struct ApiError(pub ApprovalError);

impl From<ApprovalError> for ApiError {
    fn from(err: ApprovalError) -> Self {
        ApiError(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let code = self.0.code();
        let status = match code {
            "REQUEST_NOT_FOUND" | "FLIGHT_NOT_FOUND" | "HOTEL_NOT_FOUND" => StatusCode::NOT_FOUND,
            "INVALID_STATE" => StatusCode::UNPROCESSABLE_ENTITY,
            "INSUFFICIENT_CAPACITY"
            | "INSUFFICIENT_ROOMS"
            | "OPTIMISTIC_LOCK_FAILED"
            | "SEAT_RESERVATION_FAILED"
            | "ALLOCATION_NOT_ACTIVE"
            | "RELEASE_ERROR" => StatusCode::CONFLICT,
            "DEADLOCK_RETRY" => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let message = if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!(error = %self.0, "internal error on approval API");
            "internal server error".to_string()
        } else {
            self.0.to_string()
        };

        let body = Json(json!({
            "success": false,
            "error_code": code,
            "message": message,
        }));
        (status, body).into_response()
    }
}
