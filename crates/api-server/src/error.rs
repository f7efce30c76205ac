use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use tracing::{error, warn};

use autopilot_core::error::{CampaignError, ErrorKind};

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: ErrorKind,
    pub message: String,
}

/// Engine error rendered as a JSON response.
#[derive(Debug)]
pub struct ApiError(pub CampaignError);

impl From<CampaignError> for ApiError {
    fn from(err: CampaignError) -> Self {
        ApiError(err)
    }
}

pub fn status_for(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::Validation => StatusCode::BAD_REQUEST,
        ErrorKind::NotFound => StatusCode::NOT_FOUND,
        ErrorKind::StateConflict => StatusCode::CONFLICT,
        ErrorKind::Configuration => StatusCode::UNPROCESSABLE_ENTITY,
        ErrorKind::TransientDispatch => StatusCode::BAD_GATEWAY,
        ErrorKind::Store | ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let kind = self.0.kind();
        let status = status_for(kind);
        let message = if status.is_server_error() && status != StatusCode::BAD_GATEWAY {
            error!(error = %self.0, "Request failed");
            metrics::counter!("api.errors").increment(1);
            "Internal processing error".to_string()
        } else {
            warn!(error = %self.0, kind = ?kind, "Request rejected");
            self.0.to_string()
        };
        (status, Json(ErrorResponse { error: kind, message })).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(status_for(ErrorKind::Validation), StatusCode::BAD_REQUEST);
        assert_eq!(status_for(ErrorKind::StateConflict), StatusCode::CONFLICT);
        assert_eq!(status_for(ErrorKind::TransientDispatch), StatusCode::BAD_GATEWAY);
        assert_eq!(status_for(ErrorKind::Internal), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_internal_details_hidden() {
        let response = ApiError(CampaignError::Store("disk full".into())).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
