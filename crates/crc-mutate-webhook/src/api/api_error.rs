use axum::{http::StatusCode, response::IntoResponse};
use crc_mutate::MutateError;
use serde_json::json;
use tracing::error;

#[derive(Debug)]
/// An error that can be returned by the API
/// and will be converted into a JSON response.
pub(crate) struct ApiError {
    pub(crate) status: StatusCode,
    pub(crate) message: String,
}

impl From<MutateError> for ApiError {
    fn from(error: MutateError) -> Self {
        let status = match error {
            MutateError::DecodeEnvelope(_) => StatusCode::BAD_REQUEST,
            MutateError::DecodePod(_) | MutateError::Encode(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        error!(status = status.as_u16(), "{error}");

        Self {
            status,
            message: error.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let payload = json!({
            "message": self.message,
            "status": self.status.as_u16(),
        });

        (self.status, axum::Json(payload)).into_response()
    }
}
