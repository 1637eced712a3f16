use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use cretoai_gatekeeper::{AuthzError, BaseResponse, Denial};

pub type Result<T> = std::result::Result<T, ApiError>;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// The guard denied the request
    #[error("{denial}")]
    Denied { denial: Denial, path: String },

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Cache administration failed
    #[error("Cache unavailable: {0}")]
    Cache(#[from] AuthzError),

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Denied { .. } => StatusCode::UNAUTHORIZED,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Cache(_) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();

        // Callers see the short message; the envelope data is the request path
        let (message, data) = match self {
            ApiError::Denied { denial, path } => (denial.message.to_string(), Some(path)),
            ApiError::NotFound(path) => ("Not Found".to_string(), Some(path)),
            ApiError::BadRequest(msg) => (msg, None),
            ApiError::Cache(e) => {
                tracing::error!(error = %e, "Cache administration failed");
                ("Cache unavailable".to_string(), None)
            }
            ApiError::Internal(msg) => {
                tracing::error!(error = %msg, "Internal error");
                ("Internal server error".to_string(), None)
            }
        };

        let body = Json(BaseResponse::error(status.as_u16(), message, data));
        (status, body).into_response()
    }
}
