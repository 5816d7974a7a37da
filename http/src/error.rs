use axum::{
    http::StatusCode,
    response::{
        IntoResponse,
        Response,
    },
};

#[derive(thiserror::Error, Debug)]
pub enum AppError {
    #[error("No metric named '{0}' is configured")]
    UnknownMetric(String),
    #[error("No sample has been collected yet")]
    NoSample,
}

impl AppError {
    fn status(&self) -> StatusCode {
        match self {
            AppError::UnknownMetric(_) => StatusCode::NOT_FOUND,
            AppError::NoSample => StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        (
            self.status(),
            axum::Json(serde_json::json!({ "error": self.to_string() })),
        )
            .into_response()
    }
}
