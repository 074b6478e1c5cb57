//! Thin Axum adapter over `logsync_core::ServiceError`.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use logsync_core::ServiceError;
use serde::Serialize;

pub struct ApiErr(pub ServiceError);

#[derive(Serialize)]
struct ErrorBody<'a> {
    code: &'a str,
    message: &'a str,
}

impl IntoResponse for ApiErr {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.0.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let body = ErrorBody {
            code: self.0.code(),
            message: self.0.message(),
        };
        (status, Json(body)).into_response()
    }
}

impl From<ServiceError> for ApiErr {
    fn from(e: ServiceError) -> Self {
        ApiErr(e)
    }
}

pub fn bad_request(msg: impl Into<String>) -> ApiErr {
    ApiErr(ServiceError::bad_request(msg))
}

pub fn unauthorized(msg: impl Into<String>) -> ApiErr {
    ApiErr(ServiceError::Unauthorized(msg.into()))
}
