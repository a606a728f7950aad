use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

/// `{"code", "message", "data"}` body shared by every endpoint.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub code: u16,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            code: StatusCode::OK.as_u16(),
            message: "success".into(),
            data: Some(data),
        }
    }
}

impl ApiResponse<()> {
    pub fn success() -> Self {
        Self {
            code: StatusCode::OK.as_u16(),
            message: "success".into(),
            data: None,
        }
    }

    pub fn error(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            code: status.as_u16(),
            message: message.into(),
            data: None,
        }
    }
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, Json(self)).into_response()
    }
}

/// Pagination envelope placed in `data`.
#[derive(Debug, Serialize)]
pub struct PageData<T: Serialize> {
    pub count: i64,
    pub page: i64,
    pub data: Vec<T>,
}
