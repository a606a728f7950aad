//! HTTP-facing error type.
//!
//! The `Display` text of each variant is exactly what the client sees. Any
//! underlying cause is logged here and carried on the response as an
//! [`ErrorDiagnostic`] extension, which only the debug-mode diagnostics layer
//! copies into the body.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};

use crate::{auth::services::AuthError, response::ApiResponse, store::StoreError};

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("request param error")]
    RequestParam,
    #[error("request format error")]
    RequestFormat,
    #[error("unauthorized user")]
    Unauthorized,
    #[error("password error")]
    PasswordMismatch,
    #[error("need admin authority")]
    Forbidden,
    #[error("user not found")]
    UserNotFound,
    #[error("username has been used")]
    UsernameUsed,
    #[error("register failed")]
    RegisterFailed(#[source] anyhow::Error),
    #[error("login failed")]
    LoginFailed(#[source] anyhow::Error),
    #[error("update password failed")]
    UpdatePasswordFailed(#[source] anyhow::Error),
    #[error("user delete failed")]
    DeleteFailed(#[source] anyhow::Error),
    #[error("server unknown error")]
    Internal(#[source] anyhow::Error),
}

/// Internal cause of a failed response, for engineers only.
#[derive(Debug, Clone)]
pub struct ErrorDiagnostic(pub String);

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::RequestParam | ApiError::RequestFormat => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized | ApiError::PasswordMismatch => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden => StatusCode::FORBIDDEN,
            ApiError::UserNotFound => StatusCode::NOT_FOUND,
            ApiError::UsernameUsed
            | ApiError::RegisterFailed(_)
            | ApiError::LoginFailed(_)
            | ApiError::UpdatePasswordFailed(_)
            | ApiError::DeleteFailed(_)
            | ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn cause(&self) -> Option<&anyhow::Error> {
        match self {
            ApiError::RegisterFailed(e)
            | ApiError::LoginFailed(e)
            | ApiError::UpdatePasswordFailed(e)
            | ApiError::DeleteFailed(e)
            | ApiError::Internal(e) => Some(e),
            _ => None,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let diagnostic = self.cause().map(|cause| {
            let detail = format!("{cause:#}");
            tracing::error!(error = %detail, %status, "{}", self);
            ErrorDiagnostic(detail)
        });

        let mut response = ApiResponse::error(status, self.to_string()).into_response();
        if let Some(diagnostic) = diagnostic {
            response.extensions_mut().insert(diagnostic);
        }
        response
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::MissingField => ApiError::RequestParam,
            AuthError::InvalidFormat(_) => ApiError::RequestFormat,
            AuthError::UsernameTaken => ApiError::UsernameUsed,
            AuthError::RegistrationFailed(e) => ApiError::RegisterFailed(e),
            AuthError::UserNotFound => ApiError::UserNotFound,
            AuthError::InvalidCredentials => ApiError::PasswordMismatch,
            AuthError::LoginFailed(e) => ApiError::LoginFailed(e),
            AuthError::UpdateFailed(e) => ApiError::UpdatePasswordFailed(e),
        }
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        ApiError::Internal(err.into())
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
