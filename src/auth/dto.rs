use axum::{
    async_trait,
    extract::{FromRequest, Request},
    Form,
};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tracing::warn;

use crate::{error::ApiError, users::dto::UserDto};

/// Form body for register.
#[derive(Debug, Deserialize)]
pub struct AuthForm {
    pub username: String,
    pub password: String,
}

/// Form body for login.
#[derive(Debug, Deserialize)]
pub struct LoginForm {
    pub username: String,
    pub password: String,
    /// Requested token lifetime in seconds.
    pub expire: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct PasswordForm {
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub user: UserDto,
    pub token: String,
    pub expire: i64,
}

/// `Form<T>` whose rejection is the standard "request param error" envelope.
pub struct FormParam<T>(pub T);

#[async_trait]
impl<T, S> FromRequest<S> for FormParam<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Form::<T>::from_request(req, state).await {
            Ok(Form(value)) => Ok(FormParam(value)),
            Err(rejection) => {
                warn!(reason = %rejection.body_text(), "form rejected");
                Err(ApiError::RequestParam)
            }
        }
    }
}
