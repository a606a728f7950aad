use std::net::SocketAddr;

use axum::{
    extract::{ConnectInfo, State},
    http::HeaderMap,
    routing::{get, post, put},
    Router,
};
use tracing::instrument;

use crate::{
    auth::{
        dto::{AuthForm, FormParam, LoginForm, LoginResponse, PasswordForm},
        extractors::AuthUser,
    },
    error::ApiResult,
    response::ApiResponse,
    state::AppState,
    users::dto::UserDto,
};

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/auth", get(current_user))
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
        .route("/auth/password", put(change_password))
}

/// First hop of `X-Forwarded-For`, else the peer address.
fn client_ip(headers: &HeaderMap, peer: Option<SocketAddr>) -> Option<String> {
    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|ip| !ip.is_empty())
        .map(str::to_string)
        .or_else(|| peer.map(|addr| addr.ip().to_string()))
}

#[instrument(skip(state, headers, payload))]
pub async fn register(
    State(state): State<AppState>,
    peer: Option<ConnectInfo<SocketAddr>>,
    headers: HeaderMap,
    FormParam(payload): FormParam<AuthForm>,
) -> ApiResult<ApiResponse<UserDto>> {
    let ip = client_ip(&headers, peer.map(|ConnectInfo(addr)| addr));
    let user = state
        .auth
        .register(payload.username.trim(), &payload.password, ip)
        .await?;
    Ok(ApiResponse::ok(UserDto::from_user(
        &user,
        &state.config.image_url_prefix,
        true,
    )))
}

#[instrument(skip(state, payload))]
pub async fn login(
    State(state): State<AppState>,
    FormParam(payload): FormParam<LoginForm>,
) -> ApiResult<ApiResponse<LoginResponse>> {
    let outcome = state
        .auth
        .login(payload.username.trim(), &payload.password, payload.expire)
        .await?;
    Ok(ApiResponse::ok(LoginResponse {
        user: UserDto::from_user(&outcome.user, &state.config.image_url_prefix, true),
        token: format!("Bearer {}", outcome.token),
        expire: outcome.expire,
    }))
}

#[instrument(skip_all, fields(uid = user.uid))]
pub async fn current_user(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
) -> ApiResult<ApiResponse<UserDto>> {
    let user = state.auth.current_user(&user);
    Ok(ApiResponse::ok(UserDto::from_user(
        user,
        &state.config.image_url_prefix,
        true,
    )))
}

#[instrument(skip_all, fields(uid = user.uid))]
pub async fn change_password(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    FormParam(payload): FormParam<PasswordForm>,
) -> ApiResult<ApiResponse<()>> {
    state.auth.change_password(&user, &payload.password).await?;
    Ok(ApiResponse::success())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn forwarded_header_wins_over_peer() {
        let mut headers = HeaderMap::new();
        headers.insert(
            "x-forwarded-for",
            HeaderValue::from_static("203.0.113.7, 10.0.0.1"),
        );
        let peer: SocketAddr = "127.0.0.1:5000".parse().unwrap();
        assert_eq!(
            client_ip(&headers, Some(peer)).as_deref(),
            Some("203.0.113.7")
        );
    }

    #[test]
    fn peer_is_fallback() {
        let peer: SocketAddr = "192.0.2.4:5000".parse().unwrap();
        assert_eq!(
            client_ip(&HeaderMap::new(), Some(peer)).as_deref(),
            Some("192.0.2.4")
        );
        assert_eq!(client_ip(&HeaderMap::new(), None), None);
    }
}
