use std::sync::Arc;

use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::{header::AUTHORIZATION, request::Parts, HeaderMap},
};
use tracing::{error, warn};

use super::jwt::TokenService;
use crate::{
    error::ApiError,
    state::AppState,
    store::UserStore,
    users::model::User,
};

/// What the extractors need out of the application state.
#[derive(Clone)]
pub struct Authenticator {
    pub tokens: TokenService,
    pub store: Arc<dyn UserStore>,
}

impl FromRef<AppState> for Authenticator {
    fn from_ref(state: &AppState) -> Self {
        Self {
            tokens: state.tokens.clone(),
            store: state.store.clone(),
        }
    }
}

impl Authenticator {
    /// `Ok(None)` when no credential was presented. A presented credential
    /// that fails any check is an error, never an anonymous pass.
    pub async fn authenticate(&self, headers: &HeaderMap) -> Result<Option<User>, ApiError> {
        let Some(value) = headers.get(AUTHORIZATION) else {
            return Ok(None);
        };
        let value = value.to_str().map_err(|_| {
            warn!("authorization header is not visible ascii");
            ApiError::Unauthorized
        })?;
        let token = bearer_token(value).ok_or_else(|| {
            warn!("invalid auth scheme");
            ApiError::Unauthorized
        })?;

        let uid = self.tokens.validate(token).map_err(|e| {
            warn!(reason = %e, "token rejected");
            ApiError::Unauthorized
        })?;

        match self.store.find_user_by_id(uid).await {
            Ok(Some(user)) => Ok(Some(user)),
            Ok(None) => {
                warn!(uid, "token subject no longer exists");
                Err(ApiError::Unauthorized)
            }
            Err(e) => {
                error!(error = %e, uid, "find_user_by_id failed");
                Err(ApiError::Internal(e.into()))
            }
        }
    }
}

fn bearer_token(value: &str) -> Option<&str> {
    let (scheme, token) = value.trim().split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = token.trim();
    (!token.is_empty()).then_some(token)
}

/// Resolved identity, cached in request extensions so stacked extractors
/// only hit the store once.
#[derive(Clone)]
struct ResolvedIdentity(Option<User>);

async fn resolve<S>(parts: &mut Parts, state: &S) -> Result<Option<User>, ApiError>
where
    S: Send + Sync,
    Authenticator: FromRef<S>,
{
    if let Some(ResolvedIdentity(user)) = parts.extensions.get::<ResolvedIdentity>() {
        return Ok(user.clone());
    }
    let user = Authenticator::from_ref(state)
        .authenticate(&parts.headers)
        .await?;
    parts
        .extensions
        .insert(ResolvedIdentity(user.clone()));
    Ok(user)
}

/// Requires a valid bearer token.
pub struct AuthUser(pub User);

#[async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
    Authenticator: FromRef<S>,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        match resolve(parts, state).await? {
            Some(user) => Ok(AuthUser(user)),
            None => {
                warn!("missing Authorization header");
                Err(ApiError::Unauthorized)
            }
        }
    }
}

/// Requires a valid bearer token for an admin account.
pub struct AdminUser(pub User);

#[async_trait]
impl<S> FromRequestParts<S> for AdminUser
where
    S: Send + Sync,
    Authenticator: FromRef<S>,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let AuthUser(user) = AuthUser::from_request_parts(parts, state).await?;
        if !user.is_admin() {
            warn!(uid = user.uid, "admin route refused");
            return Err(ApiError::Forbidden);
        }
        Ok(AdminUser(user))
    }
}

/// Anonymous callers pass through as `None`; a bad token is still rejected.
pub struct MaybeAuthUser(pub Option<User>);

#[async_trait]
impl<S> FromRequestParts<S> for MaybeAuthUser
where
    S: Send + Sync,
    Authenticator: FromRef<S>,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        resolve(parts, state).await.map(MaybeAuthUser)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::JwtConfig,
        store::MemoryUserStore,
        users::model::NewUser,
    };
    use axum::http::HeaderValue;

    fn tokens() -> TokenService {
        TokenService::new(&JwtConfig {
            secret: "extractor-secret".into(),
            issuer: "iss".into(),
            audience: "aud".into(),
            default_ttl_seconds: 300,
        })
    }

    async fn authenticator_with_user() -> (Authenticator, Arc<MemoryUserStore>, User) {
        let store = Arc::new(MemoryUserStore::new());
        let user = store
            .insert_credential(NewUser {
                username: "alice123".into(),
                password_hash: "unused".into(),
                register_ip: None,
            })
            .await
            .unwrap();
        let auth = Authenticator {
            tokens: tokens(),
            store: store.clone(),
        };
        (auth, store, user)
    }

    fn headers(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_str(value).unwrap());
        headers
    }

    #[test]
    fn bearer_scheme_is_case_insensitive() {
        assert_eq!(bearer_token("Bearer abc"), Some("abc"));
        assert_eq!(bearer_token("bearer abc"), Some("abc"));
        assert_eq!(bearer_token("BEARER  abc "), Some("abc"));
        assert_eq!(bearer_token("Basic abc"), None);
        assert_eq!(bearer_token("Bearer"), None);
        assert_eq!(bearer_token("Bearer "), None);
    }

    #[tokio::test]
    async fn no_header_is_anonymous() {
        let (auth, _, _) = authenticator_with_user().await;
        assert!(auth.authenticate(&HeaderMap::new()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn valid_token_resolves_user() {
        let (auth, _, user) = authenticator_with_user().await;
        let token = auth.tokens.issue(user.uid, 60).unwrap().token;
        let found = auth
            .authenticate(&headers(&format!("Bearer {token}")))
            .await
            .unwrap();
        assert_eq!(found, Some(user));
    }

    #[tokio::test]
    async fn presented_but_invalid_credentials_are_rejected() {
        let (auth, _, _) = authenticator_with_user().await;
        for value in ["Bearer not-a-jwt", "Token abc", "Bearer"] {
            assert!(matches!(
                auth.authenticate(&headers(value)).await,
                Err(ApiError::Unauthorized)
            ));
        }
    }

    #[tokio::test]
    async fn token_for_deleted_user_is_rejected() {
        let (auth, store, user) = authenticator_with_user().await;
        let token = auth.tokens.issue(user.uid, 60).unwrap().token;
        store.delete_user(user.uid).await.unwrap();
        assert!(matches!(
            auth.authenticate(&headers(&format!("Bearer {token}"))).await,
            Err(ApiError::Unauthorized)
        ));
    }
}
