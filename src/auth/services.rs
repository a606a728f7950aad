use std::sync::Arc;

use anyhow::Context;
use time::OffsetDateTime;
use tracing::{error, info, warn};

use super::{
    jwt::TokenService,
    password::{hash_password_blocking, verify_password_blocking},
    validate::FormatRules,
};
use crate::{
    store::{StoreError, UserStore},
    users::model::{NewUser, User},
};

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("required field is missing")]
    MissingField,
    #[error("{0} has an invalid format")]
    InvalidFormat(&'static str),
    #[error("username has been used")]
    UsernameTaken,
    #[error("registration failed")]
    RegistrationFailed(#[source] anyhow::Error),
    #[error("user not found")]
    UserNotFound,
    #[error("invalid credentials")]
    InvalidCredentials,
    #[error("login failed")]
    LoginFailed(#[source] anyhow::Error),
    #[error("password update failed")]
    UpdateFailed(#[source] anyhow::Error),
}

/// Result of a successful login.
#[derive(Debug, Clone)]
pub struct LoginOutcome {
    pub user: User,
    pub token: String,
    /// Lifetime granted to `token`, in seconds.
    pub expire: i64,
    pub expires_at: OffsetDateTime,
}

/// Register / login / change-password flows over an injected store and
/// token service.
#[derive(Clone)]
pub struct AuthService {
    store: Arc<dyn UserStore>,
    tokens: TokenService,
    rules: FormatRules,
    default_ttl: i64,
}

impl AuthService {
    pub fn new(
        store: Arc<dyn UserStore>,
        tokens: TokenService,
        rules: FormatRules,
        default_ttl: i64,
    ) -> Self {
        Self {
            store,
            tokens,
            rules,
            default_ttl,
        }
    }

    pub async fn register(
        &self,
        username: &str,
        password: &str,
        register_ip: Option<String>,
    ) -> Result<User, AuthError> {
        if username.is_empty() || password.is_empty() {
            return Err(AuthError::MissingField);
        }
        if !self.rules.username(username) {
            return Err(AuthError::InvalidFormat("username"));
        }
        if !self.rules.password(password) {
            return Err(AuthError::InvalidFormat("password"));
        }

        let password_hash = hash_password_blocking(password.to_string())
            .await
            .context("hash password")
            .map_err(AuthError::RegistrationFailed)?;

        let new_user = NewUser {
            username: username.to_string(),
            password_hash,
            register_ip,
        };
        match self.store.insert_credential(new_user).await {
            Ok(user) => {
                info!(uid = user.uid, username = %user.username, "user registered");
                Ok(user)
            }
            Err(StoreError::Conflict) => {
                warn!(%username, "username already registered");
                Err(AuthError::UsernameTaken)
            }
            Err(e) => {
                error!(error = %e, "insert credential failed");
                Err(AuthError::RegistrationFailed(e.into()))
            }
        }
    }

    /// `ttl` of `None` or a non-positive value falls back to the configured default.
    pub async fn login(
        &self,
        username: &str,
        password: &str,
        ttl: Option<i64>,
    ) -> Result<LoginOutcome, AuthError> {
        if username.is_empty() || password.is_empty() {
            return Err(AuthError::MissingField);
        }
        let ttl = ttl.filter(|t| *t > 0).unwrap_or(self.default_ttl);

        let credential = match self.store.find_credential_by_username(username).await {
            Ok(Some(c)) => c,
            Ok(None) => {
                warn!(%username, "login unknown username");
                return Err(AuthError::UserNotFound);
            }
            Err(e) => {
                error!(error = %e, "find_credential_by_username failed");
                return Err(AuthError::LoginFailed(e.into()));
            }
        };

        let ok = verify_password_blocking(password.to_string(), credential.password_hash)
            .await
            .context("verify password")
            .map_err(AuthError::LoginFailed)?;
        if !ok {
            warn!(%username, uid = credential.user.uid, "login invalid password");
            return Err(AuthError::InvalidCredentials);
        }

        let issued = self
            .tokens
            .issue(credential.user.uid, ttl)
            .context("issue token")
            .map_err(AuthError::LoginFailed)?;

        info!(uid = credential.user.uid, %username, "user logged in");
        Ok(LoginOutcome {
            user: credential.user,
            token: issued.token,
            expire: ttl,
            expires_at: issued.expires_at,
        })
    }

    pub async fn change_password(&self, user: &User, new_password: &str) -> Result<(), AuthError> {
        if new_password.is_empty() {
            return Err(AuthError::MissingField);
        }
        if !self.rules.password(new_password) {
            return Err(AuthError::InvalidFormat("password"));
        }

        let password_hash = hash_password_blocking(new_password.to_string())
            .await
            .context("hash password")
            .map_err(AuthError::UpdateFailed)?;

        match self
            .store
            .update_credential_password(user.uid, &password_hash)
            .await
        {
            Ok(()) => {
                info!(uid = user.uid, "password changed");
                Ok(())
            }
            Err(StoreError::NotFound) => {
                warn!(uid = user.uid, "credential vanished before password change");
                Err(AuthError::UserNotFound)
            }
            Err(e) => {
                error!(error = %e, uid = user.uid, "update_credential_password failed");
                Err(AuthError::UpdateFailed(e.into()))
            }
        }
    }

    /// The identity resolved for this request; no I/O.
    pub fn current_user<'a>(&self, identity: &'a User) -> &'a User {
        identity
    }
}
