//! Credential and user persistence.
//!
//! Handlers and services only see the [`UserStore`] trait; the Postgres and
//! in-memory backends are picked when the application state is assembled.

use async_trait::async_trait;

use crate::users::model::{Credential, NewUser, User};

mod memory;
mod postgres;

pub use memory::MemoryUserStore;
pub use postgres::PgUserStore;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// A uniqueness constraint rejected the write.
    #[error("record already exists")]
    Conflict,
    #[error("record not found")]
    NotFound,
    #[error("store failure: {0}")]
    Failure(#[source] anyhow::Error),
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => StoreError::NotFound,
            sqlx::Error::Database(ref db_err) if db_err.code().as_deref() == Some("23505") => {
                StoreError::Conflict
            }
            other => StoreError::Failure(other.into()),
        }
    }
}

/// One page of a listing, 1-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub number: i64,
    pub size: i64,
}

impl Page {
    pub fn new(number: i64, size: i64) -> Self {
        Self {
            number: number.max(1),
            size: size.max(1),
        }
    }

    /// Saturates instead of overflowing; a page past the end is simply empty.
    pub fn offset(&self) -> i64 {
        (self.number - 1).saturating_mul(self.size)
    }
}

#[async_trait]
pub trait UserStore: Send + Sync {
    async fn find_credential_by_username(
        &self,
        username: &str,
    ) -> Result<Option<Credential>, StoreError>;

    async fn find_user_by_id(&self, uid: i64) -> Result<Option<User>, StoreError>;

    /// Creates the user and its credential row atomically.
    /// Fails with [`StoreError::Conflict`] when the username is taken.
    async fn insert_credential(&self, new_user: NewUser) -> Result<User, StoreError>;

    /// Fails with [`StoreError::NotFound`] when no credential row exists for `uid`.
    async fn update_credential_password(
        &self,
        uid: i64,
        password_hash: &str,
    ) -> Result<(), StoreError>;

    /// Returns the requested page ordered by uid, plus the total user count.
    async fn list_users(&self, page: Page) -> Result<(Vec<User>, i64), StoreError>;

    /// Removes the user; its credential goes with it.
    /// Fails with [`StoreError::NotFound`] when no such user exists.
    async fn delete_user(&self, uid: i64) -> Result<(), StoreError>;
}
