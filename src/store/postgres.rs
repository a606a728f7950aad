use async_trait::async_trait;
use sqlx::{FromRow, PgPool};
use time::{Date, OffsetDateTime};
use tracing::debug;

use super::{Page, StoreError, UserStore};
use crate::users::model::{Authority, Credential, NewUser, Sex, User, DEFAULT_BIRTHDAY};

/// Row shape of the `users` table.
#[derive(Debug, FromRow)]
struct UserRow {
    uid: i64,
    username: String,
    sex: String,
    profile: String,
    avatar_url: String,
    birthday: Date,
    authority: String,
    phone_number: Option<String>,
    register_ip: Option<String>,
    created_at: OffsetDateTime,
    updated_at: OffsetDateTime,
}

#[derive(Debug, FromRow)]
struct CredentialRow {
    #[sqlx(flatten)]
    user: UserRow,
    password_hash: String,
}

impl From<UserRow> for User {
    fn from(r: UserRow) -> Self {
        Self {
            uid: r.uid,
            username: r.username,
            sex: Sex::from_db(&r.sex),
            profile: r.profile,
            avatar_url: r.avatar_url,
            birthday: r.birthday,
            authority: Authority::from_db(&r.authority),
            phone_number: r.phone_number,
            register_ip: r.register_ip,
            created_at: r.created_at,
            updated_at: r.updated_at,
        }
    }
}

#[derive(Clone)]
pub struct PgUserStore {
    pool: PgPool,
}

impl PgUserStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl UserStore for PgUserStore {
    async fn find_credential_by_username(
        &self,
        username: &str,
    ) -> Result<Option<Credential>, StoreError> {
        let row = sqlx::query_as::<_, CredentialRow>(
            r#"
            SELECT u.uid, u.username, u.sex, u.profile, u.avatar_url, u.birthday,
                   u.authority, u.phone_number, u.register_ip, u.created_at, u.updated_at,
                   c.password_hash
              FROM users u
              JOIN credentials c ON c.uid = u.uid
             WHERE u.username = $1
            "#,
        )
        .bind(username)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| Credential {
            user: r.user.into(),
            password_hash: r.password_hash,
        }))
    }

    async fn find_user_by_id(&self, uid: i64) -> Result<Option<User>, StoreError> {
        let row = sqlx::query_as::<_, UserRow>(
            r#"
            SELECT uid, username, sex, profile, avatar_url, birthday,
                   authority, phone_number, register_ip, created_at, updated_at
              FROM users
             WHERE uid = $1
            "#,
        )
        .bind(uid)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(User::from))
    }

    async fn insert_credential(&self, new_user: NewUser) -> Result<User, StoreError> {
        // Rolled back on drop if either insert fails.
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query_as::<_, UserRow>(
            r#"
            INSERT INTO users (username, birthday, register_ip)
            VALUES ($1, $2, $3)
            RETURNING uid, username, sex, profile, avatar_url, birthday,
                      authority, phone_number, register_ip, created_at, updated_at
            "#,
        )
        .bind(&new_user.username)
        .bind(DEFAULT_BIRTHDAY)
        .bind(&new_user.register_ip)
        .fetch_one(&mut *tx)
        .await?;

        sqlx::query(
            r#"
            INSERT INTO credentials (uid, password_hash)
            VALUES ($1, $2)
            "#,
        )
        .bind(row.uid)
        .bind(&new_user.password_hash)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        debug!(uid = row.uid, "credential inserted");
        Ok(row.into())
    }

    async fn update_credential_password(
        &self,
        uid: i64,
        password_hash: &str,
    ) -> Result<(), StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE credentials
               SET password_hash = $2
             WHERE uid = $1
            "#,
        )
        .bind(uid)
        .bind(password_hash)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    async fn list_users(&self, page: Page) -> Result<(Vec<User>, i64), StoreError> {
        let rows = sqlx::query_as::<_, UserRow>(
            r#"
            SELECT uid, username, sex, profile, avatar_url, birthday,
                   authority, phone_number, register_ip, created_at, updated_at
              FROM users
             ORDER BY uid ASC
             LIMIT $1 OFFSET $2
            "#,
        )
        .bind(page.size)
        .bind(page.offset())
        .fetch_all(&self.pool)
        .await?;

        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users")
            .fetch_one(&self.pool)
            .await?;

        Ok((rows.into_iter().map(User::from).collect(), count))
    }

    async fn delete_user(&self, uid: i64) -> Result<(), StoreError> {
        let result = sqlx::query(
            r#"
            DELETE FROM users
             WHERE uid = $1
            "#,
        )
        .bind(uid)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        debug!(uid, "user deleted");
        Ok(())
    }
}
