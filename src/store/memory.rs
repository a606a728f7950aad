use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use time::OffsetDateTime;
use tokio::sync::RwLock;

use super::{Page, StoreError, UserStore};
use crate::users::model::{Authority, Credential, NewUser, Sex, User, DEFAULT_BIRTHDAY};

#[derive(Default)]
struct Tables {
    users: BTreeMap<i64, User>,
    credentials: HashMap<i64, String>,
    last_uid: i64,
}

/// Process-local store with the same contract as the Postgres one.
#[derive(Default)]
pub struct MemoryUserStore {
    tables: RwLock<Tables>,
}

impl MemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Changes a user's privilege tier; there is no HTTP surface for this.
    pub async fn set_authority(&self, uid: i64, authority: Authority) -> Result<(), StoreError> {
        let mut tables = self.tables.write().await;
        let user = tables.users.get_mut(&uid).ok_or(StoreError::NotFound)?;
        user.authority = authority;
        user.updated_at = OffsetDateTime::now_utc();
        Ok(())
    }
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn find_credential_by_username(
        &self,
        username: &str,
    ) -> Result<Option<Credential>, StoreError> {
        let tables = self.tables.read().await;
        let found = tables
            .users
            .values()
            .find(|u| u.username == username)
            .and_then(|user| {
                tables.credentials.get(&user.uid).map(|hash| Credential {
                    user: user.clone(),
                    password_hash: hash.clone(),
                })
            });
        Ok(found)
    }

    async fn find_user_by_id(&self, uid: i64) -> Result<Option<User>, StoreError> {
        Ok(self.tables.read().await.users.get(&uid).cloned())
    }

    async fn insert_credential(&self, new_user: NewUser) -> Result<User, StoreError> {
        let mut tables = self.tables.write().await;
        if tables.users.values().any(|u| u.username == new_user.username) {
            return Err(StoreError::Conflict);
        }

        tables.last_uid += 1;
        let now = OffsetDateTime::now_utc();
        let user = User {
            uid: tables.last_uid,
            username: new_user.username,
            sex: Sex::Unknown,
            profile: String::new(),
            avatar_url: String::new(),
            birthday: DEFAULT_BIRTHDAY,
            authority: Authority::Normal,
            phone_number: None,
            register_ip: new_user.register_ip,
            created_at: now,
            updated_at: now,
        };
        tables.users.insert(user.uid, user.clone());
        tables.credentials.insert(user.uid, new_user.password_hash);
        Ok(user)
    }

    async fn update_credential_password(
        &self,
        uid: i64,
        password_hash: &str,
    ) -> Result<(), StoreError> {
        let mut tables = self.tables.write().await;
        match tables.credentials.get_mut(&uid) {
            Some(hash) => {
                *hash = password_hash.to_string();
                Ok(())
            }
            None => Err(StoreError::NotFound),
        }
    }

    async fn list_users(&self, page: Page) -> Result<(Vec<User>, i64), StoreError> {
        let tables = self.tables.read().await;
        let users = tables
            .users
            .values()
            .skip(usize::try_from(page.offset()).unwrap_or(usize::MAX))
            .take(usize::try_from(page.size).unwrap_or(usize::MAX))
            .cloned()
            .collect();
        Ok((users, tables.users.len() as i64))
    }

    async fn delete_user(&self, uid: i64) -> Result<(), StoreError> {
        let mut tables = self.tables.write().await;
        tables.users.remove(&uid).ok_or(StoreError::NotFound)?;
        tables.credentials.remove(&uid);
        Ok(())
    }
}
