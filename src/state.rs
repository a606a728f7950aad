use std::{sync::Arc, time::Duration};

use anyhow::Context;

use crate::{
    auth::{jwt::TokenService, services::AuthService, validate::FormatRules},
    config::AppConfig,
    store::{PgUserStore, UserStore},
};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub store: Arc<dyn UserStore>,
    pub tokens: TokenService,
    pub auth: AuthService,
}

impl AppState {
    /// Connects to Postgres, runs migrations and wires the services.
    pub async fn init(config: AppConfig) -> anyhow::Result<Self> {
        let db = sqlx::postgres::PgPoolOptions::new()
            .max_connections(config.database.max_connections)
            .acquire_timeout(Duration::from_secs(config.database.acquire_timeout_secs))
            .connect(&config.database.url)
            .await
            .context("connect to database")?;

        sqlx::migrate!("./migrations")
            .run(&db)
            .await
            .context("run migrations")?;
        tracing::info!("migrations applied");

        let store = Arc::new(PgUserStore::new(db)) as Arc<dyn UserStore>;
        Ok(Self::from_parts(Arc::new(config), store))
    }

    pub fn from_parts(config: Arc<AppConfig>, store: Arc<dyn UserStore>) -> Self {
        let tokens = TokenService::new(&config.jwt);
        let auth = AuthService::new(
            store.clone(),
            tokens.clone(),
            FormatRules::new(config.format.clone()),
            config.jwt.default_ttl_seconds,
        );
        Self {
            config,
            store,
            tokens,
            auth,
        }
    }
}
