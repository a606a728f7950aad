#![allow(dead_code)]

use std::sync::Arc;

use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
    Router,
};
use tower::util::ServiceExt;
use vid_backend::{
    app::build_app,
    config::{AppConfig, DatabaseConfig, FormatConfig, JwtConfig, RunMode},
    state::AppState,
    store::MemoryUserStore,
};

pub const DEFAULT_TTL: i64 = 604_800;

pub fn test_config() -> AppConfig {
    AppConfig {
        run_mode: RunMode::Release,
        host: "127.0.0.1".into(),
        port: 0,
        database: DatabaseConfig {
            url: "postgres://unused".into(),
            max_connections: 1,
            acquire_timeout_secs: 1,
        },
        jwt: JwtConfig {
            secret: "integration-secret".into(),
            issuer: "vid-backend".into(),
            audience: "vid-users".into(),
            default_ttl_seconds: DEFAULT_TTL,
        },
        format: FormatConfig::default(),
        page_size: 2,
        image_url_prefix: "http://img.test/".into(),
    }
}

pub struct TestApp {
    pub router: Router,
    pub store: Arc<MemoryUserStore>,
}

pub fn test_state(store: Arc<MemoryUserStore>) -> AppState {
    AppState::from_parts(Arc::new(test_config()), store)
}

impl TestApp {
    pub fn new() -> Self {
        let store = Arc::new(MemoryUserStore::new());
        Self {
            router: build_app(test_state(store.clone())),
            store,
        }
    }

    pub async fn send(
        &self,
        method: Method,
        uri: &str,
        authorization: Option<&str>,
        form: Option<&str>,
    ) -> (StatusCode, serde_json::Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(value) = authorization {
            builder = builder.header(header::AUTHORIZATION, value);
        }
        let body = match form {
            Some(form) => {
                builder = builder.header(
                    header::CONTENT_TYPE,
                    "application/x-www-form-urlencoded",
                );
                Body::from(form.to_string())
            }
            None => Body::empty(),
        };

        let response = self
            .router
            .clone()
            .oneshot(builder.body(body).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json = if bytes.is_empty() {
            serde_json::Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null)
        };
        (status, json)
    }

    pub async fn register(&self, username: &str, password: &str) -> (StatusCode, serde_json::Value) {
        self.send(
            Method::POST,
            "/v1/auth/register",
            None,
            Some(&format!("username={username}&password={password}")),
        )
        .await
    }

    /// Registers and logs in, returning `(uid, token)`. The token already
    /// carries its `Bearer ` prefix.
    pub async fn signup(&self, username: &str, password: &str) -> (i64, String) {
        let (status, _) = self.register(username, password).await;
        assert_eq!(status, StatusCode::OK);
        let (status, json) = self
            .send(
                Method::POST,
                "/v1/auth/login",
                None,
                Some(&format!("username={username}&password={password}")),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        (
            json["data"]["user"]["uid"].as_i64().unwrap(),
            json["data"]["token"].as_str().unwrap().to_string(),
        )
    }
}
