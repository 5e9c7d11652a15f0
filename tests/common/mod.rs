#![allow(dead_code)]

use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use tempfile::TempDir;
use tower::ServiceExt;

use inkpost::config::Config;
use inkpost::db;
use inkpost::routes;
use inkpost::state::AppState;

/// A fully wired app over a throwaway database.
pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    _tmp: TempDir,
}

pub fn test_config(tmp: &TempDir) -> Config {
    let mut config = Config::default();
    config.database.path = Some(tmp.path().join("test.db"));
    config.auth.bcrypt_cost = 4;
    config
}

impl TestApp {
    pub fn new() -> Self {
        let tmp = TempDir::new().unwrap();
        let config = test_config(&tmp);
        let pool = db::create_pool(config.db_path().unwrap()).unwrap();
        db::run_migrations(&pool).unwrap();
        let state = AppState::new(pool, config);
        TestApp {
            router: routes::app(state.clone()),
            state,
            _tmp: tmp,
        }
    }

    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, value)
    }

    pub async fn get(&self, uri: &str, token: Option<&str>) -> (StatusCode, Value) {
        self.request(Method::GET, uri, token, None).await
    }

    pub async fn post(&self, uri: &str, token: &str, body: Value) -> (StatusCode, Value) {
        self.request(Method::POST, uri, Some(token), Some(body)).await
    }

    /// Registers a user and returns its session token.
    pub async fn signup(&self, username: &str) -> String {
        let (status, body) = self
            .request(
                Method::POST,
                "/register",
                None,
                Some(json!({ "username": username, "password": "hunter22" })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "signup failed: {}", body);
        body["token"].as_str().unwrap().to_string()
    }

    /// Creates a post and returns its id.
    pub async fn create_post(&self, token: &str, title: &str) -> String {
        let (status, body) = self
            .post(
                "/posts",
                token,
                json!({ "title": title, "content": format!("{} body", title) }),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "create post failed: {}", body);
        body["id"].as_str().unwrap().to_string()
    }

    pub async fn create_comment(&self, token: &str, post: &str, parent: Option<&str>) -> String {
        let (status, body) = self
            .post(
                &format!("/posts/{}/comments", post),
                token,
                json!({ "content": "a comment", "parent": parent }),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "create comment failed: {}", body);
        body["id"].as_str().unwrap().to_string()
    }
}
