#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use http::{Method, Request};
use restws::db;
use restws::hub::{Hub, HubConfig};
use restws::middleware::auth::JwtKeys;
use restws::models::user::User;
use restws::routes;
use restws::state::AppState;
use sqlx::SqlitePool;

pub const TEST_SECRET: &str = "test-secret";

/// A user created for testing, bundling the User record with a signed token.
pub struct TestUser {
    pub user: User,
    pub token: String,
}

impl TestUser {
    /// Returns the Authorization header value (`"Bearer xxx"`).
    pub fn auth_header(&self) -> String {
        format!("Bearer {}", self.token)
    }
}

/// Test server that owns an in-memory SQLite pool, its own hub and full
/// AppState. Each instance is isolated, safe for parallel tests.
pub struct TestServer {
    pub state: AppState,
}

impl TestServer {
    pub async fn new() -> Self {
        Self::with_hub_config(HubConfig {
            queue_capacity: 16,
            write_timeout: Duration::from_secs(2),
            shutdown_timeout: Duration::from_secs(3),
            ..HubConfig::default()
        })
        .await
    }

    pub async fn with_hub_config(config: HubConfig) -> Self {
        let pool = db::create_pool("sqlite::memory:")
            .await
            .expect("failed to create test pool");

        let state = AppState {
            db: pool,
            hub: Hub::new(config),
            jwt: Arc::new(JwtKeys::new(TEST_SECRET)),
            token_ttl: chrono::Duration::hours(1),
        };

        Self { state }
    }

    /// Returns an Axum Router wired to this server's state for `oneshot()` calls.
    pub fn router(&self) -> axum::Router {
        routes::router(self.state.clone())
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.state.db
    }

    pub fn hub(&self) -> &Hub {
        &self.state.hub
    }

    /// Binds a TCP listener on port 0, spawns the server, and returns the
    /// `host:port` it listens on.
    pub async fn spawn(&self) -> String {
        let app = self.router();
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("127.0.0.1:{}", addr.port())
    }

    /// Insert a user directly and sign a token for it. The stored hash is a
    /// placeholder, so this user cannot log in through `/login`.
    pub async fn create_user_with_token(&self, email: &str) -> TestUser {
        let user = db::users::create_user(self.pool(), email, "unusable")
            .await
            .expect("failed to create test user");

        let token = self
            .state
            .jwt
            .issue(&user.id, self.state.token_ttl)
            .expect("failed to sign test token");

        TestUser { user, token }
    }

    /// Insert a post owned by `user_id` without going through HTTP.
    pub async fn create_post(&self, user_id: &str, content: &str) -> String {
        let post = db::posts::insert_post(self.pool(), user_id, content)
            .await
            .expect("failed to create test post");
        post.id
    }

    /// Wait until the hub holds exactly `expected` sessions.
    pub async fn wait_for_sessions(&self, expected: usize) {
        let deadline = tokio::time::Instant::now() + Duration::from_secs(3);
        loop {
            let count = self.hub().session_count().await;
            if count == expected {
                return;
            }
            if tokio::time::Instant::now() >= deadline {
                panic!("expected {expected} sessions, hub has {count}");
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }
}

/// Build a request with the given method, URI and auth header.
pub fn authenticated_request(method: Method, uri: &str, auth: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("authorization", auth)
        .body(Body::empty())
        .unwrap()
}

/// Build an authenticated request with a JSON body.
pub fn authenticated_json_request(
    method: Method,
    uri: &str,
    auth: &str,
    body: serde_json::Value,
) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("authorization", auth)
        .header("content-type", "application/json")
        .body(Body::from(serde_json::to_string(&body).unwrap()))
        .unwrap()
}

/// Build an unauthenticated request with a JSON body.
pub fn json_request(method: Method, uri: &str, body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(serde_json::to_string(&body).unwrap()))
        .unwrap()
}

pub async fn parse_body(response: axum::response::Response) -> serde_json::Value {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&body).unwrap()
}
