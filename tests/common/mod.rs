//! Test application setup utilities
//!
//! Spins up the full router against an in-memory SQLite database and
//! provides request/response helpers plus seed data factories.

use axum::{body::Body, http::Request, Router};
use sqlx::sqlite::SqlitePoolOptions;
use tower::ServiceExt;
use uuid::Uuid;

use chatlogger::middleware;
use chatlogger::models::{ApiKey, Organization, Role, User};
use chatlogger::services::auth::{generate_api_key, AuthService};
use chatlogger::{api, AppConfig, AppState};

/// Test application wrapper for integration testing
pub struct TestApp {
    pub router: Router,
    pub state: AppState,
}

impl TestApp {
    /// Create a new test application with an in-memory SQLite database
    pub async fn new() -> Self {
        let mut config = AppConfig::default();
        // minimum cost keeps the seeded logins fast
        config.auth.bcrypt_cost = 4;
        config.auth.jwt_secret = "integration-test-secret".to_string();

        let db = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .expect("Failed to open in-memory database");
        sqlx::migrate!("./migrations")
            .run(&db)
            .await
            .expect("Failed to run migrations");

        let state = AppState { config, db };

        let router = Router::new()
            .nest("/api/v1", api::public_routes())
            .nest(
                "/api/v1",
                api::protected_routes().layer(axum::middleware::from_fn_with_state(
                    state.clone(),
                    middleware::auth_middleware,
                )),
            )
            .nest(
                "/api/v1",
                api::ingestion_routes().layer(axum::middleware::from_fn_with_state(
                    state.clone(),
                    middleware::api_key_middleware,
                )),
            )
            .with_state(state.clone());

        Self { router, state }
    }

    /// Seed an organization
    pub async fn seed_org(&self, slug: &str) -> Organization {
        let org = Organization::new(format!("{} Inc", slug), slug.to_string());
        chatlogger::db::organization_repository::OrganizationRepository::new(&self.state.db)
            .create(&org)
            .await
            .expect("Failed to seed organization");
        org
    }

    /// Seed a user with a working password
    pub async fn seed_user(&self, org: &Organization, password: &str, role: Role) -> User {
        let hash = AuthService::hash_secret(password, 4).expect("Failed to hash password");
        let user = User::new(
            org.id,
            format!("user-{}@example.com", Uuid::new_v4()),
            hash,
            role,
        );
        chatlogger::db::user_repository::UserRepository::new(&self.state.db)
            .create(&user)
            .await
            .expect("Failed to seed user");
        user
    }

    /// Seed an API key, returning the raw key and the stored record
    pub async fn seed_api_key(&self, org: &Organization) -> (String, ApiKey) {
        let (raw, digest) = generate_api_key();
        let key = ApiKey::new(org.id, digest, "test key".to_string());
        chatlogger::db::api_key_repository::ApiKeyRepository::new(&self.state.db)
            .create(&key)
            .await
            .expect("Failed to seed api key");
        (raw, key)
    }

    /// Log a seeded user in and return the bearer token
    pub async fn login(&self, email: &str, password: &str) -> String {
        let response = self
            .post_json(
                "/api/v1/auth/login",
                serde_json::json!({ "email": email, "password": password }),
            )
            .await;
        response.assert_ok();
        let body: serde_json::Value = response.json();
        body["access_token"]
            .as_str()
            .expect("login response carries a token")
            .to_string()
    }

    /// Make a GET request
    pub async fn get(&self, uri: &str) -> TestResponse {
        self.request(
            Request::builder()
                .method("GET")
                .uri(uri)
                .body(Body::empty())
                .unwrap(),
        )
        .await
    }

    /// Make an authenticated GET request
    pub async fn get_auth(&self, uri: &str, token: &str) -> TestResponse {
        self.request(
            Request::builder()
                .method("GET")
                .uri(uri)
                .header("Authorization", format!("Bearer {}", token))
                .body(Body::empty())
                .unwrap(),
        )
        .await
    }

    /// Make a POST request with a JSON body
    pub async fn post_json(&self, uri: &str, body: serde_json::Value) -> TestResponse {
        self.request(
            Request::builder()
                .method("POST")
                .uri(uri)
                .header("Content-Type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
    }

    /// Make an authenticated POST request with a JSON body
    pub async fn post_json_auth(
        &self,
        uri: &str,
        body: serde_json::Value,
        token: &str,
    ) -> TestResponse {
        self.request(
            Request::builder()
                .method("POST")
                .uri(uri)
                .header("Content-Type", "application/json")
                .header("Authorization", format!("Bearer {}", token))
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
    }

    /// Make an authenticated PUT request with a JSON body
    pub async fn put_json_auth(
        &self,
        uri: &str,
        body: serde_json::Value,
        token: &str,
    ) -> TestResponse {
        self.request(
            Request::builder()
                .method("PUT")
                .uri(uri)
                .header("Content-Type", "application/json")
                .header("Authorization", format!("Bearer {}", token))
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
    }

    /// Make a POST request authenticated with an organization API key
    pub async fn post_json_with_key(
        &self,
        uri: &str,
        body: serde_json::Value,
        raw_key: &str,
    ) -> TestResponse {
        self.request(
            Request::builder()
                .method("POST")
                .uri(uri)
                .header("Content-Type", "application/json")
                .header("X-Organization-Api-Key", raw_key)
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
    }

    /// Make an arbitrary request
    pub async fn request(&self, request: Request<Body>) -> TestResponse {
        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("Failed to execute request");

        let status = response.status();
        let headers = response.headers().clone();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("Failed to read response body");

        TestResponse {
            status,
            headers,
            body,
        }
    }
}

/// Response from a test request
#[derive(Debug)]
pub struct TestResponse {
    pub status: axum::http::StatusCode,
    pub headers: axum::http::HeaderMap,
    pub body: bytes::Bytes,
}

impl TestResponse {
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).to_string()
    }

    pub fn json<T: serde::de::DeserializeOwned>(&self) -> T {
        serde_json::from_slice(&self.body).expect("Failed to parse response as JSON")
    }

    pub fn assert_status(&self, expected: axum::http::StatusCode) -> &Self {
        assert_eq!(
            self.status,
            expected,
            "Expected status {}, got {}. Body: {}",
            expected,
            self.status,
            self.text()
        );
        self
    }

    pub fn assert_ok(&self) -> &Self {
        self.assert_status(axum::http::StatusCode::OK)
    }

    pub fn assert_created(&self) -> &Self {
        self.assert_status(axum::http::StatusCode::CREATED)
    }

    pub fn assert_unauthorized(&self) -> &Self {
        self.assert_status(axum::http::StatusCode::UNAUTHORIZED)
    }

    pub fn assert_forbidden(&self) -> &Self {
        self.assert_status(axum::http::StatusCode::FORBIDDEN)
    }

    pub fn assert_not_found(&self) -> &Self {
        self.assert_status(axum::http::StatusCode::NOT_FOUND)
    }
}
