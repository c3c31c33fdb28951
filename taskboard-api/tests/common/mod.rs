/// Common test utilities for integration tests
///
/// This module provides shared infrastructure for integration tests:
/// - An app wired to the in-memory store and a local event hub
/// - User registration through the real auth endpoint
/// - JSON request helpers

use axum::body::Body;
use axum::http::{Request, StatusCode};
use serde_json::Value;
use std::sync::Arc;
use taskboard_api::app::{build_router, AppState};
use taskboard_api::config::Config;
use taskboard_shared::board::BoardService;
use taskboard_shared::events::BroadcastHub;
use taskboard_shared::store::Stores;
use tower::ServiceExt;

pub const TEST_SECRET: &str = "integration-test-secret-at-least-32-bytes";

/// Test context containing all necessary resources
pub struct TestContext {
    pub app: axum::Router,
    pub hub: BroadcastHub,
}

/// A registered user and their bearer token
pub struct TestUser {
    pub id: String,
    pub username: String,
    pub token: String,
}

impl TestContext {
    /// Creates a fresh app on an empty in-memory store
    pub fn new() -> Self {
        let config = Config::from_lookup(|key| match key {
            "JWT_SECRET" => Some(TEST_SECRET.to_string()),
            _ => None,
        })
        .expect("test config");

        let hub = BroadcastHub::new(config.broadcast.capacity);
        let board = BoardService::new(Stores::memory(), Arc::new(hub.clone()));
        let app = build_router(AppState::new(board, hub.clone(), config));

        Self { app, hub }
    }

    /// Sends a request and returns the status and JSON body
    pub async fn request(
        &self,
        method: &str,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header("authorization", format!("Bearer {}", token));
        }
        let request = match body {
            Some(body) => builder
                .header("content-type", "application/json")
                .body(Body::from(body.to_string())),
            None => builder.body(Body::empty()),
        }
        .unwrap();

        let response = self.app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };

        (status, json)
    }

    /// Registers a user through `POST /api/auth/register`
    pub async fn register(&self, username: &str) -> TestUser {
        let (status, body) = self
            .request(
                "POST",
                "/api/auth/register",
                None,
                Some(serde_json::json!({
                    "username": username,
                    "email": format!("{}@example.com", username),
                    "password": "secret123",
                })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "register failed: {}", body);

        TestUser {
            id: body["user"]["id"].as_str().unwrap().to_string(),
            username: username.to_string(),
            token: body["token"].as_str().unwrap().to_string(),
        }
    }

    /// Creates a task and returns its JSON
    pub async fn create_task(&self, user: &TestUser, body: Value) -> Value {
        let (status, task) = self
            .request("POST", "/api/tasks", Some(&user.token), Some(body))
            .await;
        assert_eq!(status, StatusCode::CREATED, "create failed: {}", task);
        task
    }
}
