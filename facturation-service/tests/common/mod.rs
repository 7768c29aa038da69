//! Common test utilities for facturation-service integration tests.
//!
//! Tests run against the database named by `TEST_DATABASE_URL` and are
//! skipped when it is not set. Every `TestApp` acts as a fresh user, and all
//! data is scoped by user id, so tests do not see each other's rows.

#![allow(dead_code)]

use facturation_service::config::FacturationConfig;
use facturation_service::services::Database;
use facturation_service::startup::Application;
use reqwest::{Method, RequestBuilder, StatusCode};
use serde_json::{json, Value};
use std::sync::Once;
use std::time::Duration;
use uuid::Uuid;

static INIT: Once = Once::new();

/// Initialize tracing for tests (only once).
pub fn init_tracing() {
    INIT.call_once(|| {
        tracing_subscriber::fmt()
            .with_env_filter("info,facturation_service=debug,sqlx=warn")
            .with_test_writer()
            .try_init()
            .ok();
    });
}

/// Test application wrapper: one running server, one user.
#[derive(Clone)]
pub struct TestApp {
    pub address: String,
    pub user_id: Uuid,
    pub db: Database,
    pub http: reqwest::Client,
}

/// Spawn the application on a random port, or `None` without a test database.
pub async fn spawn_app() -> Option<TestApp> {
    let Ok(database_url) = std::env::var("TEST_DATABASE_URL") else {
        eprintln!("TEST_DATABASE_URL not set, skipping integration test");
        return None;
    };
    init_tracing();

    let app = Application::build(FacturationConfig::for_tests(database_url))
        .await
        .expect("Failed to build application");

    let address = format!("http://127.0.0.1:{}", app.http_port());
    let db = app.db().clone();

    tokio::spawn(async move {
        app.run_until_stopped().await.ok();
    });

    let http = reqwest::Client::new();
    let mut attempts = 0;
    loop {
        match http.get(format!("{address}/health")).send().await {
            Ok(resp) if resp.status() == StatusCode::OK => break,
            _ if attempts < 20 => {
                attempts += 1;
                tokio::time::sleep(Duration::from_millis(50)).await;
            }
            _ => panic!("Server did not become healthy after 20 attempts"),
        }
    }

    Some(TestApp {
        address,
        user_id: Uuid::new_v4(),
        db,
        http,
    })
}

impl TestApp {
    /// Same server, acting as a different user.
    pub fn as_other_user(&self) -> TestApp {
        TestApp {
            address: self.address.clone(),
            user_id: Uuid::new_v4(),
            db: self.db.clone(),
            http: self.http.clone(),
        }
    }

    pub fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.http
            .request(method, format!("{}{}", self.address, path))
            .header("x-user-id", self.user_id.to_string())
    }

    /// Send a request and return the status with the decoded JSON body.
    pub async fn send(&self, method: Method, path: &str, body: Option<Value>) -> (StatusCode, Value) {
        let mut req = self.request(method, path);
        if let Some(body) = body {
            req = req.json(&body);
        }
        let resp = req.send().await.expect("Failed to send request");
        let status = resp.status();
        let body = resp.json::<Value>().await.unwrap_or(Value::Null);
        (status, body)
    }

    pub async fn get(&self, path: &str) -> (StatusCode, Value) {
        self.send(Method::GET, path, None).await
    }

    pub async fn post(&self, path: &str, body: Value) -> (StatusCode, Value) {
        self.send(Method::POST, path, Some(body)).await
    }

    pub async fn post_empty(&self, path: &str) -> (StatusCode, Value) {
        self.send(Method::POST, path, None).await
    }

    pub async fn put(&self, path: &str, body: Value) -> (StatusCode, Value) {
        self.send(Method::PUT, path, Some(body)).await
    }

    pub async fn delete(&self, path: &str) -> (StatusCode, Value) {
        self.send(Method::DELETE, path, None).await
    }

    /// Create a company client and return its id.
    pub async fn create_client(&self, name: &str) -> String {
        let (status, body) = self
            .post("/clients", json!({ "name": name, "email": "compta@example.fr" }))
            .await;
        assert_eq!(status, StatusCode::CREATED, "{body}");
        body["id"].as_str().unwrap().to_string()
    }

    /// Create the reference draft invoice: 5 days at 450 € with 20 % VAT.
    pub async fn create_invoice(&self, client_id: &str) -> Value {
        let (status, body) = self
            .post(
                "/invoices",
                json!({
                    "clientId": client_id,
                    "items": [{ "description": "Dev", "quantity": 5, "unitPrice": 450 }],
                    "vatRate": 20
                }),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{body}");
        body
    }

    /// Create an invoice, send it and finalize it.
    pub async fn create_finalized_invoice(&self, client_id: &str) -> Value {
        let invoice = self.create_invoice(client_id).await;
        let id = invoice["id"].as_str().unwrap();

        let (status, body) = self.put(&format!("/invoices/{id}"), json!({ "status": "sent" })).await;
        assert_eq!(status, StatusCode::OK, "{body}");

        let (status, body) = self.post_empty(&format!("/invoices/{id}/finalize")).await;
        assert_eq!(status, StatusCode::OK, "{body}");
        body
    }

    pub async fn create_quote(&self, client_id: &str) -> Value {
        let (status, body) = self
            .post(
                "/quotes",
                json!({
                    "clientId": client_id,
                    "items": [
                        { "description": "Audit", "quantity": 2, "unitPrice": "600.00" },
                        { "description": "Atelier", "quantity": 1, "unitPrice": 900, "discount": 10 }
                    ]
                }),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{body}");
        body
    }
}

/// Calendar year used for document numbers created today.
pub fn current_year() -> i32 {
    use chrono::Datelike;
    chrono::Utc::now().year()
}
