//! Shared helpers for the integration tests
//!
//! Every test gets its own SQLite database from `#[sqlx::test]` (migrations
//! applied), an in-memory mailbox and a `TestServer` around the real router.

#![allow(dead_code)]

use axum::http::HeaderName;
use axum_test::TestServer;
use clinic_backend::core::templates::extract_token;
use clinic_backend::core::{AppState, Config, RecordingEmailSender, TemplateEngine};
use serde_json::{Value, json};
use sqlx::SqlitePool;
use std::sync::Arc;

pub const PASSWORD: &str = "Secret123";

pub struct TestApp {
    pub server: TestServer,
    pub state: Arc<AppState>,
    pub mailbox: Arc<RecordingEmailSender>,
}

/// A registered, confirmed user that completed onboarding
pub struct Owner {
    pub token: String,
    pub clinic_id: i64,
    pub staff_id: i64,
}

/// Create the application state used by the tests
///
/// # Arguments
/// * `pool` - Connection pool of the test database
pub fn create_test_state(pool: SqlitePool, mailbox: Arc<RecordingEmailSender>) -> Arc<AppState> {
    Arc::new(AppState::new(
        pool,
        Config::for_tests(),
        mailbox,
        TemplateEngine::new().expect("email templates"),
    ))
}

/// Create a TestServer around the application router
pub fn create_test_server(state: Arc<AppState>) -> TestServer {
    let app = clinic_backend::create_router(state);
    TestServer::new(app).expect("Failed to create test server")
}

pub fn create_test_app(pool: SqlitePool) -> TestApp {
    let mailbox = Arc::new(RecordingEmailSender::new());
    let state = create_test_state(pool, mailbox.clone());
    let server = create_test_server(state.clone());
    TestApp {
        server,
        state,
        mailbox,
    }
}

pub fn authorization() -> HeaderName {
    HeaderName::from_static("authorization")
}

pub fn bearer(token: &str) -> String {
    format!("Bearer {}", token)
}

impl TestApp {
    /// Token carried by the last email sent to `email`
    pub fn last_token_for(&self, email: &str) -> String {
        let mail = self
            .mailbox
            .last_to(email)
            .unwrap_or_else(|| panic!("no email sent to {}", email));
        extract_token(&mail.body).expect("email without token")
    }

    pub async fn register(&self, email: &str, first_name: &str) -> Value {
        let response = self
            .server
            .post("/auth/register")
            .json(&json!({
                "email": email,
                "password": PASSWORD,
                "first_name": first_name,
                "last_name": "Tester"
            }))
            .await;
        response.assert_status(axum::http::StatusCode::CREATED);
        response.json()
    }

    pub async fn confirm(&self, email: &str) {
        let token = self.last_token_for(email);
        self.server
            .post("/auth/confirm-email")
            .json(&json!({ "email": email, "token": token }))
            .await
            .assert_status_ok();
    }

    /// Log in and return the whole token response
    pub async fn login(&self, email: &str, password: &str) -> Value {
        let response = self
            .server
            .post("/auth/login")
            .json(&json!({ "email": email, "password": password }))
            .await;
        response.assert_status_ok();
        response.json()
    }

    /// Register, confirm and log in; returns the access token
    pub async fn confirmed_user(&self, email: &str) -> String {
        self.register(email, "Test").await;
        self.confirm(email).await;
        let tokens = self.login(email, PASSWORD).await;
        tokens["access_token"].as_str().expect("access token").to_string()
    }

    /// A confirmed user owning a freshly onboarded clinic
    pub async fn owner(&self, email: &str, clinic_name: &str) -> Owner {
        let token = self.confirmed_user(email).await;
        let response = self
            .server
            .post("/onboarding/complete")
            .add_header(authorization(), bearer(&token))
            .json(&json!({ "clinic": { "name": clinic_name } }))
            .await;
        response.assert_status(axum::http::StatusCode::CREATED);
        let body: Value = response.json();
        Owner {
            token,
            clinic_id: body["clinic"]["id"].as_i64().expect("clinic id"),
            staff_id: body["staff"]["id"].as_i64().expect("staff id"),
        }
    }

    /// Invite `email` with `role`, accept as a new account and return its access token
    pub async fn staff_member(&self, owner: &Owner, email: &str, role: &str) -> String {
        let response = self
            .server
            .post("/invitations")
            .add_header(authorization(), bearer(&owner.token))
            .json(&json!({ "email": email, "role": role }))
            .await;
        response.assert_status(axum::http::StatusCode::CREATED);
        let token = self.last_token_for(email);

        let response = self
            .server
            .post("/invitations/accept")
            .json(&json!({
                "token": token,
                "first_name": "Invited",
                "last_name": "Member",
                "password": PASSWORD
            }))
            .await;
        response.assert_status(axum::http::StatusCode::CREATED);
        let body: Value = response.json();
        body["tokens"]["access_token"]
            .as_str()
            .expect("access token")
            .to_string()
    }

    /// Create a patient in the owner's clinic and return its id
    pub async fn patient(&self, token: &str, first_name: &str) -> i64 {
        let response = self
            .server
            .post("/patients")
            .add_header(authorization(), bearer(token))
            .json(&json!({ "first_name": first_name, "last_name": "Patient" }))
            .await;
        response.assert_status(axum::http::StatusCode::CREATED);
        let body: Value = response.json();
        body["id"].as_i64().expect("patient id")
    }

    /// Create a medicine and return its id
    pub async fn medicine(&self, token: &str, name: &str, price: i64, stock: i64) -> i64 {
        let response = self
            .server
            .post("/medicines")
            .add_header(authorization(), bearer(token))
            .json(&json!({
                "name": name,
                "unit": "box",
                "unit_price_cents": price,
                "stock_quantity": stock,
                "reorder_level": 2
            }))
            .await;
        response.assert_status(axum::http::StatusCode::CREATED);
        let body: Value = response.json();
        body["id"].as_i64().expect("medicine id")
    }
}
