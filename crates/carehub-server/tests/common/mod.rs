//! Shared harness: a real server on an ephemeral port backed by in-memory
//! storage, with seeded staff accounts.

#![allow(dead_code)]

use carehub_server::config::{AdminUserConfig, BootstrapConfig, StaffAccountConfig};
use carehub_server::{AppConfig, AppState, build_router, build_state};
use carehub_storage::UserRole;
use chrono::{Days, Local};
use serde_json::{Value, json};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

pub const STAFF_PASSWORD: &str = "staff-password-1";
pub const ADMIN_EMAIL: &str = "admin@carehub.test";
pub const CARDIOLOGIST_EMAIL: &str = "house@carehub.test";
pub const NEUROLOGIST_EMAIL: &str = "strange@carehub.test";
pub const PHARMACIST_EMAIL: &str = "pharma@carehub.test";
pub const LAB_EMAIL: &str = "lab@carehub.test";

fn staff(name: &str, email: &str, role: UserRole, department: Option<&str>) -> StaffAccountConfig {
    StaffAccountConfig {
        full_name: name.into(),
        email: email.into(),
        password: STAFF_PASSWORD.into(),
        role,
        department: department.map(str::to_string),
    }
}

pub fn test_config() -> AppConfig {
    let mut cfg = AppConfig::default();
    cfg.auth.secret_key = "integration-test-secret-0123456789abcdef".into();
    cfg.crypto.encryption_key =
        "000102030405060708090a0b0c0d0e0f101112131415161718191a1b1c1d1e1f".into();
    cfg.ocr.enabled = false;
    cfg.pharmacy.catalog_path = "/nonexistent/carehub-catalog.json".into();
    cfg.bootstrap = BootstrapConfig {
        admin_user: Some(AdminUserConfig {
            full_name: "Administrator".into(),
            email: ADMIN_EMAIL.into(),
            password: STAFF_PASSWORD.into(),
        }),
        staff: vec![
            staff("Dr. House", CARDIOLOGIST_EMAIL, UserRole::Doctor, Some("Cardiology")),
            staff("Dr. Strange", NEUROLOGIST_EMAIL, UserRole::Doctor, Some("Neurology")),
            staff("Pat Pharma", PHARMACIST_EMAIL, UserRole::Pharmacist, None),
            staff("Lab Tech", LAB_EMAIL, UserRole::Lab, None),
        ],
    };
    cfg
}

pub struct TestServer {
    pub base: String,
    pub client: reqwest::Client,
    pub state: AppState,
    shutdown: Option<oneshot::Sender<()>>,
    handle: JoinHandle<()>,
}

pub async fn start() -> TestServer {
    start_with(test_config(), |_| {}).await
}

/// Starts a server after letting the caller swap services in the state.
pub async fn start_with(cfg: AppConfig, customize: impl FnOnce(&mut AppState)) -> TestServer {
    let mut state = build_state(&cfg).await.expect("build state");
    customize(&mut state);
    let app = build_router(state.clone());

    let listener = tokio::net::TcpListener::bind((std::net::Ipv4Addr::LOCALHOST, 0))
        .await
        .expect("bind");
    let addr = listener.local_addr().unwrap();
    let (tx, rx) = oneshot::channel::<()>();

    let handle = tokio::spawn(async move {
        let _ = axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = rx.await;
            })
            .await;
    });

    TestServer {
        base: format!("http://{addr}"),
        client: reqwest::Client::new(),
        state,
        shutdown: Some(tx),
        handle,
    }
}

/// A bookable date well in the future.
pub fn future_date() -> String {
    Local::now()
        .date_naive()
        .checked_add_days(Days::new(30))
        .unwrap()
        .format("%Y-%m-%d")
        .to_string()
}

impl TestServer {
    pub fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base)
    }

    pub fn ws_url(&self) -> String {
        format!("{}/ws", self.base.replacen("http://", "ws://", 1))
    }

    pub async fn register(&self, name: &str, email: &str, password: &str) -> reqwest::Response {
        self.client
            .post(self.url("/auth/register"))
            .json(&json!({"full_name": name, "email": email, "password": password, "phone": "555-0100"}))
            .send()
            .await
            .unwrap()
    }

    pub async fn login(&self, email: &str, password: &str) -> reqwest::Response {
        self.client
            .post(self.url("/auth/login"))
            .json(&json!({"email": email, "password": password}))
            .send()
            .await
            .unwrap()
    }

    pub async fn token(&self, email: &str, password: &str) -> String {
        let resp = self.login(email, password).await;
        assert_eq!(resp.status(), 200, "login as {email}");
        let body: Value = resp.json().await.unwrap();
        body["access_token"].as_str().unwrap().to_string()
    }

    pub async fn staff_token(&self, email: &str) -> String {
        self.token(email, STAFF_PASSWORD).await
    }

    /// Registers and logs in a patient; returns `(user id, token)`.
    pub async fn patient(&self, email: &str) -> (i64, String) {
        let resp = self.register("Test Patient", email, "patient-pass").await;
        assert_eq!(resp.status(), 201);
        let resp = self.login(email, "patient-pass").await;
        let body: Value = resp.json().await.unwrap();
        (
            body["id"].as_i64().unwrap(),
            body["access_token"].as_str().unwrap().to_string(),
        )
    }

    pub async fn doctor_id(&self, department: &str) -> i64 {
        let doctors: Value = self
            .client
            .get(self.url("/patient/doctors"))
            .query(&[("department", department)])
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        doctors[0]["id"].as_i64().unwrap()
    }

    pub async fn slots(&self, doctor_id: i64, date: &str) -> Vec<String> {
        let body: Value = self
            .client
            .get(self.url("/patient/slots"))
            .query(&[("doctor_id", doctor_id.to_string()), ("date_str", date.to_string())])
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        serde_json::from_value(body["slots"].clone()).unwrap()
    }

    pub async fn book(
        &self,
        token: &str,
        patient_id: i64,
        doctor_id: i64,
        date: &str,
        slot: &str,
        kind: &str,
    ) -> reqwest::Response {
        self.client
            .post(self.url("/patient/book_appointment"))
            .bearer_auth(token)
            .json(&json!({
                "patient_id": patient_id,
                "doctor_id": doctor_id,
                "date_str": date,
                "time_slot": slot,
                "type": kind,
            }))
            .send()
            .await
            .unwrap()
    }

    pub async fn shutdown(mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        let _ = self.handle.await;
    }
}
