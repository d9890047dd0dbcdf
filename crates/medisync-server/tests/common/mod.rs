#![allow(dead_code)]

use std::net::{Ipv4Addr, SocketAddr};

use medisync_server::config::{AdminUserConfig, BootstrapConfig};
use medisync_server::{AppConfig, ServerBuilder};
use serde_json::{Value, json};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

pub const ADMIN_EMAIL: &str = "admin@medisync.test";
pub const ADMIN_PASSWORD: &str = "admin-password";

pub struct TestServer {
    pub addr: SocketAddr,
    pub base: String,
    pub client: reqwest::Client,
    shutdown: Option<oneshot::Sender<()>>,
    handle: JoinHandle<()>,
}

impl TestServer {
    pub async fn start() -> Self {
        let mut cfg = AppConfig::default();
        cfg.auth.jwt_secret = "integration-test-secret".into();
        cfg.bootstrap = BootstrapConfig {
            admin_user: Some(AdminUserConfig {
                name: "Integration Admin".into(),
                email: ADMIN_EMAIL.into(),
                password: ADMIN_PASSWORD.into(),
            }),
            seed_departments: true,
        };

        let server = ServerBuilder::new()
            .with_config(cfg)
            .build()
            .await
            .expect("build server");
        let app = server.router();

        let listener = tokio::net::TcpListener::bind((Ipv4Addr::LOCALHOST, 0))
            .await
            .expect("bind");
        let addr = listener.local_addr().expect("local addr");
        let (tx, rx) = oneshot::channel::<()>();
        let handle = tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async move {
                    let _ = rx.await;
                })
                .await
                .expect("server run");
        });

        Self {
            addr,
            base: format!("http://{addr}"),
            client: reqwest::Client::new(),
            shutdown: Some(tx),
            handle,
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base)
    }

    pub fn ws_url(&self, path: &str) -> String {
        format!("ws://{}{path}", self.addr)
    }

    pub async fn stop(mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        // Upgraded sockets may outlive the graceful shutdown.
        if tokio::time::timeout(std::time::Duration::from_secs(2), &mut self.handle)
            .await
            .is_err()
        {
            self.handle.abort();
        }
    }

    pub async fn login(&self, email: &str, password: &str) -> String {
        let res = self
            .client
            .post(self.url("/api/users/login"))
            .json(&json!({"email": email, "password": password}))
            .send()
            .await
            .expect("login request");
        assert_eq!(res.status(), 200, "login failed for {email}");
        let body: Value = res.json().await.expect("login body");
        body["token"].as_str().expect("token").to_string()
    }

    pub async fn admin_token(&self) -> String {
        self.login(ADMIN_EMAIL, ADMIN_PASSWORD).await
    }

    /// Create a staff member with the admin token and log in as them.
    pub async fn staff_token(&self, admin: &str, role: &str) -> String {
        let email = format!("{role}@medisync.test");
        let res = self
            .client
            .post(self.url("/api/users"))
            .bearer_auth(admin)
            .json(&json!({
                "name": format!("Test {role}"),
                "email": email,
                "password": "staff-password",
                "role": role
            }))
            .send()
            .await
            .expect("create user");
        assert_eq!(res.status(), 201, "creating {role} user");
        self.login(&email, "staff-password").await
    }

    pub async fn department_id(&self, token: &str, code: &str) -> String {
        let body: Value = self
            .client
            .get(self.url("/api/departments"))
            .bearer_auth(token)
            .send()
            .await
            .expect("list departments")
            .json()
            .await
            .expect("departments body");
        body["data"]
            .as_array()
            .expect("department list")
            .iter()
            .find(|d| d["code"] == code)
            .and_then(|d| d["id"].as_str())
            .expect("seeded department")
            .to_string()
    }

    pub async fn create_patient(&self, token: &str, department: &str, emergency: bool) -> Value {
        let res = self
            .client
            .post(self.url("/api/patients"))
            .bearer_auth(token)
            .json(&json!({
                "name": "Jane Roe",
                "age": 42,
                "gender": "female",
                "contactNumber": "555-0100",
                "address": "1 Main St",
                "department": department,
                "appointmentDate": "2024-05-01T09:30:00Z",
                "emergency": emergency
            }))
            .send()
            .await
            .expect("create patient");
        assert_eq!(res.status(), 201);
        let body: Value = res.json().await.expect("patient body");
        body["data"].clone()
    }
}

pub fn medication(name: &str, stock: u32) -> Value {
    json!({
        "name": name,
        "genericName": "Amoxicillin",
        "category": "Antibiotic",
        "dosageForm": "capsule",
        "strength": "500mg",
        "manufacturer": "Acme Pharma",
        "currentStock": stock,
        "reorderLevel": 10,
        "expiryDate": "2099-01-01T00:00:00Z",
        "batchNumber": "B-100",
        "unitPrice": 1.5,
        "location": "Shelf A"
    })
}
