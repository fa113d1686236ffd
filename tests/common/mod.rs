#![allow(dead_code)]

pub mod store;

use std::{sync::Arc, sync::OnceLock, time::Duration};

use reqwest::{RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use time::OffsetDateTime;
use tokio::net::TcpListener;
use vasudha::{
    api,
    db::{self, ticket::Repository as _, user::PasswordHash},
    http, service,
};

pub const ALICE: u128 = 1;
pub const BOB: u128 = 2;
pub const SAM: u128 = 3;
pub const MIA: u128 = 4;
pub const TOM: u128 = 5;

pub const UNIT: u128 = 100;

const USERS: &[(u128, &str, &str, api::user::Role)] = &[
    (ALICE, "Alice", "alice", api::user::Role::Tenant),
    (BOB, "Bob", "bob", api::user::Role::Landlord),
    (SAM, "Sam", "sam", api::user::Role::Maintenance),
    (MIA, "Mia", "mia", api::user::Role::Maintenance),
    (TOM, "Tom", "tom", api::user::Role::Tenant),
];

pub fn password_hash() -> &'static PasswordHash {
    static HASH: OnceLock<PasswordHash> = OnceLock::new();
    HASH.get_or_init(|| {
        PasswordHash::new("password").expect("failed to hash password")
    })
}

pub struct Server {
    pub base_url: String,
    pub store: Arc<db::Memory>,
    state: http::SharedAppState,
}

impl Server {
    pub async fn spawn() -> Self {
        let store = Arc::new(db::Memory::new());
        for &(id, name, login, role) in USERS {
            store
                .insert_user(db::User {
                    id: api::user::Id::from(id),
                    name: name.to_owned(),
                    role,
                    login: login.to_owned(),
                    password_hash: password_hash().clone(),
                })
                .await;
        }

        let state = Arc::new(http::AppState::new(
            store.clone(),
            service::Policy::default(),
            http::Jwt::new("test-secret", Duration::from_secs(60 * 60)),
        ));
        let app = http::router(state.clone());

        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind");
        let addr = listener.local_addr().expect("no local address");
        tokio::spawn(async move {
            axum::serve(listener, app).await.expect("server failed");
        });

        Self {
            base_url: format!("http://{addr}/api"),
            store,
            state,
        }
    }

    pub fn anonymous(&self) -> Client {
        Client {
            inner: reqwest::Client::new(),
            base_url: self.base_url.clone(),
            auth_token: None,
        }
    }

    /// Client holding a freshly issued token for the user.
    pub fn client(&self, user: u128) -> Client {
        let token =
            http::issue_token(&self.state.jwt, api::user::Id::from(user))
                .expect("failed to issue token");
        Client {
            auth_token: Some(token),
            ..self.anonymous()
        }
    }

    /// Stores a ticket filed by `created_by` that is `age` old.
    pub async fn insert_ticket(
        &self,
        created_by: u128,
        assigned_to: Option<u128>,
        status: api::ticket::Status,
        age: time::Duration,
    ) -> api::ticket::Id {
        let mut ticket = service::new_ticket(
            service::NewTicket {
                unit_id: Some(api::ticket::UnitId::from(UNIT)),
                created_by: Some(api::user::Id::from(created_by)),
                title: "Backdated".to_owned(),
                ..Default::default()
            },
            OffsetDateTime::now_utc() - age,
        )
        .expect("invalid ticket");
        ticket.assigned_to = assigned_to.map(api::user::Id::from);
        ticket.status = status;

        self.store
            .write_ticket(&ticket)
            .await
            .expect("failed to store ticket");
        ticket.id
    }
}

#[derive(Debug)]
pub struct Failure {
    pub status: StatusCode,
    pub message: Option<String>,
}

pub struct Client {
    inner: reqwest::Client,
    base_url: String,
    pub auth_token: Option<String>,
}

impl Client {
    async fn send<T: DeserializeOwned>(
        &self,
        mut req: RequestBuilder,
    ) -> Result<T, Failure> {
        if let Some(token) = &self.auth_token {
            req = req.header("Authorization", format!("Bearer {token}"));
        }
        let res = req.send().await.expect("failed to send a request");
        let status = res.status();
        if !status.is_success() {
            let envelope = res
                .json::<api::Envelope<Value>>()
                .await
                .expect("failed to get an error envelope");
            assert!(!envelope.success);
            return Err(Failure {
                status,
                message: envelope.message,
            });
        }
        let envelope = res
            .json::<api::Envelope<T>>()
            .await
            .expect("failed to get a response");
        assert!(envelope.success);
        Ok(envelope.data.expect("envelope without data"))
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    pub async fn auth(
        mut self,
        login: &str,
        password: &str,
    ) -> Result<Self, Failure> {
        let req = self.inner.post(self.url("/auth")).json(&json!({
            "login": login,
            "password": password,
        }));
        let token = self.send::<api::user::Token>(req).await?;
        self.auth_token = Some(token.token);
        Ok(self)
    }

    pub async fn user(&self) -> Result<api::User, Failure> {
        self.send(self.inner.get(self.url("/user"))).await
    }

    pub async fn create_ticket(
        &self,
        body: Value,
    ) -> Result<api::Ticket, Failure> {
        self.send(self.inner.post(self.url("/maintenance")).json(&body))
            .await
    }

    pub async fn file_ticket(&self, title: &str) -> api::Ticket {
        self.create_ticket(json!({
            "unitId": api::ticket::UnitId::from(UNIT),
            "title": title,
        }))
        .await
        .expect("failed to file a ticket")
    }

    pub async fn my_tickets(&self) -> Result<Vec<api::Ticket>, Failure> {
        self.send(self.inner.get(self.url("/maintenance/my"))).await
    }

    pub async fn assigned_tickets(
        &self,
        query: &str,
    ) -> Result<Vec<api::Ticket>, Failure> {
        let url = self.url(&format!("/maintenance/staff/my{query}"));
        self.send(self.inner.get(url)).await
    }

    pub async fn dashboard(
        &self,
    ) -> Result<api::ticket::DashboardStats, Failure> {
        self.send(self.inner.get(self.url("/maintenance/dashboard/staff")))
            .await
    }

    pub async fn get_ticket(
        &self,
        id: api::ticket::Id,
    ) -> Result<api::Ticket, Failure> {
        self.send(self.inner.get(self.url(&format!("/maintenance/{id}"))))
            .await
    }

    pub async fn update_status(
        &self,
        id: api::ticket::Id,
        status: &str,
        note: Option<&str>,
    ) -> Result<api::Ticket, Failure> {
        let req = self
            .inner
            .put(self.url(&format!("/maintenance/{id}/status")))
            .json(&json!({
                "status": status,
                "note": note,
            }));
        self.send(req).await
    }

    pub async fn assign(
        &self,
        id: api::ticket::Id,
        staff: u128,
    ) -> Result<api::Ticket, Failure> {
        let req = self
            .inner
            .put(self.url(&format!("/maintenance/{id}/assign")))
            .json(&json!({
                "assignedTo": api::user::Id::from(staff),
            }));
        self.send(req).await
    }

    pub async fn comment(
        &self,
        id: api::ticket::Id,
        note: &str,
    ) -> Result<api::Ticket, Failure> {
        let req = self
            .inner
            .post(self.url(&format!("/maintenance/{id}/comments")))
            .json(&json!({ "note": note }));
        self.send(req).await
    }
}
