//! Shared fixture for the API integration tests: an in-memory store, the shared
//! app state, and a router driven with `tower::ServiceExt::oneshot`.

#![allow(dead_code)]

use api_lib::{
    adapters::InMemoryStore,
    config::Config,
    web::{create_router, AppState},
};
use axum::{
    body::Body,
    http::{header, HeaderMap, Method, Request, StatusCode},
    Router,
};
use chrono::{DateTime, Duration, Utc};
use driverroom_core::ports::{DutyStore, IdentityService};
use driverroom_core::{Company, Driver, NewUser, Role, User};
use serde_json::Value;
use std::sync::Arc;
use tower::ServiceExt;
use uuid::Uuid;

pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Value,
}

pub struct TestFixture {
    pub store: Arc<InMemoryStore>,
    pub state: Arc<AppState>,
    router: Router,
}

impl TestFixture {
    pub fn new() -> Self {
        let store = Arc::new(InMemoryStore::new());
        let state = Arc::new(AppState::from_store(store.clone(), Arc::new(Config::local())));
        let router = create_router(state.clone());
        TestFixture {
            store,
            state,
            router,
        }
    }

    pub async fn company(&self, name: &str, rescue_enabled: bool) -> Company {
        self.store
            .create_company(name, rescue_enabled)
            .await
            .expect("create company")
    }

    /// An activated member of `company`.
    pub async fn member(&self, company: &Company, role: Role, name: &str) -> User {
        self.account(Some(company.id), role, name, true).await
    }

    pub async fn account(
        &self,
        company_id: Option<Uuid>,
        role: Role,
        name: &str,
        activated: bool,
    ) -> User {
        let user = self
            .store
            .create_user(NewUser {
                name: name.to_string(),
                email: format!("{}-{}@fleet.test", name.to_lowercase(), Uuid::new_v4()),
                hashed_password: "not-a-real-hash".to_string(),
                role,
                company_id,
                activated,
            })
            .await
            .expect("create user");
        self.store
            .get_profile(user.user_id)
            .await
            .expect("load profile")
    }

    pub async fn start_shift(&self, user: &User, since: DateTime<Utc>) -> Driver {
        self.store
            .start_shift(user.user_id, since)
            .await
            .expect("start shift")
    }

    pub async fn driver(&self, user: &User) -> Driver {
        self.store.get_driver(user.user_id).await.expect("load driver")
    }

    /// A `Cookie` header value carrying a fresh auth session for `user`.
    pub async fn cookie(&self, user: &User) -> String {
        let session_id = Uuid::new_v4().to_string();
        self.store
            .create_auth_session(&session_id, user.user_id, Utc::now() + Duration::days(1))
            .await
            .expect("create auth session");
        format!("session={}", session_id)
    }

    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        cookie: Option<&str>,
        body: Option<Value>,
    ) -> TestResponse {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(cookie) = cookie {
            builder = builder.header(header::COOKIE, cookie);
        }
        let request = match body {
            Some(json) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(json.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes)
                .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()))
        };
        TestResponse {
            status,
            headers,
            body,
        }
    }

    pub async fn get(&self, uri: &str, cookie: &str) -> TestResponse {
        self.request(Method::GET, uri, Some(cookie), None).await
    }

    pub async fn post(&self, uri: &str, cookie: &str, body: Value) -> TestResponse {
        self.request(Method::POST, uri, Some(cookie), Some(body)).await
    }
}
