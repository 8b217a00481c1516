#![allow(dead_code)]

use axum::{
    body::Body,
    http::{header, Method, Request, Response},
    Router,
};
use dashboard_service::config::{
    CookieSettings, IdentitySettings, RouteSettings, ServerSettings, Settings,
};
use dashboard_service::models::{Identity, Role};
use dashboard_service::services::{InMemoryProjectStore, MockIdentityProvider};
use dashboard_service::startup::build_router;
use dashboard_service::AppState;
use http_body_util::BodyExt;
use secrecy::Secret;
use std::sync::Arc;
use tower::util::ServiceExt;
use uuid::Uuid;

pub fn settings() -> Settings {
    Settings {
        server: ServerSettings {
            host: "127.0.0.1".to_string(),
            port: 0,
            log_level: "debug".to_string(),
            otlp_endpoint: None,
        },
        identity: IdentitySettings {
            url: "http://identity.test".to_string(),
            public_key: Secret::new("test-anon-key".to_string()),
            service_key: Secret::new("test-service-key".to_string()),
            timeout_ms: 500,
        },
        cookies: CookieSettings {
            secure: false,
            ..CookieSettings::default()
        },
        routes: RouteSettings::default(),
    }
}

pub fn identity(email: &str) -> Identity {
    Identity {
        id: Uuid::new_v4(),
        email: email.to_string(),
    }
}

pub struct TestApp {
    pub router: Router,
    pub identity: Arc<MockIdentityProvider>,
    pub store: Arc<InMemoryProjectStore>,
}

impl TestApp {
    pub fn new(identity: MockIdentityProvider) -> Self {
        Self::with_store(identity, InMemoryProjectStore::new())
    }

    pub fn with_store(identity: MockIdentityProvider, store: InMemoryProjectStore) -> Self {
        let identity = Arc::new(identity);
        let store = Arc::new(store);
        let state = AppState::new(settings(), identity.clone(), store.clone());

        Self {
            router: build_router(state),
            identity,
            store,
        }
    }

    pub async fn request(
        &self,
        method: Method,
        path: &str,
        token: Option<&str>,
        body: Option<serde_json::Value>,
    ) -> Response<Body> {
        let mut builder = Request::builder().method(method).uri(path);

        if let Some(token) = token {
            builder = builder.header(header::COOKIE, format!("sb-access-token={}", token));
        }

        let request = match body {
            Some(json) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(json.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        self.router.clone().oneshot(request).await.unwrap()
    }

    pub async fn get(&self, path: &str, token: Option<&str>) -> Response<Body> {
        self.request(Method::GET, path, token, None).await
    }
}

/// One project with a member at each role, every member signed in with the
/// token named after their role.
pub struct Fixture {
    pub app: TestApp,
    pub owner: Identity,
    pub admin: Identity,
    pub member: Identity,
    pub viewer: Identity,
    pub outsider: Identity,
}

pub const PROJECT: &str = "proj1";

pub fn fixture() -> Fixture {
    fixture_with(MockIdentityProvider::new())
}

pub fn fixture_with(provider: MockIdentityProvider) -> Fixture {
    let owner = identity("owner@example.com");
    let admin = identity("admin@example.com");
    let member = identity("member@example.com");
    let viewer = identity("viewer@example.com");
    let outsider = identity("outsider@example.com");

    let provider = provider
        .with_session("owner-token", owner.clone())
        .with_session("admin-token", admin.clone())
        .with_session("member-token", member.clone())
        .with_session("viewer-token", viewer.clone())
        .with_session("outsider-token", outsider.clone());

    let store = InMemoryProjectStore::new();
    store.seed_project(PROJECT, "Project One", &owner);
    store.insert_membership(PROJECT, &admin, Role::Admin);
    store.insert_membership(PROJECT, &member, Role::Member);
    store.insert_membership(PROJECT, &viewer, Role::Viewer);

    Fixture {
        app: TestApp::with_store(provider, store),
        owner,
        admin,
        member,
        viewer,
        outsider,
    }
}

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

pub async fn body_text(response: Response<Body>) -> String {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    String::from_utf8(bytes.to_vec()).unwrap()
}

pub fn location(response: &Response<Body>) -> Option<String> {
    response
        .headers()
        .get(header::LOCATION)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

pub fn set_cookies(response: &Response<Body>) -> Vec<String> {
    response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .map(str::to_string)
        .collect()
}
