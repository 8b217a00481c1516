//! Route guard.
//!
//! Every request is classified by path, the session is resolved only for
//! classes that care about it, and the pair is mapped to a decision. Both
//! classification and decision are pure; the middleware only applies them.

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use service_core::error::AppError;
use service_core::observability::extract_request_id;

use super::session::{append_cookies, SessionOutcome};
use crate::config::RouteSettings;
use crate::AppState;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteClass {
    Public,
    AuthOnly,
    Protected,
    Api,
    Unclassified,
}

impl RouteClass {
    /// Whether the decision for this class depends on the session.
    pub fn needs_session(self) -> bool {
        matches!(
            self,
            RouteClass::AuthOnly | RouteClass::Protected | RouteClass::Api
        )
    }

    fn as_str(self) -> &'static str {
        match self {
            RouteClass::Public => "public",
            RouteClass::AuthOnly => "auth_only",
            RouteClass::Protected => "protected",
            RouteClass::Api => "api",
            RouteClass::Unclassified => "unclassified",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardDecision {
    Pass,
    Redirect(String),
    Unauthorized,
}

#[derive(Debug, Clone)]
pub struct RouteTable {
    public: Vec<String>,
    auth_only: Vec<String>,
    protected: Vec<String>,
    api_prefix: String,
    login: String,
    landing: String,
}

/// `path` equals `prefix` or continues it with a new segment.
fn within(path: &str, prefix: &str) -> bool {
    let prefix = prefix.trim_end_matches('/');
    if prefix.is_empty() {
        return path.starts_with('/');
    }
    path == prefix
        || path
            .strip_prefix(prefix)
            .is_some_and(|rest| rest.starts_with('/'))
}

impl RouteTable {
    pub fn from_settings(settings: &RouteSettings) -> Self {
        Self {
            public: settings.public.clone(),
            auth_only: settings.auth_only.clone(),
            protected: settings.protected.clone(),
            api_prefix: settings.api_prefix.clone(),
            login: settings.login.clone(),
            landing: settings.landing.clone(),
        }
    }

    /// First match wins: public, auth-only, protected, API.
    pub fn classify(&self, path: &str) -> RouteClass {
        if self.public.iter().any(|p| p == path) {
            RouteClass::Public
        } else if self.auth_only.iter().any(|p| p == path) {
            RouteClass::AuthOnly
        } else if self.protected.iter().any(|p| within(path, p)) {
            RouteClass::Protected
        } else if within(path, &self.api_prefix) {
            RouteClass::Api
        } else {
            RouteClass::Unclassified
        }
    }

    pub fn decide(&self, class: RouteClass, authenticated: bool) -> GuardDecision {
        match (class, authenticated) {
            (RouteClass::AuthOnly, true) => GuardDecision::Redirect(self.landing.clone()),
            (RouteClass::Protected, false) => GuardDecision::Redirect(self.login.clone()),
            (RouteClass::Api, false) => GuardDecision::Unauthorized,
            _ => GuardDecision::Pass,
        }
    }
}

impl Default for RouteTable {
    fn default() -> Self {
        Self::from_settings(&RouteSettings::default())
    }
}

pub async fn route_guard(State(state): State<AppState>, mut req: Request, next: Next) -> Response {
    let path = req.uri().path().to_string();
    let class = state.routes.classify(&path);

    if !class.needs_session() {
        tracing::debug!(path = %path, class = class.as_str(), "Route passes without session");
        return next.run(req).await;
    }

    let request_id = extract_request_id(req.headers());

    let resolved = state.resolver.resolve(req.headers(), request_id).await;

    let session = match resolved.outcome {
        SessionOutcome::Authenticated(session) => Some(session),
        SessionOutcome::Unauthenticated => None,
        SessionOutcome::Error(reason) => {
            tracing::warn!(
                path = %path,
                reason = %reason,
                "Session resolution failed, treating as signed out"
            );
            None
        }
    };

    let decision = state.routes.decide(class, session.is_some());
    tracing::debug!(
        path = %path,
        class = class.as_str(),
        decision = ?decision,
        "Route guard decision"
    );

    let mut response = match decision {
        GuardDecision::Pass => {
            if let Some(session) = session {
                req.extensions_mut().insert(session);
            }
            next.run(req).await
        }
        GuardDecision::Redirect(location) => {
            tracing::info!(path = %path, location = %location, "Redirecting");
            Redirect::temporary(&location).into_response()
        }
        GuardDecision::Unauthorized => {
            tracing::info!(path = %path, "Blocked unauthenticated API request");
            AppError::Unauthorized.into_response()
        }
    };

    if let Some(tokens) = resolved.refreshed {
        append_cookies(&mut response, state.resolver.session_cookies(&tokens));
    }

    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classification_priority() {
        let routes = RouteTable::default();

        assert_eq!(routes.classify("/"), RouteClass::Public);
        assert_eq!(routes.classify("/login"), RouteClass::AuthOnly);
        assert_eq!(routes.classify("/register"), RouteClass::AuthOnly);
        assert_eq!(routes.classify("/projects"), RouteClass::Protected);
        assert_eq!(routes.classify("/projects/new"), RouteClass::Protected);
        assert_eq!(routes.classify("/projects/abc/settings"), RouteClass::Protected);
        assert_eq!(routes.classify("/templates"), RouteClass::Protected);
        assert_eq!(routes.classify("/settings"), RouteClass::Protected);
        assert_eq!(routes.classify("/api/projects"), RouteClass::Api);
        assert_eq!(routes.classify("/api"), RouteClass::Api);
        assert_eq!(routes.classify("/health"), RouteClass::Unclassified);
        assert_eq!(routes.classify("/auth/login"), RouteClass::Unclassified);
    }

    #[test]
    fn protected_prefixes_respect_segments() {
        let routes = RouteTable::default();

        assert_eq!(routes.classify("/projectsfoo"), RouteClass::Unclassified);
        assert_eq!(routes.classify("/settingsx/y"), RouteClass::Unclassified);
        assert_eq!(routes.classify("/apix"), RouteClass::Unclassified);
    }

    #[test]
    fn classification_is_idempotent() {
        let routes = RouteTable::default();
        for path in ["/", "/login", "/projects/1", "/api/templates", "/nowhere"] {
            assert_eq!(routes.classify(path), routes.classify(path));
        }
    }

    #[test]
    fn decision_table() {
        let routes = RouteTable::default();
        let cases = [
            (RouteClass::Public, false, GuardDecision::Pass),
            (RouteClass::Public, true, GuardDecision::Pass),
            (RouteClass::AuthOnly, false, GuardDecision::Pass),
            (RouteClass::AuthOnly, true, GuardDecision::Redirect("/projects".to_string())),
            (RouteClass::Protected, false, GuardDecision::Redirect("/login".to_string())),
            (RouteClass::Protected, true, GuardDecision::Pass),
            (RouteClass::Api, false, GuardDecision::Unauthorized),
            (RouteClass::Api, true, GuardDecision::Pass),
            (RouteClass::Unclassified, false, GuardDecision::Pass),
            (RouteClass::Unclassified, true, GuardDecision::Pass),
        ];

        for (class, authenticated, expected) in cases {
            assert_eq!(
                routes.decide(class, authenticated),
                expected,
                "{:?} authenticated={}",
                class,
                authenticated
            );
        }
    }

    #[test]
    fn only_guarded_classes_resolve_sessions() {
        assert!(!RouteClass::Public.needs_session());
        assert!(!RouteClass::Unclassified.needs_session());
        assert!(RouteClass::AuthOnly.needs_session());
        assert!(RouteClass::Protected.needs_session());
        assert!(RouteClass::Api.needs_session());
    }
}
