//! Session resolution.
//!
//! Turns the cookies (or bearer header) of an inbound request into an
//! [`SessionOutcome`], asking the identity provider once per request. The
//! resolver never fails the request itself; callers decide what an outcome
//! means for the route.

use axum::http::{header, HeaderMap, HeaderValue};
use axum::response::Response;
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use crate::config::CookieSettings;
use crate::models::{AuthSession, SessionTokens};
use crate::services::{IdentityError, IdentityProvider};
use crate::utils::jwt::seconds_until_expiry;

/// Longest token accepted before asking the provider.
const MAX_TOKEN_LEN: usize = 8 * 1024;
/// Lifetime of the refresh cookie.
const REFRESH_COOKIE_DAYS: i64 = 30;
/// Access cookie lifetime when the provider omits `expires_in`.
const DEFAULT_ACCESS_SECS: i64 = 3_600;

#[derive(Debug, Clone)]
pub enum SessionOutcome {
    Authenticated(AuthSession),
    Unauthenticated,
    /// Resolution could not complete; the reason is for logs only.
    Error(String),
}

impl SessionOutcome {
    pub fn is_authenticated(&self) -> bool {
        matches!(self, SessionOutcome::Authenticated(_))
    }
}

#[derive(Debug)]
pub struct ResolvedSession {
    pub outcome: SessionOutcome,
    /// Tokens issued by a refresh during resolution, to be written back as
    /// cookies on the response.
    pub refreshed: Option<SessionTokens>,
}

impl ResolvedSession {
    fn without_refresh(outcome: SessionOutcome) -> Self {
        Self {
            outcome,
            refreshed: None,
        }
    }
}

#[derive(Clone)]
pub struct SessionResolver {
    identity: Arc<dyn IdentityProvider>,
    cookies: CookieSettings,
    timeout: Duration,
}

fn is_plausible_token(token: &str) -> bool {
    !token.is_empty()
        && token.len() <= MAX_TOKEN_LEN
        && token.chars().all(|c| c.is_ascii_graphic())
}

/// Credentials of an `Authorization: Bearer <token>` header. The scheme is
/// matched case-insensitively.
fn bearer_token(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let (scheme, credentials) = value.trim().split_once(' ')?;

    scheme
        .eq_ignore_ascii_case("bearer")
        .then(|| credentials.trim().to_string())
}

impl SessionResolver {
    pub fn new(
        identity: Arc<dyn IdentityProvider>,
        cookies: CookieSettings,
        timeout: Duration,
    ) -> Self {
        Self {
            identity,
            cookies,
            timeout,
        }
    }

    /// Access token from the session cookie, else from `Authorization: Bearer`.
    /// Each source is checked on its own, so a malformed cookie does not hide
    /// a usable header.
    pub fn access_token(&self, headers: &HeaderMap) -> Option<String> {
        let from_cookie = CookieJar::from_headers(headers)
            .get(&self.cookies.access_token)
            .map(|c| c.value().trim().to_string())
            .filter(|v| is_plausible_token(v));

        from_cookie.or_else(|| bearer_token(headers).filter(|v| is_plausible_token(v)))
    }

    fn refresh_token(&self, headers: &HeaderMap) -> Option<String> {
        CookieJar::from_headers(headers)
            .get(&self.cookies.refresh_token)
            .map(|c| c.value().trim().to_string())
            .filter(|v| is_plausible_token(v))
    }

    /// Resolve the request's session. Panics inside resolution are caught
    /// and reported as [`SessionOutcome::Error`].
    pub async fn resolve(
        &self,
        headers: &HeaderMap,
        request_id: Option<String>,
    ) -> ResolvedSession {
        match AssertUnwindSafe(self.resolve_inner(headers, request_id))
            .catch_unwind()
            .await
        {
            Ok(resolved) => resolved,
            Err(_) => {
                tracing::error!("Session resolution panicked");
                ResolvedSession::without_refresh(SessionOutcome::Error(
                    "session resolution panicked".to_string(),
                ))
            }
        }
    }

    async fn resolve_inner(
        &self,
        headers: &HeaderMap,
        request_id: Option<String>,
    ) -> ResolvedSession {
        let Some(access_token) = self.access_token(headers) else {
            return self.resume_from_refresh(headers, request_id).await;
        };

        let lookup = self.identity.get_user(&access_token, request_id.as_deref());

        let outcome = match tokio::time::timeout(self.timeout, lookup).await {
            Ok(Ok(identity)) => SessionOutcome::Authenticated(AuthSession {
                identity,
                access_token: access_token.clone(),
                request_id: request_id.clone(),
            }),
            Ok(Err(IdentityError::InvalidSession)) => {
                return self.resume_from_refresh(headers, request_id.clone()).await;
            }
            Ok(Err(err)) => SessionOutcome::Error(err.to_string()),
            Err(_) => SessionOutcome::Error(format!(
                "identity provider did not answer within {}ms",
                self.timeout.as_millis()
            )),
        };

        let refreshed = if outcome.is_authenticated() {
            self.refresh_near_expiry(headers, &access_token, request_id.as_deref()).await
        } else {
            None
        };

        ResolvedSession { outcome, refreshed }
    }

    /// Sign the caller back in from the refresh cookie when the access token
    /// is gone or no longer accepted.
    async fn resume_from_refresh(
        &self,
        headers: &HeaderMap,
        request_id: Option<String>,
    ) -> ResolvedSession {
        let Some(refresh_token) = self.refresh_token(headers) else {
            return ResolvedSession::without_refresh(SessionOutcome::Unauthenticated);
        };

        match self.exchange(&refresh_token, request_id.as_deref()).await {
            Some(tokens) => ResolvedSession {
                outcome: SessionOutcome::Authenticated(AuthSession {
                    identity: tokens.identity.clone(),
                    access_token: tokens.access_token.clone(),
                    request_id,
                }),
                refreshed: Some(tokens),
            },
            None => ResolvedSession::without_refresh(SessionOutcome::Unauthenticated),
        }
    }

    /// Exchange the refresh token when the access token is close to expiry.
    async fn refresh_near_expiry(
        &self,
        headers: &HeaderMap,
        access_token: &str,
        request_id: Option<&str>,
    ) -> Option<SessionTokens> {
        let remaining = seconds_until_expiry(access_token, chrono::Utc::now().timestamp())?;
        if remaining > self.cookies.refresh_window_secs {
            return None;
        }
        let refresh_token = self.refresh_token(headers)?;

        self.exchange(&refresh_token, request_id).await
    }

    /// One bounded refresh round trip. Failures are logged and otherwise
    /// ignored.
    async fn exchange(
        &self,
        refresh_token: &str,
        request_id: Option<&str>,
    ) -> Option<SessionTokens> {
        let refresh = self.identity.refresh_session(refresh_token, request_id);

        match tokio::time::timeout(self.timeout, refresh).await {
            Ok(Ok(tokens)) => {
                tracing::debug!(user_id = %tokens.identity.id, "Session refreshed");
                Some(tokens)
            }
            Ok(Err(err)) => {
                tracing::warn!(error = %err, "Session refresh failed");
                None
            }
            Err(_) => {
                tracing::warn!("Session refresh timed out");
                None
            }
        }
    }

    fn base_cookie(&self, name: &str, value: String) -> Cookie<'static> {
        Cookie::build((name.to_string(), value))
            .path("/")
            .http_only(true)
            .secure(self.cookies.secure)
            .same_site(SameSite::Lax)
            .build()
    }

    /// Cookies carrying a freshly issued session.
    pub fn session_cookies(&self, tokens: &SessionTokens) -> [Cookie<'static>; 2] {
        let access_secs = if tokens.expires_in > 0 {
            tokens.expires_in
        } else {
            DEFAULT_ACCESS_SECS
        };

        let mut access = self.base_cookie(&self.cookies.access_token, tokens.access_token.clone());
        access.set_max_age(time::Duration::seconds(access_secs));

        let mut refresh =
            self.base_cookie(&self.cookies.refresh_token, tokens.refresh_token.clone());
        refresh.set_max_age(time::Duration::days(REFRESH_COOKIE_DAYS));

        [access, refresh]
    }

    /// Expired cookies that remove the session from the browser.
    pub fn cleared_cookies(&self) -> [Cookie<'static>; 2] {
        [&self.cookies.access_token, &self.cookies.refresh_token].map(|name| {
            let mut cookie = self.base_cookie(name, String::new());
            cookie.set_max_age(time::Duration::ZERO);
            cookie
        })
    }
}

/// Append `Set-Cookie` headers to an already built response.
pub fn append_cookies(response: &mut Response, cookies: impl IntoIterator<Item = Cookie<'static>>) {
    for cookie in cookies {
        match HeaderValue::from_str(&cookie.to_string()) {
            Ok(value) => {
                response.headers_mut().append(header::SET_COOKIE, value);
            }
            Err(e) => tracing::error!(cookie = %cookie.name(), error = %e, "Unencodable cookie"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Identity;
    use crate::services::{MockFailure, MockIdentityProvider};
    use base64::{engine::general_purpose, Engine as _};
    use uuid::Uuid;

    fn identity() -> Identity {
        Identity {
            id: Uuid::new_v4(),
            email: "dev@example.com".to_string(),
        }
    }

    fn resolver(provider: MockIdentityProvider) -> (SessionResolver, Arc<MockIdentityProvider>) {
        let provider = Arc::new(provider);
        let resolver = SessionResolver::new(
            provider.clone(),
            CookieSettings::default(),
            Duration::from_millis(200),
        );
        (resolver, provider)
    }

    fn cookie_headers(cookie: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(header::COOKIE, HeaderValue::from_str(cookie).unwrap());
        headers
    }

    fn jwt_expiring_in(secs: i64) -> String {
        let exp = chrono::Utc::now().timestamp() + secs;
        format!(
            "eyJhbGciOiJIUzI1NiJ9.{}.sig",
            general_purpose::URL_SAFE_NO_PAD.encode(format!(r#"{{"exp":{}}}"#, exp))
        )
    }

    #[tokio::test]
    async fn missing_token_skips_the_provider() {
        let (resolver, provider) = resolver(MockIdentityProvider::new());

        let resolved = resolver.resolve(&HeaderMap::new(), None).await;
        assert!(matches!(resolved.outcome, SessionOutcome::Unauthenticated));

        let resolved = resolver.resolve(&cookie_headers("sb-access-token="), None).await;
        assert!(matches!(resolved.outcome, SessionOutcome::Unauthenticated));

        let resolved = resolver.resolve(&cookie_headers("sb-access-token=a b"), None).await;
        assert!(!resolved.outcome.is_authenticated());

        assert_eq!(provider.user_lookups(), 0);
        assert_eq!(provider.refreshes(), 0);
    }

    #[tokio::test]
    async fn valid_cookie_authenticates_with_one_lookup() {
        let user = identity();
        let (resolver, provider) =
            resolver(MockIdentityProvider::new().with_session("tok", user.clone()));

        let resolved = resolver
            .resolve(&cookie_headers("sb-access-token=tok"), Some("req-1".to_string()))
            .await;

        match resolved.outcome {
            SessionOutcome::Authenticated(session) => {
                assert_eq!(session.identity, user);
                assert_eq!(session.request_id.as_deref(), Some("req-1"));
            }
            other => panic!("unexpected outcome {:?}", other),
        }
        assert_eq!(provider.user_lookups(), 1);
        assert_eq!(provider.last_request_id().as_deref(), Some("req-1"));
    }

    #[tokio::test]
    async fn bearer_header_is_accepted() {
        let user = identity();
        let (resolver, _) = resolver(MockIdentityProvider::new().with_session("tok", user));

        for value in ["Bearer tok", "bearer tok", "BEARER  tok"] {
            let mut headers = HeaderMap::new();
            headers.insert(header::AUTHORIZATION, HeaderValue::from_static(value));
            assert!(resolver.resolve(&headers, None).await.outcome.is_authenticated(), "{}", value);
        }

        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Basic tok"));
        assert!(!resolver.resolve(&headers, None).await.outcome.is_authenticated());
    }

    #[tokio::test]
    async fn malformed_cookie_falls_back_to_bearer_header() {
        let user = identity();
        let (resolver, _) = resolver(MockIdentityProvider::new().with_session("tok", user));

        let mut headers = cookie_headers("sb-access-token=a b");
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer tok"));

        assert!(resolver.resolve(&headers, None).await.outcome.is_authenticated());
    }

    #[tokio::test]
    async fn rejected_token_is_unauthenticated() {
        let (resolver, _) = resolver(MockIdentityProvider::new());
        let resolved = resolver.resolve(&cookie_headers("sb-access-token=stale"), None).await;
        assert!(matches!(resolved.outcome, SessionOutcome::Unauthenticated));
    }

    #[tokio::test]
    async fn refresh_cookie_resumes_a_session_without_access_token() {
        let user = identity();
        let (resolver, provider) =
            resolver(MockIdentityProvider::new().with_refresh_token("r1", user.clone()));

        let resolved = resolver
            .resolve(&cookie_headers("sb-refresh-token=r1"), Some("req-9".to_string()))
            .await;

        let tokens = resolved.refreshed.expect("new tokens");
        match resolved.outcome {
            SessionOutcome::Authenticated(session) => {
                assert_eq!(session.identity, user);
                assert_eq!(session.access_token, tokens.access_token);
                assert_eq!(session.request_id.as_deref(), Some("req-9"));
            }
            other => panic!("unexpected outcome {:?}", other),
        }
        assert_eq!(provider.user_lookups(), 0);
        assert_eq!(provider.refreshes(), 1);
        assert_eq!(provider.last_request_id().as_deref(), Some("req-9"));
    }

    #[tokio::test]
    async fn refresh_cookie_resumes_a_session_after_rejection() {
        let user = identity();
        let (resolver, provider) =
            resolver(MockIdentityProvider::new().with_refresh_token("r1", user.clone()));

        let resolved = resolver
            .resolve(&cookie_headers("sb-access-token=expired; sb-refresh-token=r1"), None)
            .await;

        assert!(resolved.outcome.is_authenticated());
        assert!(resolved.refreshed.is_some());
        assert_eq!(provider.user_lookups(), 1);
        assert_eq!(provider.refreshes(), 1);
    }

    #[tokio::test]
    async fn revoked_refresh_cookie_stays_signed_out() {
        let (resolver, provider) = resolver(MockIdentityProvider::new());

        for cookie in [
            "sb-refresh-token=revoked",
            "sb-access-token=expired; sb-refresh-token=revoked",
        ] {
            let resolved = resolver.resolve(&cookie_headers(cookie), None).await;
            assert!(matches!(resolved.outcome, SessionOutcome::Unauthenticated));
            assert!(resolved.refreshed.is_none());
        }
        assert_eq!(provider.refreshes(), 2);
    }

    #[tokio::test]
    async fn provider_failures_and_panics_become_errors() {
        let user = identity();
        let (resolver, provider) = resolver(
            MockIdentityProvider::new()
                .with_session("tok", user.clone())
                .with_refresh_token("r1", user),
        );
        let headers = cookie_headers("sb-access-token=tok; sb-refresh-token=r1");

        provider.fail_with(Some(MockFailure::Transport));
        let resolved = resolver.resolve(&headers, None).await;
        assert!(matches!(resolved.outcome, SessionOutcome::Error(_)));

        provider.fail_with(Some(MockFailure::Panic));
        let resolved = resolver.resolve(&headers, None).await;
        assert!(matches!(resolved.outcome, SessionOutcome::Error(_)));

        // An unreachable provider is not a rejection; the refresh cookie stays unused.
        assert_eq!(provider.refreshes(), 0);
    }

    #[tokio::test]
    async fn slow_provider_times_out() {
        let user = identity();
        let (resolver, _) = resolver(
            MockIdentityProvider::new()
                .with_session("tok", user)
                .with_latency(Duration::from_secs(2)),
        );

        let resolved = resolver.resolve(&cookie_headers("sb-access-token=tok"), None).await;
        assert!(matches!(resolved.outcome, SessionOutcome::Error(_)));
    }

    #[tokio::test]
    async fn refresh_only_near_expiry() {
        let user = identity();
        let near = jwt_expiring_in(60);
        let far = jwt_expiring_in(3_600);
        let (resolver, provider) = resolver(
            MockIdentityProvider::new()
                .with_session(&near, user.clone())
                .with_session(&far, user.clone())
                .with_refresh_token("r1", user),
        );

        let cookie = format!("sb-access-token={}; sb-refresh-token=r1", far);
        let resolved = resolver.resolve(&cookie_headers(&cookie), None).await;
        assert!(resolved.refreshed.is_none());
        assert_eq!(provider.refreshes(), 0);

        let cookie = format!("sb-access-token={}; sb-refresh-token=r1", near);
        let resolved = resolver.resolve(&cookie_headers(&cookie), None).await;
        assert!(resolved.outcome.is_authenticated());
        assert!(resolved.refreshed.is_some());
        assert_eq!(provider.refreshes(), 1);
    }

    #[tokio::test]
    async fn failed_refresh_keeps_the_decision() {
        let user = identity();
        let near = jwt_expiring_in(30);
        let (resolver, provider) = resolver(MockIdentityProvider::new().with_session(&near, user));

        let cookie = format!("sb-access-token={}; sb-refresh-token=gone", near);
        let resolved = resolver.resolve(&cookie_headers(&cookie), None).await;
        assert!(resolved.outcome.is_authenticated());
        assert!(resolved.refreshed.is_none());
        assert_eq!(provider.refreshes(), 1);
    }

    #[test]
    fn cleared_cookies_expire_immediately() {
        let (resolver, _) = resolver(MockIdentityProvider::new());
        let [access, refresh] = resolver.cleared_cookies();
        assert_eq!(access.name(), "sb-access-token");
        assert_eq!(refresh.name(), "sb-refresh-token");
        assert_eq!(access.max_age(), Some(time::Duration::ZERO));
        assert_eq!(access.value(), "");
    }
}
