use secrecy::Secret;
use serde::Deserialize;
use service_core::error::AppError;

pub const SERVICE_DIR: &str = "dashboard-service";

#[derive(Deserialize, Clone)]
pub struct Settings {
    pub server: ServerSettings,
    pub identity: IdentitySettings,
    #[serde(default)]
    pub cookies: CookieSettings,
    #[serde(default)]
    pub routes: RouteSettings,
}

#[derive(Deserialize, Clone)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// OTLP collector endpoint; traces are only exported when set.
    #[serde(default)]
    pub otlp_endpoint: Option<String>,
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Identity provider and data store share one base URL and key pair.
#[derive(Deserialize, Clone)]
pub struct IdentitySettings {
    /// Base URL, e.g. `https://xyz.supabase.co`.
    pub url: String,
    /// Public (anon) key sent as `apikey` on every call.
    pub public_key: Secret<String>,
    /// Service key for admin calls. Server-only; never written to a response.
    pub service_key: Secret<String>,
    /// Upper bound on a single provider round trip.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_timeout_ms() -> u64 {
    5_000
}

impl IdentitySettings {
    pub fn timeout(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.timeout_ms)
    }
}

#[derive(Deserialize, Clone, Debug)]
pub struct CookieSettings {
    #[serde(default = "default_access_cookie")]
    pub access_token: String,
    #[serde(default = "default_refresh_cookie")]
    pub refresh_token: String,
    #[serde(default = "default_secure")]
    pub secure: bool,
    /// Refresh the session when the access token expires within this many
    /// seconds.
    #[serde(default = "default_refresh_window")]
    pub refresh_window_secs: i64,
}

fn default_access_cookie() -> String {
    "sb-access-token".to_string()
}

fn default_refresh_cookie() -> String {
    "sb-refresh-token".to_string()
}

fn default_secure() -> bool {
    true
}

fn default_refresh_window() -> i64 {
    300
}

impl Default for CookieSettings {
    fn default() -> Self {
        Self {
            access_token: default_access_cookie(),
            refresh_token: default_refresh_cookie(),
            secure: default_secure(),
            refresh_window_secs: default_refresh_window(),
        }
    }
}

#[derive(Deserialize, Clone, Debug)]
pub struct RouteSettings {
    /// Exact paths served to everyone.
    #[serde(default = "default_public")]
    pub public: Vec<String>,
    /// Exact paths only useful before signing in.
    #[serde(default = "default_auth_only")]
    pub auth_only: Vec<String>,
    /// Page prefixes requiring a session.
    #[serde(default = "default_protected")]
    pub protected: Vec<String>,
    #[serde(default = "default_api_prefix")]
    pub api_prefix: String,
    #[serde(default = "default_login")]
    pub login: String,
    #[serde(default = "default_landing")]
    pub landing: String,
}

fn default_public() -> Vec<String> {
    vec!["/".to_string()]
}

fn default_auth_only() -> Vec<String> {
    vec!["/login".to_string(), "/register".to_string()]
}

fn default_protected() -> Vec<String> {
    vec![
        "/projects".to_string(),
        "/templates".to_string(),
        "/settings".to_string(),
    ]
}

fn default_api_prefix() -> String {
    "/api/".to_string()
}

fn default_login() -> String {
    "/login".to_string()
}

fn default_landing() -> String {
    "/projects".to_string()
}

impl Default for RouteSettings {
    fn default() -> Self {
        Self {
            public: default_public(),
            auth_only: default_auth_only(),
            protected: default_protected(),
            api_prefix: default_api_prefix(),
            login: default_login(),
            landing: default_landing(),
        }
    }
}

pub fn get_configuration() -> Result<Settings, AppError> {
    service_core::config::load_settings(
        SERVICE_DIR,
        &["routes.public", "routes.auth_only", "routes.protected"],
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;
    use std::path::Path;

    #[test]
    fn base_yaml_loads_with_defaults() {
        let file = Path::new(env!("CARGO_MANIFEST_DIR")).join("config/base.yaml");
        let settings: Settings = service_core::config::load_settings_from(&file, &[]).unwrap();

        assert_eq!(settings.routes.public, vec!["/"]);
        assert_eq!(settings.routes.login, "/login");
        assert_eq!(settings.routes.landing, "/projects");
        assert_eq!(settings.cookies.access_token, "sb-access-token");
        assert!(!settings.identity.url.is_empty());
        assert!(!settings.identity.public_key.expose_secret().is_empty());
    }
}
