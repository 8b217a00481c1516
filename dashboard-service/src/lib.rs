pub mod authz;
pub mod config;
pub mod dtos;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod services;
pub mod startup;
pub mod utils;

use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::Arc;

use crate::config::Settings;
use crate::middleware::{RouteTable, SessionResolver};
use crate::services::{IdentityProvider, ProjectStore};

/// Shared application state. Clients are built once in `main` and injected
/// here; nothing request-scoped lives in it.
#[derive(Clone)]
pub struct AppState {
    pub settings: Arc<Settings>,
    pub identity: Arc<dyn IdentityProvider>,
    pub store: Arc<dyn ProjectStore>,
    pub resolver: SessionResolver,
    pub routes: Arc<RouteTable>,
    pub metrics: Option<PrometheusHandle>,
}

impl AppState {
    pub fn new(
        settings: Settings,
        identity: Arc<dyn IdentityProvider>,
        store: Arc<dyn ProjectStore>,
    ) -> Self {
        let resolver = SessionResolver::new(
            identity.clone(),
            settings.cookies.clone(),
            settings.identity.timeout(),
        );
        let routes = Arc::new(RouteTable::from_settings(&settings.routes));

        Self {
            settings: Arc::new(settings),
            identity,
            store,
            resolver,
            routes,
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, handle: PrometheusHandle) -> Self {
        self.metrics = Some(handle);
        self
    }
}
