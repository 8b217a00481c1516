use axum::{
    middleware::{from_fn, from_fn_with_state},
    routing::{get, patch, post},
    Router,
};
use service_core::middleware::{
    metrics::metrics_middleware, security_headers::security_headers_middleware,
    tracing::request_id_middleware,
};
use tower_http::trace::TraceLayer;

use crate::handlers::{
    app::{
        health_check, index, login_page, new_project_page, project_page, projects_page,
        register_page, settings_page, templates_page,
    },
    auth::{login_handler, logout_handler, register_handler},
    credentials::{get_credentials, regenerate_credential},
    members::{add_member, list_members, remove_member, update_member_role},
    metrics::metrics,
    projects::{
        create_project, delete_project, get_project, list_projects, project_stats, update_project,
    },
    templates::list_templates,
};
use crate::middleware::route_guard;
use crate::AppState;

fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/projects", get(list_projects).post(create_project))
        .route(
            "/projects/:id",
            get(get_project).patch(update_project).delete(delete_project),
        )
        .route("/projects/:id/stats", get(project_stats))
        .route("/projects/:id/members", get(list_members).post(add_member))
        .route(
            "/projects/:id/members/:user_id",
            patch(update_member_role).delete(remove_member),
        )
        .route("/projects/:id/credentials", get(get_credentials))
        .route(
            "/projects/:id/credentials/regenerate",
            post(regenerate_credential),
        )
        .route("/templates", get(list_templates))
}

fn page_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(index))
        .route("/login", get(login_page))
        .route("/register", get(register_page))
        .route("/projects", get(projects_page))
        .route("/projects/new", get(new_project_page))
        .route("/projects/:id", get(project_page))
        .route("/templates", get(templates_page))
        .route("/settings", get(settings_page))
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .merge(page_routes())
        .nest("/api", api_routes())
        .route("/auth/login", post(login_handler))
        .route("/auth/register", post(register_handler))
        .route("/auth/logout", post(logout_handler))
        .route("/health", get(health_check))
        .route("/metrics", get(metrics))
        // Guard every path, the fallback included.
        .layer(from_fn_with_state(state.clone(), route_guard))
        .layer(from_fn(security_headers_middleware))
        .layer(from_fn(metrics_middleware))
        .layer(
            TraceLayer::new_for_http().make_span_with(|request: &axum::http::Request<_>| {
                let request_id = request
                    .headers()
                    .get("x-request-id")
                    .and_then(|value| value.to_str().ok())
                    .unwrap_or("-");

                tracing::info_span!(
                    "http_request",
                    request_id = %request_id,
                    method = %request.method(),
                    path = %request.uri().path(),
                    version = ?request.version(),
                )
            }),
        )
        .layer(from_fn(request_id_middleware))
        .with_state(state)
}
