use axum::{extract::State, Json};

use crate::dtos::auth::TemplateListResponse;
use crate::models::{default_templates, AuthSession};
use crate::AppState;

/// Public templates, falling back to the built-in set when the store has
/// none or cannot be reached.
pub async fn list_templates(
    State(state): State<AppState>,
    session: AuthSession,
) -> Json<TemplateListResponse> {
    let templates = match state.store.list_public_templates(&session).await {
        Ok(templates) if !templates.is_empty() => templates,
        Ok(_) => default_templates(),
        Err(e) => {
            tracing::warn!(error = %e, "Failed to load templates, serving built-ins");
            default_templates()
        }
    };

    Json(TemplateListResponse { templates })
}
