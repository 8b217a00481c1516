use axum::{extract::State, http::HeaderMap, http::StatusCode, Json};
use axum_extra::extract::cookie::CookieJar;
use service_core::error::AppError;

use crate::dtos::auth::{LoginRequest, RegisterRequest, RegisterResponse, SessionResponse};
use crate::dtos::projects::SuccessResponse;
use crate::utils::validation::ValidatedJson;
use crate::AppState;

pub async fn login_handler(
    State(state): State<AppState>,
    jar: CookieJar,
    ValidatedJson(payload): ValidatedJson<LoginRequest>,
) -> Result<(CookieJar, Json<SessionResponse>), AppError> {
    let tokens = state
        .identity
        .sign_in_with_password(&payload.email, &payload.password)
        .await
        .map_err(|e| {
            tracing::info!(error = %e, "Sign-in failed");
            AppError::from(e)
        })?;

    tracing::info!(user_id = %tokens.identity.id, "User signed in");

    let jar = state
        .resolver
        .session_cookies(&tokens)
        .into_iter()
        .fold(jar, |jar, cookie| jar.add(cookie));

    Ok((
        jar,
        Json(SessionResponse {
            user: tokens.identity,
        }),
    ))
}

pub async fn register_handler(
    State(state): State<AppState>,
    jar: CookieJar,
    ValidatedJson(payload): ValidatedJson<RegisterRequest>,
) -> Result<(StatusCode, CookieJar, Json<RegisterResponse>), AppError> {
    let outcome = state
        .identity
        .sign_up(&payload.email, &payload.password)
        .await?;

    tracing::info!(
        user_id = %outcome.identity.id,
        confirmation_required = outcome.session.is_none(),
        "User registered"
    );

    let jar = match &outcome.session {
        Some(tokens) => state
            .resolver
            .session_cookies(tokens)
            .into_iter()
            .fold(jar, |jar, cookie| jar.add(cookie)),
        None => jar,
    };

    Ok((
        StatusCode::CREATED,
        jar,
        Json(RegisterResponse {
            confirmation_required: outcome.session.is_none(),
            user: outcome.identity,
        }),
    ))
}

/// Revoke the session upstream (best effort) and clear the cookies.
pub async fn logout_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    jar: CookieJar,
) -> (CookieJar, Json<SuccessResponse>) {
    if let Some(access_token) = state.resolver.access_token(&headers) {
        if let Err(e) = state.identity.sign_out(&access_token).await {
            tracing::warn!(error = %e, "Failed to revoke session upstream");
        }
    }

    let jar = state
        .resolver
        .cleared_cookies()
        .into_iter()
        .fold(jar, |jar, cookie| jar.add(cookie));

    (jar, Json(SuccessResponse::ok()))
}
