use anyhow::Result;
use base64::{engine::general_purpose, Engine as _};
use serde::Deserialize;

/// Claims the gateway reads from a provider-issued access token.
#[derive(Debug, Deserialize)]
pub struct AccessTokenClaims {
    pub exp: i64,
}

/// Decode the claims segment without verifying the signature.
///
/// Only used to schedule a session refresh. The authentication decision is
/// always made by the identity provider, never by these claims.
pub fn decode_unverified_claims(token: &str) -> Result<AccessTokenClaims> {
    let parts: Vec<&str> = token.split('.').collect();

    if parts.len() != 3 {
        return Err(anyhow::anyhow!("Invalid JWT format"));
    }

    let payload = general_purpose::URL_SAFE_NO_PAD
        .decode(parts[1].trim_end_matches('='))
        .map_err(|e| anyhow::anyhow!("Failed to decode JWT payload: {}", e))?;

    let claims: AccessTokenClaims = serde_json::from_slice(&payload)
        .map_err(|e| anyhow::anyhow!("Failed to parse JWT claims: {}", e))?;

    Ok(claims)
}

/// Seconds until the token expires, or `None` when it cannot be read.
pub fn seconds_until_expiry(token: &str, now: i64) -> Option<i64> {
    decode_unverified_claims(token)
        .ok()
        .map(|claims| claims.exp - now)
}
