use chrono::Utc;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use rand::Rng;

use crate::auth::middleware::Claims;

/// Resolve the HS256 secret shared with the auth service.
/// An empty configured secret yields a random 256-bit key so the server still
/// starts, but tokens minted elsewhere will not validate against it.
pub fn load_or_generate_jwt_secret(configured: &str) -> Vec<u8> {
    if !configured.is_empty() {
        tracing::info!("JWT secret loaded from configuration");
        return configured.as_bytes().to_vec();
    }

    let key: [u8; 32] = rand::rng().random();
    tracing::warn!("No jwt_secret configured, generated an ephemeral one; external tokens will be rejected");
    key.to_vec()
}

/// Issue an access token with the given lifetime.
/// Claims: sub=user_id, role, email, iat, exp
pub fn issue_access_token(
    secret: &[u8],
    user_id: &str,
    role: &str,
    email: Option<&str>,
    ttl: chrono::Duration,
) -> Result<String, jsonwebtoken::errors::Error> {
    let now = Utc::now();
    let claims = Claims {
        sub: user_id.to_string(),
        role: role.to_string(),
        email: email.map(str::to_string),
        iat: now.timestamp(),
        exp: (now + ttl).timestamp(),
    };

    encode(
        &Header::default(), // HS256
        &claims,
        &EncodingKey::from_secret(secret),
    )
}

/// Validate an access token and return its claims.
pub fn validate_access_token(
    secret: &[u8],
    token: &str,
) -> Result<Claims, jsonwebtoken::errors::Error> {
    let validation = Validation::new(jsonwebtoken::Algorithm::HS256);
    let token_data = decode::<Claims>(token, &DecodingKey::from_secret(secret), &validation)?;
    Ok(token_data.claims)
}
