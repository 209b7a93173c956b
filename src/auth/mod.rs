use axum::{
    body::Body,
    extract::{ConnectInfo, FromRequestParts, State},
    http::{header::AUTHORIZATION, request::Parts, HeaderMap, Request, StatusCode},
    middleware::Next,
    response::Response,
    routing::post,
    Json, Router,
};
use chrono::Utc;
use diesel::prelude::*;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::warn;
use uuid::Uuid;

use crate::directory::{Principal, User, UserProfile};
use crate::shared::error::ApiError;
use crate::shared::schema::users;
use crate::shared::state::AppState;
use crate::shared::utils::client_ip_from_headers;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenClaims {
    pub sub: String,
    pub username: String,
    pub role: String,
    pub superuser: bool,
    pub iat: i64,
    pub exp: i64,
}

pub fn issue_token(
    user: &User,
    secret: &str,
    ttl_minutes: i64,
) -> Result<String, jsonwebtoken::errors::Error> {
    let now = Utc::now();
    let claims = TokenClaims {
        sub: user.id.to_string(),
        username: user.username.clone(),
        role: user.role.clone(),
        superuser: user.is_superuser,
        iat: now.timestamp(),
        exp: (now + chrono::Duration::minutes(ttl_minutes)).timestamp(),
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
}

pub fn validate_token(token: &str, secret: &str) -> Result<TokenClaims, ApiError> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.validate_exp = true;
    validation.set_required_spec_claims(&["sub", "exp"]);

    decode::<TokenClaims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &validation,
    )
    .map(|data| data.claims)
    .map_err(|e| ApiError::unauthorized(format!("Invalid token: {e}")))
}

/// Validate the bearer token and attach the resulting `Principal` to the
/// request. The principal is rebuilt from the user row each request, so role
/// changes and deactivations take effect immediately.
pub async fn authentication_middleware(
    State(state): State<Arc<AppState>>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    if let Some(principal) = authenticate(&state, &request) {
        request.extensions_mut().insert(principal);
    }

    next.run(request).await
}

fn authenticate(state: &AppState, request: &Request<Body>) -> Option<Principal> {
    let auth_header = request.headers().get(AUTHORIZATION)?.to_str().ok()?;
    let token = auth_header.strip_prefix("Bearer ")?;

    let claims = validate_token(token, &state.config.jwt_secret).ok()?;
    let user_id = Uuid::parse_str(&claims.sub).ok()?;

    let mut conn = state.conn.get().ok()?;
    let user: User = users::table
        .filter(users::id.eq(user_id))
        .filter(users::is_active.eq(true))
        .first(&mut conn)
        .optional()
        .ok()??;

    match user.principal() {
        Ok(principal) => Some(principal),
        Err(e) => {
            warn!("user {} rejected: {e}", user.username);
            None
        }
    }
}

#[axum::async_trait]
impl<S> FromRequestParts<S> for Principal
where
    S: Send + Sync,
{
    type Rejection = (StatusCode, Json<serde_json::Value>);

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts.extensions.get::<Principal>().cloned().ok_or((
            StatusCode::UNAUTHORIZED,
            Json(serde_json::json!({
                "error": "unauthorized",
                "message": "Authentication required",
                "code": "UNAUTHORIZED"
            })),
        ))
    }
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub token: String,
    pub user: UserProfile,
}

pub async fn login(
    State(state): State<Arc<AppState>>,
    connect_info: Option<ConnectInfo<SocketAddr>>,
    headers: HeaderMap,
    Json(req): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, ApiError> {
    let ip = client_ip_from_headers(&headers)
        .or_else(|| connect_info.map(|ConnectInfo(addr)| addr.ip().to_string()));

    let mut conn = state.conn.get()?;

    let user: Option<User> = users::table
        .filter(users::username.eq(&req.username))
        .filter(users::is_active.eq(true))
        .first(&mut conn)
        .optional()?;

    let Some(user) = user else {
        state.audit.log_login_failure(&req.username, ip).await;
        return Err(ApiError::unauthorized("Invalid username or password"));
    };

    if !verify_password(&req.password, &user.password_hash) {
        state.audit.log_login_failure(&req.username, ip).await;
        return Err(ApiError::unauthorized("Invalid username or password"));
    }

    let token = issue_token(
        &user,
        &state.config.jwt_secret,
        state.config.token_ttl_minutes,
    )
    .map_err(|e| ApiError::Internal(format!("token issuance failed: {e}")))?;

    state
        .audit
        .log_login_success(user.id, &user.username, ip)
        .await;

    Ok(Json(LoginResponse {
        token,
        user: user.into(),
    }))
}

fn verify_password(password: &str, stored_hash: &str) -> bool {
    use argon2::password_hash::PasswordHash;
    use argon2::{Argon2, PasswordVerifier};

    PasswordHash::new(stored_hash)
        .map(|parsed| {
            Argon2::default()
                .verify_password(password.as_bytes(), &parsed)
                .is_ok()
        })
        .unwrap_or(false)
}

pub fn configure_auth_routes() -> Router<Arc<AppState>> {
    Router::new().route("/api/auth/login", post(login))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::directory::Role;

    fn sample_user(role: Role, superuser: bool) -> User {
        User {
            id: Uuid::new_v4(),
            username: "jane".to_string(),
            email: "jane@example.com".to_string(),
            password_hash: String::new(),
            role: role.as_str().to_string(),
            department: None,
            phone_extension: None,
            supervisor_id: None,
            is_superuser: superuser,
            is_active: true,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_token_round_trip() {
        let user = sample_user(Role::Supervisor, false);
        let token = issue_token(&user, "test-secret", 60).unwrap();

        let claims = validate_token(&token, "test-secret").unwrap();
        assert_eq!(claims.sub, user.id.to_string());
        assert_eq!(claims.username, "jane");
        assert_eq!(claims.role, "Supervisor");
        assert!(!claims.superuser);
    }

    #[test]
    fn test_token_rejects_wrong_secret() {
        let user = sample_user(Role::Agent, false);
        let token = issue_token(&user, "test-secret", 60).unwrap();

        assert!(validate_token(&token, "other-secret").is_err());
    }

    #[test]
    fn test_expired_token_is_rejected() {
        let user = sample_user(Role::Agent, false);
        let token = issue_token(&user, "test-secret", -5).unwrap();

        assert!(validate_token(&token, "test-secret").is_err());
    }

    #[test]
    fn test_password_verification() {
        use argon2::password_hash::{rand_core::OsRng, PasswordHasher, SaltString};
        use argon2::Argon2;

        let salt = SaltString::generate(&mut OsRng);
        let hash = Argon2::default()
            .hash_password(b"hunter2", &salt)
            .unwrap()
            .to_string();

        assert!(verify_password("hunter2", &hash));
        assert!(!verify_password("hunter3", &hash));
        assert!(!verify_password("hunter2", "not-a-phc-string"));
    }
}
