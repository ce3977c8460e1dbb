//! services/api/src/web/auth.rs
//!
//! Authentication endpoints for signup, login, and logout, plus the session
//! cookie helpers shared with the auth middleware.

use axum::{
    extract::State,
    http::{header, HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use chrono::{Duration, Utc};
use driverroom_core::{NewUser, PortError, Role};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, LazyLock};
use tracing::{error, info};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::web::{
    dto::ProfileResponse,
    reply::{bad_request, port_failure, HandlerResult, Rejection},
    state::AppState,
};

const SESSION_COOKIE: &str = "session";
const SESSION_DAYS: i64 = 30;
const MIN_PASSWORD_LEN: usize = 8;

//=========================================================================================
// Request Types
//=========================================================================================

#[derive(Deserialize, Serialize, ToSchema, Debug)]
pub struct SignupRequest {
    pub email: String,
    pub password: String,
    pub name: String,
    /// `driver`, `trainer` or `company`.
    pub role: String,
    /// The company a driver or trainer asks to join.
    pub company_id: Option<Uuid>,
    /// Required when registering a new company.
    pub company_name: Option<String>,
    #[serde(default)]
    pub rescue_enabled: bool,
}

#[derive(Deserialize, Serialize, ToSchema, Debug)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

//=========================================================================================
// Cookie Helpers
//=========================================================================================

/// Extracts the auth session id from the `Cookie` header, if any.
pub fn session_id(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::COOKIE)
        .and_then(|v| v.to_str().ok())?
        .split(';')
        .find_map(|c| c.trim().strip_prefix("session="))
        .filter(|id| !id.is_empty())
}

fn session_cookie(session_id: &str) -> String {
    format!(
        "{}={}; HttpOnly; Secure; SameSite=Lax; Path=/; Max-Age={}",
        SESSION_COOKIE,
        session_id,
        Duration::days(SESSION_DAYS).num_seconds()
    )
}

async fn open_session(state: &AppState, user_id: Uuid) -> HandlerResult<String> {
    let auth_session_id = Uuid::new_v4().to_string();
    let expires_at = Utc::now() + Duration::days(SESSION_DAYS);
    state
        .identity
        .create_auth_session(&auth_session_id, user_id, expires_at)
        .await
        .map_err(|e| port_failure("create session", e))?;
    Ok(session_cookie(&auth_session_id))
}

//=========================================================================================
// Validation
//=========================================================================================

static EMAIL_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("email pattern is a valid regex")
});

fn normalize_email(email: &str) -> Result<String, Rejection> {
    let email = email.trim().to_lowercase();
    if !EMAIL_PATTERN.is_match(&email) {
        return Err(bad_request("Enter a valid email address."));
    }
    Ok(email)
}

fn hash_password(password: &str) -> Result<String, Rejection> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| {
            error!("Failed to hash password: {:?}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Failed to hash password".to_string())
        })
}

//=========================================================================================
// Handlers
//=========================================================================================

/// POST /auth/signup - Create a new account
///
/// Registering with the `company` role also creates the company and activates the
/// account. Drivers and trainers start inactive until their dispatcher activates them.
#[utoipa::path(
    post,
    path = "/auth/signup",
    request_body = SignupRequest,
    responses(
        (status = 201, description = "User created successfully", body = ProfileResponse),
        (status = 400, description = "Invalid request"),
        (status = 409, description = "Email already registered"),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn signup_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<SignupRequest>,
) -> HandlerResult<impl IntoResponse> {
    let email = normalize_email(&req.email)?;
    let name = req.name.trim().to_string();
    if name.is_empty() {
        return Err(bad_request("Enter your name."));
    }
    if req.password.chars().count() < MIN_PASSWORD_LEN {
        return Err(bad_request(format!(
            "Password must be at least {} characters.",
            MIN_PASSWORD_LEN
        )));
    }
    let role = Role::parse(&req.role).ok_or_else(|| bad_request("Unknown role."))?;

    let hashed_password = hash_password(&req.password)?;
    let user = match role {
        Role::Admin => return Err(bad_request("Admin accounts cannot be self-registered.")),
        Role::Company => {
            let company_name = req
                .company_name
                .as_deref()
                .map(str::trim)
                .filter(|n| !n.is_empty())
                .ok_or_else(|| bad_request("Enter the company name."))?;
            let owner = NewUser {
                name,
                email,
                hashed_password,
                role,
                company_id: None,
                activated: true,
            };
            state
                .identity
                .create_company_account(company_name, req.rescue_enabled, owner)
                .await
                .map_err(|e| port_failure("create company account", e))?
        }
        Role::Driver | Role::Trainer => {
            if let Some(company_id) = req.company_id {
                state
                    .identity
                    .get_company(company_id)
                    .await
                    .map_err(|e| match e {
                        PortError::NotFound(_) => bad_request("Unknown company."),
                        other => port_failure("load company", other),
                    })?;
            }
            let new_user = NewUser {
                name,
                email,
                hashed_password,
                role,
                company_id: req.company_id,
                activated: false,
            };
            state
                .identity
                .create_user(new_user)
                .await
                .map_err(|e| port_failure("create user", e))?
        }
    };
    // Reload so the company name is filled in.
    let profile = state
        .identity
        .get_profile(user.user_id)
        .await
        .map_err(|e| port_failure("load profile", e))?;

    let cookie = open_session(&state, profile.user_id).await?;
    info!("New {} account {}", profile.role, profile.user_id);

    Ok((
        StatusCode::CREATED,
        [(header::SET_COOKIE, cookie)],
        Json(ProfileResponse::from(&profile)),
    ))
}

/// POST /auth/login - Login with existing account
#[utoipa::path(
    post,
    path = "/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login successful", body = ProfileResponse),
        (status = 401, description = "Invalid credentials"),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn login_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<LoginRequest>,
) -> HandlerResult<impl IntoResponse> {
    let invalid = || (StatusCode::UNAUTHORIZED, "Invalid email or password".to_string());

    let user_creds = state
        .identity
        .get_user_by_email(req.email.trim())
        .await
        .map_err(|e| match e {
            PortError::NotFound(_) => invalid(),
            other => port_failure("load user", other),
        })?;

    let parsed_hash = PasswordHash::new(&user_creds.hashed_password).map_err(|e| {
        error!("Failed to parse password hash: {:?}", e);
        (StatusCode::INTERNAL_SERVER_ERROR, "Authentication error".to_string())
    })?;
    let valid = Argon2::default()
        .verify_password(req.password.as_bytes(), &parsed_hash)
        .is_ok();
    if !valid {
        return Err(invalid());
    }

    let profile = state
        .identity
        .get_profile(user_creds.user_id)
        .await
        .map_err(|e| port_failure("load profile", e))?;
    let cookie = open_session(&state, profile.user_id).await?;

    Ok((
        StatusCode::OK,
        [(header::SET_COOKIE, cookie)],
        Json(ProfileResponse::from(&profile)),
    ))
}

/// POST /auth/logout - Logout and invalidate session
#[utoipa::path(
    post,
    path = "/auth/logout",
    responses(
        (status = 200, description = "Logout successful"),
        (status = 401, description = "No active session")
    )
)]
pub async fn logout_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> HandlerResult<impl IntoResponse> {
    let auth_session_id = session_id(&headers)
        .ok_or((StatusCode::UNAUTHORIZED, "No session found".to_string()))?;

    state
        .identity
        .delete_auth_session(auth_session_id)
        .await
        .map_err(|e| port_failure("logout", e))?;

    let cookie = format!(
        "{}=; HttpOnly; Secure; SameSite=Lax; Path=/; Max-Age=0",
        SESSION_COOKIE
    );
    Ok((StatusCode::OK, [(header::SET_COOKIE, cookie)]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn session_id_is_read_from_any_cookie_position() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            HeaderValue::from_static("theme=dark; session=abc-123; lang=en"),
        );
        assert_eq!(session_id(&headers), Some("abc-123"));
    }

    #[test]
    fn empty_or_missing_session_cookie_is_ignored() {
        let mut headers = HeaderMap::new();
        assert_eq!(session_id(&headers), None);
        headers.insert(header::COOKIE, HeaderValue::from_static("session="));
        assert_eq!(session_id(&headers), None);
    }

    #[test]
    fn emails_are_trimmed_lowercased_and_checked() {
        assert_eq!(
            normalize_email("  Sam@Fleet.Example ").ok(),
            Some("sam@fleet.example".to_string())
        );
        assert!(normalize_email("not-an-email").is_err());
        assert!(normalize_email("two@@ats.com").is_err());
    }
}
