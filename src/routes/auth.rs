use axum::extract::State;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::Router;
use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::auth::{hash_password, sign_jwt, verify_password, AuthUser};
use crate::extractors::JsonBody;
use crate::response::{created, ok, AppError};
use crate::state::AppState;
use crate::store::operations::users::User;
use crate::store::StoreError;
use crate::validation::{is_valid_email, validate_name, validate_password};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/me", get(me))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest {
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
}

#[derive(Debug, Serialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub id: String,
    pub name: String,
    pub email: String,
    pub is_admin: bool,
}

impl From<&User> for UserProfile {
    fn from(value: &User) -> Self {
        Self {
            id: value.id.clone(),
            name: value.name.clone(),
            email: value.email.clone(),
            is_admin: value.is_admin,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthResponse {
    pub message: &'static str,
    pub token: String,
    pub user: UserProfile,
}

fn required(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

fn issue_token(user: &User, state: &AppState) -> Result<String, AppError> {
    sign_jwt(
        &user.id,
        user.is_admin,
        &state.config().jwt_secret,
        state.config().jwt_expires_in_hours,
    )
}

async fn register(
    State(state): State<AppState>,
    JsonBody(req): JsonBody<RegisterRequest>,
) -> Result<Response, AppError> {
    let (Some(name), Some(email), Some(password)) = (
        required(&req.name),
        required(&req.email),
        req.password.as_deref().filter(|p| !p.is_empty()),
    ) else {
        return Err(AppError::bad_request(
            "VALIDATION_ERROR",
            "Name, email and password are required",
        ));
    };

    let email = email.to_lowercase();
    if !is_valid_email(&email) {
        return Err(AppError::bad_request("AUTH_INVALID_EMAIL", "Invalid email format"));
    }
    if let Err(msg) = validate_name(name) {
        return Err(AppError::bad_request("AUTH_INVALID_NAME", msg));
    }
    if let Err(msg) = validate_password(password) {
        return Err(AppError::bad_request("AUTH_WEAK_PASSWORD", msg));
    }

    if state.store().get_user_by_email(&email)?.is_some() {
        return Err(AppError::conflict("AUTH_EMAIL_EXISTS", "User already exists"));
    }

    let user = User {
        id: uuid::Uuid::new_v4().to_string(),
        name: name.to_string(),
        email: email.clone(),
        password_hash: hash_password(password)?,
        is_admin: state.config().is_admin_email(&email),
        created_at: Utc::now(),
    };

    match state.store().create_user(&user) {
        Ok(()) => {}
        Err(StoreError::Conflict { .. }) => {
            return Err(AppError::conflict("AUTH_EMAIL_EXISTS", "User already exists"));
        }
        Err(e) => return Err(e.into()),
    }
    tracing::info!(user_id = %user.id, is_admin = user.is_admin, "user registered");

    let token = issue_token(&user, &state)?;
    Ok(created(AuthResponse {
        message: "User registered successfully",
        token,
        user: UserProfile::from(&user),
    })
    .into_response())
}

async fn login(
    State(state): State<AppState>,
    JsonBody(req): JsonBody<LoginRequest>,
) -> Result<Response, AppError> {
    let (Some(email), Some(password)) = (
        required(&req.email),
        req.password.as_deref().filter(|p| !p.is_empty()),
    ) else {
        return Err(AppError::bad_request(
            "VALIDATION_ERROR",
            "Email and password are required",
        ));
    };

    let user = state
        .store()
        .get_user_by_email(email)?
        .ok_or_else(|| AppError::not_found("User not found"))?;

    if !verify_password(password, &user.password_hash)? {
        return Err(AppError::unauthorized("Invalid credentials"));
    }

    let token = issue_token(&user, &state)?;
    Ok(ok(AuthResponse {
        message: "Login successful",
        token,
        user: UserProfile::from(&user),
    })
    .into_response())
}

async fn me(auth: AuthUser, State(state): State<AppState>) -> Result<Response, AppError> {
    let user = state
        .store()
        .get_user_by_id(&auth.user_id)?
        .ok_or_else(|| AppError::not_found("User not found"))?;
    Ok(ok(UserProfile::from(&user)).into_response())
}
