/// Authentication endpoints
///
/// - `POST /v1/auth/register`: creates a tenant and its first super admin
/// - `POST /v1/auth/login`: exchanges email + password for tokens
/// - `POST /v1/auth/refresh`: exchanges a refresh token for an access token

use axum::extract::State;
use salescrm_shared::auth::{jwt, password};
use salescrm_shared::models::tenant::Tenant;
use salescrm_shared::models::user::{CreateUser, User, UserRole};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
    extract::ApiJson,
    response::ApiResponse,
};

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    #[validate(length(min = 1, max = 255, message = "Company name is required"))]
    pub company_name: String,

    #[validate(length(min = 1, max = 255, message = "Name is required"))]
    pub name: String,

    #[validate(email(message = "Invalid email format"))]
    pub email: String,

    #[validate(length(min = 8, message = "Password must be at least 8 characters"))]
    pub password: String,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest {
    #[validate(email(message = "Invalid email format"))]
    pub email: String,

    #[validate(length(min = 1, message = "Password is required"))]
    pub password: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshRequest {
    pub refresh_token: String,
}

/// User profile plus a fresh token pair
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionResponse {
    pub user: User,
    #[serde(flatten)]
    pub tokens: jwt::TokenPair,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshResponse {
    pub access_token: String,
}

/// Registration endpoint
///
/// ```text
/// POST /v1/auth/register
/// {"companyName": "Acme", "name": "Jane", "email": "jane@acme.test", "password": "Secure-Pass1"}
/// ```
///
/// # Errors
///
/// - `409 Conflict`: email already registered
/// - `422 Unprocessable Entity`: validation failed or weak password
pub async fn register(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<RegisterRequest>,
) -> ApiResult<ApiResponse<SessionResponse>> {
    req.validate()?;
    password::validate_password_strength(&req.password)
        .map_err(|msg| ApiError::validation("password", msg))?;

    let email = req.email.trim().to_lowercase();
    if User::find_by_email(&state.db, &email).await?.is_some() {
        return Err(ApiError::Conflict("Email already registered".to_string()));
    }

    let password_hash = password::hash_password(&req.password)?;

    let mut tx = state.db.begin().await?;
    let tenant = Tenant::create(&mut *tx, req.company_name.trim()).await?;
    let user = User::create(
        &mut *tx,
        tenant.id,
        CreateUser {
            email,
            password_hash,
            name: req.name.trim().to_string(),
            phone: None,
            role: UserRole::SuperAdmin,
            manager_id: None,
        },
    )
    .await?;
    tx.commit().await?;

    tracing::info!(tenant_id = %tenant.id, user_id = %user.id, "Registered new tenant");

    let tokens = jwt::issue_token_pair(user.id, tenant.id, state.jwt_secret())?;
    Ok(ApiResponse::created(SessionResponse { user, tokens }).message("Registration successful"))
}

/// Login endpoint
///
/// ```text
/// POST /v1/auth/login
/// {"email": "jane@acme.test", "password": "Secure-Pass1"}
/// ```
///
/// Unknown email, wrong password and deactivated accounts all answer 401
/// with the same message.
pub async fn login(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<LoginRequest>,
) -> ApiResult<ApiResponse<SessionResponse>> {
    req.validate()?;

    let invalid = || ApiError::Unauthorized("Invalid email or password".to_string());

    let user = User::find_by_email(&state.db, req.email.trim())
        .await?
        .ok_or_else(invalid)?;

    if !password::verify_password(&req.password, &user.password_hash)? || !user.is_active {
        tracing::debug!(user_id = %user.id, "Login rejected");
        return Err(invalid());
    }

    User::update_last_login(&state.db, user.id).await?;

    let tokens = jwt::issue_token_pair(user.id, user.tenant_id, state.jwt_secret())?;
    Ok(ApiResponse::ok(SessionResponse { user, tokens }).message("Login successful"))
}

/// Token refresh endpoint
///
/// ```text
/// POST /v1/auth/refresh
/// {"refreshToken": "eyJ..."}
/// ```
pub async fn refresh(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<RefreshRequest>,
) -> ApiResult<ApiResponse<RefreshResponse>> {
    let access_token = jwt::refresh_access_token(&req.refresh_token, state.jwt_secret())?;
    Ok(ApiResponse::ok(RefreshResponse { access_token }))
}
