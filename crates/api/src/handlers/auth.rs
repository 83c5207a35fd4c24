//! Handlers for the `/auth` resource (register, login, current user).

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};
use skillforge_core::error::CoreError;
use skillforge_core::types::DbId;
use skillforge_db::models::user::{CreateUser, User, UserResponse};
use skillforge_db::repositories::{RoleRepo, UserRepo};
use validator::Validate;

use crate::auth::jwt::generate_access_token;
use crate::auth::password::{hash_password, verify_password};
use crate::error::{AppError, AppResult};
use crate::middleware::auth::AuthUser;
use crate::response::DataResponse;
use crate::state::AppState;
use crate::validation::validate_input;

// ---------------------------------------------------------------------------
// Request / response types
// ---------------------------------------------------------------------------

/// Request body for `POST /auth/register`.
#[derive(Debug, Deserialize, Validate)]
pub struct RegisterRequest {
    #[validate(length(min = 3, max = 30, message = "must be 3 to 30 characters"))]
    pub username: String,
    #[validate(email(message = "must be a valid email address"))]
    pub email: String,
    #[validate(length(min = 8, message = "must be at least 8 characters"))]
    pub password: String,
    pub name: Option<String>,
}

/// Request body for `POST /auth/login`. `login` accepts a username or email.
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    #[serde(alias = "username", alias = "email")]
    pub login: String,
    pub password: String,
}

/// Successful authentication response returned by register and login.
#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub access_token: String,
    /// Access token lifetime in seconds.
    pub expires_in: i64,
    pub user: UserResponse,
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// POST /api/v1/auth/register
///
/// Create an account and sign it in. New accounts hold no roles.
pub async fn register(
    State(state): State<AppState>,
    Json(input): Json<RegisterRequest>,
) -> AppResult<(StatusCode, Json<AuthResponse>)> {
    validate_input(&input)?;

    let username = input.username.trim();
    let email = input.email.trim().to_lowercase();
    if UserRepo::exists_by_username_or_email(&state.pool, username, &email).await? {
        return Err(AppError::Core(CoreError::Validation(
            "Username or email already exists".into(),
        )));
    }

    let password_hash = hash_password(&input.password)
        .map_err(|e| AppError::InternalError(format!("Password hashing error: {e}")))?;

    let user = UserRepo::create(
        &state.pool,
        &CreateUser {
            username: username.to_string(),
            email,
            name: input.name.clone(),
            password_hash,
        },
    )
    .await?;

    tracing::info!(user_id = user.id, username = %user.username, "User registered");

    let response = create_auth_response(&state, &user, Vec::new(), Vec::new()).await?;
    Ok((StatusCode::CREATED, Json(response)))
}

/// POST /api/v1/auth/login
///
/// Authenticate with username or email plus password.
pub async fn login(
    State(state): State<AppState>,
    Json(input): Json<LoginRequest>,
) -> AppResult<Json<AuthResponse>> {
    let invalid = || {
        AppError::Core(CoreError::Unauthorized(
            "Invalid username or password".into(),
        ))
    };

    let user = UserRepo::find_by_login(&state.pool, input.login.trim())
        .await?
        .ok_or_else(invalid)?;

    if !user.is_active {
        return Err(AppError::Core(CoreError::Forbidden(
            "Account is deactivated".into(),
        )));
    }

    let password_valid = verify_password(&input.password, &user.password_hash)
        .map_err(|e| AppError::InternalError(format!("Password verification error: {e}")))?;
    if !password_valid {
        tracing::warn!(user_id = user.id, "Failed login attempt");
        return Err(invalid());
    }

    let role_ids = RoleRepo::role_ids_for_user(&state.pool, user.id).await?;
    let permissions = RoleRepo::direct_permissions_for_user(&state.pool, user.id).await?;

    tracing::info!(user_id = user.id, roles = role_ids.len(), "User logged in");

    let response = create_auth_response(&state, &user, role_ids, permissions).await?;
    Ok(Json(response))
}

/// GET /api/v1/auth/me
///
/// The current user with role names as stored now, not as in the token.
pub async fn me(
    State(state): State<AppState>,
    auth_user: AuthUser,
) -> AppResult<Json<DataResponse<UserResponse>>> {
    let user = UserRepo::find_by_id(&state.pool, auth_user.user_id)
        .await?
        .ok_or(AppError::Core(CoreError::NotFound {
            entity: "User",
            id: auth_user.user_id,
        }))?;

    let role_ids = RoleRepo::role_ids_for_user(&state.pool, user.id).await?;
    let roles = state.roles.snapshot().await.role_names(&role_ids);

    Ok(Json(DataResponse {
        data: UserResponse::from_user(&user, roles),
    }))
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Sign an access token for `user` and build the response.
async fn create_auth_response(
    state: &AppState,
    user: &User,
    role_ids: Vec<DbId>,
    permissions: Vec<String>,
) -> AppResult<AuthResponse> {
    let access_token = generate_access_token(user.id, &role_ids, &permissions, &state.config.jwt)
        .map_err(|e| AppError::InternalError(format!("Token generation error: {e}")))?;

    let roles = state.roles.snapshot().await.role_names(&role_ids);

    Ok(AuthResponse {
        access_token,
        expires_in: state.config.jwt.access_token_expiry_mins * 60,
        user: UserResponse::from_user(user, roles),
    })
}
