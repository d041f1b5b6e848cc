//! Signup Handler
//!
//! POST /api/auth/signup: create a user, hash the password with bcrypt, and
//! return a token so the client is logged in immediately.

use axum::{extract::State, http::StatusCode, response::Json};
use sqlx::PgPool;

use crate::backend::auth::handlers::types::{AuthResponse, SignupRequest, UserResponse};
use crate::backend::auth::sessions::create_token;
use crate::backend::auth::users::{create_user, get_user_by_email, get_user_by_username};

pub async fn signup(
    State(pool): State<Option<PgPool>>,
    Json(request): Json<SignupRequest>,
) -> Result<(StatusCode, Json<AuthResponse>), StatusCode> {
    let pool = pool.ok_or_else(|| {
        tracing::error!("Database not configured");
        StatusCode::SERVICE_UNAVAILABLE
    })?;

    if request.username.len() < 3 || request.password.len() < 8 || !request.email.contains('@') {
        return Err(StatusCode::BAD_REQUEST);
    }

    // Reject duplicates up front for a friendlier status than a raw
    // constraint violation.
    let email_taken = get_user_by_email(&pool, &request.email)
        .await
        .map_err(|e| {
            tracing::error!("Database error: {:?}", e);
            StatusCode::INTERNAL_SERVER_ERROR
        })?
        .is_some();
    let username_taken = get_user_by_username(&pool, &request.username)
        .await
        .map_err(|e| {
            tracing::error!("Database error: {:?}", e);
            StatusCode::INTERNAL_SERVER_ERROR
        })?
        .is_some();
    if email_taken || username_taken {
        return Err(StatusCode::CONFLICT);
    }

    let password_hash = bcrypt::hash(&request.password, bcrypt::DEFAULT_COST).map_err(|e| {
        tracing::error!("Password hashing error: {:?}", e);
        StatusCode::INTERNAL_SERVER_ERROR
    })?;

    let user = create_user(&pool, request.username, request.email, password_hash)
        .await
        .map_err(|e| {
            tracing::error!("Failed to create user: {:?}", e);
            StatusCode::INTERNAL_SERVER_ERROR
        })?;

    let token = create_token(user.id, user.email.clone(), user.username.clone()).map_err(|e| {
        tracing::error!("Failed to create token: {:?}", e);
        StatusCode::INTERNAL_SERVER_ERROR
    })?;

    tracing::info!("User created: {} ({})", user.username, user.email);

    Ok((
        StatusCode::CREATED,
        Json(AuthResponse {
            token,
            user: UserResponse {
                id: user.id.to_string(),
                username: user.username,
                email: user.email,
            },
        }),
    ))
}
