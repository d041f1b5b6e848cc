//! Login Handler
//!
//! POST /api/auth/login: verify the password with bcrypt and return a JWT.
//! Unknown user and wrong password return the same 401 so accounts cannot
//! be enumerated.

use axum::{extract::State, http::StatusCode, response::Json};
use bcrypt::verify;
use sqlx::PgPool;

use crate::backend::auth::handlers::types::{AuthResponse, LoginRequest, UserResponse};
use crate::backend::auth::sessions::create_token;
use crate::backend::auth::users::{get_user_by_email, get_user_by_username};

pub async fn login(
    State(pool): State<Option<PgPool>>,
    Json(request): Json<LoginRequest>,
) -> Result<Json<AuthResponse>, StatusCode> {
    let pool = pool.ok_or_else(|| {
        tracing::error!("Database not configured");
        StatusCode::SERVICE_UNAVAILABLE
    })?;
    tracing::info!("Login request for: {}", request.username);

    // The field accepts a username or an email.
    let user = if request.username.contains('@') {
        get_user_by_email(&pool, &request.username).await
    } else {
        get_user_by_username(&pool, &request.username).await
    };

    let user = user
        .map_err(|e| {
            tracing::error!("Database error: {:?}", e);
            StatusCode::INTERNAL_SERVER_ERROR
        })?
        .ok_or_else(|| {
            tracing::warn!("User not found: {}", request.username);
            StatusCode::UNAUTHORIZED
        })?;

    let valid = verify(&request.password, &user.password_hash).map_err(|e| {
        tracing::error!("Password verification error: {:?}", e);
        StatusCode::INTERNAL_SERVER_ERROR
    })?;

    if !valid {
        tracing::warn!("Invalid password for user: {}", request.username);
        return Err(StatusCode::UNAUTHORIZED);
    }

    let token = create_token(user.id, user.email.clone(), user.username.clone()).map_err(|e| {
        tracing::error!("Failed to create token: {:?}", e);
        StatusCode::INTERNAL_SERVER_ERROR
    })?;

    tracing::info!("User logged in: {} ({})", user.username, user.email);

    Ok(Json(AuthResponse {
        token,
        user: UserResponse {
            id: user.id.to_string(),
            username: user.username,
            email: user.email,
        },
    }))
}
