//! Current-user handler for GET /api/auth/me.

use axum::{http::StatusCode, response::Json};

use crate::backend::auth::handlers::types::UserResponse;
use crate::backend::middleware::auth::AuthUser;

pub async fn get_me(AuthUser(user): AuthUser) -> Result<Json<UserResponse>, StatusCode> {
    Ok(Json(UserResponse {
        id: user.user_id.to_string(),
        username: user.username,
        email: user.email,
    }))
}
