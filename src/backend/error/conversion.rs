//! Error Conversion
//!
//! `IntoResponse` for [`ApiError`], producing the `{"success": false,
//! "error": ...}` body shape clients expect, with the status class from the
//! taxonomy.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};

use crate::backend::error::types::ApiError;

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!("request failed: {}", self);
        }

        let body = serde_json::json!({
            "success": false,
            "error": self.to_string(),
        });

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_response_body() {
        let response = ApiError::access_denied("project").into_response();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }
}
