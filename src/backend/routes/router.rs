//! Router Configuration
//!
//! Assembles the REST surface and the WebSocket endpoint. Signup/login and
//! the socket upgrade are public (the upgrade authenticates its own token
//! before any room operation); everything else under `/api` sits behind the
//! auth middleware.

use axum::routing::{get, post, put};
use axum::{middleware, Json, Router};
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;

use crate::backend::auth::{get_me, login, signup};
use crate::backend::boards::handlers as boards;
use crate::backend::collections::handlers as collections;
use crate::backend::middleware::auth::auth_middleware;
use crate::backend::projects::handlers as projects;
use crate::backend::realtime::socket::handle_socket_upgrade;
use crate::backend::server::state::AppState;
use crate::backend::tasks::handlers as tasks;

async fn root() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "message": "Flowboard Backend API is running!" }))
}

/// Create the Axum router with all routes configured.
pub fn create_router(app_state: AppState) -> Router<()> {
    let protected = Router::new()
        .route("/api/auth/me", get(get_me))
        // Projects
        .route(
            "/api/projects",
            get(projects::get_projects).post(projects::create_project),
        )
        .route(
            "/api/projects/{id}",
            get(projects::get_project)
                .put(projects::update_project)
                .delete(projects::delete_project),
        )
        // Boards
        .route(
            "/api/boards",
            get(boards::get_boards).post(boards::create_board),
        )
        .route(
            "/api/boards/{id}",
            get(boards::get_board)
                .put(boards::update_board)
                .delete(boards::delete_board),
        )
        .route("/api/boards/{id}/columns", put(boards::update_board_columns))
        // Tasks
        .route("/api/tasks", get(tasks::get_tasks).post(tasks::create_task))
        .route(
            "/api/tasks/{id}",
            get(tasks::get_task)
                .put(tasks::update_task)
                .delete(tasks::delete_task),
        )
        .route("/api/tasks/{id}/move", put(tasks::move_task))
        .route(
            "/api/tasks/{id}/subtasks",
            get(tasks::get_subtasks).post(tasks::create_subtask),
        )
        // Collections
        .route(
            "/api/collections",
            get(collections::get_collections).post(collections::create_collection),
        )
        .route(
            "/api/collections/reorder",
            put(collections::reorder_collections),
        )
        .route(
            "/api/collections/{id}",
            get(collections::get_collection)
                .put(collections::update_collection)
                .delete(collections::delete_collection),
        )
        .route_layer(middleware::from_fn_with_state(
            app_state.clone(),
            auth_middleware,
        ));

    Router::new()
        .route("/", get(root))
        .route("/ws", get(handle_socket_upgrade))
        .route("/api/auth/signup", post(signup))
        .route("/api/auth/login", post(login))
        .merge(protected)
        .nest_service("/static", ServeDir::new("public"))
        .fallback(|| async { "404 Not Found" })
        .layer(CorsLayer::permissive())
        .with_state(app_state)
}
