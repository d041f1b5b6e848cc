//! Backend Module
//!
//! The Axum server: REST routes, authentication, the persistence gateway,
//! and the realtime board-collaboration core.
//!
//! # Architecture
//!
//! - **`server`** - initialization, application state, configuration
//! - **`routes`** - router assembly
//! - **`realtime`** - room registry, mutation broadcaster, drag-and-drop
//!   reconciler, WebSocket gateway
//! - **`store`** - persistence gateway trait with PostgreSQL and in-memory
//!   implementations
//! - **`access`** - project membership predicates
//! - **`auth`** - JWT sessions, user records, signup/login/me handlers
//! - **`projects`/`boards`/`tasks`/`collections`** - REST CRUD handlers
//! - **`middleware`** - bearer-token auth middleware
//! - **`error`** - the error taxonomy and its HTTP mapping

/// Project membership predicates
pub mod access;

/// Authentication and user management
pub mod auth;

/// Board endpoints
pub mod boards;

/// Collection endpoints
pub mod collections;

/// Backend error types
pub mod error;

/// Middleware for request processing
pub mod middleware;

/// Project endpoints
pub mod projects;

/// Real-time board collaboration core
pub mod realtime;

/// REST response envelope
pub mod response;

/// Route configuration
pub mod routes;

/// Server setup and state
pub mod server;

/// Persistence gateway
pub mod store;

/// Task endpoints
pub mod tasks;

/// Re-export commonly used types
pub use error::ApiError;
pub use realtime::{MoveReconciler, MutationBroadcaster, RoomRegistry};
pub use server::{create_app, AppState};
