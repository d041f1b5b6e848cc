//! Flowboard - Main Library
//!
//! Flowboard is a project/task-tracking backend with real-time board
//! collaboration. Clients talk to it over a small REST API and a WebSocket
//! event channel; every task/column mutation is persisted and then fanned
//! out to the board's connected users.
//!
//! # Module Structure
//!
//! - **`shared`** - Types shared between the REST surface and the realtime
//!   layer: domain models (projects, boards, tasks, collections) and the
//!   socket event vocabulary.
//!
//! - **`backend`** - The Axum server: routes, auth, persistence gateway,
//!   and the realtime core (room registry, mutation broadcaster,
//!   drag-and-drop reconciler).

/// Types shared between the REST surface and the realtime layer
pub mod shared;

/// Server-side code
pub mod backend;
