//! Server Initialization
//!
//! Wires the store, the room registry, and the realtime core together into
//! the application state, then hands the state to the router. The
//! broadcaster and reconciler are constructed exactly once here; REST
//! handlers and the socket dispatcher both receive them through `AppState`.

use std::sync::Arc;

use axum::Router;
use sqlx::PgPool;

use crate::backend::realtime::{BoardLocks, MoveReconciler, MutationBroadcaster, RoomRegistry};
use crate::backend::routes::router::create_router;
use crate::backend::server::config::load_database;
use crate::backend::server::state::AppState;
use crate::backend::store::{MemoryStore, PgStore, Store};

/// Build the application state around a store.
///
/// Tests call this directly with a `MemoryStore`; production wiring goes
/// through [`create_app`].
pub fn build_state(store: Arc<dyn Store>, db_pool: Option<PgPool>) -> AppState {
    let rooms = Arc::new(RoomRegistry::new());
    let locks = Arc::new(BoardLocks::new());
    let broadcaster = Arc::new(MutationBroadcaster::new(
        store.clone(),
        rooms.clone(),
        locks.clone(),
    ));
    let reconciler = Arc::new(MoveReconciler::new(store.clone(), rooms.clone(), locks));
    AppState {
        store,
        db_pool,
        rooms,
        broadcaster,
        reconciler,
    }
}

/// Create and configure the Axum application.
pub async fn create_app() -> Router<()> {
    tracing::info!("Initializing Flowboard backend server");

    let db_pool = load_database().await;
    let store: Arc<dyn Store> = match &db_pool {
        Some(pool) => Arc::new(PgStore::new(pool.clone())),
        None => {
            tracing::warn!("Running on the in-memory store; state will not survive a restart");
            Arc::new(MemoryStore::new())
        }
    };

    let app_state = build_state(store, db_pool);
    tracing::info!("Realtime core and store initialized");

    create_router(app_state)
}
