//! Application State
//!
//! `AppState` is the central state container. The broadcaster and
//! reconciler are constructed once at startup with their registry and store
//! handles and shared by every surface (REST and socket), so there is no
//! late-bound global realtime handle anywhere.

use std::sync::Arc;

use axum::extract::FromRef;
use sqlx::PgPool;

use crate::backend::realtime::{MoveReconciler, MutationBroadcaster, RoomRegistry};
use crate::backend::store::Store;

#[derive(Clone)]
pub struct AppState {
    /// Persistence gateway for projects/boards/tasks/collections.
    pub store: Arc<dyn Store>,
    /// PostgreSQL pool for user records; `None` disables the auth endpoints.
    pub db_pool: Option<PgPool>,
    /// In-memory room membership, the only shared mutable in-memory state.
    pub rooms: Arc<RoomRegistry>,
    /// Access check → persist → broadcast for every mutation.
    pub broadcaster: Arc<MutationBroadcaster>,
    /// Optimistic drag-and-drop move pipeline.
    pub reconciler: Arc<MoveReconciler>,
}

impl FromRef<AppState> for Arc<dyn Store> {
    fn from_ref(app_state: &AppState) -> Self {
        app_state.store.clone()
    }
}

impl FromRef<AppState> for Option<PgPool> {
    fn from_ref(app_state: &AppState) -> Self {
        app_state.db_pool.clone()
    }
}

impl FromRef<AppState> for Arc<RoomRegistry> {
    fn from_ref(app_state: &AppState) -> Self {
        app_state.rooms.clone()
    }
}

impl FromRef<AppState> for Arc<MutationBroadcaster> {
    fn from_ref(app_state: &AppState) -> Self {
        app_state.broadcaster.clone()
    }
}

impl FromRef<AppState> for Arc<MoveReconciler> {
    fn from_ref(app_state: &AppState) -> Self {
        app_state.reconciler.clone()
    }
}
