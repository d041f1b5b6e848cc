//! Real-time board collaboration core.
//!
//! Four pieces:
//!
//! - **`registry`** - in-memory presence: which connection is in which room,
//!   and the fan-out primitive every broadcast goes through.
//! - **`broadcaster`** - access check → persist → broadcast, for every task,
//!   subtask, collection, and column mutation.
//! - **`reconciler`** - drag-and-drop moves: optimistic broadcast first, then
//!   durable reordering, then a confirmation or a `task:move_failed` revert.
//! - **`socket`** - the WebSocket gateway dispatching client frames into the
//!   three above.
//!
//! The broadcaster and reconciler receive the registry and the store at
//! construction and are shared between the socket dispatcher and the REST
//! handlers, so both surfaces produce identical room traffic.

pub mod broadcaster;
pub mod locks;
pub mod reconciler;
pub mod registry;
pub mod socket;

pub use broadcaster::MutationBroadcaster;
pub use locks::BoardLocks;
pub use reconciler::MoveReconciler;
pub use registry::{RoomMember, RoomRegistry};
