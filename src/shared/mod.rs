//! Shared Module
//!
//! Types shared between the REST handlers and the realtime layer. Everything
//! here serializes with camelCase field names to match the JavaScript
//! clients' payload shapes.

/// Domain models (projects, boards, tasks, collections)
pub mod models;

/// Real-time event vocabulary
pub mod event;

/// Re-export commonly used types for convenience
pub use event::{ClientMessage, ServerEvent, SocketUser};
pub use models::board::{Board, Column};
pub use models::collection::Collection;
pub use models::project::Project;
pub use models::task::{Priority, Task};
