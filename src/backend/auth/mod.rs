//! Authentication and user management.

pub mod handlers;
pub mod sessions;
pub mod users;

pub use handlers::{get_me, login, signup};
