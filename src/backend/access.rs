//! Access Control Check
//!
//! Pure membership predicates, evaluated on every board/task/collection
//! operation. There is no per-board or per-task ACL: access to anything is
//! always access to its owning project.

use uuid::Uuid;

use crate::shared::models::project::Project;

/// True when `user_id` is the project's creator or one of its members.
pub fn has_access(user_id: Uuid, project: &Project) -> bool {
    project.created_by == user_id || project.members.contains(&user_id)
}

/// True only for the project's creator. Gates destructive project-level
/// operations (delete project, delete board).
pub fn is_owner(user_id: Uuid, project: &Project) -> bool {
    project.created_by == user_id
}
