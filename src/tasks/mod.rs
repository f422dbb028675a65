//! Tasks owned by users.
//!
//! The store knows nothing about callers. Ownership is decided by the
//! [`AccessGuard`](crate::identity::AccessGuard) once a task's `user_id` is known.

mod store;

pub use store::{NewTask, Task, TaskChanges, TaskStore};

pub const MAX_TITLE_CHARS: usize = 200;
pub const MAX_DESCRIPTION_CHARS: usize = 2000;

/// Trim and bound a task title.
///
/// # Errors
/// Returns a client-facing message when the title is blank or too long.
pub fn normalize_title(title: &str) -> Result<String, String> {
    let title = title.trim();
    if title.is_empty() {
        return Err("Title must not be empty".to_string());
    }
    if title.chars().count() > MAX_TITLE_CHARS {
        return Err(format!("Title must be at most {MAX_TITLE_CHARS} characters"));
    }
    Ok(title.to_string())
}

/// # Errors
/// Returns a client-facing message when the description is too long.
pub fn normalize_description(description: &str) -> Result<String, String> {
    if description.chars().count() > MAX_DESCRIPTION_CHARS {
        return Err(format!(
            "Description must be at most {MAX_DESCRIPTION_CHARS} characters"
        ));
    }
    Ok(description.to_string())
}
