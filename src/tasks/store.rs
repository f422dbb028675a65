use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, RwLock};
use tracing::debug;
use utoipa::ToSchema;

use crate::identity::{Clock, StoreError};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, ToSchema)]
pub struct Task {
    pub id: i64,
    /// Owner.
    pub user_id: i64,
    pub title: String,
    pub description: String,
    pub completed: bool,
    pub created_at: i64,
    pub updated_at: i64,
}

/// Already validated input for a new task.
#[derive(Debug)]
pub struct NewTask {
    pub user_id: i64,
    pub title: String,
    pub description: String,
}

/// Partial update; `None` leaves the field alone.
#[derive(Debug, Default)]
pub struct TaskChanges {
    pub title: Option<String>,
    pub description: Option<String>,
    pub completed: Option<bool>,
}

#[derive(Default)]
struct TaskTable {
    tasks: BTreeMap<i64, Task>,
    next_id: i64,
}

pub struct TaskStore {
    table: RwLock<TaskTable>,
    clock: Arc<dyn Clock>,
}

impl fmt::Debug for TaskStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskStore")
            .field("clock", &self.clock)
            .finish_non_exhaustive()
    }
}

fn poisoned() -> StoreError {
    StoreError::Backend("task table lock poisoned".to_string())
}

impl TaskStore {
    #[must_use]
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            table: RwLock::new(TaskTable::default()),
            clock,
        }
    }

    /// # Errors
    /// Returns `StoreError::Backend` if the table is unusable.
    pub fn create(&self, new_task: NewTask) -> Result<Task, StoreError> {
        let now = self.clock.now_unix_seconds();
        let mut table = self.table.write().map_err(|_| poisoned())?;
        table.next_id += 1;
        let task = Task {
            id: table.next_id,
            user_id: new_task.user_id,
            title: new_task.title,
            description: new_task.description,
            completed: false,
            created_at: now,
            updated_at: now,
        };
        table.tasks.insert(task.id, task.clone());
        debug!(task_id = task.id, user_id = task.user_id, "task created");
        Ok(task)
    }

    /// # Errors
    /// Returns `StoreError::Backend` if the table is unusable.
    pub fn get(&self, id: i64) -> Result<Option<Task>, StoreError> {
        let table = self.table.read().map_err(|_| poisoned())?;
        Ok(table.tasks.get(&id).cloned())
    }

    /// Tasks ordered by id, restricted to `owner` when given.
    ///
    /// # Errors
    /// Returns `StoreError::Backend` if the table is unusable.
    pub fn list(&self, owner: Option<i64>) -> Result<Vec<Task>, StoreError> {
        let table = self.table.read().map_err(|_| poisoned())?;
        Ok(table
            .tasks
            .values()
            .filter(|task| owner.is_none_or(|owner| task.user_id == owner))
            .cloned()
            .collect())
    }

    /// # Errors
    /// Returns `StoreError::NotFound` if the task does not exist.
    pub fn update(&self, id: i64, changes: TaskChanges) -> Result<Task, StoreError> {
        let now = self.clock.now_unix_seconds();
        let mut table = self.table.write().map_err(|_| poisoned())?;
        let task = table.tasks.get_mut(&id).ok_or(StoreError::NotFound)?;
        if let Some(title) = changes.title {
            task.title = title;
        }
        if let Some(description) = changes.description {
            task.description = description;
        }
        if let Some(completed) = changes.completed {
            task.completed = completed;
        }
        task.updated_at = now;
        Ok(task.clone())
    }

    /// # Errors
    /// Returns `StoreError::NotFound` if the task does not exist.
    pub fn delete(&self, id: i64) -> Result<(), StoreError> {
        let mut table = self.table.write().map_err(|_| poisoned())?;
        table.tasks.remove(&id).ok_or(StoreError::NotFound)?;
        debug!(task_id = id, "task deleted");
        Ok(())
    }

    /// # Errors
    /// Returns `StoreError::Backend` if the table is unusable.
    pub fn count(&self) -> Result<usize, StoreError> {
        let table = self.table.read().map_err(|_| poisoned())?;
        Ok(table.tasks.len())
    }
}
