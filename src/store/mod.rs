//! Persistent store for users and tasks.
//!
//! Request handlers only see the [`UserStore`] and [`TaskStore`] traits.
//! Every task operation takes the owner id and filters on it, so a task
//! id alone never reaches another user's row.

pub mod schema;
pub mod sqlite;
pub mod types;

pub use sqlite::SqliteStore;
pub use types::{NewTask, Priority, Task, TaskPatch, TaskQuery, User};

use crate::error::ServiceError;

/// Store-layer errors.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("I/O error: {0}")]
    Io(String),

    #[error("record not found: {0}")]
    NotFound(String),

    #[error("duplicate record: {0}")]
    Duplicate(String),

    /// The owner id does not name a registered user.
    #[error("unknown owner: {0}")]
    UnknownOwner(String),

    #[error("corrupt record: {0}")]
    Corrupt(String),

    #[error("lock poisoned: {0}")]
    Lock(String),
}

impl From<StoreError> for ServiceError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(_) => ServiceError::NotFound("Task not found".into()),
            StoreError::Duplicate(what) => ServiceError::Conflict(what),
            StoreError::UnknownOwner(_) => {
                ServiceError::Forbidden("Token does not belong to a registered user.".into())
            }
            other => ServiceError::Store(other.to_string()),
        }
    }
}

/// Account records.
pub trait UserStore: Send + Sync {
    /// Insert a user. Fails with [`StoreError::Duplicate`] when the email
    /// is already registered.
    fn create_user(&self, email: &str, password_hash: &str) -> Result<User, StoreError>;

    fn find_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError>;

    fn find_user_by_id(&self, id: &str) -> Result<Option<User>, StoreError>;
}

/// Owner-scoped task records.
pub trait TaskStore: Send + Sync {
    /// Fails with [`StoreError::UnknownOwner`] when `owner_id` is not a
    /// registered user.
    fn insert_task(&self, owner_id: &str, task: NewTask) -> Result<Task, StoreError>;

    /// Fails with [`StoreError::NotFound`] unless `id` exists *and* belongs
    /// to `owner_id`.
    fn get_task(&self, owner_id: &str, id: &str) -> Result<Task, StoreError>;

    fn find_tasks(&self, owner_id: &str, query: &TaskQuery) -> Result<Vec<Task>, StoreError>;

    /// Merge `patch` into the owned task and return the updated record.
    fn update_task(&self, owner_id: &str, id: &str, patch: TaskPatch)
    -> Result<Task, StoreError>;

    fn delete_task(&self, owner_id: &str, id: &str) -> Result<(), StoreError>;
}
