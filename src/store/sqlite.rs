//! SQLite-backed user and task store.
//!
//! A single database file holds both tables. Thread-safe via an internal
//! `Mutex<Connection>`; every statement is short, so handlers call it
//! directly.

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use rusqlite::{Connection, ErrorCode, OptionalExtension, params};

use super::schema::{apply_schema, read_schema_version};
use super::types::{NewTask, Priority, Task, TaskPatch, TaskQuery, User, new_id, now_epoch_secs};
use super::{StoreError, TaskStore, UserStore};

const TASK_COLUMNS: &str =
    "id, owner_id, title, description, is_complete, due_at_ms, priority, category";

/// SQLite-backed store.
pub struct SqliteStore {
    path: Option<PathBuf>,
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open (or create) the database at `path`, creating parent directories.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| StoreError::Io(e.to_string()))?;
        }
        let conn = Connection::open(path)?;
        apply_schema(&conn)?;
        Ok(Self {
            path: Some(path.to_path_buf()),
            conn: Mutex::new(conn),
        })
    }

    /// Private in-memory database, used by tests and throwaway runs.
    pub fn in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        apply_schema(&conn)?;
        Ok(Self {
            path: None,
            conn: Mutex::new(conn),
        })
    }

    /// Database file path, `None` for in-memory stores.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Read the current schema version from the database.
    pub fn schema_version(&self) -> Result<Option<u32>, StoreError> {
        let conn = self.lock()?;
        Ok(read_schema_version(&conn)?)
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>, StoreError> {
        self.conn
            .lock()
            .map_err(|e| StoreError::Lock(e.to_string()))
    }
}

impl UserStore for SqliteStore {
    fn create_user(&self, email: &str, password_hash: &str) -> Result<User, StoreError> {
        let conn = self.lock()?;
        let user = User {
            id: new_id(),
            email: email.to_owned(),
            password_hash: password_hash.to_owned(),
            created_at: now_epoch_secs(),
        };

        let inserted = conn.execute(
            "INSERT INTO users (id, email, password_hash, created_at) VALUES (?1, ?2, ?3, ?4)",
            params![user.id, user.email, user.password_hash, user.created_at],
        );
        match inserted {
            Ok(_) => Ok(user),
            Err(rusqlite::Error::SqliteFailure(e, _)) if e.code == ErrorCode::ConstraintViolation => {
                Err(StoreError::Duplicate(format!("email '{email}' is already registered")))
            }
            Err(e) => Err(StoreError::Sqlite(e)),
        }
    }

    fn find_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let conn = self.lock()?;
        let user = conn
            .query_row(
                "SELECT id, email, password_hash, created_at FROM users WHERE email = ?1",
                params![email],
                row_to_user,
            )
            .optional()?;
        Ok(user)
    }

    fn find_user_by_id(&self, id: &str) -> Result<Option<User>, StoreError> {
        let conn = self.lock()?;
        let user = conn
            .query_row(
                "SELECT id, email, password_hash, created_at FROM users WHERE id = ?1",
                params![id],
                row_to_user,
            )
            .optional()?;
        Ok(user)
    }
}

impl TaskStore for SqliteStore {
    fn insert_task(&self, owner_id: &str, task: NewTask) -> Result<Task, StoreError> {
        let conn = self.lock()?;
        let task = Task {
            id: new_id(),
            owner_id: owner_id.to_owned(),
            title: task.title,
            description: task.description,
            is_complete: task.is_complete,
            due_date: task.due_date,
            priority: task.priority,
            category: task.category,
        };

        let inserted = conn.execute(
            "INSERT INTO tasks \
             (id, owner_id, title, description, is_complete, due_at_ms, priority, category, \
              created_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                task.id,
                task.owner_id,
                task.title,
                task.description,
                task.is_complete,
                task.due_date.timestamp_millis(),
                task.priority.as_str(),
                task.category,
                now_epoch_secs()
            ],
        );
        match inserted {
            Ok(_) => {}
            Err(rusqlite::Error::SqliteFailure(e, _)) if e.code == ErrorCode::ConstraintViolation => {
                return Err(StoreError::UnknownOwner(owner_id.to_owned()));
            }
            Err(e) => return Err(StoreError::Sqlite(e)),
        }

        Ok(task)
    }

    fn get_task(&self, owner_id: &str, id: &str) -> Result<Task, StoreError> {
        let conn = self.lock()?;
        select_owned(&conn, owner_id, id)?.ok_or_else(|| StoreError::NotFound(id.to_owned()))
    }

    fn find_tasks(&self, owner_id: &str, query: &TaskQuery) -> Result<Vec<Task>, StoreError> {
        let conn = self.lock()?;
        let base = format!("SELECT {TASK_COLUMNS} FROM tasks WHERE owner_id = ?1");

        let (sql, rows) = match query {
            TaskQuery::All => {
                let sql = format!("{base} ORDER BY due_at_ms ASC");
                let mut stmt = conn.prepare(&sql)?;
                let rows = collect(stmt.query_map(params![owner_id], row_to_task)?)?;
                (sql, rows)
            }
            TaskQuery::DueBetween { start, end } => {
                let sql = format!("{base} AND due_at_ms >= ?2 AND due_at_ms <= ?3 ORDER BY due_at_ms ASC");
                let mut stmt = conn.prepare(&sql)?;
                let rows = collect(stmt.query_map(
                    params![owner_id, start.timestamp_millis(), end.timestamp_millis()],
                    row_to_task,
                )?)?;
                (sql, rows)
            }
            TaskQuery::Overdue { now } => {
                let sql = format!("{base} AND due_at_ms < ?2 AND is_complete = 0 ORDER BY due_at_ms ASC");
                let mut stmt = conn.prepare(&sql)?;
                let rows = collect(
                    stmt.query_map(params![owner_id, now.timestamp_millis()], row_to_task)?,
                )?;
                (sql, rows)
            }
            TaskQuery::Category(category) => {
                let sql = format!("{base} AND category = ?2 ORDER BY due_at_ms ASC");
                let mut stmt = conn.prepare(&sql)?;
                let rows = collect(stmt.query_map(params![owner_id, category], row_to_task)?)?;
                (sql, rows)
            }
            TaskQuery::Priority(priority) => {
                let sql = format!("{base} AND priority = ?2 ORDER BY due_at_ms ASC");
                let mut stmt = conn.prepare(&sql)?;
                let rows =
                    collect(stmt.query_map(params![owner_id, priority.as_str()], row_to_task)?)?;
                (sql, rows)
            }
        };

        tracing::trace!(owner_id, sql = %sql, hits = rows.len(), "task query");
        Ok(rows)
    }

    fn update_task(
        &self,
        owner_id: &str,
        id: &str,
        patch: TaskPatch,
    ) -> Result<Task, StoreError> {
        let conn = self.lock()?;
        let tx = conn.unchecked_transaction()?;

        let mut task =
            select_owned(&tx, owner_id, id)?.ok_or_else(|| StoreError::NotFound(id.to_owned()))?;
        patch.apply_to(&mut task);

        tx.execute(
            "UPDATE tasks SET title = ?1, description = ?2, is_complete = ?3, due_at_ms = ?4, \
             priority = ?5, category = ?6 WHERE id = ?7 AND owner_id = ?8",
            params![
                task.title,
                task.description,
                task.is_complete,
                task.due_date.timestamp_millis(),
                task.priority.as_str(),
                task.category,
                id,
                owner_id
            ],
        )?;
        tx.commit()?;

        Ok(task)
    }

    fn delete_task(&self, owner_id: &str, id: &str) -> Result<(), StoreError> {
        let conn = self.lock()?;
        let rows = conn.execute(
            "DELETE FROM tasks WHERE id = ?1 AND owner_id = ?2",
            params![id, owner_id],
        )?;
        if rows == 0 {
            return Err(StoreError::NotFound(id.to_owned()));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Row conversion helpers
// ---------------------------------------------------------------------------

fn select_owned(conn: &Connection, owner_id: &str, id: &str) -> Result<Option<Task>, StoreError> {
    let sql = format!("SELECT {TASK_COLUMNS} FROM tasks WHERE id = ?1 AND owner_id = ?2");
    let task = conn
        .query_row(&sql, params![id, owner_id], row_to_task)
        .optional()?;
    Ok(task)
}

fn collect<I>(rows: I) -> Result<Vec<Task>, StoreError>
where
    I: Iterator<Item = rusqlite::Result<Task>>,
{
    let mut tasks = Vec::new();
    for r in rows {
        tasks.push(r?);
    }
    Ok(tasks)
}

fn row_to_user(row: &rusqlite::Row<'_>) -> rusqlite::Result<User> {
    Ok(User {
        id: row.get(0)?,
        email: row.get(1)?,
        password_hash: row.get(2)?,
        created_at: row.get(3)?,
    })
}

fn row_to_task(row: &rusqlite::Row<'_>) -> rusqlite::Result<Task> {
    let due_ms: i64 = row.get(5)?;
    let priority_str: String = row.get(6)?;

    Ok(Task {
        id: row.get(0)?,
        owner_id: row.get(1)?,
        title: row.get(2)?,
        description: row.get(3)?,
        is_complete: row.get(4)?,
        due_date: millis_to_datetime(due_ms).map_err(|e| conversion_error(5, e))?,
        priority: str_to_priority(&priority_str),
        category: row.get(7)?,
    })
}

fn millis_to_datetime(ms: i64) -> Result<DateTime<Utc>, StoreError> {
    DateTime::from_timestamp_millis(ms)
        .ok_or_else(|| StoreError::Corrupt(format!("due_at_ms {ms} is out of range")))
}

fn conversion_error(column: usize, err: StoreError) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(column, rusqlite::types::Type::Integer, Box::new(err))
}

fn str_to_priority(s: &str) -> Priority {
    match s {
        "low" => Priority::Low,
        "high" => Priority::High,
        _ => Priority::Medium, // safe fallback
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

    use super::super::types::CURRENT_SCHEMA_VERSION;
    use super::*;
    use chrono::TimeZone;

    fn test_store() -> SqliteStore {
        SqliteStore::in_memory().expect("create in-memory store")
    }

    fn new_task(title: &str, due: DateTime<Utc>) -> NewTask {
        NewTask {
            title: title.to_owned(),
            description: String::new(),
            is_complete: false,
            due_date: due,
            priority: Priority::Medium,
            category: String::new(),
        }
    }

    fn at(day: u32, hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, day, hour, 0, 0).unwrap()
    }

    #[test]
    fn file_store_creates_schema() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("data").join("tasks.db");
        let store = SqliteStore::open(&path).expect("open");
        assert!(path.exists());
        assert_eq!(store.path(), Some(path.as_path()));
        assert_eq!(store.schema_version().expect("version"), Some(CURRENT_SCHEMA_VERSION));
    }

    #[test]
    fn duplicate_email_is_reported() {
        let store = test_store();
        store.create_user("a@example.com", "hash").expect("first");
        let err = store.create_user("a@example.com", "hash").unwrap_err();
        assert!(matches!(err, StoreError::Duplicate(_)), "got {err:?}");
    }

    #[test]
    fn users_are_found_by_email_and_id() {
        let store = test_store();
        let user = store.create_user("a@example.com", "hash").expect("create");
        let by_email = store.find_user_by_email("a@example.com").expect("query");
        assert_eq!(by_email.as_ref().map(|u| u.id.as_str()), Some(user.id.as_str()));
        let by_id = store.find_user_by_id(&user.id).expect("query");
        assert_eq!(by_id.map(|u| u.email), Some("a@example.com".to_owned()));
        assert!(store.find_user_by_email("b@example.com").expect("query").is_none());
    }

    #[test]
    fn insert_then_get_round_trips() {
        let store = test_store();
        let owner = store.create_user("a@example.com", "hash").expect("user");
        let mut input = new_task("Report", at(10, 9));
        input.description = "quarterly".into();
        input.priority = Priority::High;
        input.category = "work".into();

        let created = store.insert_task(&owner.id, input).expect("insert");
        let fetched = store.get_task(&owner.id, &created.id).expect("get");
        assert_eq!(created, fetched);
    }

    #[test]
    fn other_owner_cannot_see_update_or_delete() {
        let store = test_store();
        let alice = store.create_user("alice@example.com", "hash").expect("alice");
        let bob = store.create_user("bob@example.com", "hash").expect("bob");
        let task = store
            .insert_task(&alice.id, new_task("Secret", at(10, 9)))
            .expect("insert");

        assert!(matches!(
            store.get_task(&bob.id, &task.id),
            Err(StoreError::NotFound(_))
        ));
        let patch = TaskPatch {
            title: Some("Hijacked".into()),
            ..TaskPatch::default()
        };
        assert!(matches!(
            store.update_task(&bob.id, &task.id, patch),
            Err(StoreError::NotFound(_))
        ));
        assert!(matches!(
            store.delete_task(&bob.id, &task.id),
            Err(StoreError::NotFound(_))
        ));
        assert!(store.find_tasks(&bob.id, &TaskQuery::All).expect("list").is_empty());

        let still_there = store.get_task(&alice.id, &task.id).expect("owner get");
        assert_eq!(still_there.title, "Secret");
    }

    #[test]
    fn insert_for_unregistered_owner_is_rejected() {
        let store = test_store();
        let err = store
            .insert_task("no-such-user", new_task("Orphan", at(10, 9)))
            .unwrap_err();
        assert!(matches!(err, StoreError::UnknownOwner(_)), "got {err:?}");
    }

    #[test]
    fn update_merges_and_persists() {
        let store = test_store();
        let owner = store.create_user("a@example.com", "hash").expect("user");
        let task = store.insert_task(&owner.id, new_task("Draft", at(10, 9))).expect("insert");

        let patch = TaskPatch {
            is_complete: Some(true),
            category: Some("home".into()),
            ..TaskPatch::default()
        };
        let updated = store.update_task(&owner.id, &task.id, patch).expect("update");
        assert!(updated.is_complete);
        assert_eq!(updated.title, "Draft");
        assert_eq!(store.get_task(&owner.id, &task.id).expect("get"), updated);
    }

    #[test]
    fn delete_removes_only_once() {
        let store = test_store();
        let owner = store.create_user("a@example.com", "hash").expect("user");
        let task = store.insert_task(&owner.id, new_task("Gone", at(10, 9))).expect("insert");
        store.delete_task(&owner.id, &task.id).expect("delete");
        assert!(matches!(
            store.delete_task(&owner.id, &task.id),
            Err(StoreError::NotFound(_))
        ));
    }

    #[test]
    fn due_between_is_inclusive_on_both_ends() {
        let store = test_store();
        let owner = store.create_user("a@example.com", "hash").expect("user");
        for (title, due) in [("before", at(9, 23)), ("start", at(10, 0)), ("end", at(11, 0)), ("after", at(11, 1))] {
            store.insert_task(&owner.id, new_task(title, due)).expect("insert");
        }

        let hits = store
            .find_tasks(
                &owner.id,
                &TaskQuery::DueBetween {
                    start: at(10, 0),
                    end: at(11, 0),
                },
            )
            .expect("query");
        let titles: Vec<_> = hits.iter().map(|t| t.title.as_str()).collect();
        assert_eq!(titles, ["start", "end"]);
    }

    #[test]
    fn overdue_excludes_completed_and_future() {
        let store = test_store();
        let owner = store.create_user("a@example.com", "hash").expect("user");
        store.insert_task(&owner.id, new_task("late", at(1, 0))).expect("insert");
        let mut done = new_task("done", at(1, 0));
        done.is_complete = true;
        store.insert_task(&owner.id, done).expect("insert");
        store.insert_task(&owner.id, new_task("future", at(20, 0))).expect("insert");

        let hits = store
            .find_tasks(&owner.id, &TaskQuery::Overdue { now: at(10, 0) })
            .expect("query");
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].title, "late");
    }

    #[test]
    fn category_and_priority_queries_match_exactly() {
        let store = test_store();
        let owner = store.create_user("a@example.com", "hash").expect("user");
        let mut work = new_task("work", at(10, 0));
        work.category = "work".into();
        work.priority = Priority::High;
        store.insert_task(&owner.id, work).expect("insert");
        store.insert_task(&owner.id, new_task("other", at(10, 0))).expect("insert");

        let by_cat = store
            .find_tasks(&owner.id, &TaskQuery::Category("work".into()))
            .expect("query");
        assert_eq!(by_cat.len(), 1);
        let by_prio = store
            .find_tasks(&owner.id, &TaskQuery::Priority(Priority::Medium))
            .expect("query");
        assert_eq!(by_prio.len(), 1);
        assert_eq!(by_prio[0].title, "other");
    }
}
