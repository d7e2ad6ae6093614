//! SQLite-backed task store implementation.
//!
//! Active tasks and archived history live in two tables of the same database.
//! One connection behind one mutex serializes every operation.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection};

use super::{Metadata, Task, TaskStore, TaskStoreError};

const TASK_COLUMNS: &str = "id, anime_title, target_dir, source, dmhy_mode, metadata, custom_keywords, status, progress, error_message, created_at, updated_at";

/// SQLite-backed task store.
pub struct SqliteTaskStore {
    conn: Mutex<Connection>,
}

impl SqliteTaskStore {
    /// Open (or create) the database file and its tables.
    pub fn new(path: &Path) -> Result<Self, TaskStoreError> {
        let conn = Connection::open(path)?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Create an in-memory SQLite task store (useful for testing).
    pub fn in_memory() -> Result<Self, TaskStoreError> {
        let conn = Connection::open_in_memory()?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn initialize_schema(conn: &Connection) -> Result<(), TaskStoreError> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS tasks (
                id TEXT PRIMARY KEY,
                anime_title TEXT NOT NULL,
                target_dir TEXT NOT NULL,
                source TEXT NOT NULL,
                dmhy_mode TEXT NOT NULL,
                metadata TEXT,
                custom_keywords TEXT,
                status TEXT NOT NULL,
                progress REAL NOT NULL DEFAULT 0,
                error_message TEXT,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS task_history (
                seq INTEGER PRIMARY KEY AUTOINCREMENT,
                id TEXT NOT NULL,
                anime_title TEXT NOT NULL,
                target_dir TEXT NOT NULL,
                source TEXT NOT NULL,
                dmhy_mode TEXT NOT NULL,
                metadata TEXT,
                custom_keywords TEXT,
                status TEXT NOT NULL,
                progress REAL NOT NULL DEFAULT 0,
                error_message TEXT,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                archived_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_tasks_created_at ON tasks(created_at);
            CREATE INDEX IF NOT EXISTS idx_task_history_id ON task_history(id);
            "#,
        )?;
        Ok(())
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, TaskStoreError> {
        self.conn.lock().map_err(|_| TaskStoreError::LockPoisoned)
    }

    fn insert_active(conn: &Connection, task: &Task) -> Result<(), TaskStoreError> {
        // Archived ids stay reserved; the active table's primary key covers the rest.
        let archived: bool = conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM task_history WHERE id = ?)",
            params![task.id],
            |row| row.get(0),
        )?;
        if archived {
            return Err(TaskStoreError::Duplicate(task.id.clone()));
        }

        let metadata_json = encode_metadata(task.metadata.as_ref())?;
        let result = conn.execute(
            &format!(
                "INSERT INTO tasks ({}) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
                TASK_COLUMNS
            ),
            params![
                task.id,
                task.anime_title,
                task.target_dir,
                task.source.as_str(),
                task.dmhy_mode.as_str(),
                metadata_json,
                task.custom_keywords,
                task.status.as_str(),
                task.progress,
                task.error_message,
                format_timestamp(&task.created_at),
                format_timestamp(&task.updated_at),
            ],
        );

        match result {
            Ok(_) => Ok(()),
            Err(rusqlite::Error::SqliteFailure(e, _))
                if e.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                Err(TaskStoreError::Duplicate(task.id.clone()))
            }
            Err(e) => Err(e.into()),
        }
    }

    fn row_to_task(row: &rusqlite::Row) -> rusqlite::Result<Task> {
        let source: String = row.get(3)?;
        let dmhy_mode: String = row.get(4)?;
        let metadata_json: Option<String> = row.get(5)?;
        let status: String = row.get(7)?;
        let created_at: String = row.get(10)?;
        let updated_at: String = row.get(11)?;

        let metadata = metadata_json
            .map(|json| serde_json::from_str::<Metadata>(&json))
            .transpose()
            .map_err(|e| conversion_error(5, e.to_string()))?;

        Ok(Task {
            id: row.get(0)?,
            anime_title: row.get(1)?,
            target_dir: row.get(2)?,
            source: source.parse().map_err(|e| conversion_error(3, e))?,
            dmhy_mode: dmhy_mode.parse().map_err(|e| conversion_error(4, e))?,
            metadata,
            custom_keywords: row.get(6)?,
            status: status.parse().map_err(|e| conversion_error(7, e))?,
            progress: row.get(8)?,
            error_message: row.get(9)?,
            created_at: parse_timestamp(10, &created_at)?,
            updated_at: parse_timestamp(11, &updated_at)?,
        })
    }

    fn query_tasks(
        conn: &Connection,
        sql: &str,
        args: &[&dyn rusqlite::ToSql],
    ) -> Result<Vec<Task>, TaskStoreError> {
        let mut stmt = conn.prepare(sql)?;
        let rows = stmt.query_map(args, Self::row_to_task)?;

        let mut tasks = Vec::new();
        for row_result in rows {
            tasks.push(row_result?);
        }
        Ok(tasks)
    }
}

impl TaskStore for SqliteTaskStore {
    fn add(&self, task: &Task) -> Result<(), TaskStoreError> {
        let conn = self.lock()?;
        Self::insert_active(&conn, task)
    }

    fn add_batch(&self, tasks: &[Task]) -> Result<(), TaskStoreError> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        for task in tasks {
            Self::insert_active(&tx, task)?;
        }
        tx.commit()?;
        Ok(())
    }

    fn get(&self, id: &str) -> Result<Option<Task>, TaskStoreError> {
        let conn = self.lock()?;
        let result = conn.query_row(
            &format!("SELECT {} FROM tasks WHERE id = ?", TASK_COLUMNS),
            params![id],
            Self::row_to_task,
        );

        match result {
            Ok(task) => Ok(Some(task)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn list(&self) -> Result<Vec<Task>, TaskStoreError> {
        let conn = self.lock()?;
        Self::query_tasks(
            &conn,
            &format!(
                "SELECT {} FROM tasks ORDER BY created_at ASC, id ASC",
                TASK_COLUMNS
            ),
            &[],
        )
    }

    fn update(&self, task: &Task) -> Result<bool, TaskStoreError> {
        let conn = self.lock()?;
        let metadata_json = encode_metadata(task.metadata.as_ref())?;
        let changed = conn.execute(
            "UPDATE tasks SET anime_title = ?, target_dir = ?, source = ?, dmhy_mode = ?, metadata = ?, custom_keywords = ?, status = ?, progress = ?, error_message = ?, updated_at = ? WHERE id = ?",
            params![
                task.anime_title,
                task.target_dir,
                task.source.as_str(),
                task.dmhy_mode.as_str(),
                metadata_json,
                task.custom_keywords,
                task.status.as_str(),
                task.progress,
                task.error_message,
                format_timestamp(&task.updated_at),
                task.id,
            ],
        )?;
        Ok(changed > 0)
    }

    fn remove(&self, id: &str) -> Result<Task, TaskStoreError> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;

        let task = match tx.query_row(
            &format!("SELECT {} FROM tasks WHERE id = ?", TASK_COLUMNS),
            params![id],
            Self::row_to_task,
        ) {
            Ok(task) => task,
            Err(rusqlite::Error::QueryReturnedNoRows) => {
                return Err(TaskStoreError::NotFound(id.to_string()));
            }
            Err(e) => return Err(e.into()),
        };

        tx.execute("DELETE FROM tasks WHERE id = ?", params![id])?;
        tx.commit()?;
        Ok(task)
    }

    fn save_history(&self, task: &Task) -> Result<(), TaskStoreError> {
        let mut conn = self.lock()?;
        let metadata_json = encode_metadata(task.metadata.as_ref())?;

        let tx = conn.transaction()?;
        tx.execute(
            &format!(
                "INSERT INTO task_history ({}, archived_at) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
                TASK_COLUMNS
            ),
            params![
                task.id,
                task.anime_title,
                task.target_dir,
                task.source.as_str(),
                task.dmhy_mode.as_str(),
                metadata_json,
                task.custom_keywords,
                task.status.as_str(),
                task.progress,
                task.error_message,
                format_timestamp(&task.created_at),
                format_timestamp(&task.updated_at),
                format_timestamp(&Utc::now()),
            ],
        )?;
        tx.execute("DELETE FROM tasks WHERE id = ?", params![task.id])?;
        tx.commit()?;
        Ok(())
    }

    fn get_history(&self, id: &str) -> Result<Option<Task>, TaskStoreError> {
        let conn = self.lock()?;
        let mut tasks = Self::query_tasks(
            &conn,
            &format!(
                "SELECT {} FROM task_history WHERE id = ? ORDER BY seq DESC LIMIT 1",
                TASK_COLUMNS
            ),
            &[&id],
        )?;
        Ok(tasks.pop())
    }

    fn list_history(&self) -> Result<Vec<Task>, TaskStoreError> {
        let conn = self.lock()?;
        Self::query_tasks(
            &conn,
            &format!("SELECT {} FROM task_history ORDER BY seq ASC", TASK_COLUMNS),
            &[],
        )
    }
}

/// Fixed-width RFC 3339 so stored timestamps sort lexically.
fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

fn parse_timestamp(idx: usize, raw: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| conversion_error(idx, e.to_string()))
}

fn encode_metadata(metadata: Option<&Metadata>) -> Result<Option<String>, TaskStoreError> {
    metadata
        .map(serde_json::to_string)
        .transpose()
        .map_err(|e| TaskStoreError::Database(e.to_string()))
}

fn conversion_error(idx: usize, msg: String) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, msg.into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::{DownloadMode, Source, TaskStatus};

    fn create_test_store() -> SqliteTaskStore {
        SqliteTaskStore::in_memory().unwrap()
    }

    fn create_test_task() -> Task {
        Task::new(
            "Lycoris Recoil",
            "/media/music/lycoris",
            Source::TorrentIndex,
            DownloadMode::TorrentFile,
        )
        .with_metadata(Metadata::new("Lycoris Recoil", "ALIVE", "ClariS", "OP").with_bangumi_id("345678"))
        .with_custom_keywords("ALIVE ClariS")
    }

    #[test]
    fn test_add_and_get_round_trip() {
        let store = create_test_store();
        let task = create_test_task();
        store.add(&task).unwrap();

        let fetched = store.get(&task.id).unwrap().unwrap();
        assert_eq!(fetched, task);
        assert_eq!(fetched.created_at, task.created_at);
        assert_eq!(fetched.updated_at, task.updated_at);
    }

    #[test]
    fn test_get_nonexistent_task() {
        let store = create_test_store();
        assert!(store.get("nonexistent-id").unwrap().is_none());
    }

    #[test]
    fn test_add_duplicate_id() {
        let store = create_test_store();
        let task = create_test_task();
        store.add(&task).unwrap();
        assert!(matches!(
            store.add(&task),
            Err(TaskStoreError::Duplicate(_))
        ));
    }

    #[test]
    fn test_add_batch_rolls_back_on_duplicate() {
        let store = create_test_store();
        let existing = create_test_task();
        store.add(&existing).unwrap();

        let fresh = create_test_task();
        assert!(store.add_batch(&[fresh.clone(), existing]).is_err());
        assert!(store.get(&fresh.id).unwrap().is_none());
    }

    #[test]
    fn test_archived_id_cannot_be_reused() {
        let store = create_test_store();
        let mut task = create_test_task();
        store.add(&task).unwrap();
        task.complete().unwrap();
        store.save_history(&task).unwrap();

        let mut again = create_test_task();
        again.id = task.id.clone();
        assert!(matches!(
            store.add(&again),
            Err(TaskStoreError::Duplicate(_))
        ));
        assert!(matches!(
            store.add_batch(&[again]),
            Err(TaskStoreError::Duplicate(_))
        ));
        assert_eq!(store.list_history().unwrap().len(), 1);
        assert!(store.get(&task.id).unwrap().is_none());
    }

    #[test]
    fn test_list_tasks() {
        let store = create_test_store();
        for _ in 0..3 {
            store.add(&create_test_task()).unwrap();
        }
        assert_eq!(store.list().unwrap().len(), 3);
    }

    #[test]
    fn test_task_without_metadata() {
        let store = create_test_store();
        let task = Task::new("Unknown", "/tmp", Source::VideoHost, DownloadMode::Video);
        store.add(&task).unwrap();
        let fetched = store.get(&task.id).unwrap().unwrap();
        assert!(fetched.metadata.is_none());
        assert!(fetched.custom_keywords.is_none());
    }

    #[test]
    fn test_update_task() {
        let store = create_test_store();
        let mut task = create_test_task();
        store.add(&task).unwrap();

        task.start(10.0).unwrap();
        task.fail("dmhy: request timed out").unwrap();
        assert!(store.update(&task).unwrap());

        let fetched = store.get(&task.id).unwrap().unwrap();
        assert_eq!(fetched.status, TaskStatus::Failed);
        assert_eq!(fetched.progress, 10.0);
        assert_eq!(fetched.error_message.as_deref(), Some("dmhy: request timed out"));
    }

    #[test]
    fn test_update_missing_task_reports_false() {
        let store = create_test_store();
        assert!(!store.update(&create_test_task()).unwrap());
    }

    #[test]
    fn test_remove_task() {
        let store = create_test_store();
        let task = create_test_task();
        store.add(&task).unwrap();

        let removed = store.remove(&task.id).unwrap();
        assert_eq!(removed.id, task.id);
        assert!(store.get(&task.id).unwrap().is_none());
        assert!(matches!(
            store.remove(&task.id),
            Err(TaskStoreError::NotFound(_))
        ));
    }

    #[test]
    fn test_save_history_is_atomic_move() {
        let store = create_test_store();
        let mut task = create_test_task();
        store.add(&task).unwrap();
        task.complete().unwrap();

        store.save_history(&task).unwrap();

        assert!(store.get(&task.id).unwrap().is_none());
        let history = store.list_history().unwrap();
        assert_eq!(history.iter().filter(|t| t.id == task.id).count(), 1);

        let archived = store.get_history(&task.id).unwrap().unwrap();
        assert_eq!(archived, task);
    }

    #[test]
    fn test_timestamps_sort_lexically() {
        let early = DateTime::parse_from_rfc3339("2024-01-01T00:00:00.5Z")
            .unwrap()
            .with_timezone(&Utc);
        let late = DateTime::parse_from_rfc3339("2024-01-01T00:00:00.25Z")
            .unwrap()
            .with_timezone(&Utc)
            + chrono::Duration::seconds(1);
        assert!(format_timestamp(&early) < format_timestamp(&late));
    }

    #[test]
    fn test_file_based_store_persists() {
        let temp_dir = tempfile::tempdir().unwrap();
        let db_path = temp_dir.path().join("tasks.db");
        let task = create_test_task();

        {
            let store = SqliteTaskStore::new(&db_path).unwrap();
            store.add(&task).unwrap();
        }

        assert!(db_path.exists());
        let reopened = SqliteTaskStore::new(&db_path).unwrap();
        assert_eq!(reopened.get(&task.id).unwrap().unwrap(), task);
    }
}
