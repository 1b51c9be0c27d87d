use crate::errors::HeraldError;
use crate::task::{Task, TaskStatus};
use super::connection::{db_err, timestamp};
use super::Database;

fn decode_rows(rows: impl Iterator<Item = rusqlite::Result<String>>) -> Result<Vec<Task>, HeraldError> {
    let mut tasks = Vec::new();
    for row in rows {
        let json = row.map_err(db_err("Row error"))?;
        tasks.push(serde_json::from_str(&json)?);
    }
    Ok(tasks)
}

impl Database {
    pub fn upsert_task(&self, task: &Task) -> Result<(), HeraldError> {
        let json = serde_json::to_string(task)?;
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO tasks (id, agent_id, task_type, status, priority, sequence, retry_count, task_json, scheduled_at, completed_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
             ON CONFLICT(id) DO UPDATE SET status = excluded.status, retry_count = excluded.retry_count,
                task_json = excluded.task_json, completed_at = excluded.completed_at",
            rusqlite::params![
                task.id,
                task.agent_id,
                task.task_type.as_str(),
                task.status.as_str(),
                task.priority.to_string(),
                task.sequence as i64,
                task.retry_count,
                json,
                timestamp(&task.scheduled_at),
                task.completed_at.as_ref().map(timestamp),
            ],
        ).map_err(db_err("Failed to save task"))?;
        Ok(())
    }

    pub fn get_task(&self, task_id: &str) -> Result<Option<Task>, HeraldError> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare("SELECT task_json FROM tasks WHERE id = ?1")
            .map_err(db_err("Query failed"))?;

        match stmt.query_row(rusqlite::params![task_id], |row: &rusqlite::Row| row.get::<_, String>(0)) {
            Ok(json) => Ok(Some(serde_json::from_str(&json)?)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(HeraldError::Database(format!("Query error: {}", e))),
        }
    }

    pub fn get_tasks_by_agent(&self, agent_id: &str) -> Result<Vec<Task>, HeraldError> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT task_json FROM tasks WHERE agent_id = ?1 ORDER BY sequence ASC"
        ).map_err(db_err("Query failed"))?;

        let rows = stmt.query_map(rusqlite::params![agent_id], |row: &rusqlite::Row| row.get::<_, String>(0))
            .map_err(db_err("Query error"))?;
        decode_rows(rows)
    }

    pub fn get_task_history(&self, agent_id: &str, limit: usize) -> Result<Vec<Task>, HeraldError> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT task_json FROM tasks WHERE agent_id = ?1
             ORDER BY COALESCE(completed_at, scheduled_at) DESC LIMIT ?2"
        ).map_err(db_err("Query failed"))?;

        let rows = stmt.query_map(rusqlite::params![agent_id, limit as i64], |row: &rusqlite::Row| row.get::<_, String>(0))
            .map_err(db_err("Query error"))?;
        decode_rows(rows)
    }

    /// Rewrites both the indexed column and the stored document.
    pub fn set_task_status(&self, task_id: &str, status: TaskStatus) -> Result<bool, HeraldError> {
        let conn = self.lock()?;
        let json = match conn.query_row(
            "SELECT task_json FROM tasks WHERE id = ?1",
            rusqlite::params![task_id],
            |row: &rusqlite::Row| row.get::<_, String>(0),
        ) {
            Ok(json) => json,
            Err(rusqlite::Error::QueryReturnedNoRows) => return Ok(false),
            Err(e) => return Err(HeraldError::Database(format!("Query error: {}", e))),
        };

        let mut task: Task = serde_json::from_str(&json)?;
        task.status = status;
        let json = serde_json::to_string(&task)?;
        conn.execute(
            "UPDATE tasks SET status = ?2, task_json = ?3 WHERE id = ?1",
            rusqlite::params![task_id, status.as_str(), json],
        ).map_err(db_err("Update failed"))?;
        Ok(true)
    }

    pub fn count_tasks(&self, agent_id: &str) -> Result<usize, HeraldError> {
        let conn = self.lock()?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM tasks WHERE agent_id = ?1",
            rusqlite::params![agent_id],
            |row: &rusqlite::Row| row.get(0),
        ).map_err(db_err("Count failed"))?;
        Ok(count as usize)
    }
}
