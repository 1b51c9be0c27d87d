use chrono::{DateTime, Utc};
use crate::errors::HeraldError;
use crate::store::Feedback;
use super::connection::{db_err, timestamp};
use super::Database;

impl Database {
    pub fn upsert_feedback(&self, feedback: &Feedback) -> Result<(), HeraldError> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO feedback (id, task_id, agent_id, rating, comment, approved, created_at) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
             ON CONFLICT(id) DO UPDATE SET rating = excluded.rating, comment = excluded.comment, approved = excluded.approved",
            rusqlite::params![
                feedback.id,
                feedback.task_id,
                feedback.agent_id,
                feedback.rating,
                feedback.comment,
                feedback.approved,
                timestamp(&feedback.created_at),
            ],
        ).map_err(db_err("Failed to save feedback"))?;
        Ok(())
    }

    pub fn get_feedback(&self, task_id: &str) -> Result<Vec<Feedback>, HeraldError> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT id, task_id, agent_id, rating, comment, approved, created_at FROM feedback WHERE task_id = ?1 ORDER BY created_at ASC"
        ).map_err(db_err("Query failed"))?;

        let rows = stmt.query_map(rusqlite::params![task_id], |row: &rusqlite::Row| {
            let created_at: String = row.get(6)?;
            Ok((
                Feedback {
                    id: row.get(0)?,
                    task_id: row.get(1)?,
                    agent_id: row.get(2)?,
                    rating: row.get(3)?,
                    comment: row.get(4)?,
                    approved: row.get(5)?,
                    created_at: Utc::now(),
                },
                created_at,
            ))
        }).map_err(db_err("Query error"))?;

        let mut results = Vec::new();
        for row in rows {
            let (mut feedback, created_at) = row.map_err(db_err("Row error"))?;
            feedback.created_at = DateTime::parse_from_rfc3339(&created_at)
                .map_err(|e| HeraldError::Database(format!("Bad feedback timestamp: {}", e)))?
                .with_timezone(&Utc);
            results.push(feedback);
        }
        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_db_feedback_round_trip() {
        let db = Database::in_memory().unwrap();
        let fb = Feedback::new("task-1", "agent-1")
            .with_rating(5)
            .with_comment("ship it")
            .approved(true);
        db.upsert_feedback(&fb).unwrap();

        let loaded = db.get_feedback("task-1").unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].id, fb.id);
        assert_eq!(loaded[0].rating, Some(5));
        assert_eq!(loaded[0].comment.as_deref(), Some("ship it"));
        assert!(loaded[0].approved);
    }

    #[test]
    fn test_db_feedback_upsert() {
        let db = Database::in_memory().unwrap();
        let mut fb = Feedback::new("task-1", "agent-1").with_rating(2);
        db.upsert_feedback(&fb).unwrap();
        fb.rating = Some(4);
        db.upsert_feedback(&fb).unwrap();

        let loaded = db.get_feedback("task-1").unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].rating, Some(4));
    }

    #[test]
    fn test_db_feedback_empty() {
        let db = Database::in_memory().unwrap();
        assert!(db.get_feedback("none").unwrap().is_empty());
    }
}
