use crate::errors::HeraldError;
use crate::runner::state::AgentState;
use super::connection::{db_err, timestamp};
use super::Database;

impl Database {
    pub fn upsert_state(&self, state: &AgentState) -> Result<(), HeraldError> {
        let json = serde_json::to_string(state)?;
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO agent_states (id, status, state_json, created_at, updated_at) VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(id) DO UPDATE SET status = excluded.status, state_json = excluded.state_json, updated_at = excluded.updated_at",
            rusqlite::params![
                state.id,
                state.status.to_string(),
                json,
                timestamp(&state.created_at),
                timestamp(&state.updated_at),
            ],
        ).map_err(db_err("Failed to save agent state"))?;
        Ok(())
    }

    pub fn get_state(&self, agent_id: &str) -> Result<Option<AgentState>, HeraldError> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare("SELECT state_json FROM agent_states WHERE id = ?1")
            .map_err(db_err("Query failed"))?;

        match stmt.query_row(rusqlite::params![agent_id], |row: &rusqlite::Row| row.get::<_, String>(0)) {
            Ok(json) => Ok(Some(serde_json::from_str(&json)?)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(HeraldError::Database(format!("Query error: {}", e))),
        }
    }

    pub fn delete_state(&self, agent_id: &str) -> Result<bool, HeraldError> {
        let conn = self.lock()?;
        let affected = conn.execute("DELETE FROM agent_states WHERE id = ?1", rusqlite::params![agent_id])
            .map_err(db_err("Delete failed"))?;
        Ok(affected > 0)
    }

    pub fn count_states(&self) -> Result<usize, HeraldError> {
        let conn = self.lock()?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM agent_states", [], |row: &rusqlite::Row| row.get(0))
            .map_err(db_err("Count failed"))?;
        Ok(count as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runner::state::AgentStatus;

    #[test]
    fn test_db_upsert_and_get_state() {
        let db = Database::in_memory().unwrap();
        let state = AgentState::new("agent-1");
        db.upsert_state(&state).unwrap();

        let loaded = db.get_state("agent-1").unwrap().unwrap();
        assert_eq!(loaded, state);
    }

    #[test]
    fn test_db_upsert_twice_keeps_one_row() {
        let db = Database::in_memory().unwrap();
        let mut state = AgentState::new("agent-1");
        db.upsert_state(&state).unwrap();
        db.upsert_state(&state).unwrap();
        assert_eq!(db.count_states().unwrap(), 1);

        state.status = AgentStatus::Running;
        state.touch();
        db.upsert_state(&state).unwrap();
        assert_eq!(db.count_states().unwrap(), 1);
        assert_eq!(db.get_state("agent-1").unwrap().unwrap().status, AgentStatus::Running);
    }

    #[test]
    fn test_db_get_nonexistent_state() {
        let db = Database::in_memory().unwrap();
        assert!(db.get_state("nobody").unwrap().is_none());
    }

    #[test]
    fn test_db_delete_state() {
        let db = Database::in_memory().unwrap();
        db.upsert_state(&AgentState::new("agent-del")).unwrap();

        assert!(db.delete_state("agent-del").unwrap());
        assert!(!db.delete_state("agent-del").unwrap());
        assert!(db.get_state("agent-del").unwrap().is_none());
    }
}
