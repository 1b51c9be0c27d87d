pub mod memory;
pub mod models;
pub mod sqlite;
pub mod traits;

pub use memory::InMemoryStore;
pub use models::Feedback;
pub use sqlite::SqliteStore;
pub use traits::AgentStore;
