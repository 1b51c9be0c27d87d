pub mod connection;
pub mod feedback;
pub mod schema;
pub mod states;
pub mod tasks;

pub use connection::Database;
