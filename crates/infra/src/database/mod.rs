//! SQLite persistence adapter

mod schema;
mod scheduler_repository;

pub use schema::initialize_schema;
pub use scheduler_repository::{build_repository, SqliteSchedulerRepository};
