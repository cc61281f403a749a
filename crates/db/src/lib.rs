//! SQLite storage for node static data.
//!
//! Holds the pool setup, the row struct and queries of `node_static_data`,
//! and `SqliteStaticDataStore`, which the webhook activator uses to keep
//! registrations across restarts.

pub mod error;
pub mod models;
pub mod pool;
pub mod repository;
pub mod store;

pub use error::DbError;
pub use pool::{create_pool, run_migrations, DbPool};
pub use store::SqliteStaticDataStore;
