//! Persistence layer for the fleet server.
//!
//! SQLite write-behind of every record the in-memory store writes. The store
//! is reloaded from these tables at startup.

pub mod db;
pub mod records;

pub use db::{init_database, Database};
pub use records::{load_snapshot, write_changes};
