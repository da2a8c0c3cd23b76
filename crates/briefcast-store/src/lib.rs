//! # Briefcast Store
//!
//! SQLite-backed persistence for tasks and execution history. Embedded
//! structures (steps, personalization, step results) are stored as JSON
//! columns — one file, survives restarts, no external database.

mod sqlite;

pub use sqlite::SqliteTaskStore;
