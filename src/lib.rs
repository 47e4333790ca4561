//! # mcp-crud - Line-oriented CRUD agent
//!
//! Reads one text command per line, runs it against a single `users` table
//! and answers with one JSON record per line.
//!
//! mcp-crud provides:
//! - A shell-quoting aware command parser producing typed commands
//! - A store gateway over PostgreSQL or SQLite
//! - A sequential command loop with explicit termination states

pub mod user;
pub mod command;
pub mod response;
pub mod storage;
pub mod session;
pub mod config;
pub mod output;
pub mod ui;

// Re-exports for convenient access
pub use user::{User, NewUser, UserChanges};
pub use command::Command;
pub use response::Response;
pub use storage::{UserStore, PostgresStore, SqliteStore};
pub use session::{Session, Termination};
pub use config::McpCrudConfig;

/// Result type alias for mcp-crud operations
pub type Result<T> = std::result::Result<T, Error>;

/// Message reported when an update carries neither `name` nor `email`
pub const NO_FIELDS_TO_UPDATE: &str = "No fields to update.";

/// Error types for mcp-crud operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Connection error: {0}")]
    Connect(String),

    #[error("{0}")]
    Parse(String),

    #[error("{0}")]
    Validation(String),

    #[error("Unknown command.")]
    UnknownCommand,

    #[error("Storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    /// PostgreSQL rejection, carrying the server's message text
    #[error("Storage error: {0}")]
    Postgres(String),

    #[error("Command timed out after {0:?}")]
    Timeout(std::time::Duration),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
