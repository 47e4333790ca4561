//! Store Gateway - the only contact point with the relational backend
//!
//! One table:
//! - users(id, name, email)
//!
//! Two backends implement [`UserStore`]:
//! - [`PostgresStore`]: networked PostgreSQL over a single connection
//! - [`SqliteStore`]: embedded SQLite file or in-memory database

pub mod schema;
pub mod postgres;
pub mod sqlite;

pub use postgres::PostgresStore;
pub use sqlite::SqliteStore;

use async_trait::async_trait;
use crate::user::{NewUser, User, UserChanges};
use crate::Result;

/// Operations over the `users` table. Each call is one backend round-trip.
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Create the table if it does not exist. Safe to run repeatedly.
    async fn provision(&self) -> Result<()>;

    /// Insert a record and return the generated primary key
    async fn insert(&self, user: &NewUser) -> Result<i64>;

    /// Every record, in insertion order
    async fn list(&self) -> Result<Vec<User>>;

    /// Apply the supplied fields to `id`; returns rows affected (0 or 1)
    async fn update(&self, id: i64, changes: &UserChanges) -> Result<u64>;

    /// Remove `id`; returns rows affected (0 or 1)
    async fn delete(&self, id: i64) -> Result<u64>;
}
