//! SQLite storage implementation

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use rusqlite::{params, params_from_iter, types::Value, Connection};

use super::schema;
use super::UserStore;
use crate::user::{NewUser, User, UserChanges};
use crate::{Error, Result, NO_FIELDS_TO_UPDATE};

/// SQLite-backed storage for user records
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open a database file (creates if doesn't exist)
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;
        Ok(Self { conn: Mutex::new(conn) })
    }

    /// Open an in-memory database (for testing)
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Ok(Self { conn: Mutex::new(conn) })
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| Error::Connect("SQLite connection poisoned".to_string()))
    }

    /// Helper to convert a row to a User
    fn row_to_user(row: &rusqlite::Row) -> rusqlite::Result<User> {
        Ok(User {
            id: row.get(0)?,
            name: row.get(1)?,
            email: row.get(2)?,
        })
    }
}

#[async_trait]
impl UserStore for SqliteStore {
    async fn provision(&self) -> Result<()> {
        self.conn()?.execute(schema::CREATE_USERS_TABLE_SQLITE, [])?;
        Ok(())
    }

    async fn insert(&self, user: &NewUser) -> Result<i64> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO users (name, email) VALUES (?1, ?2)",
            params![user.name, user.email],
        )?;
        Ok(conn.last_insert_rowid())
    }

    async fn list(&self) -> Result<Vec<User>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(schema::SELECT_USERS)?;
        let users = stmt
            .query_map([], Self::row_to_user)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(users)
    }

    async fn update(&self, id: i64, changes: &UserChanges) -> Result<u64> {
        let assignments = changes.assignments();
        if assignments.is_empty() {
            return Err(Error::Validation(NO_FIELDS_TO_UPDATE.to_string()));
        }

        let columns: Vec<&str> = assignments.iter().map(|(col, _)| *col).collect();
        let sql = schema::update_statement(&columns, |n| format!("?{}", n));

        let mut values: Vec<Value> = assignments
            .iter()
            .map(|(_, v)| Value::Text(v.to_string()))
            .collect();
        values.push(Value::Integer(id));

        let rows = self.conn()?.execute(&sql, params_from_iter(values))?;
        Ok(rows as u64)
    }

    async fn delete(&self, id: i64) -> Result<u64> {
        let rows = self.conn()?.execute("DELETE FROM users WHERE id = ?1", [id])?;
        Ok(rows as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn store() -> SqliteStore {
        let store = SqliteStore::open_in_memory().unwrap();
        store.provision().await.unwrap();
        store
    }

    fn new_user(name: &str, email: &str) -> NewUser {
        NewUser::new(Some(name.to_string()), Some(email.to_string()))
    }

    #[tokio::test]
    async fn test_user_crud() {
        let store = store().await;

        let id = store.insert(&new_user("Alice", "alice@example.com")).await.unwrap();
        let users = store.list().await.unwrap();
        assert_eq!(users.len(), 1);
        assert_eq!(users[0].id, id);
        assert_eq!(users[0].name.as_deref(), Some("Alice"));

        let changes = UserChanges::new(Some("Alicia".to_string()), None);
        assert_eq!(store.update(id, &changes).await.unwrap(), 1);
        let users = store.list().await.unwrap();
        assert_eq!(users[0].name.as_deref(), Some("Alicia"));
        assert_eq!(users[0].email.as_deref(), Some("alice@example.com"));

        assert_eq!(store.delete(id).await.unwrap(), 1);
        assert!(store.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_ids_are_generated_in_order() {
        let store = store().await;
        let a = store.insert(&new_user("a", "a@x.com")).await.unwrap();
        let b = store.insert(&NewUser::default()).await.unwrap();
        assert!(b > a);

        let users = store.list().await.unwrap();
        assert_eq!(users.iter().map(|u| u.id).collect::<Vec<_>>(), vec![a, b]);
        assert_eq!(users[1].name, None);
        assert_eq!(users[1].email, None);
    }

    #[tokio::test]
    async fn test_missing_id_affects_nothing() {
        let store = store().await;
        let changes = UserChanges::new(Some("x".to_string()), None);
        assert_eq!(store.update(99999, &changes).await.unwrap(), 0);
        assert_eq!(store.delete(99999).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_update_rejects_empty_changes() {
        let store = store().await;
        let id = store.insert(&new_user("a", "a@x.com")).await.unwrap();
        let err = store.update(id, &UserChanges::default()).await.unwrap_err();
        assert_eq!(err.to_string(), NO_FIELDS_TO_UPDATE);
    }

    #[tokio::test]
    async fn test_provision_is_idempotent_on_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("users.db");

        let store = SqliteStore::open(&path).unwrap();
        store.provision().await.unwrap();
        let id = store.insert(&new_user("a", "a@x.com")).await.unwrap();
        drop(store);

        let reopened = SqliteStore::open(&path).unwrap();
        reopened.provision().await.unwrap();
        let users = reopened.list().await.unwrap();
        assert_eq!(users.len(), 1);
        assert_eq!(users[0].id, id);
    }
}
