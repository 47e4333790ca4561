//! PostgreSQL storage implementation
//!
//! A single connection is opened at startup and reused for the process
//! lifetime. Its driver runs as a spawned task owned by the store, and
//! [`PostgresStore::close`] waits for it to finish once the client is gone.

use std::time::Duration;

use async_trait::async_trait;
use tokio::task::JoinHandle;
use tokio_postgres::types::ToSql;
use tokio_postgres::{Client, NoTls, Row};

use super::schema;
use super::UserStore;
use crate::config::McpCrudConfig;
use crate::user::{NewUser, User, UserChanges};
use crate::{Error, Result, NO_FIELDS_TO_UPDATE};

/// PostgreSQL-backed storage for user records
pub struct PostgresStore {
    client: Client,
    driver: JoinHandle<()>,
}

impl PostgresStore {
    /// Connect using the loaded configuration
    pub async fn connect(config: &McpCrudConfig) -> Result<Self> {
        let (client, connection) = pg_config(config)
            .connect(NoTls)
            .await
            .map_err(|e| Error::Connect(backend_message(&e)))?;

        let driver = tokio::spawn(async move {
            if let Err(e) = connection.await {
                tracing::error!("PostgreSQL connection error: {}", backend_message(&e));
            }
        });

        tracing::info!("Connected to PostgreSQL at {}", config.target());
        Ok(Self { client, driver })
    }

    /// Drop the client and wait for the connection driver to shut down
    pub async fn close(self) {
        let Self { client, driver } = self;
        drop(client);
        if let Err(e) = driver.await {
            tracing::warn!("PostgreSQL driver task ended abnormally: {}", e);
        }
        tracing::debug!("PostgreSQL connection closed");
    }

    fn row_to_user(row: &Row) -> Result<User> {
        let id: i32 = row.try_get(0).map_err(backend_error)?;
        Ok(User {
            id: i64::from(id),
            name: row.try_get(1).map_err(backend_error)?,
            email: row.try_get(2).map_err(backend_error)?,
        })
    }
}

fn pg_config(config: &McpCrudConfig) -> tokio_postgres::Config {
    let mut pg = tokio_postgres::Config::new();
    pg.user(&config.db_user)
        .password(&config.db_password)
        .host(&config.db_host)
        .port(config.db_port)
        .dbname(&config.db_name)
        .application_name("mcp-crud");
    if let Some(secs) = config.connect_timeout_secs {
        pg.connect_timeout(Duration::from_secs(secs));
    }
    pg
}

/// A closed connection is a connection failure, anything else is the
/// backend rejecting the statement.
fn backend_error(err: tokio_postgres::Error) -> Error {
    if err.is_closed() {
        Error::Connect(backend_message(&err))
    } else {
        Error::Postgres(backend_message(&err))
    }
}

/// `Display` on a driver error names only its kind ("db error"); the
/// server's text lives in the `DbError` or further down the source chain.
fn backend_message(err: &tokio_postgres::Error) -> String {
    let detail = match err.as_db_error() {
        Some(db) => Some(db.message().to_string()),
        None => std::error::Error::source(err).map(|cause| cause.to_string()),
    };
    join_message(&err.to_string(), detail.as_deref())
}

fn join_message(summary: &str, detail: Option<&str>) -> String {
    match detail {
        Some(detail) if !detail.is_empty() && !summary.contains(detail) => {
            format!("{}: {}", summary, detail)
        }
        _ => summary.to_string(),
    }
}

#[async_trait]
impl UserStore for PostgresStore {
    async fn provision(&self) -> Result<()> {
        self.client
            .batch_execute(schema::CREATE_USERS_TABLE_POSTGRES)
            .await
            .map_err(backend_error)
    }

    async fn insert(&self, user: &NewUser) -> Result<i64> {
        let row = self
            .client
            .query_one(
                "INSERT INTO users (name, email) VALUES ($1, $2) RETURNING id",
                &[&user.name, &user.email],
            )
            .await
            .map_err(backend_error)?;
        let id: i32 = row.try_get(0).map_err(backend_error)?;
        Ok(i64::from(id))
    }

    async fn list(&self) -> Result<Vec<User>> {
        let rows = self
            .client
            .query(schema::SELECT_USERS, &[])
            .await
            .map_err(backend_error)?;
        rows.iter().map(Self::row_to_user).collect()
    }

    async fn update(&self, id: i64, changes: &UserChanges) -> Result<u64> {
        let assignments = changes.assignments();
        if assignments.is_empty() {
            return Err(Error::Validation(NO_FIELDS_TO_UPDATE.to_string()));
        }
        // `id` is a SERIAL (int4) column; nothing outside that range exists
        let Ok(id) = i32::try_from(id) else {
            return Ok(0);
        };

        let columns: Vec<&str> = assignments.iter().map(|(col, _)| *col).collect();
        let sql = schema::update_statement(&columns, |n| format!("${}", n));

        let mut params: Vec<&(dyn ToSql + Sync)> = assignments
            .iter()
            .map(|(_, value)| value as &(dyn ToSql + Sync))
            .collect();
        params.push(&id);

        self.client.execute(&sql, &params).await.map_err(backend_error)
    }

    async fn delete(&self, id: i64) -> Result<u64> {
        let Ok(id) = i32::try_from(id) else {
            return Ok(0);
        };
        self.client
            .execute("DELETE FROM users WHERE id = $1", &[&id])
            .await
            .map_err(backend_error)
    }
}
