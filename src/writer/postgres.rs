//! PostgreSQL timestamp writer.

use std::time::Duration;

use async_trait::async_trait;
use sqlx::postgres::{PgConnectOptions, PgPoolOptions};
use sqlx::PgPool;

use crate::config::DatabaseTarget;
use crate::writer::{DatabaseWriter, WriteError};

const CREATE_TABLE: &str = r#"
    CREATE TABLE IF NOT EXISTS timestamps (
        id SERIAL PRIMARY KEY,
        timestamp TEXT NOT NULL
    )
"#;

pub const INSERT_TIMESTAMP: &str = "INSERT INTO timestamps (timestamp) VALUES ($1)";

/// Writes one row per call into the target's `timestamps` table.
///
/// The pool connects lazily, so an unreachable server surfaces as a failed
/// write instead of a startup error, and a dropped connection is replaced on
/// the next cycle.
pub struct PostgresWriter {
    name: String,
    pool: PgPool,
}

impl PostgresWriter {
    pub fn connect_lazy(target: &DatabaseTarget, write_timeout: Duration) -> Self {
        let options = PgConnectOptions::new()
            .host(&target.host)
            .port(target.port)
            .username(&target.user)
            .password(&target.password)
            .database(&target.dbname)
            .application_name("db-write-reporter");

        // One writer loop per target never needs more than one connection.
        let pool = PgPoolOptions::new()
            .max_connections(1)
            .acquire_timeout(write_timeout)
            .connect_lazy_with(options);

        tracing::info!(
            database_name = %target.name,
            host = %target.host,
            port = target.port,
            dbname = %target.dbname,
            user = %target.user,
            "PostgreSQL writer configured"
        );

        Self {
            name: target.name.clone(),
            pool,
        }
    }
}

#[async_trait]
impl DatabaseWriter for PostgresWriter {
    async fn prepare(&self) -> Result<(), WriteError> {
        sqlx::query(CREATE_TABLE).execute(&self.pool).await?;
        tracing::info!(database_name = %self.name, "Table 'timestamps' ensured");
        Ok(())
    }

    async fn write(&self) -> Result<(), WriteError> {
        let now = chrono::Utc::now().to_rfc3339();
        sqlx::query(INSERT_TIMESTAMP)
            .bind(&now)
            .execute(&self.pool)
            .await?;
        tracing::debug!(database_name = %self.name, timestamp = %now, "Timestamp written");
        Ok(())
    }

    fn needs_prepare(&self) -> bool {
        true
    }
}
