//! SQLite role repository

use async_trait::async_trait;
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};
use tracing::debug;

use haris_core::config::{DatastoreConfig, SchemaConfig};
use haris_core::{Error, Result};

use crate::traits::RoleRepository;

pub struct SqliteStore {
    pool: SqlitePool,
    credential_sql: Option<String>,
    roles_sql: String,
}

impl SqliteStore {
    pub async fn connect(datastore: &DatastoreConfig, schema: &SchemaConfig) -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(datastore.max_connections)
            .min_connections(datastore.min_connections)
            .connect(&datastore.url)
            .await
            .map_err(|e| Error::datastore_unavailable(e.to_string()))?;

        debug!("connected sqlite role store: {}", datastore.url);
        Ok(Self::with_pool(pool, schema))
    }

    /// Build a store over an existing pool. The SQL text is fixed here; the
    /// schema is immutable once the realm starts.
    pub fn with_pool(pool: SqlitePool, schema: &SchemaConfig) -> Self {
        let credential_sql = schema.user_cred_column.as_ref().map(|cred| {
            format!(
                "SELECT {} FROM {} WHERE {} = ?",
                cred, schema.user_table, schema.user_name_column
            )
        });
        let roles_sql = format!(
            "SELECT {} FROM {} WHERE {} = ?",
            schema.role_name_column, schema.user_role_table, schema.user_name_column
        );

        Self {
            pool,
            credential_sql,
            roles_sql,
        }
    }
}

#[async_trait]
impl RoleRepository for SqliteStore {
    async fn lookup_credential(&self, username: &str) -> Result<Option<String>> {
        let Some(sql) = &self.credential_sql else {
            return Ok(None);
        };

        let row: Option<(Option<String>,)> = sqlx::query_as(sql)
            .bind(username)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| Error::datastore_unavailable(e.to_string()))?;

        Ok(row.and_then(|r| r.0))
    }

    async fn roles_for(&self, username: &str) -> Result<Vec<String>> {
        let rows: Vec<(String,)> = sqlx::query_as(&self.roles_sql)
            .bind(username)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| Error::datastore_unavailable(e.to_string()))?;

        Ok(rows.into_iter().map(|r| r.0).collect())
    }

    async fn ping(&self) -> Result<()> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| Error::datastore_unavailable(e.to_string()))?;
        Ok(())
    }

    async fn close(&self) {
        self.pool.close().await;
    }
}
