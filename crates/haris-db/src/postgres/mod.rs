//! PostgreSQL role repository

use async_trait::async_trait;
use sqlx::postgres::{PgPool, PgPoolOptions};
use tracing::debug;

use haris_core::config::{DatastoreConfig, SchemaConfig};
use haris_core::{Error, Result};

use crate::traits::RoleRepository;

pub struct PostgresStore {
    pool: PgPool,
    credential_sql: Option<String>,
    roles_sql: String,
}

impl PostgresStore {
    pub async fn connect(datastore: &DatastoreConfig, schema: &SchemaConfig) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(datastore.max_connections)
            .min_connections(datastore.min_connections)
            .connect(&datastore.url)
            .await
            .map_err(|e| Error::datastore_unavailable(e.to_string()))?;

        debug!("connected postgres role store");
        Ok(Self::with_pool(pool, schema))
    }

    pub fn with_pool(pool: PgPool, schema: &SchemaConfig) -> Self {
        let credential_sql = schema.user_cred_column.as_ref().map(|cred| {
            format!(
                "SELECT {} FROM {} WHERE {} = $1",
                cred, schema.user_table, schema.user_name_column
            )
        });
        let roles_sql = format!(
            "SELECT {} FROM {} WHERE {} = $1",
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
impl RoleRepository for PostgresStore {
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
