//! PostgreSQL backend.
//!
//! Uses a single-connection sqlx pool driven by a current-thread runtime, so
//! every call blocks until the server has answered.

use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Row};
use tokio::runtime::Runtime;

use crate::config::SqlConfig;
use crate::error::{Error, Result};
use crate::fixtures::{full_ride_select, CatalogQuery, PROBE_PRICE};

use super::{runtime, Backend, BackendKind, RecordId};

/// PostgreSQL backend for benchmarks.
pub struct PostgresBackend {
    pool: PgPool,
    rt: Runtime,
    fetch_sql: String,
}

impl PostgresBackend {
    /// Connect using the configured URL.
    pub fn connect(config: &SqlConfig) -> Result<Self> {
        let rt = runtime()?;

        let pool = rt
            .block_on(async {
                PgPoolOptions::new()
                    .max_connections(1)
                    .acquire_timeout(config.acquire_timeout())
                    .connect(&config.url)
                    .await
            })
            .map_err(|e| Error::Connection(format!("postgres: {e}")))?;

        Ok(Self {
            pool,
            rt,
            fetch_sql: full_ride_select("$1"),
        })
    }
}

impl Backend for PostgresBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::PostgreSql
    }

    fn insert_probe(&mut self, _seq: usize) -> Result<RecordId> {
        let id: i64 = self.rt.block_on(async {
            sqlx::query(
                "INSERT INTO Price (price, distance, surge_multiplier, latitude, longitude) \
                 VALUES ($1, 1.0, 1, 0, 0) RETURNING id::bigint AS id",
            )
            .bind(PROBE_PRICE)
            .fetch_one(&self.pool)
            .await?
            .try_get("id")
        })?;

        Ok(RecordId::Row(id))
    }

    fn delete_record(&mut self, id: &RecordId) -> Result<()> {
        let id = id.as_row()?;
        self.rt.block_on(async {
            sqlx::query("DELETE FROM Price WHERE id = $1")
                .bind(id)
                .execute(&self.pool)
                .await
        })?;
        Ok(())
    }

    fn update_price(&mut self, id: &RecordId, price: f64) -> Result<()> {
        let id = id.as_row()?;
        self.rt.block_on(async {
            sqlx::query("UPDATE Price SET price = $1 WHERE id = $2")
                .bind(price)
                .bind(id)
                .execute(&self.pool)
                .await
        })?;
        Ok(())
    }

    fn fetch_rides(&mut self, limit: usize) -> Result<usize> {
        let rows = self.rt.block_on(async {
            sqlx::query(&self.fetch_sql)
                .bind(limit as i64)
                .fetch_all(&self.pool)
                .await
        })?;
        Ok(rows.len())
    }

    fn run_query(&mut self, query: CatalogQuery) -> Result<usize> {
        let rows = self
            .rt
            .block_on(async { sqlx::query(query.sql()).fetch_all(&self.pool).await })?;
        Ok(rows.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unreachable_server_is_connection_error() {
        let config =
            SqlConfig::new("postgres://nobody@127.0.0.1:1/none").with_acquire_timeout_ms(200);
        match PostgresBackend::connect(&config) {
            Err(Error::Connection(msg)) => assert!(msg.starts_with("postgres")),
            Err(other) => panic!("unexpected error: {other}"),
            Ok(_) => panic!("connected to a closed port"),
        }
    }
}
