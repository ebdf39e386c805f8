//! MySQL backend.

use sqlx::mysql::MySqlPoolOptions;
use sqlx::MySqlPool;
use tokio::runtime::Runtime;

use crate::config::SqlConfig;
use crate::error::{Error, Result};
use crate::fixtures::{full_ride_select, CatalogQuery, PROBE_PRICE};

use super::{runtime, Backend, BackendKind, RecordId};

/// MySQL backend for benchmarks.
pub struct MysqlBackend {
    pool: MySqlPool,
    rt: Runtime,
    fetch_sql: String,
}

impl MysqlBackend {
    /// Connect using the configured URL.
    pub fn connect(config: &SqlConfig) -> Result<Self> {
        let rt = runtime()?;

        let pool = rt
            .block_on(async {
                MySqlPoolOptions::new()
                    .max_connections(1)
                    .acquire_timeout(config.acquire_timeout())
                    .connect(&config.url)
                    .await
            })
            .map_err(|e| Error::Connection(format!("mysql: {e}")))?;

        Ok(Self {
            pool,
            rt,
            fetch_sql: full_ride_select("?"),
        })
    }
}

impl Backend for MysqlBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::MySql
    }

    fn insert_probe(&mut self, _seq: usize) -> Result<RecordId> {
        let done = self.rt.block_on(async {
            sqlx::query(
                "INSERT INTO Price (price, distance, surge_multiplier, latitude, longitude) \
                 VALUES (?, 1.0, 1, 0, 0)",
            )
            .bind(PROBE_PRICE)
            .execute(&self.pool)
            .await
        })?;

        let last = done.last_insert_id();
        let id = i64::try_from(last)
            .map_err(|_| Error::Query(format!("insert id {last} out of range")))?;
        Ok(RecordId::Row(id))
    }

    fn delete_record(&mut self, id: &RecordId) -> Result<()> {
        let id = id.as_row()?;
        self.rt.block_on(async {
            sqlx::query("DELETE FROM Price WHERE id = ?")
                .bind(id)
                .execute(&self.pool)
                .await
        })?;
        Ok(())
    }

    fn update_price(&mut self, id: &RecordId, price: f64) -> Result<()> {
        let id = id.as_row()?;
        self.rt.block_on(async {
            sqlx::query("UPDATE Price SET price = ? WHERE id = ?")
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
            SqlConfig::new("mysql://nobody@127.0.0.1:1/none").with_acquire_timeout_ms(200);
        match MysqlBackend::connect(&config) {
            Err(Error::Connection(msg)) => assert!(msg.starts_with("mysql")),
            Err(other) => panic!("unexpected error: {other}"),
            Ok(_) => panic!("connected to a closed port"),
        }
    }
}
