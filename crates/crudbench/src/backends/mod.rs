//! Database backends under test.
//!
//! Every backend exposes the same small set of primitives so the harness can
//! drive MongoDB, PostgreSQL, MySQL and Redis through one interface. Each
//! implementation keeps its driver's native query syntax internal.

pub mod mongo;
pub mod mysql;
pub mod postgres;
pub mod redis;

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::config::BackendsConfig;
use crate::error::{Error, Result};
use crate::fixtures::CatalogQuery;

pub use self::mongo::MongoBackend;
pub use self::mysql::MysqlBackend;
pub use self::postgres::PostgresBackend;
pub use self::redis::RedisBackend;

/// The fixed set of databases compared by every workload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    MongoDb,
    /// Named `postgres`, like its `[backends.postgres]` table.
    #[serde(rename = "postgres", alias = "postgresql")]
    PostgreSql,
    MySql,
    Redis,
}

impl BackendKind {
    /// All backends, in benchmark order.
    pub const ALL: [BackendKind; 4] = [
        BackendKind::MongoDb,
        BackendKind::PostgreSql,
        BackendKind::MySql,
        BackendKind::Redis,
    ];

    /// Display name used in CSV headers and chart labels.
    pub fn name(&self) -> &'static str {
        match self {
            BackendKind::MongoDb => "MongoDB",
            BackendKind::PostgreSql => "PostgreSQL",
            BackendKind::MySql => "MySQL",
            BackendKind::Redis => "Redis",
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Identifier of a record created by the harness.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordId {
    /// Integer primary key (relational backends).
    Row(i64),
    /// Hex-encoded document id (MongoDB).
    Document(String),
    /// Key name (Redis).
    Key(String),
}

impl RecordId {
    /// Primary key of a relational record.
    pub fn as_row(&self) -> Result<i64> {
        match self {
            RecordId::Row(id) => Ok(*id),
            other => Err(Error::Query(format!("expected a row id, got {other}"))),
        }
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordId::Row(id) => write!(f, "{id}"),
            RecordId::Document(id) | RecordId::Key(id) => f.write_str(id),
        }
    }
}

/// Primitives every backend provides to the workloads.
///
/// Calls block until the driver returns; the blocking call is what the
/// harness measures, so implementations must not cache or pipeline across
/// calls.
pub trait Backend {
    /// Which database this is.
    fn kind(&self) -> BackendKind;

    /// Insert a throwaway ride record priced at 10 and return its id.
    fn insert_probe(&mut self, seq: usize) -> Result<RecordId>;

    /// Delete a record by id.
    fn delete_record(&mut self, id: &RecordId) -> Result<()>;

    /// Set the price of a record.
    fn update_price(&mut self, id: &RecordId, price: f64) -> Result<()>;

    /// Untimed preparation before [`Backend::fetch_rides`] (e.g. key listing).
    fn prepare_fetch(&mut self, _limit: usize) -> Result<()> {
        Ok(())
    }

    /// Read up to `limit` full ride records and return how many were read.
    fn fetch_rides(&mut self, limit: usize) -> Result<usize>;

    /// Execute a catalog query and return the number of result rows.
    fn run_query(&mut self, query: CatalogQuery) -> Result<usize>;
}

impl<B: Backend + ?Sized> Backend for Box<B> {
    fn kind(&self) -> BackendKind {
        (**self).kind()
    }

    fn insert_probe(&mut self, seq: usize) -> Result<RecordId> {
        (**self).insert_probe(seq)
    }

    fn delete_record(&mut self, id: &RecordId) -> Result<()> {
        (**self).delete_record(id)
    }

    fn update_price(&mut self, id: &RecordId, price: f64) -> Result<()> {
        (**self).update_price(id, price)
    }

    fn prepare_fetch(&mut self, limit: usize) -> Result<()> {
        (**self).prepare_fetch(limit)
    }

    fn fetch_rides(&mut self, limit: usize) -> Result<usize> {
        (**self).fetch_rides(limit)
    }

    fn run_query(&mut self, query: CatalogQuery) -> Result<usize> {
        (**self).run_query(query)
    }
}

/// Opens backends by kind. The suite goes through this so tests can swap in
/// in-memory fakes.
pub trait Connector {
    fn connect(&mut self, kind: BackendKind) -> Result<Box<dyn Backend>>;
}

impl<F> Connector for F
where
    F: FnMut(BackendKind) -> Result<Box<dyn Backend>>,
{
    fn connect(&mut self, kind: BackendKind) -> Result<Box<dyn Backend>> {
        self(kind)
    }
}

/// Connector that opens real driver connections from configuration.
pub struct DriverConnector<'a> {
    config: &'a BackendsConfig,
}

impl<'a> DriverConnector<'a> {
    pub fn new(config: &'a BackendsConfig) -> Self {
        Self { config }
    }
}

impl Connector for DriverConnector<'_> {
    fn connect(&mut self, kind: BackendKind) -> Result<Box<dyn Backend>> {
        let not_configured = || Error::Config(format!("no connection configured for {kind}"));
        if !self.config.is_configured(kind) {
            return Err(not_configured());
        }

        let backend: Box<dyn Backend> = match kind {
            BackendKind::MongoDb => {
                let config = self.config.mongodb.as_ref().ok_or_else(not_configured)?;
                Box::new(MongoBackend::connect(config)?)
            }
            BackendKind::PostgreSql => {
                let config = self.config.postgres.as_ref().ok_or_else(not_configured)?;
                Box::new(PostgresBackend::connect(config)?)
            }
            BackendKind::MySql => {
                let config = self.config.mysql.as_ref().ok_or_else(not_configured)?;
                Box::new(MysqlBackend::connect(config)?)
            }
            BackendKind::Redis => {
                let config = self.config.redis.as_ref().ok_or_else(not_configured)?;
                Box::new(RedisBackend::connect(config)?)
            }
        };

        Ok(backend)
    }
}

/// Current-thread runtime for driving an async driver from the sequential harness.
pub(crate) fn runtime() -> Result<tokio::runtime::Runtime> {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|e| Error::Connection(format!("failed to start runtime: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_order_and_names() {
        let names: Vec<_> = BackendKind::ALL.iter().map(BackendKind::name).collect();
        assert_eq!(names, vec!["MongoDB", "PostgreSQL", "MySQL", "Redis"]);
    }

    #[test]
    fn test_missing_descriptor_is_config_error() {
        let config = BackendsConfig::default().without(BackendKind::Redis);
        let mut connector = DriverConnector::new(&config);

        match connector.connect(BackendKind::Redis) {
            Err(Error::Config(msg)) => assert!(msg.contains("Redis")),
            Err(other) => panic!("unexpected error: {other}"),
            Ok(_) => panic!("expected missing configuration"),
        }
    }

    #[test]
    fn test_record_id_display() {
        assert_eq!(RecordId::Row(42).to_string(), "42");
        assert_eq!(RecordId::Key("bench:probe:1".into()).to_string(), "bench:probe:1");
    }

    #[test]
    fn test_record_id_as_row() {
        assert_eq!(RecordId::Row(7).as_row().unwrap(), 7);
        assert!(RecordId::Key("ride:1".into()).as_row().is_err());
        assert!(RecordId::Document("67f144c61fd8f48fc214971f".into())
            .as_row()
            .is_err());
    }
}
