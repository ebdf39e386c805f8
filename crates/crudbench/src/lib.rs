//! crudbench
//!
//! CRUD latency benchmarks across MongoDB, PostgreSQL, MySQL and Redis.
//!
//! # Workloads
//!
//! - **delete**: insert a probe record (untimed), delete it (timed), N times
//! - **update**: set a random price on one record, N times
//! - **select-all**: one bulk read of full ride records
//! - **select-tiers**: one bulk read per record-count tier
//! - **queries**: a fixed catalog of filters and aggregations
//!
//! Every workload runs against all four backends in order. A backend that
//! cannot be reached or lacks a feature is recorded as unavailable and the
//! run continues. Results are written as CSV and as a PNG chart.

pub mod backends;
pub mod config;
pub mod error;
pub mod fixtures;
pub mod harness;
pub mod report;
pub mod results;
pub mod suite;
pub mod workloads;

pub use backends::{Backend, BackendKind, Connector, DriverConnector, RecordId};
pub use config::BenchConfig;
pub use error::{Error, Result};
pub use harness::Operation;
pub use report::{write_reports, Artifacts, ReportSpec};
pub use results::{FailureReason, Measurement, ResultTable, RunResult, Unavailable};
pub use suite::{Suite, WorkloadReport};
pub use workloads::Workload;
