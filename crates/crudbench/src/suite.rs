//! Workload driver.
//!
//! Runs a workload against every backend in fixed order, collects the
//! results into a [`ResultTable`], and hands the table to the report sinks.

use crate::backends::{BackendKind, Connector, DriverConnector};
use crate::config::BenchConfig;
use crate::error::Result;
use crate::report::{write_reports, Artifacts};
use crate::results::{ResultTable, RunResult, Unavailable};
use crate::workloads::Workload;

/// Results and artifacts of one workload run.
#[derive(Debug)]
pub struct WorkloadReport {
    pub workload: Workload,
    pub table: ResultTable,
    pub artifacts: Artifacts,
}

/// Runs workloads over all backends.
pub struct Suite<'a, C> {
    config: &'a BenchConfig,
    connector: C,
}

impl<'a> Suite<'a, DriverConnector<'a>> {
    /// Suite connecting to the databases named in the configuration.
    pub fn with_drivers(config: &'a BenchConfig) -> Self {
        Self::new(config, DriverConnector::new(&config.backends))
    }
}

impl<'a, C: Connector> Suite<'a, C> {
    pub fn new(config: &'a BenchConfig, connector: C) -> Self {
        Self { config, connector }
    }

    pub fn config(&self) -> &BenchConfig {
        self.config
    }

    /// Run one workload on every backend without writing reports.
    pub fn measure(&mut self, workload: Workload) -> Result<ResultTable> {
        let mut table = ResultTable::new();
        for kind in BackendKind::ALL {
            let result = self.run_backend(workload, kind);
            table.insert(kind, result)?;
        }

        tracing::info!(
            workload = %workload,
            available = table.available().count(),
            unavailable = table.unavailable().count(),
            "workload measured"
        );
        Ok(table)
    }

    /// Run one workload and write its reports.
    pub fn run(&mut self, workload: Workload) -> Result<WorkloadReport> {
        let table = self.measure(workload)?;
        let artifacts = write_reports(
            &table,
            &workload.report_spec(&self.config.workloads),
            &self.config.report,
        )?;
        Ok(WorkloadReport {
            workload,
            table,
            artifacts,
        })
    }

    /// Run every workload in order.
    pub fn run_all(&mut self) -> Result<Vec<WorkloadReport>> {
        Workload::ALL.into_iter().map(|w| self.run(w)).collect()
    }

    fn run_backend(&mut self, workload: Workload, kind: BackendKind) -> RunResult {
        let mut backend = match self.connector.connect(kind) {
            Ok(backend) => backend,
            Err(e) => {
                let unavailable = Unavailable::from(e);
                tracing::warn!(
                    backend = %kind,
                    workload = %workload,
                    reason = %unavailable.reason,
                    error = %unavailable.message,
                    "skipping backend"
                );
                return Err(unavailable);
            }
        };

        tracing::info!(backend = %kind, workload = %workload, "running");
        workload.run(backend.as_mut(), &self.config.workloads)
    }
}
