//! Benchmark workloads.
//!
//! Each workload pairs one or more [`Operation`]s with the runner that
//! drives them and the report layout its results are written with.

use std::fmt;
use std::str::FromStr;

use crate::backends::{Backend, RecordId};
use crate::config::WorkloadConfig;
use crate::error::{Error, Result};
use crate::fixtures::{CatalogQuery, PriceGenerator};
use crate::harness::{run_queries, run_repeated, run_single, run_tiered, Operation};
use crate::report::{ChartKind, Layout, ReportSpec, Unit};
use crate::results::RunResult;

/// Insert a probe record (untimed), then delete it (timed).
#[derive(Debug, Default)]
pub struct InsertDelete;

impl Operation for InsertDelete {
    type Prepared = RecordId;

    fn label(&self) -> &'static str {
        "delete"
    }

    fn prepare(&mut self, backend: &mut dyn Backend, rep: usize) -> Result<RecordId> {
        backend.insert_probe(rep)
    }

    fn operate(&mut self, backend: &mut dyn Backend, id: RecordId) -> Result<()> {
        backend.delete_record(&id)
    }
}

/// Set a random price on one seeded record.
///
/// The record is inserted in setup and removed in teardown; only the update
/// itself is timed.
pub struct Update {
    prices: PriceGenerator,
    record: Option<RecordId>,
}

impl Update {
    pub fn new(seed: u64) -> Self {
        Self {
            prices: PriceGenerator::new(seed),
            record: None,
        }
    }
}

impl Operation for Update {
    type Prepared = f64;

    fn label(&self) -> &'static str {
        "update"
    }

    fn setup(&mut self, backend: &mut dyn Backend) -> Result<()> {
        self.record = Some(backend.insert_probe(0)?);
        Ok(())
    }

    fn prepare(&mut self, _backend: &mut dyn Backend, _rep: usize) -> Result<f64> {
        Ok(self.prices.next_price())
    }

    fn operate(&mut self, backend: &mut dyn Backend, price: f64) -> Result<()> {
        let id = self
            .record
            .as_ref()
            .ok_or_else(|| Error::Query("update target was not seeded".into()))?;
        backend.update_price(id, price)
    }

    fn teardown(&mut self, backend: &mut dyn Backend) -> Result<()> {
        match self.record.take() {
            Some(id) => backend.delete_record(&id),
            None => Ok(()),
        }
    }
}

/// Read up to `limit` full ride records in one call.
#[derive(Debug, Clone, Copy)]
pub struct SelectRides {
    pub limit: usize,
}

impl Operation for SelectRides {
    type Prepared = ();

    fn label(&self) -> &'static str {
        "select"
    }

    fn prepare(&mut self, backend: &mut dyn Backend, _rep: usize) -> Result<()> {
        backend.prepare_fetch(self.limit)
    }

    fn operate(&mut self, backend: &mut dyn Backend, _prepared: ()) -> Result<()> {
        let rows = backend.fetch_rides(self.limit)?;
        tracing::debug!(backend = %backend.kind(), limit = self.limit, rows, "rides fetched");
        Ok(())
    }
}

/// Execute one catalog query.
#[derive(Debug, Clone, Copy)]
pub struct RunCatalogQuery(pub CatalogQuery);

impl Operation for RunCatalogQuery {
    type Prepared = ();

    fn label(&self) -> &'static str {
        self.0.label()
    }

    fn prepare(&mut self, _backend: &mut dyn Backend, _rep: usize) -> Result<()> {
        Ok(())
    }

    fn operate(&mut self, backend: &mut dyn Backend, _prepared: ()) -> Result<()> {
        let rows = backend.run_query(self.0)?;
        tracing::debug!(backend = %backend.kind(), query = self.0.label(), rows, "query returned");
        Ok(())
    }
}

/// The benchmark workloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Workload {
    /// Timed delete of a freshly inserted record, repeated.
    Delete,
    /// Timed single-field update, repeated.
    Update,
    /// One timed bulk select.
    SelectAll,
    /// One timed bulk select per tier size.
    SelectTiers,
    /// The read query catalog.
    Queries,
}

impl Workload {
    /// All workloads, in the order `all` runs them.
    pub const ALL: [Workload; 5] = [
        Workload::Delete,
        Workload::Update,
        Workload::SelectAll,
        Workload::SelectTiers,
        Workload::Queries,
    ];

    /// Command-line name.
    pub fn name(&self) -> &'static str {
        match self {
            Workload::Delete => "delete",
            Workload::Update => "update",
            Workload::SelectAll => "select-all",
            Workload::SelectTiers => "select-tiers",
            Workload::Queries => "queries",
        }
    }

    /// Run against one backend.
    pub fn run(&self, backend: &mut dyn Backend, config: &WorkloadConfig) -> RunResult {
        match self {
            Workload::Delete => run_repeated(backend, &mut InsertDelete, config.repetitions),
            Workload::Update => run_repeated(
                backend,
                &mut Update::new(config.seed),
                config.update_repetitions,
            ),
            Workload::SelectAll => run_single(
                backend,
                &mut SelectRides {
                    limit: config.select_limit,
                },
            ),
            Workload::SelectTiers => {
                run_tiered(backend, &config.tiers, |limit| SelectRides { limit })
            }
            Workload::Queries => run_queries(
                backend,
                CatalogQuery::ALL.into_iter().map(RunCatalogQuery),
                config.query_repeats,
            ),
        }
    }

    /// Unit the results are reported in.
    pub fn unit(&self) -> Unit {
        match self {
            Workload::SelectAll | Workload::Queries => Unit::Seconds,
            Workload::Delete | Workload::Update | Workload::SelectTiers => Unit::Millis,
        }
    }

    /// How the results are written out. Tier and query reports get one row
    /// per configured tier or catalog query even if nothing was measured.
    pub fn report_spec(&self, config: &WorkloadConfig) -> ReportSpec {
        let unit = self.unit();
        match self {
            Workload::Delete => ReportSpec {
                title: "Delete latency",
                csv_file: "delete_timings.csv",
                chart_file: "delete_comparison.png",
                layout: Layout::Samples,
                chart: ChartKind::Bar,
                unit,
            },
            Workload::Update => ReportSpec {
                title: "Average update time",
                csv_file: "update_benchmark.csv",
                chart_file: "update_comparison.png",
                layout: Layout::Summary {
                    value_column: "Average Update Time (ms)",
                },
                chart: ChartKind::Bar,
                unit,
            },
            Workload::SelectAll => ReportSpec {
                title: "Select all rides",
                csv_file: "select_all_results.csv",
                chart_file: "select_all_comparison.png",
                layout: Layout::Summary {
                    value_column: "Time (s)",
                },
                chart: ChartKind::Bar,
                unit,
            },
            Workload::SelectTiers => ReportSpec {
                title: "Select time by record count",
                csv_file: "select_tiers_results.csv",
                chart_file: "select_tiers_comparison.png",
                layout: Layout::Tiers {
                    sizes: config.tiers.clone(),
                },
                chart: ChartKind::LogLine,
                unit,
            },
            Workload::Queries => ReportSpec {
                title: "Query execution time",
                csv_file: "query_benchmark.csv",
                chart_file: "query_benchmark_chart.png",
                layout: Layout::Queries {
                    labels: CatalogQuery::ALL.iter().map(|q| q.label()).collect(),
                },
                chart: ChartKind::GroupedBar,
                unit,
            },
        }
    }
}

impl fmt::Display for Workload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Workload {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Workload::ALL
            .into_iter()
            .find(|w| w.name() == s)
            .ok_or_else(|| Error::Config(format!("unknown workload: {s}")))
    }
}
