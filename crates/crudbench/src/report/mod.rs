//! Report sinks.
//!
//! A finished [`ResultTable`] is handed to each sink, which writes one
//! artifact into the output directory: a CSV file and a PNG chart. Both
//! match on [`RunResult`](crate::results::RunResult) explicitly, so an
//! unavailable backend becomes an empty CSV field and is left off the chart.

pub mod chart;
pub mod csv_sink;

use std::path::{Path, PathBuf};

use crate::config::ReportConfig;
use crate::error::Result;
use crate::results::ResultTable;

pub use chart::{ChartPlan, ChartSink};
pub use csv_sink::CsvSink;

/// Unit values are reported in. Timings are always stored in milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Unit {
    Millis,
    Seconds,
}

impl Unit {
    /// Convert a millisecond value into this unit.
    pub fn from_millis(&self, millis: f64) -> f64 {
        match self {
            Unit::Millis => millis,
            Unit::Seconds => millis / 1000.0,
        }
    }

    pub fn suffix(&self) -> &'static str {
        match self {
            Unit::Millis => "ms",
            Unit::Seconds => "s",
        }
    }

    /// Axis caption for charts.
    pub fn axis_label(&self) -> &'static str {
        match self {
            Unit::Millis => "Time (ms)",
            Unit::Seconds => "Time (s)",
        }
    }
}

/// CSV layout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Layout {
    /// `Run,<backends...>`, one row per repetition.
    Samples,
    /// `Database,<value_column>`, one row per backend.
    Summary { value_column: &'static str },
    /// `Records,<backends...>`, one row per configured tier.
    Tiers { sizes: Vec<usize> },
    /// `Query,<backends...>`, one row per catalog query.
    Queries { labels: Vec<&'static str> },
}

/// Chart shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChartKind {
    /// One bar per backend.
    Bar,
    /// One group per query, one bar per backend.
    GroupedBar,
    /// One line per backend over tier sizes, both axes logarithmic.
    LogLine,
}

/// Everything the sinks need to know about a workload's report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportSpec {
    pub title: &'static str,
    pub csv_file: &'static str,
    pub chart_file: &'static str,
    pub layout: Layout,
    pub chart: ChartKind,
    pub unit: Unit,
}

impl ReportSpec {
    /// Tier sizes that always get a row, measured or not.
    pub fn tier_rows(&self) -> &[usize] {
        match &self.layout {
            Layout::Tiers { sizes } => sizes,
            _ => &[],
        }
    }

    /// Query labels that always get a row, measured or not.
    pub fn query_rows(&self) -> &[&'static str] {
        match &self.layout {
            Layout::Queries { labels } => labels,
            _ => &[],
        }
    }
}

/// A destination for the results of one workload run.
pub trait ReportSink {
    /// Write the table into `output_dir` and return the artifact path.
    fn write(&self, table: &ResultTable, spec: &ReportSpec, output_dir: &Path) -> Result<PathBuf>;
}

/// Paths written by [`write_reports`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifacts {
    pub csv: PathBuf,
    pub chart: Option<PathBuf>,
}

/// Write every configured sink for one workload run.
pub fn write_reports(
    table: &ResultTable,
    spec: &ReportSpec,
    config: &ReportConfig,
) -> Result<Artifacts> {
    std::fs::create_dir_all(&config.output_dir)?;

    let csv = CsvSink::new(config.precision).write(table, spec, &config.output_dir)?;
    tracing::info!(path = %csv.display(), "csv report written");

    let chart = if config.skip_charts {
        None
    } else {
        let path = ChartSink::default().write(table, spec, &config.output_dir)?;
        tracing::info!(path = %path.display(), "chart written");
        Some(path)
    };

    Ok(Artifacts { csv, chart })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unit_conversion() {
        assert_eq!(Unit::Millis.from_millis(1500.0), 1500.0);
        assert_eq!(Unit::Seconds.from_millis(1500.0), 1.5);
        assert_eq!(Unit::Seconds.axis_label(), "Time (s)");
    }

    #[test]
    fn test_csv_only_when_charts_skipped() {
        use crate::backends::BackendKind;
        use crate::results::Measurement;

        let dir = tempfile::tempdir().unwrap();
        let config = ReportConfig {
            output_dir: dir.path().join("nested"),
            precision: 3,
            skip_charts: true,
        };
        let spec = ReportSpec {
            title: "t",
            csv_file: "t.csv",
            chart_file: "t.png",
            layout: Layout::Summary { value_column: "Time (ms)" },
            chart: ChartKind::Bar,
            unit: Unit::Millis,
        };
        let mut table = ResultTable::new();
        table
            .insert(BackendKind::MySql, Ok(Measurement::Single(2.0)))
            .unwrap();

        let artifacts = write_reports(&table, &spec, &config).unwrap();
        assert_eq!(artifacts.csv, dir.path().join("nested").join("t.csv"));
        assert!(artifacts.csv.exists());
        assert_eq!(artifacts.chart, None);
        assert!(!dir.path().join("nested").join("t.png").exists());
    }
}
