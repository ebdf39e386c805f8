//! CSV report sink.

use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};

use crate::error::Result;
use crate::results::{Measurement, Outcome, ResultTable};

use super::{Layout, ReportSink, ReportSpec, Unit};

/// Writes a result table as CSV with fixed-point numbers.
#[derive(Debug, Clone, Copy)]
pub struct CsvSink {
    precision: usize,
}

impl CsvSink {
    pub fn new(precision: usize) -> Self {
        Self { precision }
    }

    /// Write the table to any writer in the layout named by `spec`.
    pub fn write_to<W: io::Write>(
        &self,
        writer: W,
        table: &ResultTable,
        spec: &ReportSpec,
    ) -> Result<()> {
        let mut out = csv::Writer::from_writer(writer);
        let unit = spec.unit;

        match &spec.layout {
            Layout::Samples => {
                out.write_record(header("Run", table))?;
                for index in 0..table.max_samples() {
                    let mut row = vec![(index + 1).to_string()];
                    for (_, result) in table.iter() {
                        let millis = result
                            .as_ref()
                            .ok()
                            .and_then(|m| m.samples())
                            .and_then(|s| s.get(index))
                            .map(|s| s.millis);
                        row.push(self.cell(unit, millis));
                    }
                    out.write_record(&row)?;
                }
            }
            Layout::Summary { value_column } => {
                out.write_record(["Database", *value_column])?;
                for backend in table.backends() {
                    let value = self.cell(unit, table.scalar_of(backend));
                    out.write_record([backend.name(), value.as_str()])?;
                }
            }
            Layout::Tiers { sizes } => {
                out.write_record(header("Records", table))?;
                for size in tier_sizes(table, sizes) {
                    let mut row = vec![size.to_string()];
                    for (_, result) in table.iter() {
                        let millis = result.as_ref().ok().and_then(|m| m.tier(size));
                        row.push(self.outcome_cell(unit, millis));
                    }
                    out.write_record(&row)?;
                }
            }
            Layout::Queries { labels } => {
                out.write_record(header("Query", table))?;
                for label in query_labels(table, labels) {
                    let mut row = vec![label.to_string()];
                    for (_, result) in table.iter() {
                        let millis = result.as_ref().ok().and_then(|m| m.query(label));
                        row.push(self.outcome_cell(unit, millis));
                    }
                    out.write_record(&row)?;
                }
            }
        }

        out.flush()?;
        Ok(())
    }

    fn cell(&self, unit: Unit, millis: Option<f64>) -> String {
        match millis {
            Some(ms) => format!("{:.*}", self.precision, unit.from_millis(ms)),
            None => String::new(),
        }
    }

    fn outcome_cell(&self, unit: Unit, millis: Option<&Outcome<f64>>) -> String {
        self.cell(unit, millis.and_then(|o| o.as_ref().ok().copied()))
    }
}

impl Default for CsvSink {
    fn default() -> Self {
        Self::new(6)
    }
}

impl ReportSink for CsvSink {
    fn write(&self, table: &ResultTable, spec: &ReportSpec, output_dir: &Path) -> Result<PathBuf> {
        let path = output_dir.join(spec.csv_file);
        let file = File::create(&path)?;
        self.write_to(file, table, spec)?;
        Ok(path)
    }
}

fn header(first: &str, table: &ResultTable) -> Vec<String> {
    std::iter::once(first.to_string())
        .chain(table.backends().map(|b| b.name().to_string()))
        .collect()
}

/// Configured tier sizes, then any other measured size in the order first seen.
pub(crate) fn tier_sizes(table: &ResultTable, configured: &[usize]) -> Vec<usize> {
    let mut sizes = configured.to_vec();
    for (_, measurement) in table.available() {
        if let Measurement::Tiered(tiers) = measurement {
            for tier in tiers {
                if !sizes.contains(&tier.size) {
                    sizes.push(tier.size);
                }
            }
        }
    }
    sizes
}

/// Configured query labels, then any other measured label in the order first seen.
pub(crate) fn query_labels(table: &ResultTable, configured: &[&'static str]) -> Vec<&'static str> {
    let mut labels = configured.to_vec();
    for (_, measurement) in table.available() {
        if let Measurement::Queries(queries) = measurement {
            for query in queries {
                if !labels.contains(&query.label) {
                    labels.push(query.label);
                }
            }
        }
    }
    labels
}
