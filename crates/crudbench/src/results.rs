//! Timing results.
//!
//! A [`ResultTable`] maps each backend to its [`RunResult`]: either a
//! [`Measurement`] or an [`Unavailable`] marker saying why the backend could
//! not be benchmarked. Both report sinks match on that explicitly.

use std::fmt;
use std::time::Duration;

use crate::backends::BackendKind;
use crate::error::{Error, Result};

/// Why a backend (or a single cell) has no timing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureReason {
    /// No connection descriptor was configured.
    NotConfigured,
    /// Connecting or authenticating failed.
    Connection,
    /// The backend lacks a required feature (module, index, command).
    Unsupported,
    /// A query failed while running.
    Query,
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            FailureReason::NotConfigured => "not configured",
            FailureReason::Connection => "connection failed",
            FailureReason::Unsupported => "unsupported",
            FailureReason::Query => "query failed",
        })
    }
}

/// Sentinel recorded instead of a timing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Unavailable {
    pub reason: FailureReason,
    pub message: String,
}

impl Unavailable {
    pub fn new(reason: FailureReason, message: impl Into<String>) -> Self {
        Self {
            reason,
            message: message.into(),
        }
    }
}

impl fmt::Display for Unavailable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.reason, self.message)
    }
}

impl From<Error> for Unavailable {
    fn from(err: Error) -> Self {
        let reason = match &err {
            Error::Config(_) => FailureReason::NotConfigured,
            Error::Connection(_) => FailureReason::Connection,
            Error::Unsupported(_) => FailureReason::Unsupported,
            _ => FailureReason::Query,
        };
        Unavailable::new(reason, err.to_string())
    }
}

/// A timing or the reason it is missing.
pub type Outcome<T> = std::result::Result<T, Unavailable>;

/// One elapsed-time measurement.
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    pub backend: BackendKind,
    pub operation: &'static str,
    /// Zero-based repetition index.
    pub index: usize,
    /// Elapsed milliseconds, never negative.
    pub millis: f64,
}

/// Per-repetition samples of one backend.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Samples {
    samples: Vec<Sample>,
}

impl Samples {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            samples: Vec::with_capacity(capacity),
        }
    }

    /// Record the next repetition.
    pub fn push(&mut self, backend: BackendKind, operation: &'static str, elapsed: Duration) {
        let index = self.samples.len();
        self.samples.push(Sample {
            backend,
            operation,
            index,
            millis: millis(elapsed),
        });
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Sample> {
        self.samples.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Sample> {
        self.samples.iter()
    }

    /// Arithmetic mean in milliseconds; zero for no samples.
    pub fn mean(&self) -> f64 {
        if self.samples.is_empty() {
            return 0.0;
        }
        self.total() / self.samples.len() as f64
    }

    /// Sum of all samples in milliseconds.
    pub fn total(&self) -> f64 {
        self.samples.iter().map(|s| s.millis).sum()
    }
}

/// Timing of one tier of a scaling benchmark.
#[derive(Debug, Clone, PartialEq)]
pub struct TierTiming {
    pub size: usize,
    pub millis: Outcome<f64>,
}

/// Timing of one catalog query.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryTiming {
    pub label: &'static str,
    pub millis: Outcome<f64>,
}

/// Successful result of one backend's run. The shape depends on the workload.
#[derive(Debug, Clone, PartialEq)]
pub enum Measurement {
    /// One sample per repetition.
    Repeated(Samples),
    /// One timed bulk operation, in milliseconds.
    Single(f64),
    /// One timing per tier, in tier order.
    Tiered(Vec<TierTiming>),
    /// One timing per catalog query, in catalog order.
    Queries(Vec<QueryTiming>),
}

impl Measurement {
    /// Scalar summary: mean for repeated runs, the value for single runs.
    pub fn scalar(&self) -> Option<f64> {
        match self {
            Measurement::Repeated(samples) => Some(samples.mean()),
            Measurement::Single(millis) => Some(*millis),
            Measurement::Tiered(_) | Measurement::Queries(_) => None,
        }
    }

    /// Samples of a repeated run.
    pub fn samples(&self) -> Option<&Samples> {
        match self {
            Measurement::Repeated(samples) => Some(samples),
            _ => None,
        }
    }

    /// Tier timing for `size`, if this is a tiered run that covered it.
    pub fn tier(&self, size: usize) -> Option<&Outcome<f64>> {
        match self {
            Measurement::Tiered(tiers) => tiers.iter().find(|t| t.size == size).map(|t| &t.millis),
            _ => None,
        }
    }

    /// Query timing for `label`, if this is a query run that covered it.
    pub fn query(&self, label: &str) -> Option<&Outcome<f64>> {
        match self {
            Measurement::Queries(queries) => {
                queries.iter().find(|q| q.label == label).map(|q| &q.millis)
            }
            _ => None,
        }
    }
}

/// Outcome of one backend in one workload.
pub type RunResult = Outcome<Measurement>;

/// Backend → result mapping for one workload run.
///
/// Append-only: each backend is recorded once, in invocation order.
#[derive(Debug, Clone, Default)]
pub struct ResultTable {
    entries: Vec<(BackendKind, RunResult)>,
}

impl ResultTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the result of a backend. Rejects a second result for the same backend.
    pub fn insert(&mut self, backend: BackendKind, result: RunResult) -> Result<()> {
        if self.contains(backend) {
            return Err(Error::DuplicateBackend(backend));
        }
        self.entries.push((backend, result));
        Ok(())
    }

    /// Combine with another table built by a separate invocation.
    pub fn merge(mut self, other: ResultTable) -> Result<Self> {
        for (backend, result) in other.entries {
            self.insert(backend, result)?;
        }
        Ok(self)
    }

    pub fn contains(&self, backend: BackendKind) -> bool {
        self.entries.iter().any(|(b, _)| *b == backend)
    }

    pub fn get(&self, backend: BackendKind) -> Option<&RunResult> {
        self.entries
            .iter()
            .find(|(b, _)| *b == backend)
            .map(|(_, r)| r)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Backends in insertion order.
    pub fn backends(&self) -> impl Iterator<Item = BackendKind> + '_ {
        self.entries.iter().map(|(b, _)| *b)
    }

    pub fn iter(&self) -> impl Iterator<Item = (BackendKind, &RunResult)> {
        self.entries.iter().map(|(b, r)| (*b, r))
    }

    /// Backends with a measurement.
    pub fn available(&self) -> impl Iterator<Item = (BackendKind, &Measurement)> {
        self.entries
            .iter()
            .filter_map(|(b, r)| r.as_ref().ok().map(|m| (*b, m)))
    }

    /// Backends marked unavailable.
    pub fn unavailable(&self) -> impl Iterator<Item = (BackendKind, &Unavailable)> {
        self.entries
            .iter()
            .filter_map(|(b, r)| r.as_ref().err().map(|u| (*b, u)))
    }

    /// Mean of a repeated measurement.
    pub fn mean_of(&self, backend: BackendKind) -> Option<f64> {
        Some(self.get(backend)?.as_ref().ok()?.samples()?.mean())
    }

    /// Scalar summary for a backend (see [`Measurement::scalar`]).
    pub fn scalar_of(&self, backend: BackendKind) -> Option<f64> {
        self.get(backend)?.as_ref().ok()?.scalar()
    }

    /// Largest sample count across repeated measurements.
    pub fn max_samples(&self) -> usize {
        self.available()
            .filter_map(|(_, m)| m.samples().map(Samples::len))
            .max()
            .unwrap_or(0)
    }
}

/// Milliseconds as a float.
pub fn millis(elapsed: Duration) -> f64 {
    elapsed.as_secs_f64() * 1000.0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn samples_of(backend: BackendKind, values: &[u64]) -> Samples {
        let mut samples = Samples::default();
        for v in values {
            samples.push(backend, "op", Duration::from_micros(*v));
        }
        samples
    }

    #[test]
    fn test_mean_matches_samples() {
        let samples = samples_of(BackendKind::MySql, &[1_000, 2_000, 4_500]);
        assert_eq!(samples.len(), 3);
        assert!((samples.mean() - 2.5).abs() < 1e-9);
        assert!((samples.total() / samples.len() as f64 - samples.mean()).abs() < 1e-12);
        let indices: Vec<_> = samples.iter().map(|s| s.index).collect();
        assert_eq!(indices, vec![0, 1, 2]);
    }

    #[test]
    fn test_empty_samples_mean_is_zero() {
        assert_eq!(Samples::default().mean(), 0.0);
    }

    #[test]
    fn test_duplicate_backend_rejected() {
        let mut table = ResultTable::new();
        table
            .insert(BackendKind::Redis, Ok(Measurement::Single(1.0)))
            .unwrap();
        let err = table
            .insert(BackendKind::Redis, Ok(Measurement::Single(2.0)))
            .unwrap_err();
        assert!(matches!(err, Error::DuplicateBackend(BackendKind::Redis)));
        assert_eq!(table.scalar_of(BackendKind::Redis), Some(1.0));
    }

    #[test]
    fn test_available_and_unavailable_views() {
        let mut table = ResultTable::new();
        table
            .insert(BackendKind::MongoDb, Ok(Measurement::Single(3.0)))
            .unwrap();
        table
            .insert(
                BackendKind::Redis,
                Err(Unavailable::new(FailureReason::Connection, "refused")),
            )
            .unwrap();

        let available: Vec<_> = table.available().map(|(b, _)| b).collect();
        let unavailable: Vec<_> = table.unavailable().map(|(b, _)| b).collect();
        assert_eq!(available, vec![BackendKind::MongoDb]);
        assert_eq!(unavailable, vec![BackendKind::Redis]);
        assert_eq!(table.scalar_of(BackendKind::Redis), None);
    }

    #[test]
    fn test_merge_preserves_order() {
        let mut first = ResultTable::new();
        first
            .insert(BackendKind::PostgreSql, Ok(Measurement::Single(1.0)))
            .unwrap();
        let mut second = ResultTable::new();
        second
            .insert(BackendKind::MongoDb, Ok(Measurement::Single(2.0)))
            .unwrap();

        let merged = first.merge(second).unwrap();
        let order: Vec<_> = merged.backends().collect();
        assert_eq!(order, vec![BackendKind::PostgreSql, BackendKind::MongoDb]);
    }

    #[test]
    fn test_error_maps_to_failure_reason() {
        let u: Unavailable = Error::Connection("refused".into()).into();
        assert_eq!(u.reason, FailureReason::Connection);
        let u: Unavailable = Error::Unsupported("no index".into()).into();
        assert_eq!(u.reason, FailureReason::Unsupported);
        let u: Unavailable = Error::Config("missing".into()).into();
        assert_eq!(u.reason, FailureReason::NotConfigured);
        let u: Unavailable = Error::Query("syntax".into()).into();
        assert_eq!(u.reason, FailureReason::Query);
    }

    #[test]
    fn test_tier_lookup() {
        let m = Measurement::Tiered(vec![
            TierTiming {
                size: 100,
                millis: Ok(1.5),
            },
            TierTiming {
                size: 1000,
                millis: Err(Unavailable::new(FailureReason::Query, "timeout")),
            },
        ]);
        assert_eq!(m.tier(100), Some(&Ok(1.5)));
        assert!(m.tier(1000).unwrap().is_err());
        assert_eq!(m.tier(10), None);
        assert_eq!(m.scalar(), None);
    }
}
