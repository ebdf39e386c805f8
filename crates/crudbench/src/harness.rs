//! Timed operation runner.
//!
//! An [`Operation`] splits one unit of benchmark work into untimed setup,
//! per-repetition preparation, the timed call, and untimed teardown. The
//! runner functions drive an operation against one backend and turn the
//! outcome into a [`RunResult`]. Failures never escape: they are logged and
//! recorded as [`Unavailable`] so the remaining backends still run.

use std::time::{Duration, Instant};

use crate::backends::{Backend, BackendKind};
use crate::error::{Error, Result};
use crate::results::{
    millis, Measurement, QueryTiming, RunResult, Samples, TierTiming, Unavailable,
};

/// One unit of benchmark work.
pub trait Operation {
    /// State handed from [`Operation::prepare`] to [`Operation::operate`].
    type Prepared;

    /// Label attached to samples and log events.
    fn label(&self) -> &'static str;

    /// Runs once before the first repetition. Untimed.
    fn setup(&mut self, _backend: &mut dyn Backend) -> Result<()> {
        Ok(())
    }

    /// Runs before each repetition. Untimed.
    fn prepare(&mut self, backend: &mut dyn Backend, rep: usize) -> Result<Self::Prepared>;

    /// The timed call.
    fn operate(&mut self, backend: &mut dyn Backend, prepared: Self::Prepared) -> Result<()>;

    /// Runs once after the last repetition, also after a failure. Untimed.
    fn teardown(&mut self, _backend: &mut dyn Backend) -> Result<()> {
        Ok(())
    }
}

/// Run `op` `repetitions` times, recording every repetition.
///
/// Any failure marks the backend unavailable; partial samples are dropped.
pub fn run_repeated<O: Operation>(
    backend: &mut dyn Backend,
    op: &mut O,
    repetitions: usize,
) -> RunResult {
    let kind = backend.kind();
    let label = op.label();
    if repetitions == 0 {
        return Err(unavailable(
            kind,
            label,
            Error::Config("repetitions must be at least 1".into()),
        ));
    }

    let mut samples = Samples::with_capacity(repetitions);
    measure(backend, op, repetitions, |elapsed| {
        samples.push(kind, label, elapsed)
    })
    .map_err(|e| unavailable(kind, label, e))?;

    tracing::info!(
        backend = %kind,
        operation = label,
        repetitions,
        mean_ms = samples.mean(),
        "repeated run complete"
    );
    Ok(Measurement::Repeated(samples))
}

/// Time one execution of `op`.
pub fn run_single<O: Operation>(backend: &mut dyn Backend, op: &mut O) -> RunResult {
    let kind = backend.kind();
    let label = op.label();

    let elapsed = measure_total(backend, op, 1).map_err(|e| unavailable(kind, label, e))?;

    tracing::info!(backend = %kind, operation = label, elapsed_ms = elapsed, "single run complete");
    Ok(Measurement::Single(elapsed))
}

/// Time one execution per tier. A failing tier is recorded as unavailable
/// and the remaining tiers still run.
pub fn run_tiered<O, F>(backend: &mut dyn Backend, sizes: &[usize], mut op_for: F) -> RunResult
where
    O: Operation,
    F: FnMut(usize) -> O,
{
    let kind = backend.kind();
    let mut tiers = Vec::with_capacity(sizes.len());

    for &size in sizes {
        let mut op = op_for(size);
        let label = op.label();
        let timing = measure_total(backend, &mut op, 1).map_err(|e| unavailable(kind, label, e));
        if let Ok(elapsed) = &timing {
            tracing::debug!(backend = %kind, operation = label, size, elapsed_ms = *elapsed, "tier complete");
        }
        tiers.push(TierTiming {
            size,
            millis: timing,
        });
    }

    Ok(Measurement::Tiered(tiers))
}

/// Time each query operation over `repeats` executions (total elapsed).
/// A failing query is recorded as unavailable for that label only.
pub fn run_queries<O: Operation>(
    backend: &mut dyn Backend,
    ops: impl IntoIterator<Item = O>,
    repeats: usize,
) -> RunResult {
    let kind = backend.kind();
    let mut timings = Vec::new();

    for mut op in ops {
        let label = op.label();
        let timing = if repeats == 0 {
            Err(unavailable(
                kind,
                label,
                Error::Config("repeats must be at least 1".into()),
            ))
        } else {
            measure_total(backend, &mut op, repeats).map_err(|e| unavailable(kind, label, e))
        };
        if let Ok(elapsed) = &timing {
            tracing::info!(backend = %kind, operation = label, elapsed_ms = *elapsed, "query complete");
        }
        timings.push(QueryTiming {
            label,
            millis: timing,
        });
    }

    Ok(Measurement::Queries(timings))
}

/// Drive setup, the repetitions and teardown, reporting each timed call.
/// Teardown always runs; its failure is logged but only returned when the
/// repetitions themselves succeeded.
fn measure<O: Operation>(
    backend: &mut dyn Backend,
    op: &mut O,
    repetitions: usize,
    mut on_sample: impl FnMut(Duration),
) -> Result<()> {
    op.setup(backend)?;

    let mut outcome = Ok(());
    for rep in 0..repetitions {
        match time_once(backend, op, rep) {
            Ok(elapsed) => on_sample(elapsed),
            Err(e) => {
                outcome = Err(e);
                break;
            }
        }
    }

    if let Err(e) = op.teardown(backend) {
        tracing::warn!(
            backend = %backend.kind(),
            operation = op.label(),
            error = %e,
            "teardown failed"
        );
        if outcome.is_ok() {
            outcome = Err(e);
        }
    }

    outcome
}

/// Total elapsed milliseconds across `repetitions`.
fn measure_total<O: Operation>(
    backend: &mut dyn Backend,
    op: &mut O,
    repetitions: usize,
) -> Result<f64> {
    let mut total = Duration::ZERO;
    measure(backend, op, repetitions, |elapsed| total += elapsed)?;
    Ok(millis(total))
}

fn time_once<O: Operation>(backend: &mut dyn Backend, op: &mut O, rep: usize) -> Result<Duration> {
    let prepared = op.prepare(backend, rep)?;
    let start = Instant::now();
    op.operate(backend, prepared)?;
    Ok(start.elapsed())
}

fn unavailable(kind: BackendKind, label: &str, err: Error) -> Unavailable {
    let unavailable = Unavailable::from(err);
    tracing::warn!(
        backend = %kind,
        operation = label,
        reason = %unavailable.reason,
        error = %unavailable.message,
        "backend unavailable"
    );
    unavailable
}
