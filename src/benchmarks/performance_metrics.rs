//! Warmup-then-measure timing protocol shared by every workload.

use super::benchmark_errors::{BenchmarkError, BenchmarkResult};
use super::benchmark_types::{Score, ThroughputUnit, TimingResults};
use log::{debug, info};
use std::time::{Duration, Instant};

/// One call of a benchmarked computation.
pub trait Operation {
    /// Issues one call. Asynchronous backends may return before it completes.
    fn run(&mut self) -> BenchmarkResult<()>;

    /// Blocks until every issued call has completed.
    fn synchronize(&mut self) -> BenchmarkResult<()> {
        Ok(())
    }
}

/// Adapts a synchronous closure into an [`Operation`].
pub struct FnOperation<F>(pub F);

impl<F> Operation for FnOperation<F>
where
    F: FnMut() -> BenchmarkResult<()>,
{
    fn run(&mut self) -> BenchmarkResult<()> {
        (self.0)()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimingProtocol {
    pub warmup_iters: u32,
    pub measure_iters: u32,
}

/// Operations per second of `iterations` calls taking `elapsed`, in `unit`.
pub fn throughput(
    operation_count: u64,
    elapsed: Duration,
    iterations: u32,
    unit: ThroughputUnit,
) -> f64 {
    let per_call = elapsed.as_secs_f64() / iterations as f64;
    operation_count as f64 / per_call / unit.divisor()
}

/// Measures the sustained throughput of `op`.
///
/// Runs `warmup_iters` untimed calls and a barrier, then times `measure_iters`
/// back-to-back calls closed by a barrier.
pub fn measure(
    label: &str,
    op: &mut dyn Operation,
    operation_count: u64,
    unit: ThroughputUnit,
    protocol: TimingProtocol,
) -> BenchmarkResult<Score> {
    if protocol.measure_iters == 0 {
        return Err(BenchmarkError::invalid(
            "measure_iters",
            "At least one measured iteration is required",
        ));
    }
    if operation_count == 0 {
        return Err(BenchmarkError::invalid(
            "operation_count",
            "Operation count must be greater than 0",
        ));
    }

    info!(
        "Benchmarking {} ({} warmup, {} measured)...",
        label, protocol.warmup_iters, protocol.measure_iters
    );

    for _ in 0..protocol.warmup_iters {
        op.run()?;
    }
    op.synchronize()?;

    let start = Instant::now();
    for _ in 0..protocol.measure_iters {
        op.run()?;
    }
    op.synchronize()?;
    let elapsed = start.elapsed();

    if elapsed.is_zero() {
        return Err(BenchmarkError::TimerResolution {
            iterations: protocol.measure_iters,
        });
    }

    let timing = TimingResults::new(label.to_string(), elapsed.as_nanos(), protocol.measure_iters);
    debug!(
        "{}: {} iterations in {:.3} ms ({:.3} ms per call)",
        timing.label,
        timing.iterations,
        timing.total_time_ns as f64 / 1_000_000.0,
        timing.average_time_ms
    );

    let value = throughput(operation_count, elapsed, protocol.measure_iters, unit);
    let score = Score::measured(label, unit, value);
    info!("{}: {}", label, score);
    Ok(score)
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Counting {
        runs: u32,
        syncs: u32,
    }

    impl Operation for Counting {
        fn run(&mut self) -> BenchmarkResult<()> {
            self.runs += 1;
            std::thread::sleep(Duration::from_micros(50));
            Ok(())
        }

        fn synchronize(&mut self) -> BenchmarkResult<()> {
            self.syncs += 1;
            Ok(())
        }
    }

    #[test]
    fn test_protocol_call_counts() {
        let mut op = Counting { runs: 0, syncs: 0 };
        let protocol = TimingProtocol {
            warmup_iters: 3,
            measure_iters: 7,
        };
        let score = measure("count", &mut op, 1_000, ThroughputUnit::Gflops, protocol).unwrap();
        assert_eq!(op.runs, 10);
        assert_eq!(op.syncs, 2);
        assert!(score.value > 0.0);
    }

    #[test]
    fn test_throughput_arithmetic() {
        let value = throughput(2_000_000_000, Duration::from_secs(2), 4, ThroughputUnit::Gflops);
        assert!((value - 4.0).abs() < 1e-9);
        let value = throughput(1_000_000_000_000, Duration::from_millis(500), 1, ThroughputUnit::Tops);
        assert!((value - 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_zero_operation_count_is_rejected() {
        let mut op = FnOperation(|| Ok(()));
        let protocol = TimingProtocol {
            warmup_iters: 0,
            measure_iters: 1,
        };
        assert!(matches!(
            measure("zero", &mut op, 0, ThroughputUnit::Tops, protocol),
            Err(BenchmarkError::InvalidConfiguration { .. })
        ));
    }
}
