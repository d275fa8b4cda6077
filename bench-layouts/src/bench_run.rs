//! The measurement loop: repeats a labeled operation, aggregates samples
//! into mean and sample standard deviation, and keeps failures local to
//! their label so one broken variant never aborts the run.

use std::time::Duration;

use tracing::warn;

use crate::layout::LayoutVariant;
use crate::measurements::{ReadMeasurement, WriteMeasurement};

pub fn duration_ms(duration: Duration) -> f64 {
    duration.as_secs_f64() * 1_000.0
}

/// Mean and unbiased sample standard deviation. Fewer than two samples have
/// no spread to report.
pub fn mean_stddev(samples: &[f64]) -> (f64, Option<f64>) {
    let n = samples.len();
    if n == 0 {
        return (0.0, None);
    }
    let avg = samples.iter().sum::<f64>() / n as f64;
    if n < 2 {
        return (avg, None);
    }
    let sum_sq = samples.iter().map(|x| x * x).sum::<f64>();
    let variance = (sum_sq - n as f64 * avg * avg) / (n as f64 - 1.0);
    (avg, Some(variance.max(0.0).sqrt()))
}

/// Runs `op` for `iterations` samples. Any error is caught here, recorded as
/// a failed measurement, and not propagated.
pub fn benchmark_write(
    label: &str,
    variant: LayoutVariant,
    threads: usize,
    iterations: usize,
    mut op: impl FnMut() -> anyhow::Result<Duration>,
) -> WriteMeasurement {
    let mut samples = Vec::with_capacity(iterations);
    for _ in 0..iterations {
        match op() {
            Ok(elapsed) => samples.push(duration_ms(elapsed)),
            Err(error) => {
                warn!(label, "write benchmark failed: {error:#}");
                return WriteMeasurement::failure(label, variant, threads, &error);
            }
        }
    }
    let (avg_ms, stddev_ms) = mean_stddev(&samples);
    WriteMeasurement {
        label: label.to_string(),
        variant,
        threads,
        avg_ms,
        stddev_ms,
        failed: false,
        error: None,
    }
}

/// Runs `op` for `iterations` cold/warm sample pairs with the same failure
/// isolation as [`benchmark_write`].
pub fn benchmark_read(
    label: &str,
    variant: LayoutVariant,
    threads: usize,
    iterations: usize,
    mut op: impl FnMut() -> anyhow::Result<(Duration, Duration)>,
) -> ReadMeasurement {
    let mut cold = Vec::with_capacity(iterations);
    let mut warm = Vec::with_capacity(iterations);
    for _ in 0..iterations {
        match op() {
            Ok((cold_elapsed, warm_elapsed)) => {
                cold.push(duration_ms(cold_elapsed));
                warm.push(duration_ms(warm_elapsed));
            }
            Err(error) => {
                warn!(label, "read benchmark failed: {error:#}");
                return ReadMeasurement::failure(label, variant, threads, &error);
            }
        }
    }
    let (cold_ms, _) = mean_stddev(&cold);
    let (warm_avg_ms, warm_stddev_ms) = mean_stddev(&warm);
    ReadMeasurement {
        label: label.to_string(),
        variant,
        threads,
        cold_ms,
        warm_avg_ms,
        warm_stddev_ms,
        failed: false,
        error: None,
    }
}

#[cfg(test)]
mod tests {
    use anyhow::anyhow;

    use super::*;
    use crate::layout::{Granularity, Grouping};

    fn variant() -> LayoutVariant {
        LayoutVariant {
            granularity: Granularity::Event,
            grouping: Grouping::All,
        }
    }

    #[test]
    fn stats_match_hand_computation() {
        let (avg, stddev) = mean_stddev(&[10.0, 20.0, 30.0]);
        assert_eq!(avg, 20.0);
        let stddev = stddev.expect("three samples have spread");
        assert!((stddev - 10.0).abs() < 1e-9);
    }

    #[test]
    fn single_sample_has_no_stddev() {
        assert_eq!(mean_stddev(&[42.0]), (42.0, None));
        assert_eq!(mean_stddev(&[]), (0.0, None));
    }

    #[test]
    fn write_samples_aggregate() {
        let mut times = [10, 20, 30].into_iter();
        let m = benchmark_write("w", variant(), 1, 3, || {
            Ok(Duration::from_millis(times.next().expect("three samples")))
        });
        assert!(!m.failed);
        assert_eq!(m.avg_ms, 20.0);
        assert!((m.stddev_ms.expect("spread") - 10.0).abs() < 1e-9);
    }

    #[test]
    fn read_cold_and_warm_aggregate_separately() {
        let m = benchmark_read("r", variant(), 1, 2, || {
            Ok((Duration::from_millis(100), Duration::from_millis(10)))
        });
        assert!(!m.failed);
        assert_eq!(m.cold_ms, 100.0);
        assert_eq!(m.warm_avg_ms, 10.0);
        assert_eq!(m.warm_stddev_ms, Some(0.0));
    }

    #[test]
    fn a_failing_label_does_not_stop_the_run() {
        let mut third_ran = false;
        let ops: Vec<(&str, bool)> = vec![("a", true), ("b", false), ("c", true)];
        let mut results = Vec::new();
        for (label, succeeds) in ops {
            results.push(benchmark_write(label, variant(), 1, 2, || {
                if succeeds {
                    if label == "c" {
                        third_ran = true;
                    }
                    Ok(Duration::from_millis(1))
                } else {
                    Err(anyhow!("boom"))
                }
            }));
        }
        assert_eq!(results.len(), 3);
        assert!(!results[0].failed);
        assert!(results[1].failed);
        assert_eq!(results[1].error.as_deref(), Some("boom"));
        assert!(!results[2].failed);
        assert!(third_ran);
    }
}
