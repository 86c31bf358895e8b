//! # Micro-Benchmarking
//!
//! Times repeated invocations of one implementation and reduces the samples
//! to order statistics the profiler compares.

use crate::config::ProfilerConfig;
use crate::error::{Result, VkernError};
use std::time::{Duration, Instant};

/// Results from micro-benchmarking one implementation
#[derive(Debug, Clone)]
pub struct BenchmarkResults {
    /// Median latency
    pub median_latency: Duration,

    /// 95th percentile latency
    pub p95_latency: Duration,

    /// 99th percentile latency
    pub p99_latency: Duration,

    /// Fastest observed run
    pub min_latency: Duration,

    /// Throughput (runs per second)
    pub throughput: f64,

    /// Number of samples collected
    pub samples: usize,
}

impl BenchmarkResults {
    /// Calculate statistics from latency samples
    pub fn from_samples(latencies: &mut [Duration]) -> Result<Self> {
        if latencies.is_empty() {
            return Err(VkernError::invalid_data(
                "cannot summarize an empty set of latency samples",
            ));
        }

        latencies.sort();

        let samples = latencies.len();
        let total_duration: Duration = latencies.iter().sum();
        let throughput = if total_duration.is_zero() {
            f64::INFINITY
        } else {
            samples as f64 / total_duration.as_secs_f64()
        };

        Ok(BenchmarkResults {
            median_latency: latencies[samples / 2],
            p95_latency: latencies[(samples * 95) / 100],
            p99_latency: latencies[(samples * 99) / 100],
            min_latency: latencies[0],
            throughput,
            samples,
        })
    }

    /// Samples processed per second at the median latency
    pub fn points_per_second(&self, num_points: usize) -> f64 {
        let secs = self.median_latency.as_secs_f64();
        if secs == 0.0 {
            f64::INFINITY
        } else {
            num_points as f64 / secs
        }
    }
}

/// Micro-benchmark runner
#[derive(Debug, Clone, Copy)]
pub struct MicroBenchmark {
    warmup_iterations: usize,
    measurement_iterations: usize,
}

impl Default for MicroBenchmark {
    fn default() -> Self {
        Self::new(10, 100)
    }
}

impl MicroBenchmark {
    /// Create new micro-benchmark runner
    pub fn new(warmup_iterations: usize, measurement_iterations: usize) -> Self {
        MicroBenchmark {
            warmup_iterations,
            measurement_iterations,
        }
    }

    /// Runner with the iteration counts of a profiler configuration
    pub fn from_config(config: &ProfilerConfig) -> Self {
        Self::new(config.warmup_iterations, config.measurement_iterations)
    }

    /// Measurement iterations per run
    pub fn measurement_iterations(&self) -> usize {
        self.measurement_iterations
    }

    /// Run benchmark on provided closure
    pub fn run<F>(&self, mut operation: F) -> Result<BenchmarkResults>
    where
        F: FnMut(),
    {
        // Warmup phase
        for _ in 0..self.warmup_iterations {
            operation();
        }

        // Measurement phase
        let mut latencies = Vec::with_capacity(self.measurement_iterations);
        for _ in 0..self.measurement_iterations {
            let start = Instant::now();
            operation();
            latencies.push(start.elapsed());
        }

        BenchmarkResults::from_samples(&mut latencies)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_benchmark_results_from_samples() {
        let mut latencies = vec![
            Duration::from_nanos(100),
            Duration::from_nanos(200),
            Duration::from_nanos(150),
            Duration::from_nanos(120),
            Duration::from_nanos(180),
        ];

        let results = BenchmarkResults::from_samples(&mut latencies).unwrap();

        assert_eq!(results.samples, 5);
        assert_eq!(results.median_latency, Duration::from_nanos(150));
        assert_eq!(results.min_latency, Duration::from_nanos(100));
        assert!(results.throughput > 0.0);
        assert!(results.p95_latency >= results.median_latency);
        assert!(results.p99_latency >= results.p95_latency);
    }

    #[test]
    fn test_empty_samples() {
        let err = BenchmarkResults::from_samples(&mut []).unwrap_err();
        assert_eq!(err.category(), "data");
    }

    #[test]
    fn test_micro_benchmark() {
        let bench = MicroBenchmark::new(5, 20);
        let mut calls = 0usize;
        let results = bench
            .run(|| {
                calls += 1;
                std::hint::black_box((0..100).sum::<i32>());
            })
            .unwrap();

        assert_eq!(calls, 25);
        assert_eq!(results.samples, 20);
        assert!(results.median_latency >= results.min_latency);
    }

    #[test]
    fn test_zero_measurements_is_an_error() {
        assert!(MicroBenchmark::new(1, 0).run(|| {}).is_err());
    }

    #[test]
    fn test_from_config() {
        let bench = MicroBenchmark::from_config(&ProfilerConfig::quick());
        assert_eq!(bench.measurement_iterations(), ProfilerConfig::quick().measurement_iterations);
    }

    #[test]
    fn test_points_per_second() {
        let mut latencies = vec![Duration::from_micros(10); 4];
        let results = BenchmarkResults::from_samples(&mut latencies).unwrap();
        assert!((results.points_per_second(1000) - 1.0e8).abs() < 1.0);
        assert_eq!(results.samples, 4);
    }
}
