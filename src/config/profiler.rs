//! Offline profiler configuration.

use super::{parse_env_bool, parse_env_var, Config};
use crate::error::{Result, VkernError};
use serde::{Deserialize, Serialize};

/// Measurement parameters for the profiler.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProfilerConfig {
    /// Untimed runs before measurement
    pub warmup_iterations: usize,
    /// Timed runs per implementation
    pub measurement_iterations: usize,
    /// Representative input size in samples
    pub num_points: usize,
    /// Profile kernels on the rayon pool
    pub parallel: bool,
    /// Compare every candidate with the generic implementation before timing
    pub verify: bool,
    /// Agreement bound per sample used by verification
    pub tolerance: f32,
}

impl Default for ProfilerConfig {
    fn default() -> Self {
        Self {
            warmup_iterations: 10,
            measurement_iterations: 100,
            num_points: 131_071,
            parallel: false,
            verify: true,
            tolerance: 1e-3,
        }
    }
}

impl ProfilerConfig {
    /// Short run suitable for tests and smoke checks
    pub fn quick() -> Self {
        Self {
            warmup_iterations: 2,
            measurement_iterations: 8,
            num_points: 4099,
            ..Self::default()
        }
    }

    /// Long run for stable measurements
    pub fn thorough() -> Self {
        Self {
            warmup_iterations: 50,
            measurement_iterations: 1000,
            ..Self::default()
        }
    }
}

impl Config for ProfilerConfig {
    const NAME: &'static str = "profiler";

    fn validate(&self) -> Result<()> {
        if self.measurement_iterations == 0 {
            return Err(VkernError::configuration(
                "measurement_iterations must be greater than zero",
            ));
        }
        if self.num_points == 0 {
            return Err(VkernError::configuration(
                "num_points must be greater than zero",
            ));
        }
        if !self.tolerance.is_finite() || self.tolerance < 0.0 {
            return Err(VkernError::configuration(format!(
                "tolerance must be a finite non-negative number, got {}",
                self.tolerance
            )));
        }
        Ok(())
    }

    fn from_env_with_prefix(prefix: &str) -> Result<Self> {
        let mut config = Self::default();
        config.warmup_iterations = parse_env_var(
            &format!("{}PROFILE_WARMUP", prefix),
            config.warmup_iterations,
        );
        config.measurement_iterations = parse_env_var(
            &format!("{}PROFILE_ITERATIONS", prefix),
            config.measurement_iterations,
        );
        config.num_points =
            parse_env_var(&format!("{}PROFILE_POINTS", prefix), config.num_points);
        config.parallel = parse_env_bool(&format!("{}PROFILE_PARALLEL", prefix), config.parallel);
        config.verify = parse_env_bool(&format!("{}PROFILE_VERIFY", prefix), config.verify);
        config.tolerance =
            parse_env_var(&format!("{}PROFILE_TOLERANCE", prefix), config.tolerance);
        config.validate()?;
        Ok(config)
    }
}
