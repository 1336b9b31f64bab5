//! Service configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Prefix shared by every environment variable the service reads.
pub const ENV_PREFIX: &str = "BOOKNLP_";

/// Configuration errors.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for {key}: {value:?}")]
    InvalidValue { key: String, value: String },

    #[error("{0} must be greater than zero")]
    Zero(&'static str),
}

/// Configuration for the job service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// Maximum number of pending jobs in the admission queue.
    pub max_queue_size: usize,
    /// How long terminal jobs stay queryable (milliseconds).
    pub job_ttl_ms: u64,
    /// How long shutdown waits for the running job (milliseconds).
    pub shutdown_grace_ms: u64,
    /// Interval between periodic table sweeps (milliseconds).
    pub sweep_interval_ms: u64,
    /// Bounded wait of the worker for the next job (milliseconds).
    pub poll_timeout_ms: u64,
    /// Capacity of the progress channel between processor and table.
    pub progress_buffer: usize,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            max_queue_size: 10,
            job_ttl_ms: 3_600_000,
            shutdown_grace_ms: 30_000,
            sweep_interval_ms: 60_000,
            poll_timeout_ms: 1_000,
            progress_buffer: 64,
        }
    }
}

impl ServiceConfig {
    /// Read the configuration from `BOOKNLP_*` environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a configuration from an arbitrary key lookup.
    ///
    /// Unset keys keep their defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        let get = |name: &str| {
            let key = format!("{ENV_PREFIX}{name}");
            lookup(&key).map(|value| (key, value.trim().to_string()))
        };

        if let Some((key, value)) = get("MAX_QUEUE_SIZE") {
            config.max_queue_size = parse(&key, &value)?;
        }
        if let Some((key, value)) = get("JOB_TTL_SECONDS") {
            config.job_ttl_ms = parse::<u64>(&key, &value)?.saturating_mul(1_000);
        }
        if let Some((key, value)) = get("SHUTDOWN_GRACE_PERIOD") {
            config.shutdown_grace_ms = secs_to_ms(&key, &value)?;
        }
        if let Some((key, value)) = get("SWEEP_INTERVAL_SECONDS") {
            config.sweep_interval_ms = parse::<u64>(&key, &value)?.saturating_mul(1_000);
        }
        if let Some((key, value)) = get("POLL_TIMEOUT_MS") {
            config.poll_timeout_ms = parse(&key, &value)?;
        }
        if let Some((key, value)) = get("PROGRESS_BUFFER") {
            config.progress_buffer = parse(&key, &value)?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Reject values the runtime cannot work with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_queue_size == 0 {
            return Err(ConfigError::Zero("max_queue_size"));
        }
        if self.poll_timeout_ms == 0 {
            return Err(ConfigError::Zero("poll_timeout_ms"));
        }
        if self.sweep_interval_ms == 0 {
            return Err(ConfigError::Zero("sweep_interval_ms"));
        }
        if self.progress_buffer == 0 {
            return Err(ConfigError::Zero("progress_buffer"));
        }
        Ok(())
    }

    /// Set the admission queue capacity.
    pub fn with_max_queue_size(mut self, max_queue_size: usize) -> Self {
        self.max_queue_size = max_queue_size;
        self
    }

    /// Set the retention window for terminal jobs.
    pub fn with_job_ttl(mut self, ttl: Duration) -> Self {
        self.job_ttl_ms = duration_ms(ttl);
        self
    }

    /// Set the default shutdown grace period.
    pub fn with_shutdown_grace(mut self, grace: Duration) -> Self {
        self.shutdown_grace_ms = duration_ms(grace);
        self
    }

    /// Set the periodic sweep interval.
    pub fn with_sweep_interval(mut self, interval: Duration) -> Self {
        self.sweep_interval_ms = duration_ms(interval);
        self
    }

    /// Set the worker's bounded wait for the next job.
    pub fn with_poll_timeout(mut self, timeout: Duration) -> Self {
        self.poll_timeout_ms = duration_ms(timeout);
        self
    }

    pub fn job_ttl(&self) -> Duration {
        Duration::from_millis(self.job_ttl_ms)
    }

    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_millis(self.shutdown_grace_ms)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_millis(self.sweep_interval_ms)
    }

    pub fn poll_timeout(&self) -> Duration {
        Duration::from_millis(self.poll_timeout_ms)
    }
}

fn duration_ms(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

fn parse<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, ConfigError> {
    value.parse().map_err(|_| ConfigError::InvalidValue {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn secs_to_ms(key: &str, value: &str) -> Result<u64, ConfigError> {
    let secs: f64 = parse(key, value)?;
    if !secs.is_finite() || secs < 0.0 {
        return Err(ConfigError::InvalidValue {
            key: key.to_string(),
            value: value.to_string(),
        });
    }
    Ok((secs * 1_000.0).round() as u64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_when_unset() {
        let config = ServiceConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config, ServiceConfig::default());
        assert_eq!(config.job_ttl(), Duration::from_secs(3600));
        assert_eq!(config.shutdown_grace(), Duration::from_secs(30));
    }

    #[test]
    fn test_reads_prefixed_variables() {
        let config = ServiceConfig::from_lookup(lookup(&[
            ("BOOKNLP_MAX_QUEUE_SIZE", "3"),
            ("BOOKNLP_JOB_TTL_SECONDS", "120"),
            ("BOOKNLP_SHUTDOWN_GRACE_PERIOD", "2.5"),
            ("BOOKNLP_POLL_TIMEOUT_MS", " 250 "),
        ]))
        .unwrap();

        assert_eq!(config.max_queue_size, 3);
        assert_eq!(config.job_ttl_ms, 120_000);
        assert_eq!(config.shutdown_grace_ms, 2_500);
        assert_eq!(config.poll_timeout_ms, 250);
    }

    #[test]
    fn test_rejects_garbage_and_zero() {
        let err = ServiceConfig::from_lookup(lookup(&[("BOOKNLP_MAX_QUEUE_SIZE", "ten")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { .. }));

        let err = ServiceConfig::from_lookup(lookup(&[("BOOKNLP_MAX_QUEUE_SIZE", "0")]))
            .unwrap_err();
        assert_eq!(err, ConfigError::Zero("max_queue_size"));

        let err =
            ServiceConfig::from_lookup(lookup(&[("BOOKNLP_SHUTDOWN_GRACE_PERIOD", "-1")]))
                .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { .. }));
    }
}
