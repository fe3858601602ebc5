use std::str::FromStr;
use std::time::Duration;

use crate::messaging::RedpandaConfig;
use crate::workers::{CleanupConfig, PublisherConfig, Schedule};

// ============================================================================
// Application Configuration
// ============================================================================
//
// Read from environment variables (a `.env` file is loaded first by main).
// Every option has a safe default; a value that is present but unparsable is
// an error rather than silently replaced by the default.
//
// ============================================================================

/// One hundred years.
const MAX_RETENTION_DAYS: u32 = 36_500;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{key}={value:?} is invalid: {reason}")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    /// `None` selects the in-memory store.
    pub database_url: Option<String>,
    pub database_max_connections: u32,
    pub brokers: String,
    pub topic: String,
    pub send_timeout: Duration,
    pub outbox_enabled: bool,
    pub poll_interval: Duration,
    pub batch_size: usize,
    pub max_backoff: Duration,
    pub retention_days: u32,
    pub cleanup_schedule: Schedule,
    pub metrics_port: u16,
    pub demo_lifecycle: bool,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = Env { lookup };

        let batch_size: usize = env.parse("OUTBOX_BATCH_SIZE", 200)?;
        if batch_size == 0 {
            return Err(ConfigError::Invalid {
                key: "OUTBOX_BATCH_SIZE",
                value: "0".to_string(),
                reason: "must be greater than zero".to_string(),
            });
        }

        let poll_interval_ms: u64 = env.parse("OUTBOX_POLL_INTERVAL_MS", 1000)?;
        if poll_interval_ms == 0 {
            return Err(ConfigError::Invalid {
                key: "OUTBOX_POLL_INTERVAL_MS",
                value: "0".to_string(),
                reason: "must be greater than zero".to_string(),
            });
        }

        let retention_days: u32 = env.parse("OUTBOX_RETENTION_DAYS", 7)?;
        if retention_days > MAX_RETENTION_DAYS {
            return Err(ConfigError::Invalid {
                key: "OUTBOX_RETENTION_DAYS",
                value: retention_days.to_string(),
                reason: format!("must be at most {MAX_RETENTION_DAYS}"),
            });
        }

        Ok(Self {
            database_url: env.get("DATABASE_URL").filter(|url| !url.trim().is_empty()),
            database_max_connections: env.parse("DATABASE_MAX_CONNECTIONS", 10)?,
            brokers: env
                .get("REDPANDA_BROKERS")
                .unwrap_or_else(|| "localhost:9092".to_string()),
            topic: env
                .get("OUTBOX_TOPIC")
                .unwrap_or_else(|| "orders.events".to_string()),
            send_timeout: Duration::from_millis(env.parse("OUTBOX_SEND_TIMEOUT_MS", 5000)?),
            outbox_enabled: env.parse("OUTBOX_ENABLED", true)?,
            poll_interval: Duration::from_millis(poll_interval_ms),
            batch_size,
            max_backoff: Duration::from_millis(env.parse("OUTBOX_MAX_BACKOFF_MS", 30_000)?),
            retention_days,
            cleanup_schedule: env.parse_or("OUTBOX_CLEANUP_SCHEDULE", "daily@03:00")?,
            metrics_port: env.parse("METRICS_PORT", 9090)?,
            demo_lifecycle: env.parse("DEMO_LIFECYCLE", false)?,
        })
    }

    pub fn redpanda(&self) -> RedpandaConfig {
        RedpandaConfig {
            brokers: self.brokers.clone(),
            message_timeout: self.send_timeout,
        }
    }

    pub fn publisher(&self) -> PublisherConfig {
        PublisherConfig {
            topic: self.topic.clone(),
            poll_interval: self.poll_interval,
            batch_size: self.batch_size,
            send_timeout: self.send_timeout,
            max_backoff: self.max_backoff,
        }
    }

    pub fn cleanup(&self) -> CleanupConfig {
        CleanupConfig {
            retention_days: self.retention_days,
            schedule: self.cleanup_schedule,
        }
    }
}

struct Env<F> {
    lookup: F,
}

impl<F> Env<F>
where
    F: Fn(&str) -> Option<String>,
{
    fn get(&self, key: &str) -> Option<String> {
        (self.lookup)(key)
    }

    fn parse<T>(&self, key: &'static str, default: T) -> Result<T, ConfigError>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        match self.get(key) {
            None => Ok(default),
            Some(raw) => parse_value(key, &raw),
        }
    }

    /// Like `parse`, with the default given in its textual form.
    fn parse_or<T>(&self, key: &'static str, default: &str) -> Result<T, ConfigError>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        let raw = self.get(key).unwrap_or_else(|| default.to_string());
        parse_value(key, &raw)
    }
}

fn parse_value<T>(key: &'static str, raw: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    raw.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
        key,
        value: raw.to_string(),
        reason: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(vars: &[(&str, &str)]) -> Result<AppConfig, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        AppConfig::from_lookup(move |key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = config(&[]).unwrap();

        assert_eq!(config.database_url, None);
        assert_eq!(config.database_max_connections, 10);
        assert_eq!(config.brokers, "localhost:9092");
        assert_eq!(config.topic, "orders.events");
        assert_eq!(config.send_timeout, Duration::from_secs(5));
        assert!(config.outbox_enabled);
        assert_eq!(config.poll_interval, Duration::from_secs(1));
        assert_eq!(config.batch_size, 200);
        assert_eq!(config.max_backoff, Duration::from_secs(30));
        assert_eq!(config.retention_days, 7);
        assert_eq!(config.cleanup_schedule.to_string(), "daily@03:00");
        assert_eq!(config.metrics_port, 9090);
        assert!(!config.demo_lifecycle);
    }

    #[test]
    fn test_overrides() {
        let config = config(&[
            ("DATABASE_URL", "postgres://localhost/orders"),
            ("OUTBOX_TOPIC", "custom.topic"),
            ("OUTBOX_BATCH_SIZE", "50"),
            ("OUTBOX_POLL_INTERVAL_MS", "250"),
            ("OUTBOX_ENABLED", "false"),
            ("OUTBOX_CLEANUP_SCHEDULE", "every:15m"),
        ])
        .unwrap();

        assert_eq!(config.database_url.as_deref(), Some("postgres://localhost/orders"));
        assert_eq!(config.topic, "custom.topic");
        assert_eq!(config.batch_size, 50);
        assert_eq!(config.poll_interval, Duration::from_millis(250));
        assert!(!config.outbox_enabled);
        assert_eq!(config.cleanup_schedule, Schedule::Every(Duration::from_secs(900)));

        let publisher = config.publisher();
        assert_eq!(publisher.topic, "custom.topic");
        assert_eq!(publisher.batch_size, 50);
    }

    #[test]
    fn test_blank_database_url_means_in_memory() {
        assert_eq!(config(&[("DATABASE_URL", "  ")]).unwrap().database_url, None);
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        let err = config(&[("OUTBOX_BATCH_SIZE", "lots")]).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { key: "OUTBOX_BATCH_SIZE", .. }));

        assert!(config(&[("OUTBOX_BATCH_SIZE", "0")]).is_err());
        assert!(config(&[("OUTBOX_POLL_INTERVAL_MS", "0")]).is_err());
        assert!(config(&[("OUTBOX_ENABLED", "maybe")]).is_err());
        assert!(config(&[("OUTBOX_CLEANUP_SCHEDULE", "weekly")]).is_err());
        assert!(config(&[("METRICS_PORT", "70000")]).is_err());
    }

    #[test]
    fn test_retention_is_capped() {
        assert_eq!(config(&[("OUTBOX_RETENTION_DAYS", "36500")]).unwrap().retention_days, 36_500);

        let err = config(&[("OUTBOX_RETENTION_DAYS", "4294967295")]).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { key: "OUTBOX_RETENTION_DAYS", .. }));
    }
}
