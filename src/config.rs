use crate::app_env;
use crate::domain::task_feed::NotificationPolicy;
use std::env;
use std::fmt::Display;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("required environment variable {0} is not set")]
    Missing(&'static str),
    #[error("environment variable {key} has an invalid value: {problem}")]
    Invalid { key: &'static str, problem: String },
}

/// Exporter endpoints for OpenTelemetry. Only present when both URLs are configured.
#[derive(Debug, Clone)]
pub struct OtelEndpoints {
    pub spans: String,
    pub metrics: String,
}

/// Settings the server needs at startup, read from the environment (and a .env file if present)
#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub database_url: String,
    pub otel: Option<OtelEndpoints>,
    pub identity_provider_url: String,
    pub identity_provider_api_key: String,
    pub push_gateway_url: Option<String>,
    pub notification_policy: NotificationPolicy,
    pub session_idle_timeout: Duration,
    /// Variables that were unset and fell back to a default, with the default used
    pub defaulted: Vec<(&'static str, &'static str)>,
}

impl Config {
    pub fn load() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the config from any key-value source. Blank values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut source = Source {
            lookup,
            defaulted: Vec::new(),
        };

        let otel = match (
            source.optional(app_env::OTEL_SPAN_EXPORT_URL),
            source.optional(app_env::OTEL_METRIC_EXPORT_URL),
        ) {
            (Some(spans), Some(metrics)) => Some(OtelEndpoints { spans, metrics }),
            _ => None,
        };
        let idle_minutes: u64 = source.parse_or(app_env::SESSION_IDLE_TIMEOUT_MINUTES, "1440")?;

        Ok(Config {
            port: source.parse_or(app_env::PORT, "8080")?,
            database_url: source.required(app_env::DB_URL)?,
            otel,
            identity_provider_url: source.required(app_env::IDENTITY_PROVIDER_URL)?,
            identity_provider_api_key: source.required(app_env::IDENTITY_PROVIDER_API_KEY)?,
            push_gateway_url: source.optional(app_env::PUSH_GATEWAY_URL),
            notification_policy: source
                .parse_or(app_env::DEADLINE_NOTIFICATION_POLICY, "every_snapshot")?,
            session_idle_timeout: Duration::from_secs(idle_minutes * 60),
            defaulted: source.defaulted,
        })
    }

    /// Reports which settings fell back to defaults. Call once logging is set up.
    pub fn log_defaults(&self) {
        for (key, default) in &self.defaulted {
            info!("{key} not set, using default: {default}");
        }
    }
}

struct Source<F> {
    lookup: F,
    defaulted: Vec<(&'static str, &'static str)>,
}

impl<F: Fn(&str) -> Option<String>> Source<F> {
    fn optional(&self, key: &'static str) -> Option<String> {
        (self.lookup)(key).filter(|value| !value.trim().is_empty())
    }

    fn required(&self, key: &'static str) -> Result<String, ConfigError> {
        self.optional(key).ok_or(ConfigError::Missing(key))
    }

    fn parse_or<T: FromStr>(&mut self, key: &'static str, default: &'static str) -> Result<T, ConfigError>
    where
        T::Err: Display,
    {
        let raw = match self.optional(key) {
            Some(raw) => raw,
            None => {
                self.defaulted.push((key, default));
                default.to_owned()
            }
        };

        raw.trim().parse().map_err(|err: T::Err| ConfigError::Invalid {
            key,
            problem: err.to_string(),
        })
    }
}
