/// URL for accessing the PostrgeSQL database (should contain a schema name in the path)
pub const DB_URL: &str = "DATABASE_URL";
/// Log level configuration for the application. For formatting info, see [tracing_subscriber's EnvFilter documentation](https://docs.rs/tracing-subscriber/latest/tracing_subscriber/filter/struct.EnvFilter.html)
pub const LOG_LEVEL: &str = "LOG_LEVEL";
/// Port the HTTP server listens on. Defaults to 8080.
pub const PORT: &str = "PORT";

/// OpenTelemetry span export URL. Should be http://localhost:4317 by default, as the service should
/// have an OpenTelemetry collector sidecar which directs metrics to the correct place
pub const OTEL_SPAN_EXPORT_URL: &str = "OTEL_SPAN_EXPORT_URL";
/// OpenTelemetry metrics export URL. Should be http://localhost:4317 by default, as the service should
/// have an OpenTelemetry collector sidecar which directs metrics to the correct place
pub const OTEL_METRIC_EXPORT_URL: &str = "OTEL_METRIC_EXPORT_URL";

/// Base URL of the identity provider which stores and verifies user credentials
pub const IDENTITY_PROVIDER_URL: &str = "IDENTITY_PROVIDER_URL";
/// API key sent to the identity provider on every request
pub const IDENTITY_PROVIDER_API_KEY: &str = "IDENTITY_PROVIDER_API_KEY";
/// URL of the push gateway which delivers deadline notifications. Notifications are dropped when unset.
pub const PUSH_GATEWAY_URL: &str = "PUSH_GATEWAY_URL";
/// Either "every_snapshot" (default) or "once_per_task_per_day"
pub const DEADLINE_NOTIFICATION_POLICY: &str = "DEADLINE_NOTIFICATION_POLICY";

/// Minutes a session may go unused before it is closed. Defaults to 1440 (one day).
pub const SESSION_IDLE_TIMEOUT_MINUTES: &str = "SESSION_IDLE_TIMEOUT_MINUTES";
