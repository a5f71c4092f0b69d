//! Environment configuration for different deployment stages

use std::env;
use std::time::Duration;

use aws_config::{retry::RetryConfig, timeout::TimeoutConfig, BehaviorVersion};
use tracing::Level;

const MAX_RETRY_ATTEMPTS: u32 = 3;

/// Application environment configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Environment {
    /// Production environment
    Production,
    /// Staging environment
    Staging,
    /// Development environment (uses `LocalStack`)
    Development,
}

impl Environment {
    /// Creates an Environment from the `APP_ENV` environment variable
    ///
    /// # Panics
    ///
    /// Panics if `APP_ENV` contains an invalid value
    #[must_use]
    pub fn from_env() -> Self {
        let env = env::var("APP_ENV")
            .unwrap_or_else(|_| "development".to_string())
            .trim()
            .to_lowercase();

        match env.as_str() {
            "production" => Self::Production,
            "staging" => Self::Staging,
            "development" => Self::Development,
            _ => panic!("Invalid environment: {env}"),
        }
    }

    /// Returns the endpoint URL to use for the storage backend
    ///
    /// `S3_ENDPOINT_URL` overrides the endpoint in every environment so the
    /// client can target MinIO, Ceph and other S3-compatible stores; in
    /// development the `LocalStack` endpoint is used when no override is set.
    #[must_use]
    pub fn override_aws_endpoint_url(&self) -> Option<String> {
        match self {
            Self::Production | Self::Staging => env::var("S3_ENDPOINT_URL").ok(),
            Self::Development => Some(
                env::var("S3_ENDPOINT_URL")
                    .unwrap_or_else(|_| "http://localhost:4566".to_string()),
            ),
        }
    }

    /// AWS configuration with retry and timeout settings
    ///
    /// The standard retry policy is capped at 3 attempts. Per-call deadlines
    /// are enforced by the client facade; the operation timeout here only
    /// backstops requests that would otherwise hang.
    pub async fn aws_config(&self) -> aws_config::SdkConfig {
        let retry_config = RetryConfig::standard()
            .with_max_attempts(MAX_RETRY_ATTEMPTS)
            .with_initial_backoff(Duration::from_millis(50));

        let timeout_config = TimeoutConfig::builder()
            .operation_timeout(Duration::from_secs(30))
            .build();

        let mut config_builder = aws_config::load_defaults(BehaviorVersion::latest())
            .await
            .to_builder()
            .retry_config(retry_config)
            .timeout_config(timeout_config);

        if let Some(endpoint_url) = self.override_aws_endpoint_url() {
            config_builder = config_builder.endpoint_url(endpoint_url);
        }

        config_builder.build()
    }

    /// Diagnostic level for the environment, overridable via `TRACING_LEVEL`
    #[must_use]
    pub fn tracing_level(&self) -> Level {
        env::var("TRACING_LEVEL")
            .ok()
            .and_then(|val| val.parse::<Level>().ok())
            .unwrap_or(match self {
                Self::Production | Self::Staging => Level::INFO,
                Self::Development => Level::DEBUG,
            })
    }
}
