//! Storage configuration types.

use std::time::Duration;

use bazaar_shared::StorageSettings;

pub use bazaar_shared::StorageProvider;

/// Storage service configuration.
#[derive(Debug, Clone)]
pub struct StorageConfig {
    /// Storage provider configuration.
    pub provider: StorageProvider,
    /// Base URL objects are publicly served from.
    pub public_base_url: String,
    /// Prefix for every generated object key.
    pub key_prefix: String,
    /// Upper bound for a single remote call.
    pub operation_timeout: Duration,
}

impl StorageConfig {
    /// Default key prefix.
    pub const DEFAULT_KEY_PREFIX: &'static str = "bazaar";
    /// Default per-call timeout: 30 seconds.
    pub const DEFAULT_OPERATION_TIMEOUT: Duration = Duration::from_secs(30);

    /// Create a new storage config with default settings.
    #[must_use]
    pub fn new(provider: StorageProvider, public_base_url: impl Into<String>) -> Self {
        Self {
            provider,
            public_base_url: public_base_url.into(),
            key_prefix: Self::DEFAULT_KEY_PREFIX.to_string(),
            operation_timeout: Self::DEFAULT_OPERATION_TIMEOUT,
        }
    }

    /// Build from the application settings section.
    #[must_use]
    pub fn from_settings(settings: &StorageSettings) -> Self {
        Self::new(settings.provider.clone(), settings.public_base_url.clone())
            .with_key_prefix(settings.key_prefix.clone())
            .with_operation_timeout(Duration::from_secs(settings.operation_timeout_secs))
    }

    /// Set the object key prefix.
    #[must_use]
    pub fn with_key_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.key_prefix = prefix.into();
        self
    }

    /// Set the per-call timeout.
    #[must_use]
    pub fn with_operation_timeout(mut self, timeout: Duration) -> Self {
        self.operation_timeout = timeout;
        self
    }

    /// Public URL for an object key.
    #[must_use]
    pub fn public_url(&self, key: &str) -> String {
        format!("{}/{}", self.public_base_url.trim_end_matches('/'), key)
    }
}
