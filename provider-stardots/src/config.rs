//! StarDots connection settings
//!
//! Credentials come from the StarDots console: an API key, its secret and the
//! name of the space that holds the mirror.

use std::fmt;
use std::time::Duration;

use crate::error::{Result, StarDotsError};

/// Default API endpoint
pub const DEFAULT_API_BASE: &str = "https://api.stardots.io";

/// Default host serving stored objects
pub const DEFAULT_DOWNLOAD_BASE: &str = "https://i.stardots.io";

/// Environment variables read by [`StarDotsConfig::from_env`]
pub const ENV_KEY: &str = "STARDOTS_KEY";
pub const ENV_SECRET: &str = "STARDOTS_SECRET";
pub const ENV_SPACE: &str = "STARDOTS_SPACE";

/// Connection settings for a StarDots space.
///
/// `Debug` output never includes the secret.
#[derive(Clone)]
pub struct StarDotsConfig {
    pub key: String,
    pub secret: String,
    pub space: String,
    pub api_base: String,
    pub download_base: String,
    /// Timeout for list, ticket and delete calls
    pub request_timeout: Duration,
    /// Timeout for uploads and object downloads
    pub transfer_timeout: Duration,
}

impl fmt::Debug for StarDotsConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StarDotsConfig")
            .field("key", &self.key)
            .field("secret", &"<redacted>")
            .field("space", &self.space)
            .field("api_base", &self.api_base)
            .field("download_base", &self.download_base)
            .field("request_timeout", &self.request_timeout)
            .field("transfer_timeout", &self.transfer_timeout)
            .finish()
    }
}

impl StarDotsConfig {
    pub fn builder() -> StarDotsConfigBuilder {
        StarDotsConfigBuilder::default()
    }

    /// Build from `STARDOTS_KEY`, `STARDOTS_SECRET` and `STARDOTS_SPACE`.
    pub fn from_env() -> Result<Self> {
        let mut builder = Self::builder();
        if let Ok(key) = std::env::var(ENV_KEY) {
            builder = builder.key(key);
        }
        if let Ok(secret) = std::env::var(ENV_SECRET) {
            builder = builder.secret(secret);
        }
        if let Ok(space) = std::env::var(ENV_SPACE) {
            builder = builder.space(space);
        }
        builder.build()
    }

    pub fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("API key", &self.key),
            ("API secret", &self.secret),
            ("Space", &self.space),
        ] {
            if value.trim().is_empty() {
                return Err(StarDotsError::InvalidConfig(format!(
                    "{} cannot be empty",
                    name
                )));
            }
        }

        if self.space.contains('/') {
            return Err(StarDotsError::InvalidConfig(
                "Space name cannot contain '/'".to_string(),
            ));
        }

        for (name, url) in [("API base", &self.api_base), ("Download base", &self.download_base)] {
            if !(url.starts_with("https://") || url.starts_with("http://")) {
                return Err(StarDotsError::InvalidConfig(format!(
                    "{} must be an http(s) URL, got '{}'",
                    name, url
                )));
            }
        }

        if self.request_timeout.is_zero() || self.transfer_timeout.is_zero() {
            return Err(StarDotsError::InvalidConfig(
                "Timeouts must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }
}

/// Builder for [`StarDotsConfig`].
#[derive(Default)]
pub struct StarDotsConfigBuilder {
    key: Option<String>,
    secret: Option<String>,
    space: Option<String>,
    api_base: Option<String>,
    download_base: Option<String>,
    request_timeout: Option<Duration>,
    transfer_timeout: Option<Duration>,
}

impl StarDotsConfigBuilder {
    /// Sets the API key sent as `x-stardots-key`.
    pub fn key(mut self, key: impl Into<String>) -> Self {
        self.key = Some(key.into());
        self
    }

    /// Sets the secret used to sign requests.
    pub fn secret(mut self, secret: impl Into<String>) -> Self {
        self.secret = Some(secret.into());
        self
    }

    /// Sets the space holding the mirror.
    pub fn space(mut self, space: impl Into<String>) -> Self {
        self.space = Some(space.into());
        self
    }

    /// Overrides the API endpoint (defaults to [`DEFAULT_API_BASE`]).
    pub fn api_base(mut self, url: impl Into<String>) -> Self {
        self.api_base = Some(url.into());
        self
    }

    /// Overrides the object host (defaults to [`DEFAULT_DOWNLOAD_BASE`]).
    pub fn download_base(mut self, url: impl Into<String>) -> Self {
        self.download_base = Some(url.into());
        self
    }

    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(timeout);
        self
    }

    pub fn transfer_timeout(mut self, timeout: Duration) -> Self {
        self.transfer_timeout = Some(timeout);
        self
    }

    pub fn build(self) -> Result<StarDotsConfig> {
        let key = self.key.ok_or_else(|| {
            StarDotsError::InvalidConfig("API key is required. Use .key() to set it.".to_string())
        })?;
        let secret = self.secret.ok_or_else(|| {
            StarDotsError::InvalidConfig(
                "API secret is required. Use .secret() to set it.".to_string(),
            )
        })?;
        let space = self.space.ok_or_else(|| {
            StarDotsError::InvalidConfig("Space is required. Use .space() to set it.".to_string())
        })?;

        let config = StarDotsConfig {
            key,
            secret,
            space,
            api_base: self
                .api_base
                .unwrap_or_else(|| DEFAULT_API_BASE.to_string())
                .trim_end_matches('/')
                .to_string(),
            download_base: self
                .download_base
                .unwrap_or_else(|| DEFAULT_DOWNLOAD_BASE.to_string())
                .trim_end_matches('/')
                .to_string(),
            request_timeout: self.request_timeout.unwrap_or(Duration::from_secs(30)),
            transfer_timeout: self.transfer_timeout.unwrap_or(Duration::from_secs(60)),
        };

        config.validate()?;
        Ok(config)
    }
}
