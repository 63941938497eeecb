//! # Engine Configuration Module
//!
//! Provides configuration management for the sync engine.
//!
//! ## Overview
//!
//! The configuration system uses a builder pattern to construct an
//! `EngineConfig` holding every collaborator the engine talks to plus the
//! timing knobs of polling, status-check retry, health checking and rename
//! relocation. It enforces fail-fast validation so a misconfigured engine
//! never starts.
//!
//! ## Required Dependencies
//!
//! - `RemoteMediaStore` - The object store mirror (e.g. StarDots)
//! - `LocalMediaStore` - The local media directory (desktop default: tokio fs)
//! - `ConfigStore` - The category description table (desktop default: JSON file)
//! - `TransferService` - Upload/download jobs (desktop default: tokio tasks)
//!
//! ## Optional Dependencies
//!
//! - `LifecycleObserver` - Suspends the health check while the host is inactive
//!
//! When the `desktop-shims` feature is enabled, desktop-ready defaults for the
//! local store, config store and transfer service are injected automatically
//! if not provided.
//!
//! ## Usage
//!
//! ```ignore
//! use core_runtime::config::EngineConfig;
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! let config = EngineConfig::builder()
//!     .remote_store(Arc::new(connector))
//!     .media_dir("/path/to/memes")
//!     .config_path("/path/to/memes_data.json")
//!     .poll_interval(Duration::from_millis(1000))
//!     .build()
//!     .expect("Failed to build config");
//! ```
//!
//! ## Error Handling
//!
//! Missing collaborators surface as [`Error::CapabilityMissing`], out of range
//! settings as [`Error::Config`], each with an actionable message.

use crate::error::{Error, Result};
use crate::events::DEFAULT_EVENT_BUFFER_SIZE;
use bridge_traits::{
    ConfigStore, LifecycleObserver, LocalMediaStore, RemoteMediaStore, TransferService,
};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Default spacing between two status checks of a transfer job.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(1000);

/// Default spacing between passive health checks.
pub const DEFAULT_HEALTH_CHECK_INTERVAL: Duration = Duration::from_secs(5 * 60);

/// Default bound on the local relocation step of a category rename.
pub const DEFAULT_RENAME_RELOCATION_TIMEOUT: Duration = Duration::from_secs(30);

/// Description given to categories registered without one.
pub const DEFAULT_DESCRIPTION: &str = "请添加描述";

const MAX_STATUS_ATTEMPTS: u32 = 100;

/// Retry policy for failed job status checks.
///
/// The delay before retry `n` (1-based) is `base_delay * multiplier^(n-1)`,
/// capped at `max_delay`. With the defaults that is 2 s, 3 s, 4.5 s, 6.75 s,
/// then 10 s for every later retry.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StatusRetryPolicy {
    /// Total status-check attempts before the job's state is declared unknown
    pub max_attempts: u32,
    /// Delay before the first retry
    pub base_delay: Duration,
    /// Growth factor applied per retry
    pub multiplier: f64,
    /// Upper bound for any single delay
    pub max_delay: Duration,
}

impl Default for StatusRetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 10,
            base_delay: Duration::from_secs(2),
            multiplier: 1.5,
            max_delay: Duration::from_secs(10),
        }
    }
}

impl StatusRetryPolicy {
    /// Delay to wait after the `attempt`-th consecutive failure (1-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(i32::MAX as u32) as i32;
        let scaled = self.base_delay.as_secs_f64() * self.multiplier.powi(exponent);
        if !scaled.is_finite() || scaled >= self.max_delay.as_secs_f64() {
            self.max_delay
        } else {
            Duration::from_secs_f64(scaled)
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_attempts == 0 {
            return Err(Error::Config(
                "Status retry max attempts must be greater than 0".to_string(),
            ));
        }
        if self.max_attempts > MAX_STATUS_ATTEMPTS {
            return Err(Error::Config(format!(
                "Status retry max attempts exceeds maximum of {}",
                MAX_STATUS_ATTEMPTS
            )));
        }
        if self.base_delay.is_zero() {
            return Err(Error::Config(
                "Status retry base delay must be greater than 0".to_string(),
            ));
        }
        if self.max_delay < self.base_delay {
            return Err(Error::Config(
                "Status retry max delay must not be below the base delay".to_string(),
            ));
        }
        if !self.multiplier.is_finite() || self.multiplier < 1.0 {
            return Err(Error::Config(
                "Status retry multiplier must be at least 1.0".to_string(),
            ));
        }
        Ok(())
    }
}

/// Engine configuration.
///
/// This struct holds all collaborators and settings required to run the
/// engine. Use [`EngineConfigBuilder`] to construct instances.
#[derive(Clone)]
pub struct EngineConfig {
    /// Local media directory
    pub local_store: Arc<dyn LocalMediaStore>,

    /// Remote object store mirror
    pub remote_store: Arc<dyn RemoteMediaStore>,

    /// Category description table
    pub config_store: Arc<dyn ConfigStore>,

    /// Upload/download job service
    pub transfer_service: Arc<dyn TransferService>,

    /// App lifecycle observer (optional)
    pub lifecycle_observer: Option<Arc<dyn LifecycleObserver>>,

    /// Spacing between status checks of an active job
    pub poll_interval: Duration,

    /// Retry policy for failed status checks
    pub status_retry: StatusRetryPolicy,

    /// Spacing between passive health checks
    pub health_check_interval: Duration,

    /// Bound on the local relocation step of a rename
    pub rename_relocation_timeout: Duration,

    /// Description assigned to restored and adopted categories
    pub default_description: String,

    /// Capacity of the event bus
    pub event_buffer_size: usize,
}

impl std::fmt::Debug for EngineConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EngineConfig")
            .field("local_store", &"LocalMediaStore { ... }")
            .field("remote_store", &"RemoteMediaStore { ... }")
            .field("config_store", &"ConfigStore { ... }")
            .field("transfer_service", &"TransferService { ... }")
            .field(
                "lifecycle_observer",
                &self
                    .lifecycle_observer
                    .as_ref()
                    .map(|_| "LifecycleObserver { ... }"),
            )
            .field("poll_interval", &self.poll_interval)
            .field("status_retry", &self.status_retry)
            .field("health_check_interval", &self.health_check_interval)
            .field("rename_relocation_timeout", &self.rename_relocation_timeout)
            .field("default_description", &self.default_description)
            .field("event_buffer_size", &self.event_buffer_size)
            .finish()
    }
}

impl EngineConfig {
    /// Creates a new builder for constructing an `EngineConfig`.
    pub fn builder() -> EngineConfigBuilder {
        EngineConfigBuilder::default()
    }

    /// Validates the configuration and returns an error if invalid.
    ///
    /// This checks:
    /// - Intervals and timeouts are non-zero
    /// - The status retry policy is consistent
    /// - The default description is not blank
    pub fn validate(&self) -> Result<()> {
        if self.poll_interval.is_zero() {
            return Err(Error::Config(
                "Poll interval must be greater than 0".to_string(),
            ));
        }

        if self.health_check_interval.is_zero() {
            return Err(Error::Config(
                "Health check interval must be greater than 0".to_string(),
            ));
        }

        if self.rename_relocation_timeout.is_zero() {
            return Err(Error::Config(
                "Rename relocation timeout must be greater than 0".to_string(),
            ));
        }

        self.status_retry.validate()?;

        if self.default_description.trim().is_empty() {
            return Err(Error::Config(
                "Default description cannot be empty".to_string(),
            ));
        }

        if self.event_buffer_size == 0 {
            return Err(Error::Config(
                "Event buffer size must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }
}

fn capability_missing_error(capability: &str, message: &str) -> Error {
    Error::CapabilityMissing {
        capability: capability.to_string(),
        message: message.to_string(),
    }
}

#[cfg(feature = "desktop-shims")]
fn provide_default_local_store(media_dir: Option<PathBuf>) -> Result<Arc<dyn LocalMediaStore>> {
    use bridge_desktop::FsMediaStore;

    let store = match media_dir {
        Some(dir) => FsMediaStore::with_root(dir),
        None => FsMediaStore::new(),
    };
    let store: Arc<dyn LocalMediaStore> = Arc::new(store);
    Ok(store)
}

#[cfg(not(feature = "desktop-shims"))]
fn provide_default_local_store(_media_dir: Option<PathBuf>) -> Result<Arc<dyn LocalMediaStore>> {
    Err(capability_missing_error(
        "LocalMediaStore",
        "LocalMediaStore implementation is required for scanning the media directory. \
         Desktop: ensure the 'desktop-shims' feature is enabled to use the default FsMediaStore. \
         Other hosts: inject a store over the platform's file access.",
    ))
}

#[cfg(feature = "desktop-shims")]
fn provide_default_config_store(config_path: Option<PathBuf>) -> Result<Arc<dyn ConfigStore>> {
    use bridge_desktop::JsonConfigStore;
    use std::thread;
    use tokio::runtime::{Handle, Runtime};

    let init_store = |path: Option<PathBuf>| -> Result<JsonConfigStore> {
        let runtime = Runtime::new().map_err(|e| {
            Error::Internal(format!(
                "Failed to create Tokio runtime for default ConfigStore: {}",
                e
            ))
        })?;

        runtime
            .block_on(async move {
                match path {
                    Some(path) => JsonConfigStore::open(path).await,
                    None => JsonConfigStore::open_default().await,
                }
            })
            .map_err(|e| Error::Internal(format!("Failed to initialize default ConfigStore: {}", e)))
    };

    // A runtime cannot be blocked on from inside another one
    let store = match Handle::try_current() {
        Ok(_) => thread::spawn(move || init_store(config_path))
            .join()
            .map_err(|_| {
                Error::Internal(
                    "Worker thread panicked while creating default ConfigStore".to_string(),
                )
            })??,
        Err(_) => init_store(config_path)?,
    };

    let store: Arc<dyn ConfigStore> = Arc::new(store);
    Ok(store)
}

#[cfg(not(feature = "desktop-shims"))]
fn provide_default_config_store(_config_path: Option<PathBuf>) -> Result<Arc<dyn ConfigStore>> {
    Err(capability_missing_error(
        "ConfigStore",
        "ConfigStore implementation is required for category descriptions. \
         Desktop: ensure the 'desktop-shims' feature is enabled to use the default JsonConfigStore.",
    ))
}

#[cfg(feature = "desktop-shims")]
fn provide_default_transfer_service(
    local: Arc<dyn LocalMediaStore>,
    remote: Arc<dyn RemoteMediaStore>,
) -> Result<Arc<dyn TransferService>> {
    use bridge_desktop::TokioTransferService;

    let service: Arc<dyn TransferService> = Arc::new(TokioTransferService::new(local, remote));
    Ok(service)
}

#[cfg(not(feature = "desktop-shims"))]
fn provide_default_transfer_service(
    _local: Arc<dyn LocalMediaStore>,
    _remote: Arc<dyn RemoteMediaStore>,
) -> Result<Arc<dyn TransferService>> {
    Err(capability_missing_error(
        "TransferService",
        "TransferService implementation is required for upload and download jobs. \
         Desktop: ensure the 'desktop-shims' feature is enabled to use the default TokioTransferService.",
    ))
}

/// Builder for constructing [`EngineConfig`] instances.
///
/// Call [`build()`](EngineConfigBuilder::build) once every required
/// collaborator is set; unset timing knobs take their defaults.
#[derive(Default)]
pub struct EngineConfigBuilder {
    media_dir: Option<PathBuf>,
    config_path: Option<PathBuf>,
    local_store: Option<Arc<dyn LocalMediaStore>>,
    remote_store: Option<Arc<dyn RemoteMediaStore>>,
    config_store: Option<Arc<dyn ConfigStore>>,
    transfer_service: Option<Arc<dyn TransferService>>,
    lifecycle_observer: Option<Arc<dyn LifecycleObserver>>,
    poll_interval: Option<Duration>,
    status_retry: Option<StatusRetryPolicy>,
    health_check_interval: Option<Duration>,
    rename_relocation_timeout: Option<Duration>,
    default_description: Option<String>,
    event_buffer_size: Option<usize>,
}

impl EngineConfigBuilder {
    /// Sets the media root used by the default local store.
    pub fn media_dir<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.media_dir = Some(path.into());
        self
    }

    /// Sets the JSON file used by the default config store.
    pub fn config_path<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.config_path = Some(path.into());
        self
    }

    pub fn local_store(mut self, store: Arc<dyn LocalMediaStore>) -> Self {
        self.local_store = Some(store);
        self
    }

    /// Sets the remote store (required, no default).
    pub fn remote_store(mut self, store: Arc<dyn RemoteMediaStore>) -> Self {
        self.remote_store = Some(store);
        self
    }

    pub fn config_store(mut self, store: Arc<dyn ConfigStore>) -> Self {
        self.config_store = Some(store);
        self
    }

    /// Sets the transfer service.
    ///
    /// If not provided, the desktop default runs transfers between the local
    /// and remote stores in spawned tokio tasks.
    pub fn transfer_service(mut self, service: Arc<dyn TransferService>) -> Self {
        self.transfer_service = Some(service);
        self
    }

    /// Sets the lifecycle observer (optional).
    ///
    /// When present, the health check is suspended while the host is
    /// backgrounded and resumed when it returns to the foreground.
    pub fn lifecycle_observer(mut self, observer: Arc<dyn LifecycleObserver>) -> Self {
        self.lifecycle_observer = Some(observer);
        self
    }

    /// Default: 1000 ms
    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = Some(interval);
        self
    }

    pub fn status_retry(mut self, policy: StatusRetryPolicy) -> Self {
        self.status_retry = Some(policy);
        self
    }

    /// Default: 5 minutes
    pub fn health_check_interval(mut self, interval: Duration) -> Self {
        self.health_check_interval = Some(interval);
        self
    }

    /// Default: 30 seconds
    pub fn rename_relocation_timeout(mut self, timeout: Duration) -> Self {
        self.rename_relocation_timeout = Some(timeout);
        self
    }

    pub fn default_description(mut self, description: impl Into<String>) -> Self {
        self.default_description = Some(description.into());
        self
    }

    pub fn event_buffer_size(mut self, size: usize) -> Self {
        self.event_buffer_size = Some(size);
        self
    }

    /// Builds the final `EngineConfig` instance.
    ///
    /// # Returns
    ///
    /// Returns `Ok(EngineConfig)` on success, or an error if:
    /// - The remote store is missing
    /// - Another required collaborator is missing and no default is available
    /// - A timing value is out of range
    pub fn build(self) -> Result<EngineConfig> {
        let remote_store = self.remote_store.ok_or_else(|| {
            capability_missing_error(
                "RemoteMediaStore",
                "Remote store is required. Use .remote_store() to set it.",
            )
        })?;

        let local_store = match self.local_store {
            Some(store) => store,
            None => provide_default_local_store(self.media_dir)?,
        };

        let config_store = match self.config_store {
            Some(store) => store,
            None => provide_default_config_store(self.config_path)?,
        };

        let transfer_service = match self.transfer_service {
            Some(service) => service,
            None => provide_default_transfer_service(
                Arc::clone(&local_store),
                Arc::clone(&remote_store),
            )?,
        };

        let config = EngineConfig {
            local_store,
            remote_store,
            config_store,
            transfer_service,
            lifecycle_observer: self.lifecycle_observer,
            poll_interval: self.poll_interval.unwrap_or(DEFAULT_POLL_INTERVAL),
            status_retry: self.status_retry.unwrap_or_default(),
            health_check_interval: self
                .health_check_interval
                .unwrap_or(DEFAULT_HEALTH_CHECK_INTERVAL),
            rename_relocation_timeout: self
                .rename_relocation_timeout
                .unwrap_or(DEFAULT_RENAME_RELOCATION_TIMEOUT),
            default_description: self
                .default_description
                .unwrap_or_else(|| DEFAULT_DESCRIPTION.to_string()),
            event_buffer_size: self.event_buffer_size.unwrap_or(DEFAULT_EVENT_BUFFER_SIZE),
        };

        config.validate()?;

        Ok(config)
    }
}
