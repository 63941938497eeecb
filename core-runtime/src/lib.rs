//! # Core Runtime Module
//!
//! Provides foundational runtime infrastructure for the sync engine:
//! - Logging and tracing infrastructure
//! - Engine configuration
//! - Event bus system
//!
//! ## Overview
//!
//! This crate contains the runtime utilities that the sync core depends on.
//! It establishes the logging conventions, the configuration builder and the
//! event broadcasting used throughout the system.

pub mod config;
pub mod error;
pub mod events;
pub mod logging;

pub use config::{EngineConfig, EngineConfigBuilder, StatusRetryPolicy};
pub use error::{Error, Result};
pub use events::{CoreEvent, EventBus, EventStream};
