//! # StarDots Provider
//!
//! Implements `RemoteMediaStore` for the StarDots image host.
//!
//! ## Overview
//!
//! This module provides:
//! - Request signing with the space's API key and secret
//! - Paged listing with categories decoded from object names
//! - Multipart uploads and ticket-authorized downloads
//! - Mapping of provider failures onto `BridgeError` kinds, so a broken
//!   response is never mistaken for an unreachable service

pub mod config;
pub mod connector;
pub mod error;
pub mod naming;
pub mod types;

pub use config::{StarDotsConfig, StarDotsConfigBuilder};
pub use connector::StarDotsConnector;
pub use error::{Result, StarDotsError};
