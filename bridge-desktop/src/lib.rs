//! # Desktop Bridge Implementations
//!
//! Default implementations of bridge traits for desktop platforms
//! (macOS, Windows, Linux).
//!
//! ## Overview
//!
//! This crate provides production-ready implementations of the collaborator
//! traits using desktop-appropriate libraries:
//! - `LocalMediaStore` over a directory tree using `tokio::fs`
//! - `ConfigStore` as a JSON object file with atomic rewrites
//! - `TransferService` running bulk transfers as Tokio tasks
//! - `HttpClient` using `reqwest`
//! - `LifecycleObserver` driven by the host UI
//!
//! ## Usage
//!
//! ```ignore
//! use bridge_desktop::{FsMediaStore, JsonConfigStore, TokioTransferService};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> bridge_traits::error::Result<()> {
//!     let local = Arc::new(FsMediaStore::with_root("./memes"));
//!     let config = Arc::new(JsonConfigStore::open("./memes_data.json").await?);
//!     let transfers = Arc::new(TokioTransferService::new(local.clone(), remote.clone()));
//!
//!     // Use in engine configuration
//!     Ok(())
//! }
//! ```

mod config_store;
mod filesystem;
mod http;
mod lifecycle;
mod transfer;

pub use config_store::{JsonConfigStore, DEFAULT_CONFIG_FILE};
pub use filesystem::FsMediaStore;
pub use http::ReqwestHttpClient;
pub use lifecycle::DesktopLifecycleObserver;
pub use transfer::{TokioTransferService, TransferRetry, DEFAULT_JOB_RETENTION};
