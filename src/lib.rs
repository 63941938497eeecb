//! Workspace facade crate.
//!
//! Re-exports the public surface of the workspace crates so a host can depend
//! on `meme-sync` alone and pick the collaborator adapters through features:
//!
//! - `desktop-shims` (default): filesystem media store, JSON config store,
//!   tokio transfer service and reqwest HTTP client from `bridge-desktop`.
//! - `stardots` (default): the StarDots remote mirror connector.

pub use bridge_traits;
pub use core_runtime;
pub use core_sync;

#[cfg(feature = "desktop-shims")]
pub use bridge_desktop;

#[cfg(feature = "stardots")]
pub use provider_stardots;

pub use core_runtime::config::{EngineConfig, EngineConfigBuilder};
pub use core_runtime::events::{CoreEvent, EventBus};
pub use core_sync::{DiffReport, SyncContext, SyncError};
