//! Proxy module
//!
//! Local stand-ins for remote catalog entities.
//!
//! # Overview
//!
//! - A [`Registry`] maps (kind, id) to at most one live record; every
//!   [`Proxy`] handle to the same entity shares that record
//! - Records load lazily on first read and buffer writes until synced
//! - [`DeferredSync`] scopes batch writes across records and sync them on
//!   commit, restoring local state on failure or drop
//!
//! # State machine
//!
//! ```text
//!            read/sync                 write
//!   EMPTY ─────────────► CLEAN ─────────────► DIRTY
//!     ▲                   │  ▲                  │
//!     │   invalidate      │  │  sync / reset    │
//!     └───────────────────┘  └──────────────────┘
//!
//!   any state ── entity missing / purged ──► ERROR (terminal)
//! ```

mod deferred;
mod handle;
mod list;
mod registry;
mod state;

pub use deferred::DeferredSync;
pub use handle::Proxy;
pub use list::ProxyList;
pub use registry::{Registry, RegistryStats};
pub use state::ProxyState;

#[cfg(test)]
mod tests;
