//! drivesync-core - Multi-repository synchronization coordinator
//!
//! Tracks which documents each user designated as synchronization roots
//! and answers incremental "what changed since cursor X" polls from
//! desktop clients.
//!
//! ## Components
//!
//! 1. **Root Registry**: register / unregister roots, resolve `RootSets`
//! 2. **Collection Membership Index**: members of synchronized collections
//! 3. **Change Summary Engine**: per-repository scan with all-or-overflow
//!    semantics
//! 4. **Cache Layer**: user-keyed, expire-after-write projections,
//!    invalidated on every mutation
//!
//! ## Usage
//!
//! ```rust,ignore
//! use drivesync_core::{ChangeCursor, CoordinatorConfig, SyncCoordinator};
//!
//! let coordinator = SyncCoordinator::builder(CoordinatorConfig::default())
//!     .with_sessions(provider)
//!     .with_catalog(catalog)
//!     .with_collections(lister, manager)
//!     .with_change_finder(finder)
//!     .build()?;
//!
//! coordinator.register_root("alice", &folder, &*session).await?;
//! let summary = coordinator
//!     .get_change_summary_by_sequence("alice", &last_active_roots, last_cursor)
//!     .await?;
//! if summary.has_too_many_changes {
//!     // full resynchronization
//! }
//! ```

pub mod cache;
pub mod config;
pub mod coordinator;
pub mod domain;
pub mod error;
pub mod infrastructure;
pub mod membership;
pub mod registry;
pub mod summary;

pub use error::{ErrorKind, Result, SyncError};

pub use config::{CacheConfig, CoordinatorConfig};
pub use coordinator::{CoordinatorBuilder, SyncCoordinator};
pub use domain::{
    ChangeCursor, ChangeRecord, ChangeSummary, CursorMode, Document, DocumentPath, DocumentRef,
    RootRefs, RootSet, RootSets,
};
