//! Domain layer for the synchronization coordinator
//!
//! # Domain Models
//!
//! - `Document`, `DocumentRef`, `DocumentPath`: document identity and location
//! - `RootSet`: per user × repository projection of synchronization roots
//! - `Subscription`: per user entry stored against a root document
//! - `ChangeCursor`: time or sequence progress marker
//! - `ChangeRecord` / `ChangeSummary`: incremental change results
//!
//! # Port Traits
//!
//! - `SessionProvider` / `DocumentSession`: document store access
//! - `ChangeFinder`: pluggable change detection
//! - `LifecycleEmitter`: outbound lifecycle signals
//! - `RepositoryCatalog`, `CollectionLister`, `CollectionManager`

pub mod cursor;
pub mod models;
pub mod ports;
pub mod query;

pub use cursor::{ChangeCursor, CursorMode};
pub use models::{
    ChangeRecord, ChangeSummary, Document, DocumentKind, DocumentPath, DocumentRef,
    LifecycleEvent, LifecycleSignal, MutationFlags, Page, PageRequest, RepositoryName,
    RootRefs, RootSet, RootSets, Subscription, UserId,
};
pub use ports::{
    ChangeFinder, CollectionLister, CollectionManager, DocumentSession, LifecycleEmitter,
    RepositoryCatalog, SessionProvider,
};
pub use query::{SortKey, SortOrder, SyncRootQuery};
