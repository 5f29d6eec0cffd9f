//! Ports (Trait Interfaces)
//!
//! The coordinator never talks to a document store, an event bus or a change
//! log directly. Every collaborator is injected as one of these traits:
//! - Production: adapters over the real document store
//! - Testing: in-memory adapters from `infrastructure`

use async_trait::async_trait;
use std::collections::BTreeSet;
use std::sync::Arc;

use super::models::{
    ChangeRecord, Document, DocumentPath, DocumentRef, LifecycleSignal, MutationFlags, Page,
    PageRequest, RepositoryName, RootSet, Subscription,
};
use super::query::SyncRootQuery;
use crate::Result;

/// Document session bound to one repository and one user
///
/// Results are already filtered by access control.
#[async_trait]
pub trait DocumentSession: Send + Sync {
    fn repository(&self) -> &str;

    /// Principal the session was opened for
    fn user(&self) -> &str;

    fn session_id(&self) -> &str;

    /// Fetch a document by identity
    async fn get_document(&self, doc_ref: &DocumentRef) -> Result<Document>;

    /// Fetch a document by path, `None` when absent
    async fn find_by_path(&self, path: &DocumentPath) -> Result<Option<Document>>;

    /// Read permission check for `user` on the document at `path`
    async fn has_read_permission(&self, user: &str, path: &DocumentPath) -> Result<bool>;

    /// Evaluate a root query, returning matching ids in query order
    async fn query_sync_roots(&self, query: &SyncRootQuery) -> Result<Vec<DocumentRef>>;

    /// Subscription entries stored against a document
    async fn subscriptions(&self, doc_ref: &DocumentRef) -> Result<Vec<Subscription>>;

    /// Persist a document (facets) together with its subscription entries
    async fn save_document(
        &self,
        document: &Document,
        subscriptions: &[Subscription],
        flags: MutationFlags,
    ) -> Result<Document>;

    /// Commit pending mutations
    async fn save(&self) -> Result<()>;
}

/// Opens document sessions
#[async_trait]
pub trait SessionProvider: Send + Sync {
    async fn session(
        &self,
        repository: &str,
        user: &str,
    ) -> Result<Arc<dyn DocumentSession>>;
}

/// Static list of repositories of the deployment
pub trait RepositoryCatalog: Send + Sync {
    fn list_repositories(&self) -> Vec<RepositoryName>;
}

/// Paged listing of collections and their members
#[async_trait]
pub trait CollectionLister: Send + Sync {
    async fn list_collections(
        &self,
        session: &dyn DocumentSession,
        page: PageRequest,
    ) -> Result<Page<Document>>;

    async fn list_collection_members(
        &self,
        session: &dyn DocumentSession,
        collection: &DocumentRef,
        page: PageRequest,
    ) -> Result<Page<Document>>;
}

/// Collection mutation service
#[async_trait]
pub trait CollectionManager: Send + Sync {
    /// Container holding the default collections of the session user
    async fn user_default_collections(
        &self,
        session: &dyn DocumentSession,
        context: &Document,
    ) -> Result<Document>;

    async fn add_to_collection(
        &self,
        session: &dyn DocumentSession,
        collection: &Document,
        member: &Document,
    ) -> Result<()>;

    /// Create a collection in the user's default container holding `member`
    async fn add_to_new_collection(
        &self,
        session: &dyn DocumentSession,
        name: &str,
        description: &str,
        member: &Document,
    ) -> Result<Document>;
}

/// Pluggable change detection
///
/// Both change entry points fail with `ErrorKind::TooManyChanges` when the
/// number of matching records exceeds what can be enumerated safely.
#[async_trait]
pub trait ChangeFinder: Send + Sync {
    /// Current server time, milliseconds since epoch
    async fn current_date(&self) -> Result<i64>;

    /// Greatest change log sequence id
    async fn upper_bound(&self) -> Result<i64>;

    /// Changes in `(lower_bound, upper_bound]` by time
    async fn file_system_changes(
        &self,
        session: &dyn DocumentSession,
        previous_roots: &BTreeSet<DocumentRef>,
        current_roots: &RootSet,
        lower_bound: i64,
        upper_bound: i64,
        limit: usize,
    ) -> Result<Vec<ChangeRecord>>;

    /// Changes in `(lower_bound, upper_bound]` by sequence id
    #[allow(clippy::too_many_arguments)]
    async fn file_system_changes_integer_bounds(
        &self,
        session: &dyn DocumentSession,
        previous_roots: &BTreeSet<DocumentRef>,
        current_roots: &RootSet,
        collection_members: &BTreeSet<DocumentRef>,
        lower_bound: i64,
        upper_bound: i64,
        limit: usize,
    ) -> Result<Vec<ChangeRecord>>;
}

/// Outbound lifecycle signals, fire-and-forget
pub trait LifecycleEmitter: Send + Sync {
    fn emit(&self, signal: LifecycleSignal);
}
