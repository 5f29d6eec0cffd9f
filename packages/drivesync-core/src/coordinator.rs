//! Synchronization coordinator facade
//!
//! Wires the root registry, the collection membership index and the change
//! summary engine over one shared cache layer. Every collaborator is
//! injected through [`CoordinatorBuilder`].

use std::collections::BTreeSet;
use std::sync::Arc;

use prometheus::Registry;

use crate::cache::CacheLayer;
use crate::config::constants::document::{
    LOCALLY_EDITED_COLLECTION_DESCRIPTION, LOCALLY_EDITED_COLLECTION_NAME,
};
use crate::config::CoordinatorConfig;
use crate::domain::{
    ChangeCursor, ChangeFinder, ChangeSummary, CollectionLister, CollectionManager, Document,
    DocumentRef, DocumentSession, LifecycleEmitter, RepositoryCatalog, RootRefs, RootSets,
    SessionProvider,
};
use crate::infrastructure::{InMemoryRepositories, TracingEmitter};
use crate::membership::CollectionMembershipIndex;
use crate::registry::RootRegistry;
use crate::summary::ChangeSummaryEngine;
use crate::{Result, SyncError};

pub struct SyncCoordinator {
    config: CoordinatorConfig,
    caches: Arc<CacheLayer>,
    registry: Arc<RootRegistry>,
    membership: Arc<CollectionMembershipIndex>,
    summaries: ChangeSummaryEngine,
    collections: Arc<dyn CollectionManager>,
    metrics: Registry,
}

impl SyncCoordinator {
    /// Create a builder for port injection
    ///
    /// # Example
    /// ```rust,ignore
    /// let coordinator = SyncCoordinator::builder(config)
    ///     .with_sessions(provider)
    ///     .with_catalog(catalog)
    ///     .with_collections(lister, manager)
    ///     .with_change_finder(finder)
    ///     .build()?;
    /// ```
    pub fn builder(config: CoordinatorConfig) -> CoordinatorBuilder {
        CoordinatorBuilder::new(config)
    }

    pub fn config(&self) -> &CoordinatorConfig {
        &self.config
    }

    /// Registry holding the cache metrics
    pub fn metrics_registry(&self) -> &Registry {
        &self.metrics
    }

    pub fn caches(&self) -> &CacheLayer {
        &self.caches
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Root registration
    // ═══════════════════════════════════════════════════════════════════════

    pub async fn register_root(
        &self,
        user: &str,
        document: &Document,
        session: &dyn DocumentSession,
    ) -> Result<()> {
        self.registry.register(user, document, session).await
    }

    pub async fn unregister_root(
        &self,
        user: &str,
        document: &Document,
        session: &dyn DocumentSession,
    ) -> Result<()> {
        self.registry.unregister(user, document, session).await
    }

    pub async fn get_synchronization_roots(&self, user: &str) -> Result<Arc<RootSets>> {
        self.registry.synchronization_roots(user).await
    }

    pub async fn is_synchronization_root(&self, user: &str, document: &Document) -> Result<bool> {
        self.registry.is_synchronization_root(user, document).await
    }

    /// Roots of the session user in the session repository
    pub async fn synchronization_root_references(
        &self,
        session: &dyn DocumentSession,
    ) -> Result<BTreeSet<DocumentRef>> {
        self.registry.synchronization_root_references(session).await
    }

    pub async fn get_collection_sync_root_member_ids(&self, user: &str) -> Result<Arc<RootRefs>> {
        self.membership.collection_sync_root_member_ids(user).await
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Change summaries
    // ═══════════════════════════════════════════════════════════════════════

    /// Time based poll; `last_sync_date` in milliseconds, negative when
    /// the client never synchronized
    pub async fn get_change_summary(
        &self,
        user: &str,
        last_active_roots: &RootRefs,
        last_sync_date: i64,
    ) -> Result<ChangeSummary> {
        self.summaries
            .change_summary(user, last_active_roots, ChangeCursor::Time(last_sync_date))
            .await
    }

    /// Sequence based poll; also reports changes of synchronized
    /// collection members
    pub async fn get_change_summary_by_sequence(
        &self,
        user: &str,
        last_active_roots: &RootRefs,
        lower_bound: i64,
    ) -> Result<ChangeSummary> {
        self.summaries
            .change_summary(user, last_active_roots, ChangeCursor::Sequence(lower_bound))
            .await
    }

    /// Poll with an explicit cursor; the cursor mode selects the finder
    pub async fn get_change_summary_since(
        &self,
        user: &str,
        last_active_roots: &RootRefs,
        cursor: ChangeCursor,
    ) -> Result<ChangeSummary> {
        self.summaries
            .change_summary(user, last_active_roots, cursor)
            .await
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Invalidation hooks
    // ═══════════════════════════════════════════════════════════════════════

    pub async fn invalidate_synchronization_roots_cache(&self, user: &str) {
        self.caches.invalidate_roots(user).await;
    }

    pub async fn invalidate_collection_member_cache(&self, user: &str) {
        self.caches.invalidate_collection_members(user).await;
    }

    pub fn invalidate_collection_member_cache_all(&self) {
        self.caches.invalidate_all_collection_members();
    }

    /// A deleted folder may hold roots of any user
    pub fn handle_folder_deletion(&self, deleted: &DocumentRef) {
        tracing::debug!("Folder {} deleted, clearing every projection cache", deleted);
        self.caches.clear();
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Locally edited collection
    // ═══════════════════════════════════════════════════════════════════════

    /// Add `document` to the "Locally Edited" collection of the session
    /// user, then make sure that collection is a synchronization root
    pub async fn add_to_locally_edited_collection(
        &self,
        session: &dyn DocumentSession,
        document: &Document,
    ) -> Result<Document> {
        let container = self
            .collections
            .user_default_collections(session, document)
            .await?;
        let path = container.path.join(LOCALLY_EDITED_COLLECTION_NAME);

        let collection = match session.find_by_path(&path).await? {
            Some(existing) => {
                self.collections
                    .add_to_collection(session, &existing, document)
                    .await?;
                existing
            }
            None => {
                tracing::debug!("Creating {} for user {}", path, session.user());
                self.collections
                    .add_to_new_collection(
                        session,
                        LOCALLY_EDITED_COLLECTION_NAME,
                        LOCALLY_EDITED_COLLECTION_DESCRIPTION,
                        document,
                    )
                    .await?
            }
        };

        let roots = self.registry.synchronization_root_references(session).await?;
        if roots.contains(&collection.doc_ref) {
            // Membership changed under an existing root
            self.caches
                .invalidate_collection_members(session.user())
                .await;
        } else {
            self.registry
                .register(session.user(), &collection, session)
                .await?;
        }
        Ok(collection)
    }
}

// ============================================================================
// Builder
// ============================================================================

/// Builder for [`SyncCoordinator`]
pub struct CoordinatorBuilder {
    config: CoordinatorConfig,
    sessions: Option<Arc<dyn SessionProvider>>,
    catalog: Option<Arc<dyn RepositoryCatalog>>,
    lister: Option<Arc<dyn CollectionLister>>,
    manager: Option<Arc<dyn CollectionManager>>,
    finder: Option<Arc<dyn ChangeFinder>>,
    emitter: Option<Arc<dyn LifecycleEmitter>>,
    metrics: Option<Registry>,
}

impl CoordinatorBuilder {
    pub fn new(config: CoordinatorConfig) -> Self {
        Self {
            config,
            sessions: None,
            catalog: None,
            lister: None,
            manager: None,
            finder: None,
            emitter: None,
            metrics: None,
        }
    }

    pub fn with_sessions(mut self, sessions: Arc<dyn SessionProvider>) -> Self {
        self.sessions = Some(sessions);
        self
    }

    pub fn with_catalog(mut self, catalog: Arc<dyn RepositoryCatalog>) -> Self {
        self.catalog = Some(catalog);
        self
    }

    pub fn with_collections(
        mut self,
        lister: Arc<dyn CollectionLister>,
        manager: Arc<dyn CollectionManager>,
    ) -> Self {
        self.lister = Some(lister);
        self.manager = Some(manager);
        self
    }

    /// Use one in-memory store for every document-side port
    pub fn with_in_memory_store(self, store: Arc<InMemoryRepositories>) -> Self {
        self.with_sessions(store.clone())
            .with_catalog(store.clone())
            .with_collections(store.clone(), store)
    }

    pub fn with_change_finder(mut self, finder: Arc<dyn ChangeFinder>) -> Self {
        self.finder = Some(finder);
        self
    }

    /// Defaults to [`TracingEmitter`]
    pub fn with_emitter(mut self, emitter: Arc<dyn LifecycleEmitter>) -> Self {
        self.emitter = Some(emitter);
        self
    }

    /// Defaults to a private registry
    pub fn with_metrics_registry(mut self, registry: Registry) -> Self {
        self.metrics = Some(registry);
        self
    }

    pub fn build(self) -> Result<SyncCoordinator> {
        self.config.validate()?;

        let sessions = required(self.sessions, "session provider")?;
        let catalog = required(self.catalog, "repository catalog")?;
        let lister = required(self.lister, "collection lister")?;
        let collections = required(self.manager, "collection manager")?;
        let finder = required(self.finder, "change finder")?;
        let emitter = self
            .emitter
            .unwrap_or_else(|| Arc::new(TracingEmitter));
        let metrics = self.metrics.unwrap_or_default();

        let caches = Arc::new(CacheLayer::new(&self.config, &metrics)?);
        let registry = Arc::new(RootRegistry::new(
            sessions.clone(),
            catalog.clone(),
            emitter,
            caches.clone(),
        ));
        let membership = Arc::new(CollectionMembershipIndex::new(
            sessions.clone(),
            catalog,
            lister,
            registry.clone(),
            caches.clone(),
            self.config.collection_page_size,
        ));
        let summaries = ChangeSummaryEngine::new(
            sessions,
            finder,
            registry.clone(),
            membership.clone(),
            self.config.change_limit,
        );

        tracing::info!(
            change_limit = self.config.change_limit,
            root_cache_ttl_secs = self.config.root_cache.ttl_secs,
            "Synchronization coordinator ready"
        );

        Ok(SyncCoordinator {
            config: self.config,
            caches,
            registry,
            membership,
            summaries,
            collections,
            metrics,
        })
    }
}

fn required<T: ?Sized>(port: Option<Arc<T>>, name: &str) -> Result<Arc<T>> {
    port.ok_or_else(|| SyncError::config(format!("Missing {}", name)))
}
