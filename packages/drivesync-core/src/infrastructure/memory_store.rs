//! In-memory document store (for testing)
//!
//! HashMap-based repositories implementing every document-side port:
//! sessions, repository catalog, collection listing and collection mutation.
//! Subscriptions are kept in a table keyed by document. NOT for production use.

use async_trait::async_trait;
use parking_lot::RwLock;
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering as AtomicOrdering};
use std::sync::Arc;

use crate::config::constants::document::COLLECTION_FACET;
use crate::domain::{
    CollectionLister, CollectionManager, Document, DocumentPath, DocumentRef, DocumentSession,
    MutationFlags, Page, PageRequest, RepositoryCatalog, RepositoryName, SessionProvider,
    SortKey, SortOrder, Subscription, SyncRootQuery, UserId,
};
use crate::{Result, SyncError};

#[derive(Default)]
struct RepositoryState {
    documents: HashMap<DocumentRef, Document>,
    subscriptions: HashMap<DocumentRef, Vec<Subscription>>,
    unreadable: HashSet<(UserId, DocumentPath)>,
    members: HashMap<DocumentRef, Vec<DocumentRef>>,
    last_flags: Option<MutationFlags>,
    failing: bool,
}

impl RepositoryState {
    fn check_available(&self, repository: &str) -> Result<()> {
        if self.failing {
            return Err(SyncError::storage(format!(
                "Repository {} is unavailable",
                repository
            )));
        }
        Ok(())
    }

    fn by_path(&self, path: &DocumentPath) -> Option<&Document> {
        self.documents.values().find(|d| d.path == *path)
    }
}

#[derive(Default)]
struct StoreStats {
    root_queries: AtomicUsize,
    collection_listings: AtomicUsize,
}

/// Fixed set of in-memory repositories
pub struct InMemoryRepositories {
    repositories: RwLock<BTreeMap<RepositoryName, Arc<RwLock<RepositoryState>>>>,
    next_id: AtomicU64,
    next_session: AtomicU64,
    stats: Arc<StoreStats>,
}

impl InMemoryRepositories {
    pub fn new<I, S>(repositories: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<RepositoryName>,
    {
        let repositories = repositories
            .into_iter()
            .map(|name| (name.into(), Arc::new(RwLock::new(RepositoryState::default()))))
            .collect();
        Self {
            repositories: RwLock::new(repositories),
            next_id: AtomicU64::new(1),
            next_session: AtomicU64::new(1),
            stats: Arc::new(StoreStats::default()),
        }
    }

    fn state(&self, repository: &str) -> Result<Arc<RwLock<RepositoryState>>> {
        self.repositories
            .read()
            .get(repository)
            .map(Arc::clone)
            .ok_or_else(|| SyncError::storage(format!("Unknown repository: {}", repository)))
    }

    /// Open a session without going through the async provider
    pub fn open(&self, repository: &str, user: &str) -> Result<Arc<InMemorySession>> {
        let state = self.state(repository)?;
        let session_id = self.next_session.fetch_add(1, AtomicOrdering::SeqCst);
        Ok(Arc::new(InMemorySession {
            repository: repository.to_string(),
            user: user.to_string(),
            session_id: format!("session-{}", session_id),
            state,
            stats: Arc::clone(&self.stats),
        }))
    }

    /// Insert or replace a document; returns it as stored
    pub fn add_document(&self, document: Document) -> Result<Document> {
        self.state(&document.repository)?
            .write()
            .documents
            .insert(document.doc_ref.clone(), document.clone());
        Ok(document)
    }

    /// Create a folder-like document with a generated id
    pub fn create_document(&self, repository: &str, path: &str, title: &str) -> Result<Document> {
        let id = self.next_id.fetch_add(1, AtomicOrdering::SeqCst);
        self.add_document(Document::new(
            repository,
            format!("doc-{}", id),
            path,
            title,
        ))
    }

    pub fn document(&self, repository: &str, doc_ref: &DocumentRef) -> Option<Document> {
        self.state(repository)
            .ok()?
            .read()
            .documents
            .get(doc_ref)
            .cloned()
    }

    pub fn subscriptions_of(&self, repository: &str, doc_ref: &DocumentRef) -> Vec<Subscription> {
        let Ok(state) = self.state(repository) else {
            return Vec::new();
        };
        let state = state.read();
        state.subscriptions.get(doc_ref).cloned().unwrap_or_default()
    }

    pub fn set_lifecycle_state(
        &self,
        repository: &str,
        doc_ref: &DocumentRef,
        state: &str,
    ) -> Result<()> {
        let repository_state = self.state(repository)?;
        let mut repository_state = repository_state.write();
        let document = repository_state
            .documents
            .get_mut(doc_ref)
            .ok_or_else(|| SyncError::document_not_found(doc_ref))?;
        document.lifecycle_state = state.to_string();
        Ok(())
    }

    /// Explicitly cut read permission of `user` on `path`
    pub fn deny_read(&self, repository: &str, user: &str, path: &str) -> Result<()> {
        self.state(repository)?
            .write()
            .unreadable
            .insert((user.to_string(), DocumentPath::from(path)));
        Ok(())
    }

    pub fn add_member(
        &self,
        repository: &str,
        collection: &DocumentRef,
        member: &DocumentRef,
    ) -> Result<()> {
        let state = self.state(repository)?;
        let mut state = state.write();
        let members = state.members.entry(collection.clone()).or_default();
        if !members.contains(member) {
            members.push(member.clone());
        }
        Ok(())
    }

    pub fn members_of(&self, repository: &str, collection: &DocumentRef) -> Vec<DocumentRef> {
        let Ok(state) = self.state(repository) else {
            return Vec::new();
        };
        let state = state.read();
        state.members.get(collection).cloned().unwrap_or_default()
    }

    /// Make every operation on `repository` fail with a storage error
    pub fn set_failing(&self, repository: &str, failing: bool) -> Result<()> {
        self.state(repository)?.write().failing = failing;
        Ok(())
    }

    pub fn last_mutation_flags(&self, repository: &str) -> Option<MutationFlags> {
        self.state(repository).ok()?.read().last_flags
    }

    /// Number of root queries evaluated so far (all repositories)
    pub fn root_query_count(&self) -> usize {
        self.stats.root_queries.load(AtomicOrdering::SeqCst)
    }

    /// Number of collection listing pages served so far
    pub fn collection_listing_count(&self) -> usize {
        self.stats.collection_listings.load(AtomicOrdering::SeqCst)
    }
}

#[async_trait]
impl SessionProvider for InMemoryRepositories {
    async fn session(&self, repository: &str, user: &str) -> Result<Arc<dyn DocumentSession>> {
        Ok(self.open(repository, user)?)
    }
}

impl RepositoryCatalog for InMemoryRepositories {
    fn list_repositories(&self) -> Vec<RepositoryName> {
        self.repositories.read().keys().cloned().collect()
    }
}

fn page_of<T: Clone>(items: &[T], page: PageRequest) -> Page<T> {
    let start = page.offset().min(items.len());
    let end = (start + page.page_size).min(items.len());
    Page {
        items: items[start..end].to_vec(),
        has_next: end < items.len(),
    }
}

#[async_trait]
impl CollectionLister for InMemoryRepositories {
    async fn list_collections(
        &self,
        session: &dyn DocumentSession,
        page: PageRequest,
    ) -> Result<Page<Document>> {
        self.stats
            .collection_listings
            .fetch_add(1, AtomicOrdering::SeqCst);
        let state = self.state(session.repository())?;
        let state = state.read();
        state.check_available(session.repository())?;
        let mut collections: Vec<Document> = state
            .documents
            .values()
            .filter(|d| d.has_facet(COLLECTION_FACET) && !d.is_deleted())
            .cloned()
            .collect();
        collections.sort_by(|a, b| a.path.cmp(&b.path));
        Ok(page_of(&collections, page))
    }

    async fn list_collection_members(
        &self,
        session: &dyn DocumentSession,
        collection: &DocumentRef,
        page: PageRequest,
    ) -> Result<Page<Document>> {
        self.stats
            .collection_listings
            .fetch_add(1, AtomicOrdering::SeqCst);
        let state = self.state(session.repository())?;
        let state = state.read();
        state.check_available(session.repository())?;
        let members: Vec<Document> = state
            .members
            .get(collection)
            .map(|refs| {
                refs.iter()
                    .filter_map(|r| state.documents.get(r))
                    .filter(|d| !d.is_deleted())
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        Ok(page_of(&members, page))
    }
}

#[async_trait]
impl CollectionManager for InMemoryRepositories {
    async fn user_default_collections(
        &self,
        session: &dyn DocumentSession,
        _context: &Document,
    ) -> Result<Document> {
        let path = DocumentPath::from(format!(
            "/default-domain/UserWorkspaces/{}/Collections",
            session.user()
        ));
        if let Some(existing) = session.find_by_path(&path).await? {
            return Ok(existing);
        }
        self.create_document(session.repository(), path.as_str(), "Collections")
    }

    async fn add_to_collection(
        &self,
        session: &dyn DocumentSession,
        collection: &Document,
        member: &Document,
    ) -> Result<()> {
        self.state(session.repository())?
            .read()
            .check_available(session.repository())?;
        self.add_member(session.repository(), &collection.doc_ref, &member.doc_ref)
    }

    async fn add_to_new_collection(
        &self,
        session: &dyn DocumentSession,
        name: &str,
        _description: &str,
        member: &Document,
    ) -> Result<Document> {
        let container = self.user_default_collections(session, member).await?;
        let id = self.next_id.fetch_add(1, AtomicOrdering::SeqCst);
        let collection = self.add_document(
            Document::new(
                session.repository(),
                format!("collection-{}", id),
                container.path.join(name),
                name,
            )
            .with_facet(COLLECTION_FACET),
        )?;
        self.add_member(session.repository(), &collection.doc_ref, &member.doc_ref)?;
        Ok(collection)
    }
}

/// Session over one in-memory repository
pub struct InMemorySession {
    repository: RepositoryName,
    user: UserId,
    session_id: String,
    state: Arc<RwLock<RepositoryState>>,
    stats: Arc<StoreStats>,
}

fn compare_by(query: &SyncRootQuery, a: &Document, b: &Document) -> Ordering {
    for (key, order) in &query.order {
        let ordering = match key {
            SortKey::Title => a.title.cmp(&b.title),
            SortKey::Created => a.created.cmp(&b.created),
        };
        let ordering = match order {
            SortOrder::Ascending => ordering,
            SortOrder::Descending => ordering.reverse(),
        };
        if ordering != Ordering::Equal {
            return ordering;
        }
    }
    Ordering::Equal
}

#[async_trait]
impl DocumentSession for InMemorySession {
    fn repository(&self) -> &str {
        &self.repository
    }

    fn user(&self) -> &str {
        &self.user
    }

    fn session_id(&self) -> &str {
        &self.session_id
    }

    async fn get_document(&self, doc_ref: &DocumentRef) -> Result<Document> {
        let state = self.state.read();
        state.check_available(&self.repository)?;
        state
            .documents
            .get(doc_ref)
            .cloned()
            .ok_or_else(|| SyncError::document_not_found(doc_ref))
    }

    async fn find_by_path(&self, path: &DocumentPath) -> Result<Option<Document>> {
        let state = self.state.read();
        state.check_available(&self.repository)?;
        Ok(state.by_path(path).cloned())
    }

    async fn has_read_permission(&self, user: &str, path: &DocumentPath) -> Result<bool> {
        let state = self.state.read();
        state.check_available(&self.repository)?;
        Ok(!state.unreadable.contains(&(user.to_string(), path.clone())))
    }

    async fn query_sync_roots(&self, query: &SyncRootQuery) -> Result<Vec<DocumentRef>> {
        self.stats.root_queries.fetch_add(1, AtomicOrdering::SeqCst);
        let state = self.state.read();
        state.check_available(&self.repository)?;
        let mut matches: Vec<&Document> = state
            .subscriptions
            .iter()
            .filter(|(_, subscriptions)| {
                subscriptions
                    .iter()
                    .any(|s| s.user == query.user && s.enabled)
            })
            .filter_map(|(doc_ref, _)| state.documents.get(doc_ref))
            .filter(|d| d.lifecycle_state != query.excluded_lifecycle_state)
            .collect();
        matches.sort_by(|a, b| compare_by(query, a, b));
        Ok(matches.into_iter().map(|d| d.doc_ref.clone()).collect())
    }

    async fn subscriptions(&self, doc_ref: &DocumentRef) -> Result<Vec<Subscription>> {
        let state = self.state.read();
        state.check_available(&self.repository)?;
        Ok(state.subscriptions.get(doc_ref).cloned().unwrap_or_default())
    }

    async fn save_document(
        &self,
        document: &Document,
        subscriptions: &[Subscription],
        flags: MutationFlags,
    ) -> Result<Document> {
        let mut state = self.state.write();
        state.check_available(&self.repository)?;
        // Only facets and subscriptions are written; lifecycle and path stay as stored
        let stored = state
            .documents
            .get_mut(&document.doc_ref)
            .ok_or_else(|| SyncError::document_not_found(&document.doc_ref))?;
        stored.facets = document.facets.clone();
        let stored = stored.clone();
        state
            .subscriptions
            .insert(document.doc_ref.clone(), subscriptions.to_vec());
        state.last_flags = Some(flags);
        Ok(stored)
    }

    async fn save(&self) -> Result<()> {
        self.state.read().check_available(&self.repository)
    }
}
