//! Collection Membership Index
//!
//! Members of a collection are not its path descendants, so a collection
//! registered as a synchronization root does not cover them through the
//! hierarchy. This index resolves, per repository, the ids of every member
//! of every collection the user synchronizes.

use std::collections::BTreeSet;
use std::sync::Arc;

use crate::cache::CacheLayer;
use crate::config::constants::COLLECTION_LIST_PAGE_SIZE;
use crate::domain::{
    CollectionLister, DocumentRef, DocumentSession, PageRequest, RepositoryCatalog, RootRefs,
    RootSet, SessionProvider,
};
use crate::registry::RootRegistry;
use crate::Result;

pub struct CollectionMembershipIndex {
    sessions: Arc<dyn SessionProvider>,
    catalog: Arc<dyn RepositoryCatalog>,
    lister: Arc<dyn CollectionLister>,
    registry: Arc<RootRegistry>,
    caches: Arc<CacheLayer>,
    page_size: usize,
}

impl CollectionMembershipIndex {
    pub fn new(
        sessions: Arc<dyn SessionProvider>,
        catalog: Arc<dyn RepositoryCatalog>,
        lister: Arc<dyn CollectionLister>,
        registry: Arc<RootRegistry>,
        caches: Arc<CacheLayer>,
        page_size: usize,
    ) -> Self {
        Self {
            sessions,
            catalog,
            lister,
            registry,
            caches,
            page_size,
        }
    }

    /// Member ids of synchronized collections, keyed by repository
    ///
    /// Repositories without any synchronized member are left out.
    pub async fn collection_sync_root_member_ids(&self, user: &str) -> Result<Arc<RootRefs>> {
        self.caches
            .collection_members
            .get_or_try_compute(user, || self.compute(user))
            .await
    }

    async fn compute(&self, user: &str) -> Result<RootRefs> {
        let roots = self.registry.synchronization_roots(user).await?;
        let mut result = RootRefs::new();

        for repository in self.catalog.list_repositories() {
            let Some(repo_roots) = roots.get(&repository).filter(|r| !r.is_empty()) else {
                continue;
            };
            let session = self.sessions.session(&repository, user).await?;
            let members = self.synchronized_members(&*session, repo_roots).await?;
            if !members.is_empty() {
                tracing::debug!(
                    "{} collection members synchronized by {} in {}",
                    members.len(),
                    user,
                    repository
                );
                result.insert(repository, members);
            }
        }
        Ok(result)
    }

    async fn synchronized_members(
        &self,
        session: &dyn DocumentSession,
        roots: &RootSet,
    ) -> Result<BTreeSet<DocumentRef>> {
        let mut members = BTreeSet::new();
        let mut page = PageRequest::first(COLLECTION_LIST_PAGE_SIZE);
        loop {
            let collections = self.lister.list_collections(session, page).await?;
            for collection in collections
                .items
                .iter()
                .filter(|c| roots.contains(&c.doc_ref))
            {
                self.collect_members(session, &collection.doc_ref, &mut members)
                    .await?;
            }
            if !collections.has_next {
                break;
            }
            page = page.next();
        }
        Ok(members)
    }

    async fn collect_members(
        &self,
        session: &dyn DocumentSession,
        collection: &DocumentRef,
        members: &mut BTreeSet<DocumentRef>,
    ) -> Result<()> {
        let mut page = PageRequest::first(self.page_size);
        loop {
            let listing = self
                .lister
                .list_collection_members(session, collection, page)
                .await?;
            members.extend(listing.items.into_iter().map(|d| d.doc_ref));
            if !listing.has_next {
                return Ok(());
            }
            page = page.next();
        }
    }
}
