//! Root Registry
//!
//! Owns registration and unregistration of synchronization roots. The
//! subscription entries stored against documents are the source of truth;
//! `RootSets` are a cached projection rebuilt wholesale on a miss.
//!
//! Registration rules:
//! 1. A target already covered by an ancestor root is a no-op, unless read
//!    permission inheritance is cut between the two.
//! 2. A target above existing roots supersedes them (they are unregistered
//!    first), except the "Locally Edited" collection.
//! 3. Caches of the user are invalidated only after a successful save.

use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::Utc;

use crate::cache::CacheLayer;
use crate::config::constants::{self, document::LOCALLY_EDITED_COLLECTION_NAME};
use crate::domain::{
    Document, DocumentPath, DocumentRef, DocumentSession, LifecycleEmitter, LifecycleEvent,
    LifecycleSignal, MutationFlags, RepositoryCatalog, RootSet, RootSets, SessionProvider,
    Subscription, SyncRootQuery,
};
use crate::{Result, SyncError};

pub struct RootRegistry {
    sessions: Arc<dyn SessionProvider>,
    catalog: Arc<dyn RepositoryCatalog>,
    emitter: Arc<dyn LifecycleEmitter>,
    caches: Arc<CacheLayer>,
}

impl RootRegistry {
    pub fn new(
        sessions: Arc<dyn SessionProvider>,
        catalog: Arc<dyn RepositoryCatalog>,
        emitter: Arc<dyn LifecycleEmitter>,
        caches: Arc<CacheLayer>,
    ) -> Self {
        Self {
            sessions,
            catalog,
            emitter,
            caches,
        }
    }

    /// Versions and read-only proxies can never be roots
    pub fn check_can_update(document: &Document) -> Result<()> {
        if document.is_proxy() || document.is_version() {
            return Err(SyncError::not_eligible_root(
                &document.title,
                &document.doc_ref,
            ));
        }
        Ok(())
    }

    /// Register `target` as a synchronization root of `user`
    pub async fn register(
        &self,
        user: &str,
        target: &Document,
        session: &dyn DocumentSession,
    ) -> Result<()> {
        Self::check_can_update(target)?;

        let roots = self.synchronization_roots(user).await?;
        let repo_roots = roots
            .get(session.repository())
            .cloned()
            .unwrap_or_else(|| RootSet::empty(session.repository()));

        // The "Locally Edited" collection lives under the personal workspace;
        // both may be roots at the same time
        if target.name() != LOCALLY_EDITED_COLLECTION_NAME {
            for root_path in repo_roots.paths() {
                if !target.path.is_descendant_of(root_path) {
                    continue;
                }
                if !self
                    .inheritance_blocked_between(user, &target.path, root_path, session)
                    .await?
                {
                    tracing::debug!(
                        "{} is already covered by synchronization root {} for user {}",
                        target.path,
                        root_path,
                        user
                    );
                    return Ok(());
                }
            }
        }

        for existing in repo_roots.paths() {
            if existing.as_str().ends_with(LOCALLY_EDITED_COLLECTION_NAME) {
                continue;
            }
            if !existing.is_descendant_of(&target.path) {
                continue;
            }
            if let Some(nested) = session.find_by_path(existing).await? {
                tracing::debug!(
                    "Unregistering nested synchronization root {} superseded by {}",
                    existing,
                    target.path
                );
                self.unregister(user, &nested, session).await?;
            }
        }

        self.update_subscription(user, target, session, true).await?;
        self.caches.invalidate_user(user).await;
        tracing::info!(
            "Registered synchronization root {} ({}) for user {}",
            target.path,
            target.doc_ref,
            user
        );
        Ok(())
    }

    /// Disable the subscription of `user` on exactly `root`
    pub async fn unregister(
        &self,
        user: &str,
        root: &Document,
        session: &dyn DocumentSession,
    ) -> Result<()> {
        Self::check_can_update(root)?;
        self.update_subscription(user, root, session, false).await?;
        self.caches.invalidate_user(user).await;
        tracing::info!(
            "Unregistered synchronization root {} ({}) for user {}",
            root.path,
            root.doc_ref,
            user
        );
        Ok(())
    }

    /// Roots of `user` in every repository (cache-through)
    pub async fn synchronization_roots(&self, user: &str) -> Result<Arc<RootSets>> {
        self.caches
            .roots
            .get_or_try_compute(user, || self.compute_synchronization_roots(user))
            .await
    }

    pub async fn is_synchronization_root(&self, user: &str, document: &Document) -> Result<bool> {
        let roots = self.synchronization_roots(user).await?;
        Ok(roots
            .get(&document.repository)
            .map(|repo_roots| repo_roots.contains(&document.doc_ref))
            .unwrap_or(false))
    }

    /// Root references of the session user in the session repository
    pub async fn synchronization_root_references(
        &self,
        session: &dyn DocumentSession,
    ) -> Result<BTreeSet<DocumentRef>> {
        let roots = self.synchronization_roots(session.user()).await?;
        Ok(roots
            .get(session.repository())
            .map(|repo_roots| repo_roots.refs().clone())
            .unwrap_or_default())
    }

    /// Walk from the parent of `path` up to `root`, looking for a document
    /// the user cannot read
    async fn inheritance_blocked_between(
        &self,
        user: &str,
        path: &DocumentPath,
        root: &DocumentPath,
        session: &dyn DocumentSession,
    ) -> Result<bool> {
        let mut parent = path.parent();
        while let Some(current) = parent {
            if current.is_root() {
                break;
            }
            if current != *root && !current.is_descendant_of(root) {
                break;
            }
            if !session.has_read_permission(user, &current).await? {
                return Ok(true);
            }
            parent = current.parent();
        }
        Ok(false)
    }

    async fn update_subscription(
        &self,
        user: &str,
        target: &Document,
        session: &dyn DocumentSession,
        enabled: bool,
    ) -> Result<()> {
        let (before, after) = if enabled {
            (
                LifecycleEvent::AboutToRegisterRoot,
                LifecycleEvent::RootRegistered,
            )
        } else {
            (
                LifecycleEvent::AboutToUnregisterRoot,
                LifecycleEvent::RootUnregistered,
            )
        };

        let mut document = target.clone();
        document.add_facet(constants::document::DRIVE_SYNCHRONIZED_FACET);

        self.fire(before, &document, session, user);

        let mut subscriptions = session.subscriptions(&document.doc_ref).await?;
        let now = Utc::now();
        match subscriptions.iter_mut().find(|s| s.user == user) {
            Some(subscription) => {
                subscription.enabled = enabled;
                subscription.last_change_time = now;
            }
            None if enabled => subscriptions.push(Subscription {
                user: user.to_string(),
                enabled: true,
                last_change_time: now,
            }),
            None => {}
        }

        let saved = session
            .save_document(&document, &subscriptions, MutationFlags::silent())
            .await?;
        self.fire(after, &saved, session, user);
        session.save().await
    }

    async fn compute_synchronization_roots(&self, user: &str) -> Result<RootSets> {
        let query = SyncRootQuery::for_user(user);
        tracing::debug!("Computing synchronization roots: {}", query);

        let mut roots = RootSets::new();
        for repository in self.catalog.list_repositories() {
            let session = self.sessions.session(&repository, user).await?;
            let mut paths = BTreeSet::new();
            let mut refs = BTreeSet::new();
            for doc_ref in session.query_sync_roots(&query).await? {
                let document = session.get_document(&doc_ref).await?;
                paths.insert(document.path);
                refs.insert(doc_ref);
            }
            roots.insert(repository.clone(), RootSet::new(repository, paths, refs));
        }
        Ok(roots)
    }

    fn fire(
        &self,
        event: LifecycleEvent,
        document: &Document,
        session: &dyn DocumentSession,
        user: &str,
    ) {
        self.emitter.emit(LifecycleSignal {
            event,
            document: document.clone(),
            impacted_user: user.to_string(),
            repository: session.repository().to_string(),
            session_id: session.session_id().to_string(),
            category: constants::EVENT_CATEGORY,
        });
    }
}
