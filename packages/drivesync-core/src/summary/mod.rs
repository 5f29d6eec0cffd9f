//! Change Summary Engine
//!
//! Aggregates per-repository change lists into one summary for a poll.
//!
//! ```text
//! Init ─┬─> bounds invalid ──────────────> empty changes + fresh cursor
//!       └─> scanning (repo by repo) ─┬──> complete: accumulated changes
//!                                    └──> overflow: discard all + flag
//! ```
//!
//! Overflow is terminal for the call and never partially succeeds.

use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::Utc;

use crate::domain::{
    ChangeCursor, ChangeFinder, ChangeRecord, ChangeSummary, CursorMode, DocumentRef, RootRefs,
    RootSet, RootSets, SessionProvider,
};
use crate::membership::CollectionMembershipIndex;
use crate::registry::RootRegistry;
use crate::Result;

pub struct ChangeSummaryEngine {
    sessions: Arc<dyn SessionProvider>,
    finder: Arc<dyn ChangeFinder>,
    registry: Arc<RootRegistry>,
    membership: Arc<CollectionMembershipIndex>,
    limit: usize,
}

/// Upper bound of one poll and the informational date reported with it
struct Bounds {
    upper: i64,
    sync_date: i64,
}

impl ChangeSummaryEngine {
    pub fn new(
        sessions: Arc<dyn SessionProvider>,
        finder: Arc<dyn ChangeFinder>,
        registry: Arc<RootRegistry>,
        membership: Arc<CollectionMembershipIndex>,
        limit: usize,
    ) -> Self {
        Self {
            sessions,
            finder,
            registry,
            membership,
            limit,
        }
    }

    /// Changes visible to `user` since `cursor`
    ///
    /// The mode of `cursor` selects the finder entry point and the mode of
    /// the returned cursor.
    pub async fn change_summary(
        &self,
        user: &str,
        last_active_roots: &RootRefs,
        cursor: ChangeCursor,
    ) -> Result<ChangeSummary> {
        let mode = cursor.mode();
        let roots = self.registry.synchronization_roots(user).await?;
        let collection_members = match mode {
            CursorMode::Sequence => self.membership.collection_sync_root_member_ids(user).await?,
            CursorMode::Time => Arc::new(RootRefs::new()),
        };

        let bounds = self.bounds(mode).await?;
        let repositories = repositories_to_scan(&roots, last_active_roots, &collection_members);
        let mut changes = Vec::new();
        let mut has_too_many_changes = false;

        match cursor.lower_bound() {
            Some(lower) if !repositories.is_empty() && bounds.upper > lower => {
                match self
                    .scan(
                        user,
                        mode,
                        &repositories,
                        &roots,
                        last_active_roots,
                        &collection_members,
                        lower,
                        bounds.upper,
                    )
                    .await?
                {
                    Some(found) => changes = found,
                    None => has_too_many_changes = true,
                }
            }
            _ => tracing::debug!(
                "Skipping change scan for {}: cursor {}, upper bound {}, {} repositories",
                user,
                cursor,
                bounds.upper,
                repositories.len()
            ),
        }

        let active_roots = roots
            .iter()
            .map(|(repository, repo_roots)| (repository.clone(), repo_roots.refs().clone()))
            .collect();

        Ok(ChangeSummary {
            changes,
            active_roots,
            cursor: ChangeCursor::of(mode, bounds.upper),
            sync_date: bounds.sync_date,
            has_too_many_changes,
        })
    }

    async fn bounds(&self, mode: CursorMode) -> Result<Bounds> {
        match mode {
            CursorMode::Time => {
                let upper = self.finder.current_date().await?;
                Ok(Bounds {
                    upper,
                    sync_date: upper,
                })
            }
            CursorMode::Sequence => {
                let upper = self.finder.upper_bound().await?;
                let now = Utc::now().timestamp_millis();
                Ok(Bounds {
                    upper,
                    sync_date: now - now.rem_euclid(1000),
                })
            }
        }
    }

    /// `None` when a repository overflowed
    #[allow(clippy::too_many_arguments)]
    async fn scan(
        &self,
        user: &str,
        mode: CursorMode,
        repositories: &BTreeSet<String>,
        roots: &RootSets,
        last_active_roots: &RootRefs,
        collection_members: &RootRefs,
        lower: i64,
        upper: i64,
    ) -> Result<Option<Vec<ChangeRecord>>> {
        let no_refs = BTreeSet::<DocumentRef>::new();
        let mut changes = Vec::new();

        for repository in repositories {
            let session = self.sessions.session(repository, user).await?;
            let previous = last_active_roots.get(repository).unwrap_or(&no_refs);
            let empty_roots;
            let current = match roots.get(repository) {
                Some(current) => current,
                None => {
                    empty_roots = RootSet::empty(repository.as_str());
                    &empty_roots
                }
            };

            let found = match mode {
                CursorMode::Time => {
                    self.finder
                        .file_system_changes(&*session, previous, current, lower, upper, self.limit)
                        .await
                }
                CursorMode::Sequence => {
                    let members = collection_members.get(repository).unwrap_or(&no_refs);
                    self.finder
                        .file_system_changes_integer_bounds(
                            &*session, previous, current, members, lower, upper, self.limit,
                        )
                        .await
                }
            };

            match found {
                Ok(found) => changes.extend(found),
                Err(err) if err.is_too_many_changes() => {
                    tracing::warn!(
                        "Too many changes for {} in {} ({}, {}], discarding {} collected changes",
                        user,
                        repository,
                        lower,
                        upper,
                        changes.len()
                    );
                    return Ok(None);
                }
                Err(err) => return Err(err),
            }
        }

        tracing::debug!(
            "Found {} changes for {} in ({}, {}]",
            changes.len(),
            user,
            lower,
            upper
        );
        Ok(Some(changes))
    }
}

/// Repositories with roots, last active roots or synchronized collection
/// members, in lexicographic order
fn repositories_to_scan(
    roots: &RootSets,
    last_active_roots: &RootRefs,
    collection_members: &RootRefs,
) -> BTreeSet<String> {
    roots
        .iter()
        .filter(|(_, repo_roots)| !repo_roots.is_empty())
        .map(|(repository, _)| repository)
        .chain(last_active_roots.keys())
        .chain(collection_members.keys())
        .cloned()
        .collect()
}
