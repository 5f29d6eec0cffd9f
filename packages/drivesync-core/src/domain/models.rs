//! Domain models for the synchronization coordinator

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use super::cursor::ChangeCursor;
use crate::config::constants;

/// User identity (externally authenticated principal name)
pub type UserId = String;

/// Name of one document-store namespace
pub type RepositoryName = String;

/// Synchronization root sets of one user, keyed by repository
pub type RootSets = BTreeMap<RepositoryName, RootSet>;

/// Root references of one user, keyed by repository
pub type RootRefs = BTreeMap<RepositoryName, BTreeSet<DocumentRef>>;

// ═══════════════════════════════════════════════════════════════════════════
// Document identity
// ═══════════════════════════════════════════════════════════════════════════

/// Stable document identity
#[derive(Debug, Clone, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DocumentRef(String);

impl DocumentRef {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DocumentRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for DocumentRef {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for DocumentRef {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Hierarchical document path at query time (`/a/b/c`)
///
/// Only used for ancestor tests, never as identity.
#[derive(Debug, Clone, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DocumentPath(String);

impl DocumentPath {
    pub const ROOT: &'static str = "/";

    pub fn new(path: impl Into<String>) -> Self {
        let path = path.into();
        if path.len() > 1 && path.ends_with('/') {
            return Self(path.trim_end_matches('/').to_string());
        }
        Self(path)
    }

    pub fn root() -> Self {
        Self(Self::ROOT.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_root(&self) -> bool {
        self.0 == Self::ROOT
    }

    /// Last segment (empty for `/`)
    pub fn name(&self) -> &str {
        self.0.rsplit('/').next().unwrap_or_default()
    }

    /// Path without its last segment; `None` for `/`
    pub fn parent(&self) -> Option<DocumentPath> {
        if self.is_root() {
            return None;
        }
        match self.0.rfind('/') {
            Some(0) => Some(Self::root()),
            Some(idx) => Some(Self(self.0[..idx].to_string())),
            None => None,
        }
    }

    pub fn join(&self, name: &str) -> DocumentPath {
        if self.is_root() {
            Self(format!("/{}", name))
        } else {
            Self(format!("{}/{}", self.0, name))
        }
    }

    /// Strictly below `ancestor` in the hierarchy
    pub fn is_descendant_of(&self, ancestor: &DocumentPath) -> bool {
        if ancestor.is_root() {
            return !self.is_root();
        }
        self.0.len() > ancestor.0.len()
            && self.0.starts_with(&ancestor.0)
            && self.0.as_bytes()[ancestor.0.len()] == b'/'
    }
}

impl fmt::Display for DocumentPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for DocumentPath {
    fn from(path: &str) -> Self {
        Self::new(path)
    }
}

impl From<String> for DocumentPath {
    fn from(path: String) -> Self {
        Self::new(path)
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Documents
// ═══════════════════════════════════════════════════════════════════════════

/// Live document, archived version, or read-only proxy
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DocumentKind {
    Live,
    Version,
    Proxy,
}

/// Document as seen through a session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    pub doc_ref: DocumentRef,
    pub repository: RepositoryName,
    pub path: DocumentPath,
    pub title: String,
    pub kind: DocumentKind,
    pub facets: BTreeSet<String>,
    pub lifecycle_state: String,
    pub created: DateTime<Utc>,
}

impl Document {
    pub fn new(
        repository: impl Into<RepositoryName>,
        doc_ref: impl Into<DocumentRef>,
        path: impl Into<DocumentPath>,
        title: impl Into<String>,
    ) -> Self {
        Self {
            doc_ref: doc_ref.into(),
            repository: repository.into(),
            path: path.into(),
            title: title.into(),
            kind: DocumentKind::Live,
            facets: BTreeSet::new(),
            lifecycle_state: "project".to_string(),
            created: Utc::now(),
        }
    }

    pub fn with_kind(mut self, kind: DocumentKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn with_facet(mut self, facet: impl Into<String>) -> Self {
        self.facets.insert(facet.into());
        self
    }

    pub fn with_lifecycle_state(mut self, state: impl Into<String>) -> Self {
        self.lifecycle_state = state.into();
        self
    }

    pub fn with_created(mut self, created: DateTime<Utc>) -> Self {
        self.created = created;
        self
    }

    /// Last path segment
    pub fn name(&self) -> &str {
        self.path.name()
    }

    pub fn is_version(&self) -> bool {
        self.kind == DocumentKind::Version
    }

    pub fn is_proxy(&self) -> bool {
        self.kind == DocumentKind::Proxy
    }

    pub fn has_facet(&self, facet: &str) -> bool {
        self.facets.contains(facet)
    }

    /// Returns `true` when the facet was not present yet
    pub fn add_facet(&mut self, facet: &str) -> bool {
        self.facets.insert(facet.to_string())
    }

    pub fn is_collection(&self) -> bool {
        self.has_facet(constants::document::COLLECTION_FACET)
    }

    pub fn is_deleted(&self) -> bool {
        self.lifecycle_state == constants::document::DELETED_LIFECYCLE_STATE
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Synchronization roots
// ═══════════════════════════════════════════════════════════════════════════

/// Synchronization roots of one user in one repository
///
/// `paths` and `refs` describe the same documents: paths serve hierarchy
/// tests, refs serve membership tests. Built wholesale, never mutated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RootSet {
    repository: RepositoryName,
    paths: BTreeSet<DocumentPath>,
    refs: BTreeSet<DocumentRef>,
}

impl RootSet {
    pub fn new(
        repository: impl Into<RepositoryName>,
        paths: BTreeSet<DocumentPath>,
        refs: BTreeSet<DocumentRef>,
    ) -> Self {
        Self {
            repository: repository.into(),
            paths,
            refs,
        }
    }

    pub fn empty(repository: impl Into<RepositoryName>) -> Self {
        Self::new(repository, BTreeSet::new(), BTreeSet::new())
    }

    pub fn repository(&self) -> &str {
        &self.repository
    }

    pub fn paths(&self) -> &BTreeSet<DocumentPath> {
        &self.paths
    }

    pub fn refs(&self) -> &BTreeSet<DocumentRef> {
        &self.refs
    }

    pub fn contains(&self, doc_ref: &DocumentRef) -> bool {
        self.refs.contains(doc_ref)
    }

    pub fn is_empty(&self) -> bool {
        self.refs.is_empty()
    }

    pub fn len(&self) -> usize {
        self.refs.len()
    }
}

/// Per user entry in a document's subscription list
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subscription {
    pub user: UserId,
    pub enabled: bool,
    pub last_change_time: DateTime<Utc>,
}

impl Subscription {
    pub fn enabled(user: impl Into<UserId>) -> Self {
        Self {
            user: user.into(),
            enabled: true,
            last_change_time: Utc::now(),
        }
    }
}

/// Side effects to suppress while persisting a document
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MutationFlags {
    pub disable_audit: bool,
    pub disable_notification: bool,
}

impl MutationFlags {
    /// No audit entry, no user notification
    pub fn silent() -> Self {
        Self {
            disable_audit: true,
            disable_notification: true,
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Lifecycle signals
// ═══════════════════════════════════════════════════════════════════════════

/// Lifecycle signals surrounding a root mutation
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq)]
pub enum LifecycleEvent {
    AboutToRegisterRoot,
    RootRegistered,
    AboutToUnregisterRoot,
    RootUnregistered,
}

impl LifecycleEvent {
    pub fn as_str(&self) -> &'static str {
        match self {
            LifecycleEvent::AboutToRegisterRoot => "aboutToRegisterRoot",
            LifecycleEvent::RootRegistered => "rootRegistered",
            LifecycleEvent::AboutToUnregisterRoot => "aboutToUnRegisterRoot",
            LifecycleEvent::RootUnregistered => "rootUnregistered",
        }
    }
}

impl fmt::Display for LifecycleEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One outbound lifecycle signal
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LifecycleSignal {
    pub event: LifecycleEvent,
    pub document: Document,
    pub impacted_user: UserId,
    pub repository: RepositoryName,
    pub session_id: String,
    pub category: &'static str,
}

// ═══════════════════════════════════════════════════════════════════════════
// Paging
// ═══════════════════════════════════════════════════════════════════════════

/// Page selector for listing services
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page_index: usize,
    pub page_size: usize,
}

impl PageRequest {
    pub fn first(page_size: usize) -> Self {
        Self {
            page_index: 0,
            page_size,
        }
    }

    pub fn next(self) -> Self {
        Self {
            page_index: self.page_index + 1,
            ..self
        }
    }

    pub fn offset(&self) -> usize {
        self.page_index * self.page_size
    }
}

/// One page of a listing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub has_next: bool,
}

// ═══════════════════════════════════════════════════════════════════════════
// Change summaries
// ═══════════════════════════════════════════════════════════════════════════

/// One change produced by the change finder
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeRecord {
    pub repository: RepositoryName,
    pub doc_ref: DocumentRef,
    pub event_type: String,
    pub sequence: i64,
    /// Milliseconds since epoch
    pub occurred_at: i64,
}

/// Aggregated result of one incremental poll
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeSummary {
    /// Empty when nothing changed, when the lower bound was missing or on overflow
    pub changes: Vec<ChangeRecord>,

    /// Current roots of the user, independent of `has_too_many_changes`
    pub active_roots: RootRefs,

    /// Continuation token for the next poll
    pub cursor: ChangeCursor,

    /// Informational server time (milliseconds)
    pub sync_date: i64,

    /// Client must fall back to a full resynchronization
    pub has_too_many_changes: bool,
}
