//! Scripted change finder (for testing)
//!
//! Keeps an append-only change log per repository. Each recorded change
//! advances both a millisecond clock and a global sequence id, so the two
//! cursor modes see the same history. Overflow and storage failures can be
//! scripted per repository.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::sync::atomic::{AtomicI64, Ordering};

use crate::domain::{
    ChangeFinder, ChangeRecord, CursorMode, DocumentRef, DocumentSession, RepositoryName,
    RootSet,
};
use crate::{Result, SyncError};

/// Clock origin: 2024-01-01T00:00:00Z
const DEFAULT_START_MILLIS: i64 = 1_704_067_200_000;

/// Arguments of one finder invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FinderCall {
    pub repository: RepositoryName,
    pub mode: CursorMode,
    pub previous_roots: BTreeSet<DocumentRef>,
    pub current_roots: BTreeSet<DocumentRef>,
    /// Always empty in time mode
    pub collection_members: BTreeSet<DocumentRef>,
    pub lower_bound: i64,
    pub upper_bound: i64,
    pub limit: usize,
}

pub struct ScriptedChangeFinder {
    now: AtomicI64,
    sequence: AtomicI64,
    records: Mutex<BTreeMap<RepositoryName, Vec<ChangeRecord>>>,
    overflowing: Mutex<HashSet<RepositoryName>>,
    failing: Mutex<HashSet<RepositoryName>>,
    calls: Mutex<Vec<FinderCall>>,
}

impl Default for ScriptedChangeFinder {
    fn default() -> Self {
        Self::starting_at(DEFAULT_START_MILLIS)
    }
}

impl ScriptedChangeFinder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Finder whose clock starts at `millis`
    pub fn starting_at(millis: i64) -> Self {
        Self {
            now: AtomicI64::new(millis),
            sequence: AtomicI64::new(0),
            records: Mutex::new(BTreeMap::new()),
            overflowing: Mutex::new(HashSet::new()),
            failing: Mutex::new(HashSet::new()),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Append a change to the log of `repository`
    pub fn record_change(
        &self,
        repository: &str,
        doc_ref: impl Into<DocumentRef>,
        event_type: &str,
    ) -> ChangeRecord {
        let record = ChangeRecord {
            repository: repository.to_string(),
            doc_ref: doc_ref.into(),
            event_type: event_type.to_string(),
            sequence: self.sequence.fetch_add(1, Ordering::SeqCst) + 1,
            occurred_at: self.now.fetch_add(1, Ordering::SeqCst) + 1,
        };
        self.records
            .lock()
            .entry(repository.to_string())
            .or_default()
            .push(record.clone());
        record
    }

    /// Report overflow for `repository` regardless of the limit
    pub fn set_overflowing(&self, repository: &str, overflowing: bool) {
        let mut set = self.overflowing.lock();
        if overflowing {
            set.insert(repository.to_string());
        } else {
            set.remove(repository);
        }
    }

    /// Fail every query on `repository` with a storage error
    pub fn set_failing(&self, repository: &str, failing: bool) {
        let mut set = self.failing.lock();
        if failing {
            set.insert(repository.to_string());
        } else {
            set.remove(repository);
        }
    }

    pub fn calls(&self) -> Vec<FinderCall> {
        self.calls.lock().clone()
    }

    pub fn last_sequence(&self) -> i64 {
        self.sequence.load(Ordering::SeqCst)
    }

    fn scan(&self, call: FinderCall) -> Result<Vec<ChangeRecord>> {
        tracing::debug!(
            "Scanning {} changes of {} in ({}, {}]",
            call.mode.as_str(),
            call.repository,
            call.lower_bound,
            call.upper_bound
        );
        let repository = call.repository.clone();
        let (mode, lower, upper, limit) =
            (call.mode, call.lower_bound, call.upper_bound, call.limit);
        self.calls.lock().push(call);

        if self.failing.lock().contains(&repository) {
            return Err(SyncError::storage(format!(
                "Change log of repository {} is unavailable",
                repository
            )));
        }
        if self.overflowing.lock().contains(&repository) {
            return Err(SyncError::too_many_changes(&repository, limit));
        }

        let changes: Vec<ChangeRecord> = self
            .records
            .lock()
            .get(&repository)
            .map(|records| {
                records
                    .iter()
                    .filter(|r| {
                        let value = match mode {
                            CursorMode::Time => r.occurred_at,
                            CursorMode::Sequence => r.sequence,
                        };
                        value > lower && value <= upper
                    })
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();

        if changes.len() > limit {
            return Err(SyncError::too_many_changes(&repository, limit));
        }
        Ok(changes)
    }
}

#[async_trait]
impl ChangeFinder for ScriptedChangeFinder {
    async fn current_date(&self) -> Result<i64> {
        Ok(self.now.fetch_add(1, Ordering::SeqCst) + 1)
    }

    async fn upper_bound(&self) -> Result<i64> {
        Ok(self.sequence.load(Ordering::SeqCst))
    }

    async fn file_system_changes(
        &self,
        session: &dyn DocumentSession,
        previous_roots: &BTreeSet<DocumentRef>,
        current_roots: &RootSet,
        lower_bound: i64,
        upper_bound: i64,
        limit: usize,
    ) -> Result<Vec<ChangeRecord>> {
        self.scan(FinderCall {
            repository: session.repository().to_string(),
            mode: CursorMode::Time,
            previous_roots: previous_roots.clone(),
            current_roots: current_roots.refs().clone(),
            collection_members: BTreeSet::new(),
            lower_bound,
            upper_bound,
            limit,
        })
    }

    async fn file_system_changes_integer_bounds(
        &self,
        session: &dyn DocumentSession,
        previous_roots: &BTreeSet<DocumentRef>,
        current_roots: &RootSet,
        collection_members: &BTreeSet<DocumentRef>,
        lower_bound: i64,
        upper_bound: i64,
        limit: usize,
    ) -> Result<Vec<ChangeRecord>> {
        self.scan(FinderCall {
            repository: session.repository().to_string(),
            mode: CursorMode::Sequence,
            previous_roots: previous_roots.clone(),
            current_roots: current_roots.refs().clone(),
            collection_members: collection_members.clone(),
            lower_bound,
            upper_bound,
            limit,
        })
    }
}
