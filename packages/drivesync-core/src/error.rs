//! Error types for drivesync-core

use std::fmt;
use thiserror::Error;

/// Coordinator error kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Target is a version or a read-only proxy
    NotEligibleRoot,
    /// Change finder refused to enumerate (too many matching records)
    TooManyChanges,
    /// Document could not be resolved in its repository
    DocumentNotFound,
    /// Storage / connectivity failure in a repository
    Storage,
    /// Configuration errors
    Config,
    /// Metrics registration errors
    Metrics,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::NotEligibleRoot => "not_eligible_root",
            ErrorKind::TooManyChanges => "too_many_changes",
            ErrorKind::DocumentNotFound => "document_not_found",
            ErrorKind::Storage => "storage",
            ErrorKind::Config => "config",
            ErrorKind::Metrics => "metrics",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Coordinator error type
#[derive(Debug, Error)]
#[error("[{kind}] {message}")]
pub struct SyncError {
    #[source]
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
    pub kind: ErrorKind,
    pub message: String,
}

impl SyncError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            source: None,
        }
    }

    pub fn with_source(mut self, source: impl std::error::Error + Send + Sync + 'static) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    // Convenience constructors
    pub fn not_eligible_root(title: impl fmt::Display, doc_ref: impl fmt::Display) -> Self {
        Self::new(
            ErrorKind::NotEligibleRoot,
            format!(
                "Document '{}' ({}) is not a suitable synchronization root \
                 as it is either a readonly proxy or an archived version.",
                title, doc_ref
            ),
        )
    }

    pub fn too_many_changes(repository: impl fmt::Display, limit: usize) -> Self {
        Self::new(
            ErrorKind::TooManyChanges,
            format!(
                "Too many changes in repository {} (limit: {})",
                repository, limit
            ),
        )
    }

    pub fn document_not_found(what: impl fmt::Display) -> Self {
        Self::new(
            ErrorKind::DocumentNotFound,
            format!("Document not found: {}", what),
        )
    }

    pub fn storage(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Storage, message)
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Config, message)
    }

    /// Overflow from the change finder: convert to a flag, never retry
    pub fn is_too_many_changes(&self) -> bool {
        self.kind == ErrorKind::TooManyChanges
    }
}

impl From<prometheus::Error> for SyncError {
    fn from(err: prometheus::Error) -> Self {
        SyncError::new(ErrorKind::Metrics, format!("Metrics error: {}", err)).with_source(err)
    }
}

impl From<serde_yaml::Error> for SyncError {
    fn from(err: serde_yaml::Error) -> Self {
        SyncError::config(format!("YAML error: {}", err)).with_source(err)
    }
}

impl From<std::io::Error> for SyncError {
    fn from(err: std::io::Error) -> Self {
        SyncError::storage(format!("I/O error: {}", err)).with_source(err)
    }
}

impl From<crate::config::ConfigError> for SyncError {
    fn from(err: crate::config::ConfigError) -> Self {
        SyncError::config(err.to_string()).with_source(err)
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, SyncError>;
