//! Infrastructure adapters
//!
//! In-memory implementations of every port, used by the test suites and by
//! embedders that want a self-contained coordinator:
//! - `InMemoryRepositories`: sessions, catalog, collection services
//! - `ScriptedChangeFinder`: change log with scripted overflow and failures
//! - Lifecycle emitters: recording, tracing and no-op

mod emitters;
mod memory_store;
mod scripted_finder;

pub use emitters::{NoopEmitter, RecordingEmitter, TracingEmitter};
pub use memory_store::{InMemoryRepositories, InMemorySession};
pub use scripted_finder::{FinderCall, ScriptedChangeFinder};
