//! Coordinator harness over the in-memory adapters

use std::sync::{Arc, Once};

use drivesync_core::infrastructure::{
    InMemoryRepositories, InMemorySession, RecordingEmitter, ScriptedChangeFinder,
};
use drivesync_core::{CoordinatorConfig, Document, SyncCoordinator};

static TRACING: Once = Once::new();

/// Honors `RUST_LOG` when set
pub fn init_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

pub struct Harness {
    pub store: Arc<InMemoryRepositories>,
    pub finder: Arc<ScriptedChangeFinder>,
    pub emitter: Arc<RecordingEmitter>,
    pub coordinator: SyncCoordinator,
}

impl Harness {
    pub fn new(repositories: &[&str]) -> Self {
        Self::with_config(repositories, CoordinatorConfig::default())
    }

    pub fn with_config(repositories: &[&str], config: CoordinatorConfig) -> Self {
        init_tracing();
        let store = Arc::new(InMemoryRepositories::new(repositories.iter().copied()));
        let finder = Arc::new(ScriptedChangeFinder::new());
        let emitter = Arc::new(RecordingEmitter::new());
        let coordinator = SyncCoordinator::builder(config)
            .with_in_memory_store(store.clone())
            .with_change_finder(finder.clone())
            .with_emitter(emitter.clone())
            .build()
            .expect("coordinator builds");
        Self {
            store,
            finder,
            emitter,
            coordinator,
        }
    }

    pub fn session(&self, repository: &str, user: &str) -> Arc<InMemorySession> {
        self.store.open(repository, user).expect("repository exists")
    }

    pub fn add(&self, document: Document) -> Document {
        self.store.add_document(document).expect("repository exists")
    }

    pub async fn register(&self, user: &str, document: &Document) {
        let session = self.session(&document.repository, user);
        self.coordinator
            .register_root(user, document, &*session)
            .await
            .expect("register succeeds");
    }

    pub async fn unregister(&self, user: &str, document: &Document) {
        let session = self.session(&document.repository, user);
        self.coordinator
            .unregister_root(user, document, &*session)
            .await
            .expect("unregister succeeds");
    }

    /// Root ids of `user` in `repository`, sorted
    pub async fn root_ids(&self, user: &str, repository: &str) -> Vec<String> {
        let roots = self
            .coordinator
            .get_synchronization_roots(user)
            .await
            .expect("roots resolve");
        roots
            .get(repository)
            .map(|set| set.refs().iter().map(|r| r.to_string()).collect())
            .unwrap_or_default()
    }
}
