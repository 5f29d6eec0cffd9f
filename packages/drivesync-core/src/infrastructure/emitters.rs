//! Lifecycle emitters

use parking_lot::Mutex;

use crate::domain::{LifecycleEmitter, LifecycleEvent, LifecycleSignal};

/// Drops every signal
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopEmitter;

impl LifecycleEmitter for NoopEmitter {
    fn emit(&self, _signal: LifecycleSignal) {}
}

/// Logs every signal at info level
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingEmitter;

impl LifecycleEmitter for TracingEmitter {
    fn emit(&self, signal: LifecycleSignal) {
        tracing::info!(
            event = signal.event.as_str(),
            category = signal.category,
            repository = %signal.repository,
            user = %signal.impacted_user,
            document = %signal.document.doc_ref,
            "lifecycle signal"
        );
    }
}

/// Keeps every signal in emission order (for testing)
#[derive(Debug, Default)]
pub struct RecordingEmitter {
    signals: Mutex<Vec<LifecycleSignal>>,
}

impl RecordingEmitter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn signals(&self) -> Vec<LifecycleSignal> {
        self.signals.lock().clone()
    }

    pub fn events(&self) -> Vec<LifecycleEvent> {
        self.signals.lock().iter().map(|s| s.event).collect()
    }

    pub fn clear(&self) {
        self.signals.lock().clear();
    }
}

impl LifecycleEmitter for RecordingEmitter {
    fn emit(&self, signal: LifecycleSignal) {
        self.signals.lock().push(signal);
    }
}
