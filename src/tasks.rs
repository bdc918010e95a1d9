use std::fmt::Display;
use std::future::Future;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Fire-and-forget work that must never reach the player: failures are logged
/// and dropped. Handles are kept so tests and shutdown can wait them out.
#[derive(Clone, Default)]
pub struct Background {
    handles: Arc<Mutex<Vec<JoinHandle<()>>>>,
}

impl Background {
    pub fn new() -> Self {
        Self::default()
    }

    /// Must be called from inside a tokio runtime.
    pub fn spawn<F, T, E>(&self, label: &'static str, task: F)
    where
        F: Future<Output = Result<T, E>> + Send + 'static,
        T: Send + 'static,
        E: Display + Send + 'static,
    {
        let handle = tokio::spawn(async move {
            match task.await {
                Ok(_) => debug!(task = label, "background task finished"),
                Err(err) => warn!(task = label, error = %err, "background task failed"),
            }
        });
        let mut handles = self.handles.lock();
        handles.retain(|h| !h.is_finished());
        handles.push(handle);
    }

    pub fn pending(&self) -> usize {
        self.handles
            .lock()
            .iter()
            .filter(|h| !h.is_finished())
            .count()
    }

    /// Waits for every spawned task, including ones spawned while waiting.
    pub async fn flush(&self) {
        loop {
            let drained: Vec<JoinHandle<()>> = std::mem::take(&mut *self.handles.lock());
            if drained.is_empty() {
                break;
            }
            for handle in drained {
                if let Err(err) = handle.await {
                    warn!(error = %err, "background task panicked or was cancelled");
                }
            }
        }
    }
}
