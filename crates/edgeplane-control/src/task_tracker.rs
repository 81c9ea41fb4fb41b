//! Task tracking for long-running background workers
//!
//! Holds the JoinHandles of the reconciliation loop, the certificate
//! manager and the API server so shutdown can wait for them in one place.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Tracks named background tasks
pub struct TaskTracker {
    /// Map of worker name -> JoinHandle
    tasks: Mutex<HashMap<String, JoinHandle<()>>>,
}

impl TaskTracker {
    /// Create a new task tracker
    pub fn new() -> Self {
        Self {
            tasks: Mutex::new(HashMap::new()),
        }
    }

    /// Register a worker; a previous worker under the same name is aborted
    pub fn register(&self, name: impl Into<String>, handle: JoinHandle<()>) {
        if let Ok(mut tasks) = self.tasks.lock() {
            if let Some(old_handle) = tasks.insert(name.into(), handle) {
                old_handle.abort();
            }
        }
    }

    pub fn len(&self) -> usize {
        self.tasks.lock().map(|tasks| tasks.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Wait for every worker to finish; stragglers are aborted after `grace`
    ///
    /// Call after the workers' cancellation token has fired.
    pub async fn shutdown(&self, grace: Duration) {
        let drained: Vec<(String, JoinHandle<()>)> = match self.tasks.lock() {
            Ok(mut tasks) => tasks.drain().collect(),
            Err(_) => return,
        };

        for (name, mut handle) in drained {
            match tokio::time::timeout(grace, &mut handle).await {
                Ok(Ok(())) => debug!(worker = %name, "Worker stopped"),
                Ok(Err(e)) => warn!(worker = %name, error = %e, "Worker ended abnormally"),
                Err(_) => {
                    warn!(worker = %name, grace_secs = grace.as_secs(), "Worker did not stop in time, aborting");
                    handle.abort();
                }
            }
        }
    }
}

impl Default for TaskTracker {
    fn default() -> Self {
        Self::new()
    }
}
