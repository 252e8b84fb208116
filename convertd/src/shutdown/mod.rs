//! Deferred-shutdown queue.
//!
//! Components register a named teardown future as they are constructed.
//! `release` runs the teardowns newest-first, so a component never outlives
//! the ones it depends on: the HTTP server closes before the orchestrator,
//! the orchestrator before the codec backends and the persistence pool.

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;
use tracing::{debug, error, warn};

use crate::Result;

type Teardown = Pin<Box<dyn Future<Output = Result<()>> + Send>>;

#[derive(Default)]
pub struct DeferredShutdown {
    pending: Mutex<Vec<(String, Teardown)>>,
    released: AtomicBool,
    running: Mutex<Option<tokio::task::JoinHandle<()>>>,
}

impl DeferredShutdown {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a teardown. Ignored with a warning once released.
    pub fn add(&self, name: impl Into<String>, teardown: impl Future<Output = Result<()>> + Send + 'static) {
        let name = name.into();
        if self.released.load(Ordering::Acquire) {
            warn!(component = %name, "teardown registered after release, dropped");
            return;
        }
        self.pending.lock().push((name, Box::pin(teardown)));
    }

    /// Start the teardowns, newest-first. Idempotent: closures run exactly
    /// once no matter how many times release is called.
    pub fn release(&self) {
        if self.released.swap(true, Ordering::AcqRel) {
            return;
        }

        let mut pending = std::mem::take(&mut *self.pending.lock());
        let handle = tokio::spawn(async move {
            while let Some((name, teardown)) = pending.pop() {
                debug!(component = %name, "teardown started");
                match teardown.await {
                    Ok(()) => debug!(component = %name, "teardown finished"),
                    Err(e) => error!(component = %name, error = %e, "teardown failed"),
                }
            }
        });
        *self.running.lock() = Some(handle);
    }

    /// Block until every teardown has completed. Returns immediately when
    /// release has not happened.
    pub async fn wait(&self) {
        let handle = self.running.lock().take();
        if let Some(handle) = handle
            && let Err(e) = handle.await
        {
            error!(error = %e, "teardown runner failed");
        }
    }
}
