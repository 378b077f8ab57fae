//! Completion signaling for a pipeline run
//!
//! A [`CompletionHandle`] starts with one unit of outstanding work for the
//! pipeline plus one per job. Every terminal transition retires one unit and
//! the handle is signaled once all of them are gone.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use tokio::sync::watch;
use tracing::warn;

#[derive(Debug)]
struct Shared {
    remaining: AtomicUsize,
    done: watch::Sender<bool>,
}

/// Synchronization handle signaled when a run has fully terminated
#[derive(Debug, Clone)]
pub struct CompletionHandle {
    shared: Arc<Shared>,
}

impl CompletionHandle {
    pub(crate) fn new(units: usize) -> Self {
        let (done, _) = watch::channel(units == 0);
        Self {
            shared: Arc::new(Shared {
                remaining: AtomicUsize::new(units),
                done,
            }),
        }
    }

    /// Units of work not yet retired
    pub fn remaining(&self) -> usize {
        self.shared.remaining.load(Ordering::Acquire)
    }

    pub fn is_done(&self) -> bool {
        self.remaining() == 0
    }

    /// Waits until every unit has been retired
    pub async fn wait(&self) {
        let mut rx = self.shared.done.subscribe();
        // The sender lives as long as `self`, so this cannot observe a closed channel.
        let _ = rx.wait_for(|done| *done).await;
    }

    /// Waits for completion, giving up after `timeout`
    ///
    /// Returns whether the run completed in time.
    pub async fn wait_timeout(&self, timeout: Duration) -> bool {
        tokio::time::timeout(timeout, self.wait()).await.is_ok()
    }

    pub(crate) fn retire(&self) {
        let previous = self
            .shared
            .remaining
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1));

        match previous {
            Ok(1) => {
                self.shared.done.send_replace(true);
            }
            Ok(_) => {}
            Err(_) => warn!("Completion unit retired after the run was already complete"),
        }
    }

    fn retire_all(&self) {
        if self.shared.remaining.swap(0, Ordering::AcqRel) > 0 {
            self.shared.done.send_replace(true);
        }
    }
}

/// Retires the pipeline's own unit when dropped
///
/// If the run is unwinding from a panic, every outstanding unit is retired so
/// that waiters are never left hanging.
pub(crate) struct PipelineUnit {
    handle: CompletionHandle,
}

impl PipelineUnit {
    pub(crate) fn new(handle: CompletionHandle) -> Self {
        Self { handle }
    }
}

impl Drop for PipelineUnit {
    fn drop(&mut self) {
        if std::thread::panicking() {
            self.handle.retire_all();
        } else {
            self.handle.retire();
        }
    }
}
