//! Cross-context wake-up between the voice driver and a guild's playback loop.
//!
//! Songbird fires track events from its own driver tasks, so the hook handed to
//! the stream only touches atomics, a [`Notify`] and an unbounded channel. All
//! of these are safe to use from any thread without holding a lock.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::sync::{Notify, mpsc};
use tracing::{debug, error};

/// Single-slot wake flag. Setting it twice before a wait is the same as once.
#[derive(Default)]
pub struct WakeSignal {
    flag: AtomicBool,
    notify: Notify,
}

impl WakeSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self) {
        self.flag.store(true, Ordering::SeqCst);
        self.notify.notify_waiters();
    }

    pub fn clear(&self) {
        self.flag.store(false, Ordering::SeqCst);
    }

    pub fn is_set(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    /// Wait until the flag is set. Returns immediately if it already is.
    pub async fn wait(&self) {
        loop {
            let notified = self.notify.notified();
            tokio::pin!(notified);
            // Register before checking so a concurrent `set` cannot be missed.
            notified.as_mut().enable();
            if self.is_set() {
                return;
            }
            notified.await;
        }
    }

    /// Returns `false` when the timeout elapsed first.
    pub async fn wait_timeout(&self, timeout: Duration) -> bool {
        tokio::time::timeout(timeout, self.wait()).await.is_ok()
    }
}

/// A stream that failed after it started
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamFailure {
    pub title: String,
    pub reason: String,
}

struct HookInner {
    fired: AtomicBool,
    signal: Arc<WakeSignal>,
    failures: mpsc::UnboundedSender<StreamFailure>,
    title: String,
}

/// Completion callback for one started stream.
///
/// Cloned into every driver event handler of that stream; only the first
/// completion counts.
#[derive(Clone)]
pub struct CompletionHook {
    inner: Arc<HookInner>,
}

impl CompletionHook {
    pub fn new(
        title: impl Into<String>,
        signal: Arc<WakeSignal>,
        failures: mpsc::UnboundedSender<StreamFailure>,
    ) -> Self {
        Self {
            inner: Arc::new(HookInner {
                fired: AtomicBool::new(false),
                signal,
                failures,
                title: title.into(),
            }),
        }
    }

    /// Report the end of the stream, with the driver's error if it failed.
    pub fn complete(&self, error: Option<String>) {
        if self.inner.fired.swap(true, Ordering::SeqCst) {
            return;
        }

        match error {
            Some(reason) => {
                error!("Stream for '{}' ended with an error: {}", self.inner.title, reason);
                // The receiver is gone only once the guild is torn down.
                let _ = self.inner.failures.send(StreamFailure {
                    title: self.inner.title.clone(),
                    reason,
                });
            }
            None => debug!("Stream for '{}' finished", self.inner.title),
        }

        self.inner.signal.set();
    }

    pub fn has_fired(&self) -> bool {
        self.inner.fired.load(Ordering::SeqCst)
    }

    pub fn title(&self) -> &str {
        &self.inner.title
    }
}
