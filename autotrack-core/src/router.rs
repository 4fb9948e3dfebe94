//! Delivery router
//!
//! A single-consumer FIFO queue that fans each event out to every registered
//! platform.
//!
//! ## Delivery guarantees
//!
//! - **FIFO across events**: event N+1 is not handed to any platform until
//!   every platform has settled event N (success or failure).
//! - **No order across platforms**: one event is delivered to all platforms
//!   concurrently.
//! - **Failure isolation**: an error or panic in one platform is logged and
//!   dropped; other platforms, the drain loop and later events are unaffected.
//!
//! The queue is unbounded and nothing is retried. A platform whose `track`
//! never completes stalls the queue.
//!
//! ## Draining
//!
//! `enqueue` appends and, if no drain is active, spawns one on the current
//! Tokio runtime. Outside a runtime the event stays queued and is picked up
//! by the next `enqueue` made inside one. The active flag is claimed with a compare-and-swap so at
//! most one drain runs at a time; after releasing it the drain re-checks the
//! queue so an event pushed during release is never stranded.

use std::collections::VecDeque;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use futures::future::join_all;
use futures::FutureExt;
use parking_lot::{Mutex, RwLock};
use tokio::sync::Notify;

use crate::platform::Platform;
use crate::types::Event;

/// Delivery statistics
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct DeliveryStats {
    /// Events taken off the queue and fanned out
    pub events_processed: usize,
    /// Successful (event, platform) deliveries
    pub deliveries_succeeded: usize,
    /// Failed (event, platform) deliveries
    pub deliveries_failed: usize,
    /// Events dequeued while no platform was registered
    pub events_without_platforms: usize,
    /// Events still waiting in the queue when the stats were taken
    pub pending: usize,
}

struct RouterInner {
    platforms: RwLock<Vec<Arc<dyn Platform>>>,
    queue: Mutex<VecDeque<Event>>,
    draining: AtomicBool,
    idle: Notify,
    stats: Mutex<DeliveryStats>,
}

/// Routes events to platforms in strict FIFO order.
///
/// Cloning yields another handle to the same queue and registry.
#[derive(Clone)]
pub struct DeliveryRouter {
    inner: Arc<RouterInner>,
}

impl Default for DeliveryRouter {
    fn default() -> Self {
        Self::new()
    }
}

impl DeliveryRouter {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RouterInner {
                platforms: RwLock::new(Vec::new()),
                queue: Mutex::new(VecDeque::new()),
                draining: AtomicBool::new(false),
                idle: Notify::new(),
                stats: Mutex::new(DeliveryStats::default()),
            }),
        }
    }

    pub fn add_platform(&self, platform: Arc<dyn Platform>) {
        self.inner.platforms.write().push(platform);
    }

    /// Replace the whole registry.
    pub fn set_platforms(&self, platforms: Vec<Arc<dyn Platform>>) {
        *self.inner.platforms.write() = platforms;
    }

    /// Remove every platform registered as `name`.
    pub fn remove_platform(&self, name: &str) {
        self.inner.platforms.write().retain(|p| p.name() != name);
    }

    pub fn platform_names(&self) -> Vec<String> {
        self.inner
            .platforms
            .read()
            .iter()
            .map(|p| p.name().to_string())
            .collect()
    }

    /// Queue an event for delivery and start draining if idle.
    ///
    /// Delivery failures are logged, never returned.
    pub fn enqueue(&self, event: Event) {
        tracing::trace!(event = %event.name, "Event queued");
        self.inner.queue.lock().push_back(event);
        self.kick();
    }

    /// Number of events waiting to be dequeued.
    pub fn pending_count(&self) -> usize {
        self.inner.queue.lock().len()
    }

    /// Whether a drain is currently running.
    pub fn is_draining(&self) -> bool {
        self.inner.draining.load(Ordering::Acquire)
    }

    pub fn stats(&self) -> DeliveryStats {
        let mut stats = self.inner.stats.lock().clone();
        stats.pending = self.pending_count();
        stats
    }

    /// Wait until the queue is empty and no drain is running.
    pub async fn flush(&self) {
        loop {
            let notified = self.inner.idle.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if self.is_idle() {
                return;
            }
            notified.await;
        }
    }

    fn is_idle(&self) -> bool {
        !self.is_draining() && self.inner.queue.lock().is_empty()
    }

    fn kick(&self) {
        if self
            .inner
            .draining
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
        {
            match tokio::runtime::Handle::try_current() {
                Ok(handle) => {
                    handle.spawn(drain(Arc::clone(&self.inner)));
                }
                Err(_) => {
                    self.inner.draining.store(false, Ordering::Release);
                    tracing::error!(
                        pending = self.pending_count(),
                        "No Tokio runtime to deliver events on, leaving them queued"
                    );
                }
            }
        }
    }
}

impl std::fmt::Debug for DeliveryRouter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeliveryRouter")
            .field("platforms", &self.platform_names())
            .field("pending", &self.pending_count())
            .field("draining", &self.is_draining())
            .finish()
    }
}

/// Drain loop. Entered only by the task that won the `draining` flag.
async fn drain(inner: Arc<RouterInner>) {
    loop {
        loop {
            let next = inner.queue.lock().pop_front();
            let Some(event) = next else { break };
            deliver(&inner, event).await;
        }

        inner.draining.store(false, Ordering::Release);

        // An enqueue may have observed `draining == true` after we emptied
        // the queue; reclaim the flag if so.
        let has_more = !inner.queue.lock().is_empty();
        if !has_more
            || inner
                .draining
                .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
                .is_err()
        {
            break;
        }
    }
    inner.idle.notify_waiters();
}

/// Fan one event out to a snapshot of the registry and wait for all to settle.
async fn deliver(inner: &RouterInner, event: Event) {
    let platforms: Vec<Arc<dyn Platform>> = inner.platforms.read().clone();

    if platforms.is_empty() {
        tracing::debug!(event = %event.name, "No platforms registered, event dropped");
        let mut stats = inner.stats.lock();
        stats.events_processed += 1;
        stats.events_without_platforms += 1;
        return;
    }

    let event = Arc::new(event);
    let attempts: Vec<_> = platforms
        .into_iter()
        .map(|platform| {
            let event = Arc::clone(&event);
            async move {
                let outcome = AssertUnwindSafe(platform.track(&event))
                    .catch_unwind()
                    .await;
                (platform, outcome)
            }
        })
        .collect();
    let results = join_all(attempts).await;

    let mut succeeded = 0;
    let mut failed = 0;
    for (platform, outcome) in results {
        match outcome {
            Ok(Ok(())) => succeeded += 1,
            Ok(Err(e)) => {
                failed += 1;
                tracing::warn!(
                    platform = %platform.name(),
                    event = %event.name,
                    error = %e,
                    "Failed to deliver event"
                );
            }
            Err(_) => {
                failed += 1;
                tracing::error!(
                    platform = %platform.name(),
                    event = %event.name,
                    "Platform panicked while delivering event"
                );
            }
        }
    }

    let mut stats = inner.stats.lock();
    stats.events_processed += 1;
    stats.deliveries_succeeded += succeeded;
    stats.deliveries_failed += failed;
}
