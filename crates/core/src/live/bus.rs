//! Live query registry and subscription handle.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use futures::stream::{self, Stream};
use log::{debug, error, warn};
use tokio::sync::{watch, Notify};

use super::table_change::{Interest, TableChange};
use crate::errors::Result;

struct Registration {
    interest: Interest,
    notify: Arc<Notify>,
}

#[derive(Default)]
struct BusInner {
    next_id: AtomicU64,
    subscriptions: Mutex<HashMap<u64, Registration>>,
}

impl BusInner {
    fn subscriptions(&self) -> MutexGuard<'_, HashMap<u64, Registration>> {
        self.subscriptions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

/// Registry of live queries, shared by the writer and the repositories.
#[derive(Clone, Default)]
pub struct LiveQueryBus {
    inner: Arc<BusInner>,
}

impl LiveQueryBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wakes every subscription affected by `changes`.
    ///
    /// Never blocks on subscribers: a wake-up only stores a permit, and
    /// several wake-ups before the next refresh collapse into one.
    pub fn publish(&self, changes: &[TableChange]) {
        if changes.is_empty() {
            return;
        }

        let subscriptions = self.inner.subscriptions();
        let mut woken = 0usize;
        for registration in subscriptions.values() {
            if changes
                .iter()
                .any(|change| registration.interest.is_affected_by(change))
            {
                registration.notify.notify_one();
                woken += 1;
            }
        }
        debug!(
            "Published {} table change(s), {} live query refresh(es) scheduled",
            changes.len(),
            woken
        );
    }

    /// Registers a live query and evaluates it once for the initial value.
    ///
    /// `query` runs inline for the initial snapshot and on the blocking pool
    /// for every refresh. Must be called from within a Tokio runtime.
    pub fn subscribe<T, F>(&self, interest: Interest, query: F) -> LiveQuery<T>
    where
        T: Clone + Send + Sync + 'static,
        F: Fn() -> T + Send + Sync + 'static,
    {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        let notify = Arc::new(Notify::new());
        self.inner.subscriptions().insert(
            id,
            Registration {
                interest,
                notify: Arc::clone(&notify),
            },
        );
        let guard = SubscriptionGuard {
            id,
            bus: Arc::downgrade(&self.inner),
        };

        // Registered before the first read: a write committing in between
        // leaves a permit behind and triggers a refresh.
        let (tx, rx) = watch::channel(query());
        tokio::spawn(refresh_loop(id, tx, notify, Arc::new(query)));

        LiveQuery {
            rx,
            delivered_initial: false,
            _guard: guard,
        }
    }

    /// Number of open subscriptions.
    pub fn subscription_count(&self) -> usize {
        self.inner.subscriptions().len()
    }
}

async fn refresh_loop<T, F>(id: u64, tx: watch::Sender<T>, notify: Arc<Notify>, query: Arc<F>)
where
    T: Send + Sync + 'static,
    F: Fn() -> T + Send + Sync + 'static,
{
    loop {
        tokio::select! {
            _ = tx.closed() => break,
            _ = notify.notified() => {}
        }

        let query = Arc::clone(&query);
        match tokio::task::spawn_blocking(move || query()).await {
            Ok(snapshot) => {
                if tx.send(snapshot).is_err() {
                    break;
                }
            }
            Err(e) => warn!("Live query {} refresh did not complete: {}", id, e),
        }
    }
    debug!("Live query {} closed", id);
}

struct SubscriptionGuard {
    id: u64,
    bus: Weak<BusInner>,
}

impl Drop for SubscriptionGuard {
    fn drop(&mut self) {
        if let Some(bus) = self.bus.upgrade() {
            bus.subscriptions().remove(&self.id);
        }
    }
}

/// Handle to a live query.
///
/// Holds the most recent snapshot. Dropping the handle deregisters the query
/// and stops its refresh task.
pub struct LiveQuery<T> {
    rx: watch::Receiver<T>,
    delivered_initial: bool,
    _guard: SubscriptionGuard,
}

impl<T: Clone> LiveQuery<T> {
    /// The most recent snapshot, without waiting.
    pub fn current(&self) -> T {
        self.rx.borrow().clone()
    }

    /// Returns the initial snapshot on the first call, then waits for each
    /// refresh. `None` once the refresh task has stopped.
    pub async fn next(&mut self) -> Option<T> {
        if !self.delivered_initial {
            self.delivered_initial = true;
            return Some(self.rx.borrow_and_update().clone());
        }
        self.changed().await
    }

    /// Waits for the next refresh after the last observed snapshot.
    pub async fn changed(&mut self) -> Option<T> {
        self.rx.changed().await.ok()?;
        self.delivered_initial = true;
        Some(self.rx.borrow_and_update().clone())
    }

    /// Consumes snapshots until one satisfies `predicate`.
    pub async fn wait_for(&mut self, mut predicate: impl FnMut(&T) -> bool) -> Option<T> {
        loop {
            let snapshot = self.next().await?;
            if predicate(&snapshot) {
                return Some(snapshot);
            }
        }
    }

    pub fn into_stream(self) -> impl Stream<Item = T> {
        stream::unfold(self, |mut query| async move {
            let snapshot = query.next().await?;
            Some((snapshot, query))
        })
    }

    /// Stops delivery and releases the registration.
    pub fn close(self) {}
}

/// Applies the live-query read policy: a failed read is logged and delivered
/// as the empty value, indistinguishable from a cold cache. Store failures
/// that may clear up on the next refresh log at `warn`, anything else at
/// `error`.
pub fn best_effort<T: Default>(context: &str, result: Result<T>) -> T {
    result.unwrap_or_else(|e| {
        if e.is_transient() {
            warn!("Live query '{}' read failed, delivering empty result: {}", context, e);
        } else {
            error!("Live query '{}' read failed, delivering empty result: {}", context, e);
        }
        T::default()
    })
}
