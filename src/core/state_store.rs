/*
 * Holds the client's mirror of backend state: the latest manager snapshot, the
 * latest app state and a small record of sync health. The backend answers every
 * poll with a complete snapshot whether or not anything changed, so `apply` first
 * compares the incoming snapshot structurally with the held one and does nothing
 * when they are equal. Only real changes bump the version, invalidate derived data
 * and reach subscribers.
 *
 * Consumers subscribe with a selector that projects the state onto the part they
 * care about, plus an equality for that projection. Each subscription is backed by
 * a `tokio::sync::watch` channel and is only signaled when its own projection
 * differs from what it last saw, independently of every other subscription.
 *
 * `StateStore` is a cheap cloneable handle around shared state. It is created
 * explicitly by whoever owns a view and passed to the scheduler and to readers.
 */
use super::listener_matcher::ListenerIndex;
use super::models::{AppState, ManagerSnapshot};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::watch;

/// Which backend collection a fetch or failure refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SyncSource {
    ManagerSnapshot,
    AppState,
}

/* Consecutive failed fetches per source; reset by the next success. */
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncHealth {
    pub manager_failures: u32,
    pub app_state_failures: u32,
}

impl SyncHealth {
    pub fn failures(&self, source: SyncSource) -> u32 {
        match source {
            SyncSource::ManagerSnapshot => self.manager_failures,
            SyncSource::AppState => self.app_state_failures,
        }
    }

    fn failures_mut(&mut self, source: SyncSource) -> &mut u32 {
        match source {
            SyncSource::ManagerSnapshot => &mut self.manager_failures,
            SyncSource::AppState => &mut self.app_state_failures,
        }
    }

    pub fn is_degraded(&self) -> bool {
        self.manager_failures > 0 || self.app_state_failures > 0
    }
}

/// Everything the store holds. `None` means "not fetched yet".
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StoreState {
    pub manager: Option<ManagerSnapshot>,
    pub app_state: Option<AppState>,
    pub health: SyncHealth,
}

trait Subscriber: Send + Sync {
    fn publish(&self, seq: u64, state: &StoreState);
    fn is_closed(&self) -> bool;
}

struct WatchSubscriber<T, S, E> {
    selector: S,
    equals: E,
    sender: watch::Sender<T>,
    // Sequence number of the newest state this subscriber has seen.
    last_seq: Mutex<u64>,
}

impl<T, S, E> Subscriber for WatchSubscriber<T, S, E>
where
    T: Send + Sync,
    S: Fn(&StoreState) -> T + Send + Sync,
    E: Fn(&T, &T) -> bool + Send + Sync,
{
    /*
     * Runs outside the store lock. Concurrent publications may arrive out of
     * order; a state older than the last one seen is dropped.
     */
    fn publish(&self, seq: u64, state: &StoreState) {
        let mut last_seq = self.last_seq.lock().unwrap_or_else(PoisonError::into_inner);
        if seq <= *last_seq {
            return;
        }
        *last_seq = seq;
        let next = (self.selector)(state);
        self.sender.send_if_modified(|current| {
            if (self.equals)(current, &next) {
                false
            } else {
                *current = next;
                true
            }
        });
    }

    fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }
}

/// A consumer's view of one projection of the store.
///
/// Dropping it unsubscribes.
pub struct Subscription<T> {
    receiver: watch::Receiver<T>,
}

impl<T: Clone> Subscription<T> {
    /// The latest projected value, marking it as seen.
    pub fn current(&mut self) -> T {
        self.receiver.borrow_and_update().clone()
    }

    /// Whether the projection changed since it was last seen.
    pub fn has_changed(&self) -> bool {
        self.receiver.has_changed().unwrap_or(false)
    }

    /// Waits for the next change. Returns `false` once the store is gone.
    pub async fn changed(&mut self) -> bool {
        self.receiver.changed().await.is_ok()
    }
}

struct StoreInner {
    state: Arc<StoreState>,
    version: u64,
    listener_index: Option<(u64, Arc<ListenerIndex>)>,
    subscribers: Vec<Arc<dyn Subscriber>>,
    // Bumped for every state that is handed to subscribers.
    publish_seq: u64,
}

/*
 * Hands the current state to every subscriber after releasing the store lock, so
 * selectors are free to read from the store (`version`, `listener_index`, ...).
 */
fn publish(mut inner: MutexGuard<'_, StoreInner>) {
    inner.subscribers.retain(|s| !s.is_closed());
    inner.publish_seq += 1;
    let seq = inner.publish_seq;
    let state = Arc::clone(&inner.state);
    let subscribers = inner.subscribers.clone();
    drop(inner);
    for subscriber in &subscribers {
        subscriber.publish(seq, &state);
    }
}

#[derive(Clone)]
pub struct StateStore {
    inner: Arc<Mutex<StoreInner>>,
}

impl Default for StateStore {
    fn default() -> Self {
        Self::new()
    }
}

impl StateStore {
    pub fn new() -> Self {
        StateStore {
            inner: Arc::new(Mutex::new(StoreInner {
                state: Arc::new(StoreState::default()),
                version: 0,
                listener_index: None,
                subscribers: Vec::new(),
                publish_seq: 0,
            })),
        }
    }

    // A panicking subscriber must not take the whole store down with it.
    fn lock(&self) -> MutexGuard<'_, StoreInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /*
     * Replaces the manager snapshot unless it is structurally equal to the held one.
     * Returns whether anything changed. A successful fetch also clears the source's
     * failure count, which only concerns subscribers watching health.
     */
    pub fn apply(&self, snapshot: ManagerSnapshot) -> bool {
        let mut inner = self.lock();
        let health_reset = inner.state.health.manager_failures != 0;

        if inner.state.manager.as_ref() == Some(&snapshot) {
            log::trace!("StateStore: Manager snapshot unchanged, skipping apply.");
            if health_reset {
                let mut next = (*inner.state).clone();
                next.health.manager_failures = 0;
                inner.state = Arc::new(next);
                publish(inner);
            }
            return false;
        }

        let next = StoreState {
            manager: Some(snapshot),
            app_state: inner.state.app_state.clone(),
            health: SyncHealth {
                manager_failures: 0,
                ..inner.state.health
            },
        };
        inner.state = Arc::new(next);
        inner.version += 1;
        inner.listener_index = None;
        log::debug!(
            "StateStore: Applied manager snapshot, now at version {}.",
            inner.version
        );
        publish(inner);
        true
    }

    /// Same equality gate as [`StateStore::apply`], for the app state.
    pub fn apply_app_state(&self, app_state: AppState) -> bool {
        let mut inner = self.lock();
        let health_reset = inner.state.health.app_state_failures != 0;

        if inner.state.app_state.as_ref() == Some(&app_state) && !health_reset {
            log::trace!("StateStore: App state unchanged, skipping apply.");
            return false;
        }

        let mut next = (*inner.state).clone();
        let changed = next.app_state.as_ref() != Some(&app_state);
        next.app_state = Some(app_state);
        next.health.app_state_failures = 0;
        inner.state = Arc::new(next);
        if changed {
            inner.version += 1;
            log::debug!(
                "StateStore: Applied app state, now at version {}.",
                inner.version
            );
        }
        publish(inner);
        changed
    }

    /// Records a failed fetch. The held data stays untouched.
    pub fn record_fetch_failure(&self, source: SyncSource) -> u32 {
        let mut inner = self.lock();
        let mut next = (*inner.state).clone();
        let failures = next.health.failures_mut(source);
        *failures = failures.saturating_add(1);
        let count = *failures;
        inner.state = Arc::new(next);
        publish(inner);
        count
    }

    /// The whole current state. Cheap: shares the held allocation.
    pub fn state(&self) -> Arc<StoreState> {
        Arc::clone(&self.lock().state)
    }

    pub fn select<T>(&self, selector: impl FnOnce(&StoreState) -> T) -> T {
        let state = self.state();
        selector(&state)
    }

    /// Incremented on every apply that changed data.
    pub fn version(&self) -> u64 {
        self.lock().version
    }

    /*
     * The server-to-listener lookup for the current snapshot. Built at most once
     * per version and shared until the next change.
     */
    pub fn listener_index(&self) -> Arc<ListenerIndex> {
        let mut inner = self.lock();
        if let Some((version, index)) = &inner.listener_index {
            if *version == inner.version {
                return Arc::clone(index);
            }
        }
        let index = Arc::new(
            inner
                .state
                .manager
                .as_ref()
                .map(ListenerIndex::build)
                .unwrap_or_default(),
        );
        inner.listener_index = Some((inner.version, Arc::clone(&index)));
        index
    }

    /// Subscribes to a projection compared with its own `PartialEq`.
    pub fn subscribe<T, S>(&self, selector: S) -> Subscription<T>
    where
        T: PartialEq + Send + Sync + 'static,
        S: Fn(&StoreState) -> T + Send + Sync + 'static,
    {
        self.subscribe_with(selector, |a: &T, b: &T| a == b)
    }

    /*
     * Subscribes to a projection with a custom equality. The subscription starts
     * out holding the current projection, marked as already seen. Selectors run
     * without the store lock held and may read from the store, but must not apply.
     */
    pub fn subscribe_with<T, S, E>(&self, selector: S, equals: E) -> Subscription<T>
    where
        T: Send + Sync + 'static,
        S: Fn(&StoreState) -> T + Send + Sync + 'static,
        E: Fn(&T, &T) -> bool + Send + Sync + 'static,
    {
        let (state, seen_seq) = {
            let inner = self.lock();
            (Arc::clone(&inner.state), inner.publish_seq)
        };
        let initial = selector(&state);
        let (sender, receiver) = watch::channel(initial);
        let subscriber: Arc<dyn Subscriber> = Arc::new(WatchSubscriber {
            selector,
            equals,
            sender,
            last_seq: Mutex::new(seen_seq),
        });

        let mut inner = self.lock();
        inner.subscribers.push(Arc::clone(&subscriber));
        let latest_seq = inner.publish_seq;
        let latest = Arc::clone(&inner.state);
        log::trace!(
            "StateStore: Added subscriber, {} active.",
            inner.subscribers.len()
        );
        drop(inner);

        // A publication may have slipped in while the initial projection was computed.
        if latest_seq > seen_seq {
            subscriber.publish(latest_seq, &latest);
        }
        Subscription { receiver }
    }

    pub fn subscriber_count(&self) -> usize {
        let mut inner = self.lock();
        inner.subscribers.retain(|s| !s.is_closed());
        inner.subscribers.len()
    }
}
