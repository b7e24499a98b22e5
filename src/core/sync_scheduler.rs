/*
 * Decides when the client talks to the backend. Each data source (manager snapshot
 * and app state) gets its own poll loop that fetches, waits for the fetch to settle,
 * and only then sleeps for the configured interval. A slow backend therefore slows
 * the loop down instead of piling up requests.
 *
 * On top of polling, the backend's "state changed" push event triggers an
 * out-of-band manager refresh. Bursts of events are coalesced: the refresh fires
 * once the channel has been quiet for the debounce window, counted from the last
 * event. The debounced refresh shares the manager source's fetch gate, so even it
 * never overlaps a periodic fetch of the same source.
 *
 * Fetch failures are logged and counted in the store's health record; the held
 * snapshot is kept and the loop carries on.
 */
use super::backend::{BackendError, BackendOperations};
use super::config::ClientConfig;
use super::scheduled_task::ScheduledTask;
use super::state_store::{StateStore, SyncSource};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, broadcast};
use tokio::time::{sleep, timeout};

#[derive(Clone)]
struct SourceRefresher {
    source: SyncSource,
    backend: Arc<dyn BackendOperations>,
    store: StateStore,
    // Held for the whole fetch; at most one fetch per source is in flight.
    gate: Arc<Mutex<()>>,
}

impl SourceRefresher {
    fn new(source: SyncSource, backend: Arc<dyn BackendOperations>, store: StateStore) -> Self {
        SourceRefresher {
            source,
            backend,
            store,
            gate: Arc::new(Mutex::new(())),
        }
    }

    async fn refresh(&self) {
        let _in_flight = self.gate.lock().await;
        let result = match self.source {
            SyncSource::ManagerSnapshot => self
                .backend
                .fetch_manager_snapshot()
                .await
                .map(|snapshot| self.store.apply(snapshot)),
            SyncSource::AppState => self
                .backend
                .fetch_app_state()
                .await
                .map(|app_state| self.store.apply_app_state(app_state)),
        };
        match result {
            Ok(changed) => {
                log::trace!("SyncScheduler: {:?} fetched (changed: {changed}).", self.source);
            }
            Err(e) => self.on_failure(&e),
        }
    }

    fn on_failure(&self, error: &BackendError) {
        let failures = self.store.record_fetch_failure(self.source);
        log::warn!(
            "SyncScheduler: Fetching {:?} failed ({failures} in a row), keeping previous data: {error}",
            self.source
        );
    }
}

async fn poll_loop(refresher: SourceRefresher, interval: Duration) {
    loop {
        refresher.refresh().await;
        sleep(interval).await;
    }
}

/*
 * Waits for a change event, then keeps restarting the quiet-period timer for every
 * further event until the window passes without one, and refreshes once.
 */
async fn debounce_loop(
    mut changes: broadcast::Receiver<()>,
    window: Duration,
    refresher: SourceRefresher,
) {
    loop {
        match changes.recv().await {
            Ok(()) | Err(broadcast::error::RecvError::Lagged(_)) => {}
            Err(broadcast::error::RecvError::Closed) => {
                log::debug!("SyncScheduler: Change channel closed, debounce loop exits.");
                return;
            }
        }

        let mut channel_open = true;
        let mut coalesced = 1u32;
        while channel_open {
            match timeout(window, changes.recv()).await {
                Err(_quiet) => break,
                Ok(Ok(())) | Ok(Err(broadcast::error::RecvError::Lagged(_))) => coalesced += 1,
                Ok(Err(broadcast::error::RecvError::Closed)) => channel_open = false,
            }
        }

        log::debug!("SyncScheduler: Refreshing after {coalesced} change event(s).");
        refresher.refresh().await;

        if !channel_open {
            return;
        }
    }
}

/*
 * The running synchronization for one mounted view. Created by `start`, torn down
 * by `stop` or by dropping it; after that no task of this scheduler touches the
 * store again.
 */
#[derive(Debug)]
pub struct SyncScheduler {
    tasks: Vec<ScheduledTask>,
}

impl SyncScheduler {
    /// Subscribes to change events and starts both poll loops. Needs a tokio runtime.
    pub fn start(
        backend: Arc<dyn BackendOperations>,
        store: StateStore,
        config: &ClientConfig,
    ) -> Self {
        log::info!(
            "SyncScheduler: Starting (manager every {:?}, app state every {:?}, debounce {:?}).",
            config.manager_poll_interval(),
            config.app_state_poll_interval(),
            config.change_debounce()
        );

        let changes = backend.subscribe_changes(&config.change_event);
        let manager = SourceRefresher::new(
            SyncSource::ManagerSnapshot,
            Arc::clone(&backend),
            store.clone(),
        );
        let app_state = SourceRefresher::new(SyncSource::AppState, backend, store);

        let tasks = vec![
            ScheduledTask::spawn(
                "manager-poll",
                poll_loop(manager.clone(), config.manager_poll_interval()),
            ),
            ScheduledTask::spawn(
                "app-state-poll",
                poll_loop(app_state, config.app_state_poll_interval()),
            ),
            ScheduledTask::spawn(
                "change-debounce",
                debounce_loop(changes, config.change_debounce(), manager),
            ),
        ];
        SyncScheduler { tasks }
    }

    /// Cancels every poll loop and pending debounce; unsubscribes from change events.
    pub fn stop(&mut self) {
        if self.tasks.is_empty() {
            return;
        }
        for task in &mut self.tasks {
            task.cancel();
        }
        self.tasks.clear();
        log::info!("SyncScheduler: Stopped.");
    }

    pub fn is_running(&self) -> bool {
        !self.tasks.is_empty()
    }
}

impl Drop for SyncScheduler {
    fn drop(&mut self) {
        self.stop();
    }
}
