/*
 * The presenter behind the proxy-fleet view. `FleetViewLogic` ties the view's
 * lifetime to a store and a sync scheduler, turns the store into display rows and
 * turns user actions into backend commands plus queued `ViewCommand`s.
 */
use super::fleet_view_ui_state::FleetViewUiState;
use super::import_session::{ImportError, ImportSession};
use super::types::{ListenerMode, ListenerRow, MessageSeverity, ServerRow, ViewCommand};
use super::ui_constants::{
    APP_NAME_FOR_CONFIG, EXPORT_DIALOG_TITLE, NO_LISTENERS_SELECTED_TEXT, NOTHING_SELECTED_TEXT,
    NOTHING_TO_EXPORT_TEXT, PENDING_SYNC_SUFFIX,
};
use crate::core::{
    self, BackendOperations, ClientConfig, ConfigManagerOperations, ProxyServer, StateStore,
    SyncScheduler,
};
use std::collections::VecDeque;
use std::sync::Arc;
use time::OffsetDateTime;

/*
 * Renderer-agnostic: results meant for the renderer are queued as `ViewCommand`s
 * and retrieved with `try_dequeue_command`.
 *
 * Mutations are fire-and-observe: the logic never edits the store itself. A
 * successful command only produces a notification; the change shows up with the
 * next sync, usually right away because the backend emits a change event.
 */
pub struct FleetViewLogic {
    pub(crate) backend: Arc<dyn BackendOperations>,
    pub(crate) config_manager: Arc<dyn ConfigManagerOperations>,
    pub(crate) config: ClientConfig,
    pub(crate) store: StateStore,
    pub(crate) scheduler: Option<SyncScheduler>,
    pub(crate) ui_state: FleetViewUiState,
    pub(crate) import_session: ImportSession,
    command_queue: VecDeque<ViewCommand>,
}

impl FleetViewLogic {
    /*
     * Loads the client settings through `config_manager`. If they cannot be read,
     * the defaults are used and a warning is queued for the user.
     */
    pub fn new(
        backend: Arc<dyn BackendOperations>,
        config_manager: Arc<dyn ConfigManagerOperations>,
    ) -> Self {
        let mut command_queue = VecDeque::new();
        let config = match config_manager.load_config(APP_NAME_FOR_CONFIG) {
            Ok(config) => config,
            Err(e) => {
                log::warn!("AppLogic: Failed to load client config, using defaults: {e}");
                command_queue.push_back(ViewCommand::ShowNotification {
                    severity: MessageSeverity::Warning,
                    text: format!("Could not load settings, using defaults: {e}"),
                });
                ClientConfig::default()
            }
        };
        FleetViewLogic {
            backend,
            config_manager,
            ui_state: FleetViewUiState::new(config.page_size),
            import_session: ImportSession::new(config.default_import_port),
            config,
            store: StateStore::new(),
            scheduler: None,
            command_queue,
        }
    }

    pub fn store(&self) -> &StateStore {
        &self.store
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn ui_state(&self) -> &FleetViewUiState {
        &self.ui_state
    }

    pub fn ui_state_mut(&mut self) -> &mut FleetViewUiState {
        &mut self.ui_state
    }

    /// Persists `config` and applies it; takes effect for the scheduler on the next mount.
    pub fn update_config(&mut self, config: ClientConfig) {
        if let Err(e) = self
            .config_manager
            .save_config(APP_NAME_FOR_CONFIG, &config)
        {
            log::error!("AppLogic: Failed to save client config: {e}");
            self.enqueue_notification(
                MessageSeverity::Error,
                format!("Could not save settings: {e}"),
            );
        }
        self.ui_state.page_size = config.page_size.max(1);
        self.config = config;
    }

    /*
     * Starts synchronization for the view. Mounting an already mounted view is a
     * no-op. Needs to run inside a tokio runtime.
     */
    pub fn on_view_mounted(&mut self) {
        if self.scheduler.is_some() {
            log::debug!("AppLogic: View already mounted, scheduler kept.");
            return;
        }
        log::info!("AppLogic: View mounted, starting sync.");
        self.scheduler = Some(SyncScheduler::start(
            Arc::clone(&self.backend),
            self.store.clone(),
            &self.config,
        ));
    }

    /// Stops all timers and subscriptions and forgets view-local state.
    pub fn on_view_unmounted(&mut self) {
        if let Some(mut scheduler) = self.scheduler.take() {
            scheduler.stop();
            log::info!("AppLogic: View unmounted, sync stopped.");
        }
        self.ui_state = FleetViewUiState::new(self.config.page_size);
        self.import_session.reset();
    }

    pub fn is_syncing(&self) -> bool {
        self.scheduler
            .as_ref()
            .is_some_and(SyncScheduler::is_running)
    }

    /// Brings selections and paging in line with the latest snapshot.
    pub fn on_store_changed(&mut self) -> bool {
        let state = self.store.state();
        match &state.manager {
            Some(snapshot) => self.ui_state.reconcile(snapshot),
            None => false,
        }
    }

    /*
     * One row per server, in id order. The listener port is looked up in the
     * store's cached index, which is only rebuilt when the snapshot changes.
     */
    pub fn server_rows(&self) -> Vec<ServerRow> {
        self.server_rows_at(OffsetDateTime::now_utc())
    }

    /// Server rows with check ages measured against `now`.
    pub fn server_rows_at(&self, now: OffsetDateTime) -> Vec<ServerRow> {
        let state = self.store.state();
        let Some(snapshot) = &state.manager else {
            return Vec::new();
        };
        let index = self.store.listener_index();
        snapshot
            .servers
            .values()
            .map(|server| ServerRow {
                id: server.id.clone(),
                host: server.host.clone(),
                port: server.port,
                username: server.auth.as_ref().map(|a| a.username.clone()),
                password: server.auth.as_ref().map(|a| a.password.clone()),
                public_ip: server.public_ip.clone(),
                public_ip_matches_host: !server.public_ip.is_empty()
                    && server.public_ip == server.host,
                latency_ms: core::duration_to_ms(server.latency),
                last_checked_at: server.last_checked_at,
                checked_ago: server
                    .last_checked_at
                    .map(|checked| core::format_elapsed(checked, now)),
                tags: core::active_tags(server),
                endpoint: core::serialize_endpoint(server),
                listener_port: index.port_for(&server.id),
                is_selected: self.ui_state.selected_server_ids.contains(&server.id),
            })
            .collect()
    }

    /// The rows of the servers table page currently shown.
    pub fn visible_server_rows(&self) -> Vec<ServerRow> {
        let mut rows = self.server_rows();
        let bounds = self.ui_state.page_bounds(rows.len());
        rows.truncate(bounds.end);
        rows.split_off(bounds.start)
    }

    pub fn listener_rows(&self) -> Vec<ListenerRow> {
        let state = self.store.state();
        let Some(snapshot) = &state.manager else {
            return Vec::new();
        };
        let local_ip = state
            .app_state
            .as_ref()
            .map(|app| app.local_ip.as_str())
            .filter(|ip| !ip.is_empty());
        snapshot
            .listeners
            .values()
            .map(|listener| ListenerRow {
                port: listener.port,
                address: local_ip.map(|ip| format!("{ip}:{}", listener.port)),
                mode: if listener.filter.ignore_all {
                    ListenerMode::Direct
                } else {
                    ListenerMode::Proxy
                },
                filter_tags: listener.filter.tags.clone(),
                candidate_count: core::candidate_servers(&listener.filter, snapshot).len(),
                sent: core::format_bytes(listener.stat.sent),
                received: core::format_bytes(listener.stat.received),
                is_serving: listener.is_serving,
                is_selected: self.ui_state.selected_listener_ports.contains(&listener.port),
            })
            .collect()
    }

    /// Returns whether the backend accepted the deletion.
    pub async fn delete_servers(&mut self, ids: &[String]) -> bool {
        if ids.is_empty() {
            self.enqueue_notification(MessageSeverity::Information, NOTHING_SELECTED_TEXT);
            return false;
        }
        log::info!("AppLogic: Requesting deletion of {} server(s).", ids.len());
        match self.backend.delete_servers(ids).await {
            Ok(()) => {
                self.enqueue_notification(
                    MessageSeverity::Information,
                    format!("Deleted {} proxy server(s). {PENDING_SYNC_SUFFIX}", ids.len()),
                );
                true
            }
            Err(e) => {
                log::error!("AppLogic: Deleting servers failed: {e}");
                self.enqueue_notification(
                    MessageSeverity::Error,
                    format!("Failed to delete proxy servers: {e}"),
                );
                false
            }
        }
    }

    /// Deletes the selected servers; the selection is cleared once the backend accepted.
    pub async fn delete_selected_servers(&mut self) -> bool {
        let ids: Vec<String> = self.ui_state.selected_server_ids.iter().cloned().collect();
        let accepted = self.delete_servers(&ids).await;
        if accepted {
            self.ui_state.selected_server_ids.clear();
        }
        accepted
    }

    pub async fn delete_listeners(&mut self, ports: &[u16]) -> bool {
        if ports.is_empty() {
            self.enqueue_notification(MessageSeverity::Information, NO_LISTENERS_SELECTED_TEXT);
            return false;
        }
        log::info!("AppLogic: Requesting deletion of listener(s) {ports:?}.");
        match self.backend.delete_listeners(ports).await {
            Ok(()) => {
                for port in ports {
                    self.ui_state.selected_listener_ports.remove(port);
                }
                self.enqueue_notification(
                    MessageSeverity::Information,
                    format!("Deleted {} listener(s). {PENDING_SYNC_SUFFIX}", ports.len()),
                );
                true
            }
            Err(e) => {
                log::error!("AppLogic: Deleting listeners failed: {e}");
                self.enqueue_notification(
                    MessageSeverity::Error,
                    format!("Failed to delete listeners: {e}"),
                );
                false
            }
        }
    }

    pub async fn recheck_server(&mut self, id: &str) {
        log::debug!("AppLogic: Requesting recheck of server '{id}'.");
        match self.backend.recheck_server(id).await {
            Ok(()) => self.enqueue_notification(
                MessageSeverity::Information,
                format!("Recheck of '{id}' requested. {PENDING_SYNC_SUFFIX}"),
            ),
            Err(e) => {
                log::error!("AppLogic: Recheck of server '{id}' failed: {e}");
                self.enqueue_notification(
                    MessageSeverity::Error,
                    format!("Failed to recheck '{id}': {e}"),
                );
            }
        }
    }

    /*
     * Serializes servers for export and asks the renderer to offer a save dialog.
     * Exports the selected servers when `only_selected` is set, otherwise all of
     * them, always in id order.
     */
    pub fn export_servers(&mut self, only_selected: bool) {
        let state = self.store.state();
        let servers: Vec<&ProxyServer> = state
            .manager
            .iter()
            .flat_map(|snapshot| snapshot.servers.values())
            .filter(|server| {
                !only_selected || self.ui_state.selected_server_ids.contains(&server.id)
            })
            .collect();

        if servers.is_empty() {
            let text = if only_selected {
                NOTHING_SELECTED_TEXT
            } else {
                NOTHING_TO_EXPORT_TEXT
            };
            self.enqueue_notification(MessageSeverity::Information, text);
            return;
        }

        let document = core::build_export(servers, core::formatting::local_now());
        log::info!("AppLogic: Prepared export '{}'.", document.file_name);
        self.command_queue.push_back(ViewCommand::ShowSaveFileDialog {
            title: EXPORT_DIALOG_TITLE.to_string(),
            default_filename: document.file_name,
            contents: document.contents,
        });
    }

    pub fn import_session(&self) -> &ImportSession {
        &self.import_session
    }

    pub fn import_session_mut(&mut self) -> &mut ImportSession {
        &mut self.import_session
    }

    /*
     * Sends the import dialog's text to the backend. On success the dialog is closed
     * and the session reset; on failure the user keeps their input and sees why.
     */
    pub async fn commit_import(&mut self) {
        let backend = Arc::clone(&self.backend);
        match self.import_session.commit(backend.as_ref()).await {
            Ok(()) => {
                self.enqueue_notification(
                    MessageSeverity::Information,
                    format!("Import submitted. {PENDING_SYNC_SUFFIX}"),
                );
                self.command_queue.push_back(ViewCommand::CloseImportDialog);
            }
            Err(ImportError::EmptyText) => {
                self.enqueue_notification(
                    MessageSeverity::Warning,
                    ImportError::EmptyText.to_string(),
                );
            }
            Err(e) => {
                log::error!("AppLogic: {e}");
                self.enqueue_notification(MessageSeverity::Error, e.to_string());
            }
        }
    }

    fn enqueue_notification(&mut self, severity: MessageSeverity, text: impl Into<String>) {
        self.command_queue.push_back(ViewCommand::ShowNotification {
            severity,
            text: text.into(),
        });
    }

    pub fn try_dequeue_command(&mut self) -> Option<ViewCommand> {
        self.command_queue.pop_front()
    }
}
