// src/main.rs

/*
 * Prints the proxy-fleet view for a manager snapshot stored as JSON on disk. The
 * file stands in for the backend: it is re-read on every poll, so editing it while
 * the program waits shows up on the next sync. Commands are refused since a file
 * cannot act on them.
 */
use async_trait::async_trait;
use proxy_fleet_view::app_logic::{FleetViewLogic, ListenerMode, ViewCommand};
use proxy_fleet_view::core::backend::Result as BackendResult;
use proxy_fleet_view::core::{
    AppState, BackendError, BackendOperations, CoreConfigManager, ImportRequest, ManagerSnapshot,
    PreviewRecord, parse_line,
};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;

const FIRST_SYNC_TIMEOUT: Duration = Duration::from_secs(5);
const READ_ONLY_REASON: &str = "the snapshot file is read-only";

struct SnapshotFileBackend {
    path: PathBuf,
    changes: broadcast::Sender<()>,
}

impl SnapshotFileBackend {
    fn new(path: PathBuf) -> Self {
        let (changes, _) = broadcast::channel(16);
        SnapshotFileBackend { path, changes }
    }
}

#[async_trait]
impl BackendOperations for SnapshotFileBackend {
    async fn fetch_manager_snapshot(&self) -> BackendResult<ManagerSnapshot> {
        let text = tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|e| BackendError::Unavailable(format!("{}: {e}", self.path.display())))?;
        Ok(ManagerSnapshot::from_json(&text)?)
    }

    async fn fetch_app_state(&self) -> BackendResult<AppState> {
        Ok(AppState {
            local_ip: "127.0.0.1".to_string(),
        })
    }

    async fn delete_servers(&self, _ids: &[String]) -> BackendResult<()> {
        Err(BackendError::Rejected(READ_ONLY_REASON.to_string()))
    }

    async fn delete_listeners(&self, _ports: &[u16]) -> BackendResult<()> {
        Err(BackendError::Rejected(READ_ONLY_REASON.to_string()))
    }

    async fn recheck_server(&self, _id: &str) -> BackendResult<()> {
        Err(BackendError::Rejected(READ_ONLY_REASON.to_string()))
    }

    async fn parse_preview_line(
        &self,
        line: &str,
        delimiter: &str,
        skip_columns: usize,
        default_port: u16,
    ) -> BackendResult<Option<PreviewRecord>> {
        Ok(parse_line(line, delimiter, skip_columns, default_port))
    }

    async fn import_bulk(&self, _request: &ImportRequest) -> BackendResult<()> {
        Err(BackendError::Rejected(READ_ONLY_REASON.to_string()))
    }

    fn subscribe_changes(&self, _event: &str) -> broadcast::Receiver<()> {
        self.changes.subscribe()
    }
}

fn print_view(logic: &FleetViewLogic) {
    println!("Servers:");
    for row in logic.server_rows() {
        let latency = row
            .latency_ms
            .map(|ms| format!("{ms} ms"))
            .unwrap_or_else(|| "-".to_string());
        let listener = row
            .listener_port
            .map(|port| format!(" -> :{port}"))
            .unwrap_or_default();
        let checked = row.checked_ago.as_deref().unwrap_or("never checked");
        println!(
            "  {:<12} {:<40} {:>8} {:>14}  [{}]{listener}",
            row.id,
            row.endpoint,
            latency,
            checked,
            row.tags.join(", ")
        );
    }

    println!("Listeners:");
    for row in logic.listener_rows() {
        let mode = match row.mode {
            ListenerMode::Direct => "direct".to_string(),
            ListenerMode::Proxy => format!("{} candidate(s)", row.candidate_count),
        };
        println!(
            "  {:<22} {:<16} sent {:>10}  received {:>10}{}",
            row.address.unwrap_or_else(|| format!(":{}", row.port)),
            mode,
            row.sent,
            row.received,
            if row.is_serving { "" } else { "  (stopped)" }
        );
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    proxy_fleet_view::initialize_logging();

    let Some(path) = std::env::args_os().nth(1).map(PathBuf::from) else {
        eprintln!("Usage: proxy_fleet_view <manager-snapshot.json>");
        return ExitCode::FAILURE;
    };

    let backend = Arc::new(SnapshotFileBackend::new(path));
    let mut logic = FleetViewLogic::new(backend, Arc::new(CoreConfigManager::new()));
    let mut loaded = logic.store().subscribe(|state| state.manager.is_some());
    logic.on_view_mounted();

    let first_sync = tokio::time::timeout(FIRST_SYNC_TIMEOUT, async {
        while !loaded.current() {
            if !loaded.changed().await {
                break;
            }
        }
    })
    .await;
    if first_sync.is_err() || logic.store().state().manager.is_none() {
        eprintln!("No snapshot could be loaded within {FIRST_SYNC_TIMEOUT:?}.");
        logic.on_view_unmounted();
        return ExitCode::FAILURE;
    }

    print_view(&logic);

    logic.export_servers(false);
    while let Some(command) = logic.try_dequeue_command() {
        match command {
            ViewCommand::ShowSaveFileDialog {
                default_filename,
                contents,
                ..
            } => println!("\nExport ({default_filename}):\n{contents}"),
            ViewCommand::ShowNotification { severity, text } => {
                println!("[{severity:?}] {text}")
            }
            ViewCommand::CloseImportDialog => {}
        }
    }

    logic.on_view_unmounted();
    ExitCode::SUCCESS
}
