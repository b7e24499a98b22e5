/*
 * The boundary to the backend service that owns all proxy and listener state. The
 * client only ever reads snapshots from it and sends it commands; how it checks
 * servers, forwards traffic or persists anything is not our concern. The trait is
 * object-safe so views can hold an `Arc<dyn BackendOperations>` and tests can plug
 * in a mock.
 */
use super::models::{AppState, ManagerSnapshot, PreviewRecord};
use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::broadcast;

/// Name of the push event the backend emits whenever its state changes.
pub const STATE_CHANGED_EVENT: &str = "state-changed";

#[derive(Debug, Error)]
pub enum BackendError {
    #[error("backend unavailable: {0}")]
    Unavailable(String),
    #[error("backend rejected the request: {0}")]
    Rejected(String),
    #[error("could not decode backend response: {0}")]
    Decode(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, BackendError>;

/* Everything a bulk import needs; sent as a single command. */
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportRequest {
    pub text: String,
    pub delimiter: String,
    pub skip_columns: usize,
    pub default_port: u16,
    pub skip_header: bool,
}

#[async_trait]
pub trait BackendOperations: Send + Sync {
    async fn fetch_manager_snapshot(&self) -> Result<ManagerSnapshot>;
    async fn fetch_app_state(&self) -> Result<AppState>;

    async fn delete_servers(&self, ids: &[String]) -> Result<()>;
    async fn delete_listeners(&self, ports: &[u16]) -> Result<()>;
    async fn recheck_server(&self, id: &str) -> Result<()>;

    async fn parse_preview_line(
        &self,
        line: &str,
        delimiter: &str,
        skip_columns: usize,
        default_port: u16,
    ) -> Result<Option<PreviewRecord>>;
    async fn import_bulk(&self, request: &ImportRequest) -> Result<()>;

    /*
     * Subscribes to the named push event. Each received `()` is one "something
     * changed" signal; dropping the receiver unsubscribes.
     */
    fn subscribe_changes(&self, event: &str) -> broadcast::Receiver<()>;
}
