/*
 * Data exchanged between the view logic and whatever renders it. Rows are plain,
 * already-formatted projections of the store; `ViewCommand`s are the requests the
 * logic queues for the renderer (notifications, the save dialog for exports,
 * closing the import dialog).
 */
use time::OffsetDateTime;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageSeverity {
    Information, // Neutral information
    Warning,     // Something the user should look at
    Error,       // A requested action failed
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ViewCommand {
    ShowNotification {
        severity: MessageSeverity,
        text: String,
    },
    /// Saving is up to the renderer; it gets the suggested name and the full contents.
    ShowSaveFileDialog {
        title: String,
        default_filename: String,
        contents: String,
    },
    CloseImportDialog,
}

// How a listener forwards: straight to the target, or through a matched server.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListenerMode {
    Direct,
    Proxy,
}

/*
 * One row of the servers table. `listener_port` is the first listener that names
 * this server explicitly, if any. `checked_ago` is relative to the moment the rows
 * were built, so renderers rebuild rows on a short tick to keep it current.
 */
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerRow {
    pub id: String,
    pub host: String,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    pub public_ip: String,
    pub public_ip_matches_host: bool,
    pub latency_ms: Option<i64>,
    pub last_checked_at: Option<OffsetDateTime>,
    pub checked_ago: Option<String>,
    pub tags: Vec<String>,
    pub endpoint: String,
    pub listener_port: Option<u16>,
    pub is_selected: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListenerRow {
    pub port: u16,
    pub address: Option<String>,
    pub mode: ListenerMode,
    pub filter_tags: Vec<String>,
    pub candidate_count: usize,
    pub sent: String,
    pub received: String,
    pub is_serving: bool,
    pub is_selected: bool,
}
