/*
 * This module consolidates the platform-agnostic core of the client: the backend
 * boundary (`BackendOperations`), the mirrored data model, the equality-gated
 * `StateStore`, the `SyncScheduler` that feeds it, the listener matcher, the import
 * parser and the display/export formatters, plus configuration handling through
 * `ConfigManagerOperations`.
 */
pub mod backend;
pub mod config;
pub mod formatting;
pub mod import_parser;
pub mod listener_matcher;
pub mod models;
pub mod path_utils;
pub mod scheduled_task;
pub mod state_store;
pub mod sync_scheduler;

pub use backend::{BackendError, BackendOperations, ImportRequest, STATE_CHANGED_EVENT};

pub use config::{ClientConfig, ConfigError, ConfigManagerOperations, CoreConfigManager};

pub use formatting::{
    ExportDocument, active_tags, build_export, duration_to_ms, format_bytes, format_elapsed,
    serialize_endpoint,
};

pub use import_parser::{
    ImportParams, ParsedEndpoint, detect_delimiter, parse_bulk, parse_endpoint, parse_line,
};

pub use listener_matcher::{ListenerIndex, candidate_servers, match_listener};

pub use models::{
    AppState, ListenerStat, LocalListener, ManagerSnapshot, PreviewRecord, ProxyAuth,
    ProxyServer, ServerFilter,
};

pub use scheduled_task::ScheduledTask;
pub use state_store::{StateStore, StoreState, Subscription, SyncHealth, SyncSource};
pub use sync_scheduler::SyncScheduler;
