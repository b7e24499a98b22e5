/*
 * This module provides the view logic layer, centered around `FleetViewLogic`
 * which acts as the Presenter for the proxy-fleet view. It also holds
 * `FleetViewUiState` for view-local selection and paging, and `ImportSession` for
 * the bulk-import dialog. Unit tests for `FleetViewLogic` are in `handler_tests.rs`.
 */
pub mod fleet_view_ui_state;
pub mod handler;
pub mod import_session;
pub mod types;
pub mod ui_constants;


pub use fleet_view_ui_state::FleetViewUiState;
pub use handler::FleetViewLogic;
pub use import_session::{ImportError, ImportSession};
pub use types::{ListenerMode, ListenerRow, MessageSeverity, ServerRow, ViewCommand};
