/*
 * Shared constants for the view logic: the application name used to locate the
 * configuration directory, and user-facing texts that tests match against.
 */

// Name under which the client's settings directory is created.
pub const APP_NAME_FOR_CONFIG: &str = "ProxyFleetView";

pub const EXPORT_DIALOG_TITLE: &str = "Export proxies";

// Shown when an export is requested with nothing to export.
pub const NOTHING_TO_EXPORT_TEXT: &str = "There are no proxies to export.";

pub const NOTHING_SELECTED_TEXT: &str = "No proxies selected.";

pub const NO_LISTENERS_SELECTED_TEXT: &str = "No listeners selected.";

// Suffix for mutation results; there is no optimistic update, the next sync shows the effect.
pub const PENDING_SYNC_SUFFIX: &str = "The list updates on the next refresh.";
