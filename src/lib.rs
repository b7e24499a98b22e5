/*
 * Client-side view of a proxy fleet managed by a separate backend service. The
 * `core` module mirrors backend state into an equality-gated store and keeps it
 * fresh; `app_logic` turns that store into rows and forwards user commands.
 */
pub mod app_logic;
pub mod core;

pub use app_logic::FleetViewLogic;
pub use crate::core::{BackendOperations, StateStore, SyncScheduler};

use simplelog::{ColorChoice, Config, LevelFilter, TermLogger, TerminalMode};
use std::sync::Once;

static LOGGING_INIT: Once = Once::new();

/*
 * Installs a terminal logger once per process. Later calls do nothing, so every
 * test can call it. If another logger is already installed, that one stays.
 */
pub fn initialize_logging() {
    LOGGING_INIT.call_once(|| {
        let level = if cfg!(debug_assertions) {
            LevelFilter::Debug
        } else {
            LevelFilter::Info
        };
        if let Err(e) = TermLogger::init(
            level,
            Config::default(),
            TerminalMode::Mixed,
            ColorChoice::Auto,
        ) {
            eprintln!("Logging: Could not install terminal logger: {e}");
        }
    });
}
