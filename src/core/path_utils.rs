/*
 * Resolves the per-user directories the client keeps its files in. Currently that
 * is only the local (non-roaming) configuration directory holding the client
 * settings.
 */
use directories::ProjectDirs;
use std::fs;
use std::path::{Path, PathBuf};

/*
 * Returns the application's local configuration directory, creating it when it
 * does not exist yet (e.g. AppData/Local/<app> on Windows, ~/.config/<app> on
 * Linux). `None` when the platform has no such directory or it cannot be created.
 */
pub fn get_base_app_config_local_dir(app_name: &str) -> Option<PathBuf> {
    let proj_dirs = ProjectDirs::from("", "", app_name)?;
    ensure_dir(proj_dirs.config_local_dir())
}

fn ensure_dir(path: &Path) -> Option<PathBuf> {
    if path.is_dir() {
        log::trace!("PathUtils: Config directory already exists: {path:?}");
        return Some(path.to_path_buf());
    }
    match fs::create_dir_all(path) {
        Ok(()) => {
            log::debug!("PathUtils: Created config directory: {path:?}");
            Some(path.to_path_buf())
        }
        Err(e) => {
            log::error!("PathUtils: Failed to create config directory {path:?}: {e}");
            None
        }
    }
}
