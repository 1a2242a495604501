//! Standard storyline directories.

use std::path::PathBuf;

/// Get the storyline configuration directory.
///
/// On Unix, `~/.config/storyline` is preferred when it exists.
pub fn config_dir() -> Option<PathBuf> {
    #[cfg(unix)]
    {
        if let Some(home) = dirs::home_dir() {
            let xdg_config = home.join(".config").join("storyline");
            if xdg_config.exists() {
                return Some(xdg_config);
            }
        }
    }

    dirs::config_dir().map(|p| p.join("storyline"))
}

/// Get the storyline data directory (where stories are stored by default).
pub fn data_dir() -> Option<PathBuf> {
    dirs::data_local_dir().map(|p| p.join("storyline"))
}
