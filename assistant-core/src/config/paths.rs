//! Platform-specific data directory paths.
//!
//!   Windows: %APPDATA%/desk-assistant/data
//!   macOS:   ~/Library/Application Support/desk-assistant/data
//!   Linux:   $XDG_CONFIG_HOME/desk-assistant/data (default ~/.config)
//!
//! `DESK_ASSISTANT_DATA_DIR` overrides the whole location.

use std::path::{Path, PathBuf};

const APP_DIR: &str = "desk-assistant";

/// Get the assistant data directory (cross-platform).
pub fn get_data_dir() -> PathBuf {
    if let Some(dir) = std::env::var_os("DESK_ASSISTANT_DATA_DIR") {
        return PathBuf::from(dir);
    }
    get_config_base().join(APP_DIR).join("data")
}

/// Rolling log files live here.
pub fn get_log_dir() -> PathBuf {
    get_data_dir().join("logs")
}

/// Persisted chat history shared by the chatbot and the search engine.
pub fn get_chat_log_path() -> PathBuf {
    chat_log_path(&get_data_dir())
}

/// Request file polled by the image generation worker.
pub fn get_handoff_path() -> PathBuf {
    handoff_path(&get_data_dir())
}

pub fn chat_log_path(data_dir: &Path) -> PathBuf {
    data_dir.join("ChatLog.json")
}

pub fn handoff_path(data_dir: &Path) -> PathBuf {
    data_dir.join("files").join("ImageGeneration.data")
}

/// Get the platform-appropriate base config directory.
fn get_config_base() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        if let Some(appdata) = std::env::var_os("APPDATA") {
            return PathBuf::from(appdata);
        }
        dirs::config_dir().unwrap_or_else(|| {
            dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("AppData")
                .join("Roaming")
        })
    }

    #[cfg(target_os = "macos")]
    {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("Library")
            .join("Application Support")
    }

    #[cfg(not(any(target_os = "windows", target_os = "macos")))]
    {
        if let Some(xdg) = std::env::var_os("XDG_CONFIG_HOME") {
            return PathBuf::from(xdg);
        }
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".config")
    }
}
