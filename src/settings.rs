//! Client settings and configuration

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::Path;

/// Client settings
///
/// Persistent configuration for chatEX clients. Settings are stored in JSON
/// format and can be loaded/saved from disk. Fields missing from the file
/// keep their defaults.
///
/// # Example
/// ```rust,no_run
/// use chatex::Settings;
///
/// // Load settings (returns default if file doesn't exist)
/// let mut settings = Settings::load("chatex.json").expect("Failed to load");
///
/// settings.preview_max_chars = 20;
/// settings.save("chatex.json").expect("Failed to save");
///
/// println!("Server record key: {}", settings.server_key);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Store key of the shared server record
    pub server_key: String,
    /// Store key of the session record
    pub session_key: String,
    /// Path of the SQLite database backing the shared store
    pub database_path: String,
    /// Maximum characters of a chat list preview before truncation
    pub preview_max_chars: usize,
    /// Auto-refresh intervals offered to the user, in milliseconds (0 = off)
    pub auto_refresh_options_ms: Vec<u64>,
    /// Numbered variants generated per directory base nickname
    pub directory_variants_per_name: usize,
}

impl Settings {
    /// Read settings from the JSON file at `path`
    ///
    /// A missing or blank file yields the defaults. The offered auto-refresh
    /// intervals come back sorted, deduplicated and always including 0.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let raw = match fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(e) => {
                return Err(Error::Storage(format!("Cannot read {}: {}", path.display(), e)));
            }
        };
        if raw.trim().is_empty() {
            return Ok(Self::default());
        }

        let settings: Self = serde_json::from_str(&raw)
            .map_err(|e| Error::Storage(format!("Invalid settings in {}: {}", path.display(), e)))?;
        Ok(settings.normalized())
    }

    /// Write these settings as pretty JSON to `path`, creating its directory
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir)
                .map_err(|e| Error::Storage(format!("Cannot create {}: {}", dir.display(), e)))?;
        }

        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)
            .map_err(|e| Error::Storage(format!("Cannot write {}: {}", path.display(), e)))
    }

    fn normalized(mut self) -> Self {
        self.auto_refresh_options_ms.push(0);
        self.auto_refresh_options_ms.sort_unstable();
        self.auto_refresh_options_ms.dedup();
        self
    }

    /// Copy of these settings with a different session key
    ///
    /// Clients that should behave as separate users on one shared store need
    /// distinct session keys.
    pub fn with_session_key(&self, session_key: impl Into<String>) -> Self {
        Self {
            session_key: session_key.into(),
            ..self.clone()
        }
    }

    /// Whether `ms` is one of the offered auto-refresh intervals
    pub fn is_offered_interval(&self, ms: u64) -> bool {
        self.auto_refresh_options_ms.contains(&ms)
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            server_key: "chatEX-server".to_string(),
            session_key: "chatEX-session".to_string(),
            database_path: "./data/chatex.db".to_string(),
            preview_max_chars: 15,
            auto_refresh_options_ms: vec![0, 5_000, 10_000, 30_000],
            directory_variants_per_name: 3,
        }
    }
}
