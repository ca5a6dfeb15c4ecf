//! Configuration management for warden.
//!
//! Loads configuration from ${WARDEN_HOME}/config.toml with sensible defaults.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

pub mod paths {
    //! Path resolution for warden configuration.
    //!
    //! WARDEN_HOME resolution order:
    //! 1. WARDEN_HOME environment variable (if set)
    //! 2. ~/.config/warden (default)

    use std::path::PathBuf;

    /// Returns the warden home directory.
    ///
    /// Checks WARDEN_HOME env var first, falls back to ~/.config/warden
    pub fn warden_home() -> PathBuf {
        if let Ok(home) = std::env::var("WARDEN_HOME") {
            return PathBuf::from(home);
        }

        dirs::home_dir()
            .map(|h| h.join(".config").join("warden"))
            .expect("Could not determine home directory")
    }

    /// Returns the path to the config.toml file.
    pub fn config_path() -> PathBuf {
        warden_home().join("config.toml")
    }
}

/// Default dangerous-command blocklist.
///
/// Mixed on purpose: regex patterns where spacing varies, plus literals —
/// the fork bomb entry is not a valid regex and relies on the substring
/// fallback.
pub const DEFAULT_BLOCKED_COMMANDS: &[&str] = &[
    r"rm\s+-rf",
    "sudo rm",
    "mkfs",
    "dd if=",
    ":(){ :|:& };:",
    "> /dev/sd",
    r"chmod\s+-R\s+777\s+/",
];

/// Command blocklist configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SecurityConfig {
    /// Master switch for the blocklist.
    pub enable_blocklist: bool,
    /// Ordered patterns matched against shell commands.
    pub blocked_commands: Vec<String>,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            enable_blocklist: true,
            blocked_commands: DEFAULT_BLOCKED_COMMANDS
                .iter()
                .map(|p| (*p).to_string())
                .collect(),
        }
    }
}

/// Presentation preferences consumed by the renderer, not the core.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplayConfig {
    /// Whether tool invocations are printed. Never affects blocking.
    pub show_tool_use: bool,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            show_tool_use: true,
        }
    }
}

/// Backend pass-through configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    /// Explicit path to the claude executable; discovery runs when unset.
    pub executable: Option<PathBuf>,
    /// Permission mode handed to the backend unchanged.
    pub permission_mode: Option<String>,
    /// Tool allowlist handed to the backend unchanged.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub allowed_tools: Vec<String>,
}

/// Main configuration structure.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Working directory for backend runs (the vault the agent operates in).
    pub vault: Option<PathBuf>,

    /// Command blocklist configuration.
    pub security: SecurityConfig,

    /// Renderer preferences.
    pub display: DisplayConfig,

    /// Backend pass-through configuration.
    pub backend: BackendConfig,
}

/// Returns the default config template with comments.
///
/// This is embedded from default_config.toml at compile time.
/// To update, edit default_config.toml directly.
fn default_config_template() -> &'static str {
    include_str!("../default_config.toml")
}

impl Config {
    /// Loads configuration from the default config path.
    pub fn load() -> Result<Self> {
        Self::load_from(&paths::config_path())
    }

    /// Loads configuration from a specific path.
    /// Returns defaults if file doesn't exist.
    pub fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let contents = fs::read_to_string(path)
                .with_context(|| format!("Failed to read config from {}", path.display()))?;
            toml::from_str(&contents)
                .with_context(|| format!("Failed to parse config from {}", path.display()))
        } else {
            Ok(Config::default())
        }
    }

    /// Writes the commented default template to the default config path.
    ///
    /// Leaves an existing file untouched. Returns the path written (or
    /// found).
    pub fn init_default_config() -> Result<PathBuf> {
        let path = paths::config_path();
        if path.exists() {
            return Ok(path);
        }
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        fs::write(&path, default_config_template())
            .with_context(|| format!("Failed to write {}", path.display()))?;
        Ok(path)
    }
}
