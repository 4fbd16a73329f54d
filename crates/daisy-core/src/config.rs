//! Editor configuration.
//!
//! Every section is `#[serde(default)]`, so a config file only needs the
//! keys it changes and older files keep loading as fields are added.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Autosave period when nothing else is configured.
pub const DEFAULT_AUTOSAVE_INTERVAL_SECS: u64 = 60;

/// Names starting with this are left out of the file tree.
pub const DEFAULT_HIDDEN_MARKER: char = '.';

/// Node cap for a single tree walk.
pub const DEFAULT_MAX_TREE_NODES: usize = 50_000;

/// Main editor configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Session behavior settings
    pub session: SessionConfig,

    /// File tree settings
    pub tree: TreeConfig,

    /// Build/run settings
    pub build: BuildConfig,
}

impl Config {
    /// Loads config from the default location, falling back to defaults.
    pub fn load() -> Self {
        match Self::load_from_default_path() {
            Ok(config) => config,
            Err(err) => {
                tracing::warn!("Using default config: {}", err);
                Self::default()
            }
        }
    }

    /// Loads config from a file.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    fn load_from_default_path() -> Result<Self, ConfigError> {
        let path = Self::default_path()?;
        if path.exists() {
            Self::load_from(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Returns the default config file path.
    pub fn default_path() -> Result<PathBuf, ConfigError> {
        let config_dir = dirs::config_dir().ok_or(ConfigError::NoConfigDir)?;
        Ok(config_dir.join("daisy").join("config.toml"))
    }

    /// Saves the config to the default location.
    pub fn save(&self) -> Result<(), ConfigError> {
        self.save_to(Self::default_path()?)
    }

    /// Saves the config to a specific file.
    pub fn save_to(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }
}

/// Session behavior configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Seconds between autosave ticks
    pub autosave_interval_secs: u64,

    /// Start in dark mode
    pub dark_mode: bool,
}

impl SessionConfig {
    /// Returns the autosave period, never shorter than one second.
    pub fn autosave_interval(&self) -> Duration {
        Duration::from_secs(self.autosave_interval_secs.max(1))
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            autosave_interval_secs: DEFAULT_AUTOSAVE_INTERVAL_SECS,
            dark_mode: false,
        }
    }
}

/// File tree configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TreeConfig {
    /// Entries whose name starts with this are skipped
    pub hidden_marker: char,

    /// Maximum directory depth below the root (None = unlimited)
    pub max_depth: Option<usize>,

    /// Maximum number of nodes in one tree (None = unlimited)
    pub max_nodes: Option<usize>,

    /// Descend into symlinked directories
    pub follow_symlinks: bool,
}

impl Default for TreeConfig {
    fn default() -> Self {
        Self {
            hidden_marker: DEFAULT_HIDDEN_MARKER,
            max_depth: None,
            max_nodes: Some(DEFAULT_MAX_TREE_NODES),
            follow_symlinks: false,
        }
    }
}

/// Build/run configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildConfig {
    /// Compiler for `.c` files
    pub c_compiler: String,

    /// Compiler for `.cpp` files
    pub cpp_compiler: String,

    /// Compiler for `.rs` files
    pub rust_compiler: String,

    /// Default-handler launcher (None = platform default)
    pub opener: Option<String>,

    /// Directory for build artifacts (None = OS temp dir)
    pub output_dir: Option<PathBuf>,

    /// Shell that runs composed commands (None = platform default)
    pub shell: Option<String>,
}

impl BuildConfig {
    /// Returns the directory build artifacts are written to.
    pub fn output_dir(&self) -> PathBuf {
        self.output_dir.clone().unwrap_or_else(std::env::temp_dir)
    }

    /// Returns the default-handler launcher command.
    pub fn opener(&self) -> &str {
        self.opener.as_deref().unwrap_or(platform_opener())
    }
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            c_compiler: "gcc".to_string(),
            cpp_compiler: "g++".to_string(),
            rust_compiler: "rustc".to_string(),
            opener: None,
            output_dir: None,
            shell: None,
        }
    }
}

fn platform_opener() -> &'static str {
    if cfg!(target_os = "macos") {
        "open"
    } else if cfg!(windows) {
        "start \"\""
    } else {
        "xdg-open"
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Config directory not found")]
    NoConfigDir,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Serialize error: {0}")]
    Serialize(#[from] toml::ser::Error),
}
