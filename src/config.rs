use anyhow::{Context, Result};
use dirs::config_dir;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::context::{
    EngineOptions, DEFAULT_ARTIFACT_NAME, DEFAULT_BINARY_EXTENSIONS, DEFAULT_IGNORED_NAMES,
    DEFAULT_PREVIEW_MAX_BYTES, DEFAULT_TREE_DEPTH,
};

const APP_NAME: &str = "context-dropper";
const CONFIG_FILE: &str = "config.json";

/// Environment variable that overrides the database location.
pub const DB_ENV_VAR: &str = "CONTEXT_DROPPER_DB";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// File name of the generated context file, written at the project root
    pub artifact_name: String,
    /// Entry names skipped when walking directories, unless selected
    pub ignored_dir_names: Vec<String>,
    /// Name suffixes that are never read as text
    pub binary_extensions: Vec<String>,
    /// Directory levels shown below the project root for subtrees without selections
    pub tree_depth: usize,
    /// Files larger than this are not shown by `preview`
    pub preview_max_bytes: u64,
    /// SQLite database location. Defaults to the user data directory.
    pub database_path: Option<PathBuf>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            artifact_name: DEFAULT_ARTIFACT_NAME.to_string(),
            ignored_dir_names: DEFAULT_IGNORED_NAMES.iter().map(|s| s.to_string()).collect(),
            binary_extensions: DEFAULT_BINARY_EXTENSIONS
                .iter()
                .map(|s| s.to_string())
                .collect(),
            tree_depth: DEFAULT_TREE_DEPTH,
            preview_max_bytes: DEFAULT_PREVIEW_MAX_BYTES,
            database_path: None,
        }
    }
}

impl Settings {
    /// Load settings from the user's config directory.
    /// Returns defaults if the file doesn't exist or fails to parse.
    pub fn load() -> Self {
        match get_config_path().and_then(|path| Self::try_load(&path)) {
            Ok(settings) => settings,
            Err(e) => {
                tracing::warn!("Failed to load settings, using defaults: {:#}", e);
                Self::default()
            }
        }
    }

    pub fn try_load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path).context("Failed to read config file")?;

        let settings = serde_json::from_str(&content).context("Failed to parse config file")?;

        Ok(settings)
    }

    /// Save the current settings to the user's config directory.
    pub fn save(&self) -> Result<()> {
        self.save_to(&get_config_path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).context("Failed to create config directory")?;
        }

        let content = serde_json::to_string_pretty(self).context("Failed to serialize config")?;

        fs::write(path, content).context("Failed to write config file")?;

        Ok(())
    }

    pub fn engine_options(&self) -> EngineOptions {
        EngineOptions {
            artifact_name: self.artifact_name.clone(),
            ignored_names: self.ignored_dir_names.clone(),
            binary_extensions: self.binary_extensions.clone(),
            tree_depth: self.tree_depth,
            preview_max_bytes: self.preview_max_bytes,
        }
    }

    /// Database location: the explicit flag, then the environment, then the
    /// settings file. `None` means the default location.
    pub fn database_path(&self, flag: Option<PathBuf>) -> Option<PathBuf> {
        flag.or_else(|| {
            std::env::var_os(DB_ENV_VAR)
                .filter(|v| !v.is_empty())
                .map(PathBuf::from)
        })
        .or_else(|| self.database_path.clone())
    }
}

fn get_config_path() -> Result<PathBuf> {
    let mut path =
        config_dir().ok_or_else(|| anyhow::anyhow!("Could not determine config directory"))?;
    path.push(APP_NAME);
    path.push(CONFIG_FILE);
    Ok(path)
}
