use std::fs;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tracing::info;

use super::paths::ProjectPaths;
use crate::error::ScriptHostError;

/// Persisted "which Game Script to run" selection.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScriptSelection {
    /// Name of the script to start; absent or empty means "no script"
    #[serde(default)]
    pub name: Option<String>,

    /// Preferred version; absent means the newest available
    #[serde(default)]
    pub version: Option<u32>,
}

impl ScriptSelection {
    /// Whether a script is actually selected.
    pub fn is_configured(&self) -> bool {
        self.name
            .as_deref()
            .map(|name| !name.trim().is_empty())
            .unwrap_or(false)
    }
}

/// Host-side configuration for the Game Script system.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HostConfig {
    /// The persisted script selection
    #[serde(default)]
    pub script: ScriptSelection,

    /// Directory containing scripts (default: data dir + /scripts)
    #[serde(default)]
    pub script_dir: Option<PathBuf>,

    /// Directory containing script libraries (default: script dir + /library)
    #[serde(default)]
    pub library_dir: Option<PathBuf>,

    /// Where this config lives on disk; set by `load_from`/`with_path`
    #[serde(skip)]
    path: Option<PathBuf>,
}

impl HostConfig {
    /// Default config file location.
    pub fn config_path() -> PathBuf {
        ProjectPaths::new("marmot")
            .map(|paths| paths.config_dir().join("config.toml"))
            .unwrap_or_else(|| PathBuf::from(".marmot/config.toml"))
    }

    /// Pin this config to a non-default file, e.g. for tests.
    pub fn with_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.path = Some(path.into());
        self
    }

    /// Load from the default location; a missing file yields the defaults.
    pub fn load() -> Result<Self, ScriptHostError> {
        Self::load_from(Self::config_path())
    }

    /// Load from an explicit path; a missing file yields the defaults.
    pub fn load_from(path: impl Into<PathBuf>) -> Result<Self, ScriptHostError> {
        let path = path.into();

        if !path.exists() {
            info!(target: "config", "no config at {}, using defaults", path.display());
            return Ok(Self::default().with_path(path));
        }

        let content = fs::read_to_string(&path)
            .map_err(|e| ScriptHostError::Config(format!("reading {}: {}", path.display(), e)))?;
        let config: HostConfig = toml::from_str(&content)
            .map_err(|e| ScriptHostError::Config(format!("parsing {}: {}", path.display(), e)))?;
        info!(target: "config", "loaded config from {}", path.display());
        Ok(config.with_path(path))
    }

    /// Write the config back to where it came from.
    pub fn save(&self) -> Result<(), ScriptHostError> {
        let path = self.storage_path();

        // Create parent directories if they don't exist
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                ScriptHostError::Config(format!("creating {}: {}", parent.display(), e))
            })?;
        }

        let content = toml::to_string_pretty(self)
            .map_err(|e| ScriptHostError::Config(format!("serializing config: {}", e)))?;
        fs::write(&path, content)
            .map_err(|e| ScriptHostError::Config(format!("writing {}: {}", path.display(), e)))?;
        info!(target: "config", "saved config to {}", path.display());
        Ok(())
    }

    /// Remove the persisted config file, if any.
    pub fn delete(&self) -> Result<(), ScriptHostError> {
        let path = self.storage_path();
        match fs::remove_file(&path) {
            Ok(()) => {
                info!(target: "config", "removed config {}", path.display());
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(ScriptHostError::Config(format!(
                "removing {}: {}",
                path.display(),
                e
            ))),
        }
    }

    /// Directory the script scanner should watch.
    pub fn script_dir(&self) -> PathBuf {
        self.script_dir.clone().unwrap_or_else(|| {
            ProjectPaths::new("marmot")
                .map(|paths| paths.data_dir().join("scripts"))
                .unwrap_or_else(|| PathBuf::from(".marmot/scripts"))
        })
    }

    /// Directory the library scanner should watch.
    pub fn library_dir(&self) -> PathBuf {
        self.library_dir
            .clone()
            .unwrap_or_else(|| self.script_dir().join("library"))
    }

    fn storage_path(&self) -> PathBuf {
        self.path.clone().unwrap_or_else(Self::config_path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_have_no_selection() {
        let config = HostConfig::default();
        assert!(!config.script.is_configured());
    }

    #[test]
    fn test_blank_name_is_not_a_selection() {
        let config: HostConfig = toml::from_str("[script]\nname = \"  \"\n").unwrap();
        assert!(!config.script.is_configured());
    }

    #[test]
    fn test_save_and_reload() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("config.toml");

        let mut config = HostConfig::default().with_path(&path);
        config.script.name = Some("grand-warren".to_string());
        config.script.version = Some(3);
        config.save().unwrap();

        let loaded = HostConfig::load_from(&path).unwrap();
        assert_eq!(loaded.script.name.as_deref(), Some("grand-warren"));
        assert_eq!(loaded.script.version, Some(3));
    }

    #[test]
    fn test_missing_file_loads_defaults() {
        let tmp = tempfile::tempdir().unwrap();
        let loaded = HostConfig::load_from(tmp.path().join("nope.toml")).unwrap();
        assert!(!loaded.script.is_configured());
    }

    #[test]
    fn test_delete_is_idempotent() {
        let tmp = tempfile::tempdir().unwrap();
        let config = HostConfig::default().with_path(tmp.path().join("config.toml"));
        config.save().unwrap();
        config.delete().unwrap();
        config.delete().unwrap();
    }

    #[test]
    fn test_library_dir_nests_under_script_dir() {
        let mut config = HostConfig::default();
        config.script_dir = Some(PathBuf::from("/srv/marmot/scripts"));
        assert_eq!(
            config.library_dir(),
            PathBuf::from("/srv/marmot/scripts/library")
        );
    }
}
