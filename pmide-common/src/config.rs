//! Configuration loading and root folder resolution

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Environment variable naming the root folder
pub const ROOT_ENV_VAR: &str = "PMIDE_ROOT";

pub const DATABASE_FILE: &str = "pmide.db";
pub const SECRET_FILE: &str = "secret.key";

pub const DEFAULT_STORE_PORT: u16 = 5730;
pub const DEFAULT_SIDECAR_PORT: u16 = 8000;

/// `[store]` table of config.toml
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub host: String,
    pub port: u16,
    /// Base URL the chat relay uses to reach the sidecar
    pub sidecar_url: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: DEFAULT_STORE_PORT,
            sidecar_url: format!("http://127.0.0.1:{}", DEFAULT_SIDECAR_PORT),
        }
    }
}

/// `[sidecar]` table of config.toml
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SidecarConfig {
    pub host: String,
    pub port: u16,
    pub request_timeout_secs: u64,
    /// Directory holding `categories.json` and per-category framework files
    pub frameworks_dir: Option<PathBuf>,
    pub anthropic_base_url: String,
    pub openai_base_url: String,
}

impl Default for SidecarConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: DEFAULT_SIDECAR_PORT,
            request_timeout_secs: 120,
            frameworks_dir: None,
            anthropic_base_url: "https://api.anthropic.com".to_string(),
            openai_base_url: "https://api.openai.com".to_string(),
        }
    }
}

/// Parsed config.toml
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PmIdeConfig {
    pub root_folder: Option<PathBuf>,
    pub store: StoreConfig,
    pub sidecar: SidecarConfig,
}

impl PmIdeConfig {
    /// Parse TOML text; missing tables and keys take defaults
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| Error::Config(format!("Invalid config.toml: {}", e)))
    }

    /// Load from an explicit path, or the platform config file when present
    ///
    /// A missing default file is not an error; an explicit path that cannot
    /// be read is.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            let content = std::fs::read_to_string(path)
                .map_err(|e| Error::Config(format!("Cannot read {}: {}", path.display(), e)))?;
            info!("Loaded config file: {}", path.display());
            return Self::from_toml_str(&content);
        }

        match default_config_file() {
            Some(path) if path.exists() => {
                let content = std::fs::read_to_string(&path)?;
                info!("Loaded config file: {}", path.display());
                Self::from_toml_str(&content)
            }
            _ => {
                debug!("No config file found, using defaults");
                Ok(Self::default())
            }
        }
    }
}

/// Root folder resolution priority order:
/// 1. Command-line argument (highest priority)
/// 2. Environment variable
/// 3. TOML config file
/// 4. OS-dependent compiled default (fallback)
pub fn resolve_root_folder(
    cli_arg: Option<&Path>,
    env_var_name: &str,
    config: &PmIdeConfig,
) -> PathBuf {
    if let Some(path) = cli_arg {
        return path.to_path_buf();
    }

    if let Ok(path) = std::env::var(env_var_name) {
        if !path.trim().is_empty() {
            return PathBuf::from(path);
        }
    }

    if let Some(path) = &config.root_folder {
        return path.clone();
    }

    get_default_root_folder()
}

/// Platform location of config.toml
pub fn default_config_file() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("pmide").join("config.toml"))
}

/// Get OS-dependent default root folder path
fn get_default_root_folder() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("pmide"))
        .unwrap_or_else(|| PathBuf::from("./pmide_data"))
}

/// Creates the root folder and names the files inside it
#[derive(Debug, Clone)]
pub struct RootFolderInitializer {
    root: PathBuf,
}

impl RootFolderInitializer {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    pub fn ensure_directory_exists(&self) -> Result<()> {
        if !self.root.exists() {
            std::fs::create_dir_all(&self.root)?;
            info!("Created root folder: {}", self.root.display());
        }
        Ok(())
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn database_path(&self) -> PathBuf {
        self.root.join(DATABASE_FILE)
    }

    pub fn secret_path(&self) -> PathBuf {
        self.root.join(SECRET_FILE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    fn test_defaults_when_empty() {
        let config = PmIdeConfig::from_toml_str("").unwrap();
        assert_eq!(config.store.port, DEFAULT_STORE_PORT);
        assert_eq!(config.sidecar.port, DEFAULT_SIDECAR_PORT);
        assert_eq!(config.sidecar.request_timeout_secs, 120);
        assert!(config.root_folder.is_none());
    }

    #[test]
    fn test_partial_tables() {
        let config = PmIdeConfig::from_toml_str(
            r#"
            root_folder = "/tmp/pm"
            [sidecar]
            port = 9001
            frameworks_dir = "/opt/frameworks"
            "#,
        )
        .unwrap();
        assert_eq!(config.root_folder, Some(PathBuf::from("/tmp/pm")));
        assert_eq!(config.sidecar.port, 9001);
        assert_eq!(config.sidecar.host, "127.0.0.1");
        assert_eq!(config.sidecar.frameworks_dir, Some(PathBuf::from("/opt/frameworks")));
        assert_eq!(config.store.sidecar_url, "http://127.0.0.1:8000");
    }

    #[test]
    fn test_invalid_toml_is_config_error() {
        let err = PmIdeConfig::from_toml_str("store = [").unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    #[serial]
    fn test_root_folder_priority() {
        let config = PmIdeConfig {
            root_folder: Some(PathBuf::from("/from/config")),
            ..Default::default()
        };
        let var = "PMIDE_TEST_ROOT_PRIORITY";

        std::env::set_var(var, "/from/env");
        assert_eq!(
            resolve_root_folder(Some(Path::new("/from/cli")), var, &config),
            PathBuf::from("/from/cli")
        );
        assert_eq!(resolve_root_folder(None, var, &config), PathBuf::from("/from/env"));

        std::env::remove_var(var);
        assert_eq!(resolve_root_folder(None, var, &config), PathBuf::from("/from/config"));
        assert!(resolve_root_folder(None, var, &PmIdeConfig::default()).ends_with("pmide")
            || resolve_root_folder(None, var, &PmIdeConfig::default()).ends_with("pmide_data"));
    }

    #[test]
    fn test_initializer_paths() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("nested").join("root");
        let init = RootFolderInitializer::new(root.clone());
        init.ensure_directory_exists().unwrap();
        assert!(root.is_dir());
        assert_eq!(init.database_path(), root.join("pmide.db"));
        assert_eq!(init.secret_path(), root.join("secret.key"));
    }
}
