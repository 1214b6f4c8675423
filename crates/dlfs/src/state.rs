use std::{fs, path::PathBuf};

use common::settings::{Options, Settings};
use serde::{Deserialize, Serialize};

pub const APP_NAME: &str = "dlfs";
pub const CONFIG_FILE_NAME: &str = "config.toml";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    /// Default log filter when RUST_LOG is unset
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Node, wallet and deploy settings; unset fields use the built-in defaults
    #[serde(default)]
    pub chia: Options,
}

fn default_log_level() -> String {
    "warn".to_string()
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            chia: Options::from(&Settings::default()),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppState {
    /// Path to the dlfs directory (~/.dlfs)
    pub dlfs_dir: PathBuf,
    /// Path to the config file
    pub config_path: PathBuf,
    /// Loaded configuration
    pub config: AppConfig,
}

impl AppState {
    /// Get the dlfs directory path (custom or default ~/.dlfs)
    pub fn dlfs_dir(custom_path: Option<PathBuf>) -> Result<PathBuf, StateError> {
        if let Some(path) = custom_path {
            return Ok(path);
        }

        let home = dirs::home_dir().ok_or(StateError::NoHomeDirectory)?;
        Ok(home.join(format!(".{}", APP_NAME)))
    }

    /// Initialize a new dlfs state directory
    pub fn init(custom_path: Option<PathBuf>, config: Option<AppConfig>) -> Result<Self, StateError> {
        let dlfs_dir = Self::dlfs_dir(custom_path)?;
        let config_path = dlfs_dir.join(CONFIG_FILE_NAME);

        if config_path.exists() {
            return Err(StateError::AlreadyInitialized);
        }

        fs::create_dir_all(&dlfs_dir)?;

        let config = config.unwrap_or_default();
        let config_toml = toml::to_string_pretty(&config)?;
        fs::write(&config_path, config_toml)?;

        Ok(Self {
            dlfs_dir,
            config_path,
            config,
        })
    }

    /// Load existing state from the dlfs directory
    pub fn load(custom_path: Option<PathBuf>) -> Result<Self, StateError> {
        let dlfs_dir = Self::dlfs_dir(custom_path)?;
        let config_path = dlfs_dir.join(CONFIG_FILE_NAME);

        if !config_path.exists() {
            return Err(StateError::NotInitialized);
        }

        let config_toml = fs::read_to_string(&config_path)?;
        let config: AppConfig = toml::from_str(&config_toml)?;

        Ok(Self {
            dlfs_dir,
            config_path,
            config,
        })
    }

    /// Load the config if there is one, built-in defaults otherwise.
    pub fn load_or_default(custom_path: Option<PathBuf>) -> Result<AppConfig, StateError> {
        match Self::load(custom_path) {
            Ok(state) => Ok(state.config),
            Err(StateError::NotInitialized) => Ok(AppConfig {
                chia: Options::default(),
                ..AppConfig::default()
            }),
            Err(e) => Err(e),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StateError {
    #[error("dlfs directory not initialized. Run 'dlfs init' first")]
    NotInitialized,

    #[error("dlfs directory already initialized")]
    AlreadyInitialized,

    #[error("no home directory found")]
    NoHomeDirectory,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML serialization error: {0}")]
    TomlSer(#[from] toml::ser::Error),

    #[error("TOML deserialization error: {0}")]
    TomlDe(#[from] toml::de::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_then_load() {
        let temp = tempfile::tempdir().unwrap();
        let dir = temp.path().join("state");

        let state = AppState::init(Some(dir.clone()), None).unwrap();
        assert!(state.config_path.exists());

        let loaded = AppState::load(Some(dir.clone())).unwrap();
        assert_eq!(loaded.config, AppConfig::default());
        assert_eq!(
            Settings::from_options(&loaded.config.chia).unwrap(),
            Settings::default()
        );

        assert!(matches!(
            AppState::init(Some(dir), None),
            Err(StateError::AlreadyInitialized)
        ));
    }

    #[test]
    fn test_load_missing() {
        let temp = tempfile::tempdir().unwrap();
        assert!(matches!(
            AppState::load(Some(temp.path().to_path_buf())),
            Err(StateError::NotInitialized)
        ));

        let config = AppState::load_or_default(Some(temp.path().to_path_buf())).unwrap();
        assert_eq!(config.chia, Options::default());
    }

    #[test]
    fn test_partial_config_file() {
        let temp = tempfile::tempdir().unwrap();
        fs::write(
            temp.path().join(CONFIG_FILE_NAME),
            "[chia]\ndefault_fee = 5\nignore_orphans = true\n",
        )
        .unwrap();

        let config = AppState::load(Some(temp.path().to_path_buf())).unwrap().config;
        assert_eq!(config.log_level, "warn");
        assert_eq!(config.chia.default_fee, Some(5));
        assert_eq!(config.chia.ignore_orphans, Some(true));
        assert_eq!(config.chia.datalayer_host, None);
    }
}
