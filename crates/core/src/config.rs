//! Deployment Configuration
//!
//! Manages droid-deploy settings including:
//! - Android SDK location override
//! - Emulator preferences (last used AVD, boot timeout)
//! - SDK acquisition wait bounds
//! - Build variant

use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{DeployError, Result};
use crate::project::BuildVariant;

/// Android SDK configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct AndroidConfig {
    /// Path to Android SDK, tried before any auto-detection
    pub sdk_path: Option<PathBuf>,
}

/// Emulator configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct EmulatorConfig {
    /// Last AVD used for an emulator run
    pub avd_name: Option<String>,
    /// How long to wait for an emulator to finish booting
    pub boot_timeout_secs: u64,
    /// GPU mode passed to the emulator
    pub gpu: String,
}

impl Default for EmulatorConfig {
    fn default() -> Self {
        Self {
            avd_name: None,
            boot_timeout_secs: 300,
            gpu: "auto".to_string(),
        }
    }
}

/// Bounds for waiting on an SDK acquisition started by another caller
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct AcquisitionConfig {
    /// Wake-up interval while waiting, in milliseconds
    pub poll_interval_ms: u64,
    /// Give up waiting after this many seconds
    pub max_wait_secs: u64,
}

impl Default for AcquisitionConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 10,
            max_wait_secs: 1800,
        }
    }
}

impl AcquisitionConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }

    pub fn max_wait(&self) -> Duration {
        Duration::from_secs(self.max_wait_secs)
    }
}

/// Build configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct BuildConfig {
    /// Variant used for run commands
    pub variant: BuildVariant,
}

/// Main configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct DeployConfig {
    /// Configuration version for migrations
    pub version: u32,
    pub android: AndroidConfig,
    pub emulator: EmulatorConfig,
    pub acquisition: AcquisitionConfig,
    pub build: BuildConfig,
}

impl Default for DeployConfig {
    fn default() -> Self {
        Self {
            version: 1,
            android: AndroidConfig::default(),
            emulator: EmulatorConfig::default(),
            acquisition: AcquisitionConfig::default(),
            build: BuildConfig::default(),
        }
    }
}

impl DeployConfig {
    /// Get the configuration directory path
    pub fn config_dir() -> Option<PathBuf> {
        ProjectDirs::from("org", "droid-deploy", "droid-deploy")
            .map(|dirs| dirs.config_dir().to_path_buf())
    }

    /// Get the configuration file path
    pub fn config_file() -> Option<PathBuf> {
        Self::config_dir().map(|dir| dir.join("config.toml"))
    }

    /// Load configuration from the default location, creating it if missing
    pub async fn load() -> Result<Self> {
        let config_file = Self::config_file()
            .ok_or_else(|| DeployError::Config("Cannot determine config path".into()))?;
        Self::load_from(&config_file).await
    }

    /// Load configuration from a file, writing defaults when it does not exist
    pub async fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            debug!("Loading config from {:?}", path);
            let contents = tokio::fs::read_to_string(path).await?;
            let config: DeployConfig = toml::from_str(&contents)?;
            Ok(config)
        } else {
            info!("Config file not found, using defaults");
            let config = DeployConfig::default();
            config.save_to(path).await?;
            Ok(config)
        }
    }

    /// Save configuration to a file
    pub async fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let contents = toml::to_string_pretty(self)?;
        tokio::fs::write(path, contents).await?;

        debug!("Config saved to {:?}", path);
        Ok(())
    }

    fn save_to_blocking(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = toml::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        debug!("Config saved to {:?}", path);
        Ok(())
    }
}

/// Persisted user preferences the deployment core reads and writes
pub trait PreferenceStore: Send + Sync {
    /// AVD used by the last emulator run
    fn last_avd(&self) -> Option<String>;

    /// Remember the AVD for future emulator runs
    fn set_last_avd(&self, name: &str) -> Result<()>;
}

/// Preferences written through to a `config.toml`
///
/// A change is kept in memory only once it is on disk.
pub struct FilePreferences {
    path: PathBuf,
    config: RwLock<DeployConfig>,
    /// Serializes writers; readers never wait on the disk
    saving: Mutex<()>,
}

impl FilePreferences {
    pub fn new(path: PathBuf, config: DeployConfig) -> Self {
        Self {
            path,
            config: RwLock::new(config),
            saving: Mutex::new(()),
        }
    }
}

impl PreferenceStore for FilePreferences {
    fn last_avd(&self) -> Option<String> {
        self.config.read().emulator.avd_name.clone()
    }

    fn set_last_avd(&self, name: &str) -> Result<()> {
        let _saving = self.saving.lock();
        let mut updated = self.config.read().clone();
        if updated.emulator.avd_name.as_deref() == Some(name) {
            return Ok(());
        }
        updated.emulator.avd_name = Some(name.to_string());
        updated.save_to_blocking(&self.path)?;
        *self.config.write() = updated;
        Ok(())
    }
}

/// In-process preferences
#[derive(Default)]
pub struct MemoryPreferences {
    avd_name: RwLock<Option<String>>,
}

impl MemoryPreferences {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_avd(name: &str) -> Self {
        Self {
            avd_name: RwLock::new(Some(name.to_string())),
        }
    }
}

impl PreferenceStore for MemoryPreferences {
    fn last_avd(&self) -> Option<String> {
        self.avd_name.read().clone()
    }

    fn set_last_avd(&self, name: &str) -> Result<()> {
        *self.avd_name.write() = Some(name.to_string());
        Ok(())
    }
}
