//! AVD (Android Virtual Device) Manager
//!
//! Looks up and creates Android Virtual Devices and enumerates the system
//! images installed in the SDK.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use configparser::ini::Ini;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, info};

/// AVD Manager errors
#[derive(Debug, thiserror::Error)]
pub enum AvdError {
    #[error("avdmanager not found. Is the Android command-line tools package installed?")]
    ManagerNotFound,
    #[error("Failed to create AVD {name}: {reason}")]
    CreateFailed { name: String, reason: String },
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Parse error: {0}")]
    Parse(String),
}

/// AVD information read from its ini files
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AvdInfo {
    pub name: String,
    pub path: PathBuf,
    /// System image folder, e.g. `system-images/android-34/google_apis/x86_64/`
    pub image_dir: Option<String>,
    pub abi: Option<String>,
    pub device_name: Option<String>,
}

/// AVD configuration for creation
#[derive(Debug, Clone)]
pub struct AvdConfig {
    pub name: String,
    /// System image package
    pub package: String,
    /// Hardware profile
    pub device: String,
    pub force: bool,
}

impl AvdConfig {
    pub fn new(name: &str, device: &str, package: &str) -> Self {
        Self {
            name: name.to_string(),
            package: package.to_string(),
            device: device.to_string(),
            force: false,
        }
    }
}

/// System image installed under `<sdk>/system-images`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SystemImage {
    pub api_level: u32,
    /// google_apis, android-wear, default, ...
    pub variant: String,
    /// x86_64, arm64-v8a, ...
    pub abi: String,
    /// Local folder; `None` when the image is not installed
    pub path: Option<PathBuf>,
}

impl SystemImage {
    /// Image that is not installed locally
    pub fn remote(api_level: u32, variant: &str, abi: &str) -> Self {
        Self {
            api_level,
            variant: variant.to_string(),
            abi: abi.to_string(),
            path: None,
        }
    }

    /// Get the package string for avdmanager
    pub fn package(&self) -> String {
        format!("system-images;android-{};{};{}", self.api_level, self.variant, self.abi)
    }

    pub fn is_installed(&self) -> bool {
        self.path.is_some()
    }

    pub fn is_wear(&self) -> bool {
        self.variant.contains("wear")
    }
}

/// AVD Manager
pub struct AvdManager {
    sdk_path: PathBuf,
    avd_home: PathBuf,
}

impl AvdManager {
    /// Create a new AVD manager using the user's AVD folder
    pub fn new(sdk_path: PathBuf) -> Self {
        Self::with_avd_home(sdk_path, default_avd_home())
    }

    pub fn with_avd_home(sdk_path: PathBuf, avd_home: PathBuf) -> Self {
        Self { sdk_path, avd_home }
    }

    /// Get avdmanager path
    fn avdmanager_path(&self) -> Result<PathBuf, AvdError> {
        let exe_name = if cfg!(windows) { "avdmanager.bat" } else { "avdmanager" };

        let latest = self.sdk_path.join("cmdline-tools").join("latest").join("bin").join(exe_name);
        if latest.exists() {
            return Ok(latest);
        }

        if let Ok(entries) = std::fs::read_dir(self.sdk_path.join("cmdline-tools")) {
            for entry in entries.flatten() {
                let path = entry.path().join("bin").join(exe_name);
                if path.exists() {
                    return Ok(path);
                }
            }
        }

        let legacy = self.sdk_path.join("tools").join("bin").join(exe_name);
        if legacy.exists() {
            return Ok(legacy);
        }

        Err(AvdError::ManagerNotFound)
    }

    /// AVD named `name`, if its ini file exists
    pub async fn avd_info(&self, name: &str) -> Result<Option<AvdInfo>, AvdError> {
        let ini_path = self.avd_home.join(format!("{}.ini", name));
        if name.is_empty() || !ini_path.is_file() {
            return Ok(None);
        }
        Ok(Some(self.parse_avd_info(name, &ini_path).await?))
    }

    /// Whether `name` exists and its data folder is still there
    pub async fn avd_exists(&self, name: &str) -> bool {
        match self.avd_info(name).await {
            Ok(Some(info)) if info.path.is_dir() => true,
            Ok(Some(info)) => {
                debug!("AVD {} points at missing folder {:?}", name, info.path);
                false
            }
            Ok(None) => false,
            Err(e) => {
                debug!("Cannot read AVD {}: {}", name, e);
                false
            }
        }
    }

    /// Parse AVD info from its ini files
    async fn parse_avd_info(&self, name: &str, ini_path: &Path) -> Result<AvdInfo, AvdError> {
        let content = tokio::fs::read_to_string(ini_path).await?;
        let ini = read_ini(content)?;

        let avd_path = ini
            .get("default", "path")
            .filter(|p| !p.is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(|| self.avd_home.join(format!("{}.avd", name)));

        let mut info = AvdInfo {
            name: name.to_string(),
            path: avd_path,
            image_dir: None,
            abi: None,
            device_name: None,
        };

        let config_path = info.path.join("config.ini");
        if config_path.exists() {
            let config = read_ini(tokio::fs::read_to_string(&config_path).await?)?;
            info.image_dir = config.get("default", "image.sysdir.1");
            info.abi = config.get("default", "abi.type");
            info.device_name = config.get("default", "hw.device.name");
        }

        Ok(info)
    }

    /// Create a new AVD
    pub async fn create_avd(&self, config: &AvdConfig) -> Result<(), AvdError> {
        let avdmanager = self.avdmanager_path()?;

        info!("Creating AVD {} ({}, {})", config.name, config.device, config.package);

        let mut cmd = Command::new(&avdmanager);
        cmd.env("ANDROID_SDK_ROOT", &self.sdk_path)
            .arg("create")
            .arg("avd")
            .arg("-n")
            .arg(&config.name)
            .arg("-k")
            .arg(&config.package)
            .arg("-d")
            .arg(&config.device);

        if config.force {
            cmd.arg("--force");
        }

        let mut child = cmd
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()?;

        // Decline the custom hardware profile question
        if let Some(mut stdin) = child.stdin.take() {
            stdin.write_all(b"no\n").await?;
        }

        let output = child.wait_with_output().await?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(AvdError::CreateFailed {
                name: config.name.clone(),
                reason: stderr.trim().to_string(),
            });
        }

        info!("AVD created successfully: {}", config.name);
        Ok(())
    }

    /// List installed system images, newest API level first
    pub async fn list_system_images(&self) -> Result<Vec<SystemImage>, AvdError> {
        let mut images = Vec::new();
        let system_images_dir = self.sdk_path.join("system-images");

        if !system_images_dir.exists() {
            return Ok(images);
        }

        // system-images/android-{api}/{variant}/{abi}/
        for api_path in subdirs(&system_images_dir).await? {
            let Some(api_level) = api_path
                .file_name()
                .and_then(|s| s.to_str())
                .and_then(|s| s.strip_prefix("android-"))
                .and_then(|s| s.parse::<u32>().ok())
            else {
                continue;
            };

            for variant_path in subdirs(&api_path).await? {
                let variant = dir_name(&variant_path);

                for abi_path in subdirs(&variant_path).await? {
                    images.push(SystemImage {
                        api_level,
                        variant: variant.clone(),
                        abi: dir_name(&abi_path),
                        path: Some(abi_path),
                    });
                }
            }
        }

        images.sort_by(|a, b| {
            b.api_level
                .cmp(&a.api_level)
                .then_with(|| a.variant.cmp(&b.variant))
                .then_with(|| a.abi.cmp(&b.abi))
        });
        Ok(images)
    }
}

fn default_avd_home() -> PathBuf {
    if let Some(home) = std::env::var_os("ANDROID_AVD_HOME") {
        return PathBuf::from(home);
    }
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".android")
        .join("avd")
}

fn read_ini(content: String) -> Result<Ini, AvdError> {
    let mut ini = Ini::new();
    ini.read(content).map_err(AvdError::Parse)?;
    Ok(ini)
}

async fn subdirs(dir: &Path) -> Result<Vec<PathBuf>, AvdError> {
    let mut dirs = Vec::new();
    let mut entries = tokio::fs::read_dir(dir).await?;
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if path.is_dir() {
            dirs.push(path);
        }
    }
    Ok(dirs)
}

fn dir_name(path: &Path) -> String {
    path.file_name()
        .and_then(|s| s.to_str())
        .unwrap_or_default()
        .to_string()
}
