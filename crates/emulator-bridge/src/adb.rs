//! ADB (Android Debug Bridge) Client
//!
//! Communicates with devices via ADB.

use std::path::{Path, PathBuf};
use std::time::Duration;

use tokio::process::Command;
use tokio::time::Instant;
use tracing::debug;

use crate::device::{Device, DeviceState, DeviceType};

/// Interval between boot checks
const BOOT_POLL_INTERVAL: Duration = Duration::from_secs(2);

/// ADB errors
#[derive(Debug, thiserror::Error)]
pub enum AdbError {
    #[error("ADB not found at {0}")]
    NotFound(PathBuf),
    #[error("ADB command failed: {0}")]
    CommandFailed(String),
    #[error("Timed out waiting for {0}")]
    Timeout(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// ADB Client
pub struct AdbClient {
    sdk_path: PathBuf,
}

impl AdbClient {
    /// Create a new ADB client
    pub fn new(sdk_path: PathBuf) -> Self {
        Self { sdk_path }
    }

    /// Get the ADB executable path
    fn adb_path(&self) -> PathBuf {
        let platform_tools = self.sdk_path.join("platform-tools");
        if cfg!(windows) {
            platform_tools.join("adb.exe")
        } else {
            platform_tools.join("adb")
        }
    }

    /// Run an ADB command
    async fn run(&self, args: &[&str]) -> Result<String, AdbError> {
        let adb = self.adb_path();

        if !adb.exists() {
            return Err(AdbError::NotFound(adb));
        }

        debug!("adb {:?}", args);

        let output = Command::new(&adb).args(args).output().await?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(AdbError::CommandFailed(stderr.trim().to_string()));
        }

        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }

    /// Run an ADB command for a specific device
    async fn run_for_device(&self, serial: &str, args: &[&str]) -> Result<String, AdbError> {
        let mut full_args = vec!["-s", serial];
        full_args.extend(args);
        self.run(&full_args).await
    }

    /// List connected devices
    pub async fn list_devices(&self) -> Result<Vec<Device>, AdbError> {
        let output = self.run(&["devices", "-l"]).await?;
        Ok(parse_devices(&output))
    }

    /// Run a shell command on device
    pub async fn shell(&self, serial: &str, command: &str) -> Result<String, AdbError> {
        self.run_for_device(serial, &["shell", command]).await
    }

    /// Get device property
    pub async fn get_prop(&self, serial: &str, prop: &str) -> Result<String, AdbError> {
        let output = self.shell(serial, &format!("getprop {}", prop)).await?;
        Ok(output.trim().to_string())
    }

    /// Whether the device identifies as a watch
    pub async fn is_watch(&self, serial: &str) -> Result<bool, AdbError> {
        let characteristics = self.get_prop(serial, "ro.build.characteristics").await?;
        Ok(characteristics.split(',').any(|c| c.trim() == "watch"))
    }

    /// Name of the AVD an emulator serial is running
    pub async fn avd_name(&self, serial: &str) -> Result<String, AdbError> {
        let output = self.run_for_device(serial, &["emu", "avd", "name"]).await?;
        parse_avd_name(&output)
            .ok_or_else(|| AdbError::CommandFailed(format!("{} did not report an AVD name", serial)))
    }

    /// Wait until `serial` is online and has finished booting
    pub async fn wait_for_boot(&self, serial: &str, timeout: Duration) -> Result<Device, AdbError> {
        let deadline = Instant::now() + timeout;

        while Instant::now() < deadline {
            if let Ok(devices) = self.list_devices().await {
                if let Some(device) = devices.into_iter().find(|d| d.serial == serial && d.is_usable()) {
                    if let Ok(booted) = self.get_prop(serial, "sys.boot_completed").await {
                        if booted == "1" {
                            debug!("{} finished booting", serial);
                            return Ok(device);
                        }
                    }
                }
            }
            tokio::time::sleep(BOOT_POLL_INTERVAL).await;
        }

        Err(AdbError::Timeout(format!("{} to boot", serial)))
    }

    /// Install an APK, replacing any previous install
    pub async fn install(&self, serial: &str, apk_path: &Path) -> Result<(), AdbError> {
        let path_str = apk_path.to_string_lossy();
        let output = self.run_for_device(serial, &["install", "-r", &path_str]).await?;

        // Older adb versions exit 0 on failed installs
        if let Some(line) = output.lines().find(|l| l.starts_with("Failure")) {
            return Err(AdbError::CommandFailed(line.to_string()));
        }
        Ok(())
    }

    /// Launch an activity
    pub async fn start_activity(&self, serial: &str, component: &str) -> Result<(), AdbError> {
        let output = self.shell(serial, &format!("am start -n {}", component)).await?;
        if let Some(line) = output.lines().find(|l| l.starts_with("Error")) {
            return Err(AdbError::CommandFailed(line.to_string()));
        }
        Ok(())
    }

    /// Force stop a package
    pub async fn force_stop(&self, serial: &str, package: &str) -> Result<(), AdbError> {
        self.shell(serial, &format!("am force-stop {}", package)).await?;
        Ok(())
    }
}

/// Parse `adb emu avd name` output: the name, then the console's `OK`
fn parse_avd_name(output: &str) -> Option<String> {
    output
        .lines()
        .map(str::trim)
        .find(|line| !line.is_empty() && *line != "OK")
        .map(str::to_string)
}

/// Parse `adb devices -l` output
pub fn parse_devices(output: &str) -> Vec<Device> {
    let mut devices = Vec::new();

    for line in output.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('*') || line.starts_with("List of devices") {
            continue;
        }

        let parts: Vec<&str> = line.split_whitespace().collect();
        if parts.len() < 2 {
            continue;
        }

        let serial = parts[0].to_string();
        let model = parts
            .iter()
            .skip(2)
            .find_map(|part| part.strip_prefix("model:"))
            .map(str::to_string);

        let device_type = if serial.starts_with("emulator-") {
            DeviceType::Emulator
        } else {
            DeviceType::Physical
        };

        devices.push(Device {
            serial,
            state: DeviceState::parse(parts[1]),
            device_type,
            model,
            wear: false,
        });
    }

    devices
}
