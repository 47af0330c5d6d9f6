//! Device management
//!
//! [`DeviceManager`] is what provisioning and target resolution drive;
//! [`SdkDeviceManager`] implements it with the SDK's own tools.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use droid_deploy_core::config::EmulatorConfig;
use droid_deploy_toolchain::{SdkComponent, SdkManager, SdkManagerError, SdkStateHolder};
use parking_lot::Mutex;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::adb::{AdbClient, AdbError};
use crate::avd::{AvdConfig, AvdError, AvdManager, SystemImage};
use crate::device::{emulator_serial, Device};
use crate::emulator::{EmulatorError, EmulatorInstance, EmulatorLauncher, EmulatorOptions};

/// Interval between attached-device checks while waiting for hardware
const HARDWARE_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Device management errors
#[derive(Debug, thiserror::Error)]
pub enum DeviceError {
    #[error("No Android SDK is loaded")]
    SdkMissing,
    #[error("No free emulator port")]
    NoFreePort,
    #[error("Port {port} is in use by emulator {running}")]
    PortInUse { port: u16, running: String },
    #[error("Timed out waiting for {0}")]
    Timeout(String),
    #[error(transparent)]
    Adb(#[from] AdbError),
    #[error(transparent)]
    Avd(#[from] AvdError),
    #[error(transparent)]
    Emulator(#[from] EmulatorError),
    #[error(transparent)]
    SdkManager(#[from] SdkManagerError),
}

#[async_trait]
pub trait DeviceManager: Send + Sync {
    /// Whether the emulator runtime is installed
    async fn emulator_installed(&self) -> bool;

    async fn install_emulator(&self) -> Result<(), DeviceError>;

    /// Locally installed system images matching the form factor, preferred first
    async fn list_images(&self, wear: bool) -> Result<Vec<SystemImage>, DeviceError>;

    /// Download the default image for the form factor
    async fn download_default_image(&self, wear: bool) -> Result<SystemImage, DeviceError>;

    async fn avd_exists(&self, name: &str) -> Result<bool, DeviceError>;

    async fn create_avd(&self, name: &str, profile: &str, image: &str) -> Result<(), DeviceError>;

    /// Online physical devices; watches when `wearable_only`, other devices otherwise
    async fn list_attached_devices(&self, wearable_only: bool) -> Result<Vec<Device>, DeviceError>;

    /// Start `avd` on `port`, or attach to it if it is already running, and
    /// wait until it has booted
    ///
    /// Fails with [`DeviceError::PortInUse`] when `port` serves another AVD.
    async fn start_emulator(&self, avd: &str, port: u16, wear: bool) -> Result<Device, DeviceError>;

    /// Wait for a matching physical device to come online
    async fn wait_for_hardware(&self, wear: bool) -> Result<Device, DeviceError>;
}

/// Default image for the form factor
pub fn default_image(wear: bool) -> SystemImage {
    let (api, tag) = if wear { (30, "android-wear") } else { (34, "google_apis") };
    SystemImage::remote(api, tag, host_abi())
}

/// System image ABI that runs natively on this host
pub fn host_abi() -> &'static str {
    if cfg!(target_arch = "aarch64") {
        "arm64-v8a"
    } else {
        "x86_64"
    }
}

/// [`DeviceManager`] over adb, avdmanager, emulator and sdkmanager
///
/// Tool paths come from the SDK in the holder at call time.
pub struct SdkDeviceManager {
    holder: Arc<SdkStateHolder>,
    avd_home: Option<PathBuf>,
    options: EmulatorOptions,
    boot_timeout: Duration,
    instances: Mutex<HashMap<String, EmulatorInstance>>,
}

impl SdkDeviceManager {
    pub fn new(holder: Arc<SdkStateHolder>, config: &EmulatorConfig) -> Self {
        Self {
            holder,
            avd_home: None,
            options: EmulatorOptions::for_development(&config.gpu),
            boot_timeout: Duration::from_secs(config.boot_timeout_secs),
            instances: Mutex::new(HashMap::new()),
        }
    }

    /// Use `avd_home` instead of the user's AVD folder
    pub fn with_avd_home(mut self, avd_home: PathBuf) -> Self {
        self.avd_home = Some(avd_home);
        self
    }

    fn sdk_root(&self) -> Result<PathBuf, DeviceError> {
        self.holder.sdk_root().ok_or(DeviceError::SdkMissing)
    }

    fn adb(&self) -> Result<AdbClient, DeviceError> {
        Ok(AdbClient::new(self.sdk_root()?))
    }

    fn avd_manager(&self) -> Result<AvdManager, DeviceError> {
        let root = self.sdk_root()?;
        Ok(match &self.avd_home {
            Some(home) => AvdManager::with_avd_home(root, home.clone()),
            None => AvdManager::new(root),
        })
    }

    fn sdk_manager(&self) -> Result<SdkManager, DeviceError> {
        Ok(SdkManager::new(self.sdk_root()?)?)
    }

    /// Whether this process already started `avd` and it is still up
    fn owns_running(&self, avd: &str) -> bool {
        let mut instances = self.instances.lock();
        match instances.get_mut(avd).map(EmulatorInstance::is_running) {
            Some(true) => true,
            Some(false) => {
                instances.remove(avd);
                false
            }
            None => false,
        }
    }
}

#[async_trait]
impl DeviceManager for SdkDeviceManager {
    async fn emulator_installed(&self) -> bool {
        match self.sdk_root() {
            Ok(root) => EmulatorLauncher::new(root).is_available(),
            Err(_) => false,
        }
    }

    async fn install_emulator(&self) -> Result<(), DeviceError> {
        info!("Installing the Android emulator");
        let manager = self.sdk_manager()?;
        manager.accept_licenses().await?;
        manager.install(&[SdkComponent::Emulator]).await?;
        Ok(())
    }

    async fn list_images(&self, wear: bool) -> Result<Vec<SystemImage>, DeviceError> {
        let images = self.avd_manager()?.list_system_images().await?;
        Ok(images.into_iter().filter(|image| image.is_wear() == wear).collect())
    }

    async fn download_default_image(&self, wear: bool) -> Result<SystemImage, DeviceError> {
        let mut image = default_image(wear);
        let component = SdkComponent::SystemImage {
            api: image.api_level,
            tag: image.variant.clone(),
            abi: image.abi.clone(),
        };

        info!("Downloading system image {}", image.package());
        let manager = self.sdk_manager()?;
        manager.accept_licenses().await?;
        manager.install(&[component]).await?;

        let path = manager
            .sdk_root()
            .join("system-images")
            .join(format!("android-{}", image.api_level))
            .join(&image.variant)
            .join(&image.abi);
        image.path = Some(path);
        Ok(image)
    }

    async fn avd_exists(&self, name: &str) -> Result<bool, DeviceError> {
        Ok(self.avd_manager()?.avd_exists(name).await)
    }

    async fn create_avd(&self, name: &str, profile: &str, image: &str) -> Result<(), DeviceError> {
        let config = AvdConfig::new(name, profile, image);
        self.avd_manager()?.create_avd(&config).await?;
        Ok(())
    }

    async fn list_attached_devices(&self, wearable_only: bool) -> Result<Vec<Device>, DeviceError> {
        let adb = self.adb()?;
        let mut matching = Vec::new();

        for device in adb.list_devices().await? {
            if device.is_emulator() || !device.is_usable() {
                continue;
            }
            let wear = match adb.is_watch(&device.serial).await {
                Ok(wear) => wear,
                Err(e) => {
                    warn!("Could not query {}: {}", device.serial, e);
                    continue;
                }
            };
            if wear == wearable_only {
                matching.push(device.with_wear(wear));
            }
        }

        debug!("{} matching device(s) attached", matching.len());
        Ok(matching)
    }

    async fn start_emulator(&self, avd: &str, port: u16, wear: bool) -> Result<Device, DeviceError> {
        let adb = self.adb()?;
        let serial = emulator_serial(port);

        let attached = adb.list_devices().await?.iter().any(|d| d.serial == serial);
        let owned = self.owns_running(avd);
        if attached && !owned {
            let running = adb.avd_name(&serial).await?;
            if running != avd {
                warn!("{} is running {}, not {}", serial, running, avd);
                return Err(DeviceError::PortInUse { port, running });
            }
        }

        if attached || owned {
            info!("Emulator {} already running as {}", avd, serial);
        } else {
            let instance = EmulatorLauncher::new(self.sdk_root()?).launch(avd, port, &self.options)?;
            self.instances.lock().insert(avd.to_string(), instance);
        }

        info!("Waiting for {} to boot...", serial);
        match adb.wait_for_boot(&serial, self.boot_timeout).await {
            Ok(device) => Ok(device.with_wear(wear)),
            Err(AdbError::Timeout(what)) => {
                if !attached && !self.owns_running(avd) {
                    return Err(EmulatorError::Exited(avd.to_string()).into());
                }
                Err(DeviceError::Timeout(what))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn wait_for_hardware(&self, wear: bool) -> Result<Device, DeviceError> {
        let deadline = Instant::now() + self.boot_timeout;

        while Instant::now() < deadline {
            if let Some(device) = self.list_attached_devices(wear).await?.into_iter().next() {
                return Ok(device);
            }
            tokio::time::sleep(HARDWARE_POLL_INTERVAL).await;
        }

        Err(DeviceError::Timeout("a device to connect".into()))
    }
}
