//! App installation on a resolved target

use std::sync::Arc;

use async_trait::async_trait;
use droid_deploy_core::{BuildArtifact, ComponentKind, DeployError};
use droid_deploy_toolchain::SdkStateHolder;
use tracing::info;

use crate::adb::{AdbClient, AdbError};
use crate::device::Device;

#[derive(Debug, thiserror::Error)]
pub enum InstallError {
    #[error("No Android SDK is loaded")]
    SdkMissing,
    #[error(transparent)]
    Adb(#[from] AdbError),
}

impl From<InstallError> for DeployError {
    fn from(err: InstallError) -> Self {
        match err {
            InstallError::SdkMissing => DeployError::SdkUnavailable(err.to_string()),
            InstallError::Adb(err) => DeployError::LaunchFailed(err.to_string()),
        }
    }
}

/// App started on a device
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunningApp {
    pub serial: String,
    pub package_name: String,
    pub component: ComponentKind,
}

#[async_trait]
pub trait AppInstaller: Send + Sync {
    async fn install(&self, device: &Device, artifact: &BuildArtifact) -> Result<(), InstallError>;

    /// Start the installed artifact; wallpapers and watch faces are picked on
    /// the device by the user, so they are only recorded
    async fn start(&self, device: &Device, artifact: &BuildArtifact) -> Result<RunningApp, InstallError>;

    async fn stop(&self, running: &RunningApp) -> Result<(), InstallError>;
}

/// [`AppInstaller`] over `adb`
pub struct AdbInstaller {
    holder: Arc<SdkStateHolder>,
}

impl AdbInstaller {
    pub fn new(holder: Arc<SdkStateHolder>) -> Self {
        Self { holder }
    }

    fn adb(&self) -> Result<AdbClient, InstallError> {
        let root = self.holder.sdk_root().ok_or(InstallError::SdkMissing)?;
        Ok(AdbClient::new(root))
    }
}

/// Component name of the generated launcher activity
pub fn launcher_component(package_name: &str) -> String {
    format!("{}/.MainActivity", package_name)
}

#[async_trait]
impl AppInstaller for AdbInstaller {
    async fn install(&self, device: &Device, artifact: &BuildArtifact) -> Result<(), InstallError> {
        info!("Installing {} on {}", artifact.apk.display(), device.serial);
        self.adb()?.install(&device.serial, &artifact.apk).await?;
        Ok(())
    }

    async fn start(&self, device: &Device, artifact: &BuildArtifact) -> Result<RunningApp, InstallError> {
        if artifact.component.has_launcher_activity() {
            let component = launcher_component(&artifact.package_name);
            info!("Starting {} on {}", component, device.serial);
            self.adb()?.start_activity(&device.serial, &component).await?;
        }

        Ok(RunningApp {
            serial: device.serial.clone(),
            package_name: artifact.package_name.clone(),
            component: artifact.component,
        })
    }

    async fn stop(&self, running: &RunningApp) -> Result<(), InstallError> {
        info!("Stopping {} on {}", running.package_name, running.serial);
        self.adb()?.force_stop(&running.serial, &running.package_name).await?;
        Ok(())
    }
}
