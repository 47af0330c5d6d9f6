//! Virtual Device Provisioner
//!
//! Makes sure an emulator runtime, a system image and an AVD exist before an
//! emulator deployment, downloading and creating them with the user's consent.

use std::sync::Arc;

use droid_deploy_core::{DeployError, Prompt, Prompter};
use tracing::{debug, info, warn};

use crate::manager::{DeviceError, DeviceManager};

/// AVD created when no usable phone AVD was chosen
pub const DEFAULT_PHONE_AVD: &str = "droidlaunch_phone";
/// AVD created when no usable watch AVD was chosen
pub const DEFAULT_WATCH_AVD: &str = "droidlaunch_watch";

const DEFAULT_PHONE_PROFILE: &str = "pixel_6";
const DEFAULT_WATCH_PROFILE: &str = "wearos_small_round";

#[derive(Debug, thiserror::Error)]
pub enum ProvisionError {
    #[error("Emulator setup was cancelled")]
    Cancelled,
    #[error("The emulator could not be installed: {0}")]
    EmulatorUnavailable(String),
    #[error("System image download failed: {0}")]
    DownloadFailed(String),
    #[error("Could not create the emulator {name}: {reason}")]
    CreateFailed { name: String, reason: String },
    #[error(transparent)]
    Device(#[from] DeviceError),
}

impl From<ProvisionError> for DeployError {
    fn from(err: ProvisionError) -> Self {
        match err {
            ProvisionError::Cancelled => DeployError::UserCancelled,
            ProvisionError::EmulatorUnavailable(cause) => DeployError::EmulatorUnavailable(cause),
            ProvisionError::DownloadFailed(cause) => {
                DeployError::EmulatorUnavailable(format!("the system image download failed: {}", cause))
            }
            err @ ProvisionError::CreateFailed { .. } => DeployError::ProvisioningFailed(err.to_string()),
            ProvisionError::Device(err) => DeployError::ProvisioningFailed(err.to_string()),
        }
    }
}

/// AVD ready to start
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProvisionedAvd {
    pub name: String,
    /// `system-images;android-N;tag;abi`
    pub image: String,
    /// The AVD was created by this call
    pub created: bool,
}

pub struct VirtualDeviceProvisioner {
    devices: Arc<dyn DeviceManager>,
}

impl VirtualDeviceProvisioner {
    pub fn new(devices: Arc<dyn DeviceManager>) -> Self {
        Self { devices }
    }

    /// Name of the AVD created for the form factor
    pub fn default_avd_name(wear: bool) -> &'static str {
        if wear {
            DEFAULT_WATCH_AVD
        } else {
            DEFAULT_PHONE_AVD
        }
    }

    /// Resolve the AVD to run
    ///
    /// `requested` is the AVD chosen last time, if any. Declining any prompt
    /// gives [`ProvisionError::Cancelled`].
    pub async fn ensure_emulator_ready(
        &self,
        requested: Option<&str>,
        wear: bool,
        ui: &dyn Prompter,
    ) -> Result<ProvisionedAvd, ProvisionError> {
        debug!("Checking emulator");
        if !self.devices.emulator_installed().await {
            if !ui.confirm(&Prompt::InstallEmulator) {
                info!("User declined the emulator install");
                return Err(ProvisionError::Cancelled);
            }
            self.devices
                .install_emulator()
                .await
                .map_err(|e| ProvisionError::EmulatorUnavailable(e.to_string()))?;
            self.devices
                .download_default_image(wear)
                .await
                .map_err(|e| ProvisionError::DownloadFailed(e.to_string()))?;
        }

        debug!("Checking system image");
        let images = self.devices.list_images(wear).await?;
        let image = match images.first() {
            Some(image) => image.package(),
            None => {
                if !ui.confirm(&Prompt::DownloadSystemImage { wear }) {
                    info!("User declined the system image download");
                    return Err(ProvisionError::Cancelled);
                }
                self.devices
                    .download_default_image(wear)
                    .await
                    .map_err(|e| ProvisionError::DownloadFailed(e.to_string()))?
                    .package()
            }
        };

        let requested = requested.filter(|name| !name.is_empty());
        if let Some(name) = requested {
            if self.devices.avd_exists(name).await? {
                return Ok(ProvisionedAvd {
                    name: name.to_string(),
                    image,
                    created: false,
                });
            }
            warn!("Selected AVD {} does not exist", name);
            let fallback = Prompt::FallBackToDefaultAvd {
                requested: name.to_string(),
            };
            if !ui.confirm(&fallback) {
                return Err(ProvisionError::Cancelled);
            }
        }

        let name = Self::default_avd_name(wear);
        if self.devices.avd_exists(name).await? {
            debug!("Reusing default AVD {}", name);
            return Ok(ProvisionedAvd {
                name: name.to_string(),
                image,
                created: false,
            });
        }

        info!("Creating default AVD {}", name);
        let profile = if wear {
            DEFAULT_WATCH_PROFILE
        } else {
            DEFAULT_PHONE_PROFILE
        };
        self.devices
            .create_avd(name, profile, &image)
            .await
            .map_err(|e| ProvisionError::CreateFailed {
                name: name.to_string(),
                reason: e.to_string(),
            })?;

        Ok(ProvisionedAvd {
            name: name.to_string(),
            image,
            created: true,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::avd::SystemImage;
    use crate::manager::fake::FakeDeviceManager;
    use parking_lot::Mutex;
    use std::path::PathBuf;

    /// Answers every confirmation with `answer` and records what was asked
    struct ScriptedPrompter {
        answer: bool,
        asked: Mutex<Vec<Prompt>>,
    }

    impl ScriptedPrompter {
        fn answering(answer: bool) -> Self {
            Self {
                answer,
                asked: Mutex::new(Vec::new()),
            }
        }
    }

    impl Prompter for ScriptedPrompter {
        fn confirm(&self, prompt: &Prompt) -> bool {
            self.asked.lock().push(prompt.clone());
            self.answer
        }
        fn advise(&self, _title: &str, _body: &str) {}
        fn warn(&self, _title: &str, _body: &str) {}
        fn ask_sdk_folder(&self) -> Option<PathBuf> {
            None
        }
    }

    fn installed_image() -> SystemImage {
        let mut image = SystemImage::remote(33, "google_apis", "x86_64");
        image.path = Some(PathBuf::from("/sdk/system-images/android-33/google_apis/x86_64"));
        image
    }

    fn provisioner(devices: &Arc<FakeDeviceManager>) -> VirtualDeviceProvisioner {
        VirtualDeviceProvisioner::new(devices.clone())
    }

    #[tokio::test]
    async fn test_existing_avd_and_image_need_no_prompts() {
        let devices = Arc::new(FakeDeviceManager::default().with_image(installed_image()).with_avd("phone1"));
        let ui = ScriptedPrompter::answering(false);

        let avd = provisioner(&devices)
            .ensure_emulator_ready(Some("phone1"), false, &ui)
            .await
            .unwrap();

        assert_eq!(avd.name, "phone1");
        assert_eq!(avd.image, "system-images;android-33;google_apis;x86_64");
        assert!(!avd.created);
        assert!(ui.asked.lock().is_empty());
        assert!(!devices.called("download_default_image"));
        assert!(!devices.called("create_avd"));
    }

    #[tokio::test]
    async fn test_empty_image_list_downloads_before_creating() {
        let devices = Arc::new(FakeDeviceManager::default());
        let ui = ScriptedPrompter::answering(true);

        let avd = provisioner(&devices)
            .ensure_emulator_ready(None, false, &ui)
            .await
            .unwrap();

        assert_eq!(avd.name, DEFAULT_PHONE_AVD);
        assert!(avd.created);
        let calls = devices.calls();
        let download = calls.iter().position(|c| c.starts_with("download_default_image")).unwrap();
        let create = calls.iter().position(|c| c.starts_with("create_avd")).unwrap();
        assert!(download < create);
        assert_eq!(
            calls[create],
            "create_avd droidlaunch_phone pixel_6 system-images;android-34;google_apis;x86_64"
        );
    }

    #[tokio::test]
    async fn test_declined_image_download_cancels_before_creation() {
        let devices = Arc::new(FakeDeviceManager::default());
        let ui = ScriptedPrompter::answering(false);

        let err = provisioner(&devices)
            .ensure_emulator_ready(Some("phone1"), false, &ui)
            .await
            .unwrap_err();

        assert!(matches!(err, ProvisionError::Cancelled));
        assert_eq!(*ui.asked.lock(), [Prompt::DownloadSystemImage { wear: false }]);
        assert!(!devices.called("download_default_image"));
        assert!(!devices.called("create_avd"));
    }

    #[tokio::test]
    async fn test_failed_download_is_not_a_cancellation() {
        let devices = Arc::new(FakeDeviceManager {
            fail_downloads: true,
            ..FakeDeviceManager::default()
        });
        let ui = ScriptedPrompter::answering(true);

        let err = provisioner(&devices)
            .ensure_emulator_ready(None, false, &ui)
            .await
            .unwrap_err();

        assert!(matches!(err, ProvisionError::DownloadFailed(_)));
        assert!(matches!(DeployError::from(err), DeployError::EmulatorUnavailable(_)));
    }

    #[tokio::test]
    async fn test_missing_requested_avd_falls_back_with_consent() {
        let devices = Arc::new(FakeDeviceManager::default().with_image(installed_image()));
        let ui = ScriptedPrompter::answering(true);

        let avd = provisioner(&devices)
            .ensure_emulator_ready(Some("gone"), false, &ui)
            .await
            .unwrap();

        assert_eq!(avd.name, DEFAULT_PHONE_AVD);
        assert_eq!(
            *ui.asked.lock(),
            [Prompt::FallBackToDefaultAvd {
                requested: "gone".into()
            }]
        );
    }

    #[tokio::test]
    async fn test_missing_requested_avd_declined_is_cancelled() {
        let devices = Arc::new(FakeDeviceManager::default().with_image(installed_image()));
        let ui = ScriptedPrompter::answering(false);

        let err = provisioner(&devices)
            .ensure_emulator_ready(Some("gone"), false, &ui)
            .await
            .unwrap_err();

        assert!(matches!(err, ProvisionError::Cancelled));
        assert!(!devices.called("create_avd"));
    }

    #[tokio::test]
    async fn test_missing_emulator_is_installed_with_an_image() {
        let devices = Arc::new(FakeDeviceManager::default());
        *devices.emulator_installed.lock() = false;
        let ui = ScriptedPrompter::answering(true);

        provisioner(&devices)
            .ensure_emulator_ready(None, true, &ui)
            .await
            .unwrap();

        let calls = devices.calls();
        assert_eq!(calls[0], "install_emulator");
        assert_eq!(calls[1], "download_default_image wear=true");
        assert_eq!(*ui.asked.lock(), [Prompt::InstallEmulator]);
        assert!(devices.called("create_avd droidlaunch_watch wearos_small_round"));
    }

    #[tokio::test]
    async fn test_declined_emulator_install_is_cancelled() {
        let devices = Arc::new(FakeDeviceManager::default());
        *devices.emulator_installed.lock() = false;

        let err = provisioner(&devices)
            .ensure_emulator_ready(None, false, &ScriptedPrompter::answering(false))
            .await
            .unwrap_err();

        assert!(matches!(err, ProvisionError::Cancelled));
        assert!(!devices.called("install_emulator"));
    }

    #[tokio::test]
    async fn test_create_failure_is_terminal() {
        let devices = Arc::new(FakeDeviceManager {
            fail_create: true,
            ..FakeDeviceManager::default()
        });
        devices.images.lock().push(installed_image());

        let err = provisioner(&devices)
            .ensure_emulator_ready(None, false, &ScriptedPrompter::answering(true))
            .await
            .unwrap_err();

        assert!(matches!(err, ProvisionError::CreateFailed { .. }));
    }
}
