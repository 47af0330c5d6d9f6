//! Deployment Pipeline
//!
//! Builds a sketch and runs it on an emulator or an attached device.
//! Steps run strictly in order: SDK check, provisioning, build, target
//! resolution, launch. This is the one place that decides how a failure is
//! shown to the user.

use std::path::Path;
use std::sync::Arc;

use droid_deploy_build::SketchBuilder;
use droid_deploy_core::{
    BuildArtifact, BuildVariant, ComponentKind, DeployConfig, DeployError, Event, EventBus, PreferenceStore,
    Prompter, RunnerListener, Sketch,
};
use droid_deploy_emulator::{
    AppInstaller, Device, DeviceManager, PortRegistry, TargetRequest, TargetResolver, VirtualDeviceProvisioner,
};
use droid_deploy_toolchain::{SdkAcquisitionGuard, SdkStateHolder, ToolchainAcquirer};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::notify::NotificationGate;
use crate::session::SessionController;

pub const STARTING_BUILD: &str = "Starting build...";
pub const BUILDING_PROJECT: &str = "Building project...";

#[cfg(windows)]
const PATH_SEPARATOR: char = ';';
#[cfg(not(windows))]
const PATH_SEPARATOR: char = ':';

/// Everything the pipeline talks to
pub struct Collaborators {
    pub holder: Arc<SdkStateHolder>,
    pub acquirer: Arc<dyn ToolchainAcquirer>,
    pub devices: Arc<dyn DeviceManager>,
    pub builder: Arc<dyn SketchBuilder>,
    pub installer: Arc<dyn AppInstaller>,
    pub prefs: Arc<dyn PreferenceStore>,
    pub ui: Arc<dyn Prompter>,
}

pub struct DeploymentPipeline {
    guard: SdkAcquisitionGuard,
    provisioner: VirtualDeviceProvisioner,
    resolver: TargetResolver,
    builder: Arc<dyn SketchBuilder>,
    session: SessionController,
    gate: NotificationGate,
    prefs: Arc<dyn PreferenceStore>,
    ui: Arc<dyn Prompter>,
    events: Arc<EventBus>,
    interrupt: CancellationToken,
    variant: BuildVariant,
}

impl DeploymentPipeline {
    pub fn new(parts: Collaborators, config: &DeployConfig, events: Arc<EventBus>) -> Self {
        Self {
            guard: SdkAcquisitionGuard::new(parts.holder, parts.acquirer).with_config(&config.acquisition),
            provisioner: VirtualDeviceProvisioner::new(Arc::clone(&parts.devices)),
            resolver: TargetResolver::new(parts.devices, Arc::new(PortRegistry::new())),
            builder: parts.builder,
            session: SessionController::new(parts.installer, Arc::clone(&events)),
            gate: NotificationGate::new(Arc::clone(&parts.ui)),
            prefs: parts.prefs,
            ui: parts.ui,
            events,
            interrupt: CancellationToken::new(),
            variant: config.build.variant,
        }
    }

    pub fn events(&self) -> &Arc<EventBus> {
        &self.events
    }

    pub fn session(&self) -> &SessionController {
        &self.session
    }

    /// Token that aborts waits on another caller's SDK check
    pub fn interrupt_token(&self) -> CancellationToken {
        self.interrupt.clone()
    }

    /// Build `sketch` and run it on an emulator
    ///
    /// `avd` overrides the AVD remembered from the last run. Failures are
    /// reported before they are returned.
    pub async fn deploy_to_emulator(&self, sketch: &Sketch, avd: Option<&str>) -> Result<(), DeployError> {
        let result = self.run_emulator(sketch, avd).await;
        self.finish(result)
    }

    /// Build `sketch` and run it on an attached device
    ///
    /// Nothing is built when no matching device is attached. Failures are
    /// reported before they are returned.
    pub async fn deploy_to_device(&self, sketch: &Sketch) -> Result<(), DeployError> {
        let result = self.run_device(sketch).await;
        self.finish(result)
    }

    /// Stop the running sketch
    pub async fn stop(&self) {
        self.session.stop().await;
    }

    /// Make sure a valid SDK is loaded
    ///
    /// Fails when the wait on another caller's check was interrupted before
    /// any SDK was loaded.
    pub async fn ensure_sdk(&self) -> Result<(), DeployError> {
        self.guard
            .ensure_valid_sdk(self.ui.as_ref(), &self.interrupt)
            .await?;
        match self.guard.holder().sdk_root() {
            Some(root) => {
                self.events.emit(Event::SdkReady { root });
                Ok(())
            }
            None => Err(DeployError::SdkUnavailable(
                "The SDK check was interrupted before an SDK was loaded.".to_string(),
            )),
        }
    }

    /// Compile classpath for sketches: the platform's `android.jar` and `core_zip`
    ///
    /// Empty when no SDK can be loaded.
    pub async fn search_path(&self, core_zip: &Path) -> String {
        if !self.guard.holder().is_present() {
            if let Err(err) = self.ensure_sdk().await {
                warn!("SDK check for the search path failed: {}", err);
            }
        }

        match self.guard.holder().get() {
            Some(sdk) => format!("{}{}{}", sdk.android_jar().display(), PATH_SEPARATOR, core_zip.display()),
            None => {
                error!("Cannot open SDK path: no Android SDK is loaded");
                String::new()
            }
        }
    }

    /// Physical devices matching the form factor
    pub async fn attached_devices(&self, wear: bool) -> Result<Vec<Device>, DeployError> {
        self.ensure_sdk().await?;
        Ok(self.resolver.attached_devices(wear).await?)
    }

    /// The user picked a component kind for the sketch
    pub fn component_selected(&self, kind: ComponentKind) {
        self.gate.component_selected(kind);
    }

    /// Let SDK acquisition run again after the user cancelled it
    pub fn reset_user_selection(&self) {
        self.guard.reset_cancellation();
    }

    async fn run_emulator(&self, sketch: &Sketch, avd: Option<&str>) -> Result<(), DeployError> {
        self.events.start_indeterminate();
        self.ensure_sdk().await?;

        let requested = avd.map(str::to_string).or_else(|| self.prefs.last_avd());
        let provisioned = self
            .provisioner
            .ensure_emulator_ready(requested.as_deref(), sketch.wear, self.ui.as_ref())
            .await?;
        if provisioned.created {
            self.events.emit(Event::AvdCreated {
                avd_name: provisioned.name.clone(),
            });
        }
        info!("Using AVD {} ({})", provisioned.name, provisioned.image);

        self.remember_avd(&provisioned.name).await;

        let (artifact, kind) = self.build(sketch).await?;

        let request = TargetRequest::Emulator {
            avd_name: provisioned.name,
            wear: sketch.wear,
        };
        let target = self.resolver.resolve(&request).await;
        self.session.try_launch(target, &artifact, kind, true).await?;
        Ok(())
    }

    async fn run_device(&self, sketch: &Sketch) -> Result<(), DeployError> {
        self.events.start_indeterminate();
        self.ensure_sdk().await?;

        if self.resolver.attached_devices(sketch.wear).await?.is_empty() {
            info!("No devices attached, skipping build");
            return Err(DeployError::NoDevicesFound);
        }

        let (artifact, kind) = self.build(sketch).await?;

        let target = self.resolver.resolve(&TargetRequest::Physical { wear: sketch.wear }).await;
        self.session.try_launch(target, &artifact, kind, false).await?;
        self.gate.post_launch(kind);
        Ok(())
    }

    /// Store `name` as the AVD for the next run; failures are only logged
    async fn remember_avd(&self, name: &str) {
        let prefs = Arc::clone(&self.prefs);
        let avd = name.to_string();
        match tokio::task::spawn_blocking(move || prefs.set_last_avd(&avd)).await {
            Ok(Ok(())) => {}
            Ok(Err(err)) => warn!("Could not remember AVD {}: {}", name, err),
            Err(err) => warn!("Could not remember AVD {}: {}", name, err),
        }
    }

    async fn build(&self, sketch: &Sketch) -> Result<(BuildArtifact, ComponentKind), DeployError> {
        self.events.status_notice(STARTING_BUILD);
        let kind = self.builder.component_kind(sketch);

        self.events.status_notice(BUILDING_PROJECT);
        info!("Building {} ({})", sketch.name, self.variant.as_str());
        let artifact = self
            .builder
            .build(sketch, self.variant)
            .await?
            .ok_or_else(|| DeployError::BuildFailed("the build did not produce a package".to_string()))?;

        self.events.emit(Event::BuildCompleted {
            apk: artifact.apk.clone(),
        });
        Ok((artifact, kind))
    }

    fn finish(&self, result: Result<(), DeployError>) -> Result<(), DeployError> {
        if let Err(err) = &result {
            self.report(err);
        }
        self.events.stop_indeterminate();
        result
    }

    fn report(&self, err: &DeployError) {
        if err.is_cancelled() {
            info!("Deployment cancelled");
            self.events.status_notice("");
            return;
        }

        error!("Deployment failed: {}", err);
        self.events.status_error(&err.status_line());
        self.ui.warn(err.title(), &err.user_message());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use crate::testing::{installed_image, FakeDevices, Harness};
    use droid_deploy_core::{MemoryPreferences, Prompt};
    use droid_deploy_emulator::provisioner::DEFAULT_PHONE_AVD;

    #[tokio::test]
    async fn test_existing_avd_goes_straight_to_build() {
        let h = Harness::builder(FakeDevices::with_emulator().with_image(installed_image(34)).with_avd("phone1"))
            .prefs(MemoryPreferences::with_avd("phone1"))
            .finish();

        h.pipeline.deploy_to_emulator(&h.sketch, None).await.unwrap();

        assert!(h.ui.confirms().is_empty());
        assert!(!h.devices.called("download_default_image"));
        assert!(!h.devices.called("create_avd"));
        assert_eq!(h.builder.builds(), 1);
        assert_eq!(h.prefs.last_avd().as_deref(), Some("phone1"));
        assert!(h.devices.called("start_emulator phone1 5554"));
        assert_eq!(h.installer.calls(), vec!["install emulator-5554", "start emulator-5554"]);
    }

    #[tokio::test]
    async fn test_declined_image_download_cancels_silently() {
        let h = Harness::builder(FakeDevices::with_emulator())
            .answering(false)
            .finish();

        let err = h.pipeline.deploy_to_emulator(&h.sketch, None).await.unwrap_err();

        assert!(err.is_cancelled());
        assert_eq!(h.ui.confirms(), vec![Prompt::DownloadSystemImage { wear: false }]);
        assert!(!h.devices.called("create_avd"));
        assert_eq!(h.builder.builds(), 0);
        assert!(h.ui.warnings().is_empty());
        assert!(!h
            .events
            .drain()
            .iter()
            .any(|e| matches!(e, Event::StatusError(_))));
    }

    #[tokio::test]
    async fn test_no_devices_skips_build() {
        let h = Harness::builder(FakeDevices::with_emulator()).finish();

        let err = h.pipeline.deploy_to_device(&h.sketch).await.unwrap_err();

        assert!(matches!(err, DeployError::NoDevicesFound));
        assert_eq!(h.builder.builds(), 0);
        assert!(!h.devices.called("wait_for_hardware"));
        assert!(h
            .events
            .drain()
            .contains(&Event::StatusError("No devices found.".to_string())));
        assert_eq!(h.ui.warnings().len(), 1);
        assert_eq!(h.ui.warnings()[0].0, "No devices found");
    }

    #[tokio::test]
    async fn test_first_emulator_run_creates_default_avd() {
        let h = Harness::builder(FakeDevices::with_emulator()).finish();

        h.pipeline.deploy_to_emulator(&h.sketch, None).await.unwrap();

        assert_eq!(h.ui.confirms(), vec![Prompt::DownloadSystemImage { wear: false }]);
        let calls = h.devices.calls();
        let download = calls.iter().position(|c| c.starts_with("download_default_image"));
        let create = calls.iter().position(|c| c.starts_with("create_avd"));
        assert!(download < create);
        assert_eq!(h.prefs.last_avd().as_deref(), Some(DEFAULT_PHONE_AVD));
        assert!(h.events.drain().contains(&Event::AvdCreated {
            avd_name: DEFAULT_PHONE_AVD.to_string(),
        }));
    }

    #[tokio::test]
    async fn test_device_launch_shows_wallpaper_advice_once() {
        let h = Harness::builder(FakeDevices::default().with_attached(Device::physical("R58M123")))
            .component(ComponentKind::Wallpaper)
            .finish();

        h.pipeline.deploy_to_device(&h.sketch).await.unwrap();
        h.pipeline.deploy_to_device(&h.sketch).await.unwrap();

        assert_eq!(h.builder.builds(), 2);
        assert_eq!(h.ui.advice_count("Wallpaper installed"), 1);
        assert_eq!(
            h.installer.calls(),
            vec!["install R58M123", "start R58M123", "stop R58M123", "install R58M123", "start R58M123"]
        );
    }

    #[tokio::test]
    async fn test_build_phases_are_announced() {
        let h = Harness::builder(FakeDevices::default().with_attached(Device::physical("R58M123"))).finish();

        h.pipeline.deploy_to_device(&h.sketch).await.unwrap();

        let notices: Vec<String> = h
            .events
            .drain()
            .into_iter()
            .filter_map(|e| match e {
                Event::StatusNotice(text) => Some(text),
                _ => None,
            })
            .collect();
        assert_eq!(notices[0], STARTING_BUILD);
        assert_eq!(notices[1], BUILDING_PROJECT);
        assert_eq!(notices[2], "Launching processing.test.bounce on R58M123...");
    }

    #[tokio::test]
    async fn test_missing_artifact_is_a_build_failure() {
        let h = Harness::builder(FakeDevices::default().with_attached(Device::physical("R58M123")))
            .build_produces_nothing()
            .finish();

        let err = h.pipeline.deploy_to_device(&h.sketch).await.unwrap_err();

        assert!(matches!(err, DeployError::BuildFailed(_)));
        assert!(h.installer.calls().is_empty());
        let events = h.events.drain();
        assert!(events.contains(&Event::StatusError("Error while building the project.".into())));
        assert_eq!(events.last(), Some(&Event::ProgressStopped));
    }

    #[tokio::test]
    async fn test_rejected_install_is_a_launch_failure() {
        let h = Harness::builder(FakeDevices::default().with_attached(Device::physical("R58M123")))
            .component(ComponentKind::Wallpaper)
            .install_fails()
            .finish();

        let err = h.pipeline.deploy_to_device(&h.sketch).await.unwrap_err();

        assert!(matches!(err, DeployError::LaunchFailed(_)));
        let events = h.events.drain();
        assert!(events.contains(&Event::StatusError(
            "Lost connection with the device while launching.".into()
        )));
        assert_eq!(h.ui.warnings().len(), 1);
        assert_eq!(h.ui.warnings()[0].0, "Launch failed");
        assert!(h.ui.advices().is_empty());
        assert!(h.pipeline.session().active().is_none());
    }

    #[tokio::test]
    async fn test_interrupted_sdk_wait_does_not_deploy() {
        let h = Harness::builder(FakeDevices::default().with_attached(Device::physical("R58M123")))
            .sdk_search_hangs()
            .finish();

        // Another caller is still searching for the SDK
        let search = h.pipeline.ensure_sdk();
        tokio::pin!(search);
        assert!(tokio::time::timeout(Duration::ZERO, &mut search).await.is_err());

        h.pipeline.interrupt_token().cancel();
        let err = h.pipeline.deploy_to_device(&h.sketch).await.unwrap_err();

        assert!(matches!(err, DeployError::SdkUnavailable(_)));
        assert!(h.devices.calls().is_empty());
        assert_eq!(h.builder.builds(), 0);
        assert!(h.installer.calls().is_empty());
        assert_eq!(h.ui.warnings().len(), 1);
    }

    #[tokio::test]
    async fn test_missing_sdk_stops_before_provisioning() {
        let h = Harness::builder(FakeDevices::with_emulator().with_image(installed_image(34)))
            .without_sdk()
            .finish();

        let err = h.pipeline.deploy_to_emulator(&h.sketch, None).await.unwrap_err();

        // Nobody picked a folder, so the locate flow counts as cancelled
        assert!(err.is_cancelled());
        assert!(h.devices.calls().is_empty());
        assert_eq!(h.acquirer.loads(), 1);

        // Suppressed until the selection is reset
        assert!(h.pipeline.deploy_to_emulator(&h.sketch, None).await.is_err());
        assert_eq!(h.acquirer.loads(), 1);
        h.pipeline.reset_user_selection();
        assert!(h.pipeline.deploy_to_emulator(&h.sketch, None).await.is_err());
        assert_eq!(h.acquirer.loads(), 2);
    }

    #[tokio::test]
    async fn test_search_path_joins_android_jar_and_core() {
        let h = Harness::builder(FakeDevices::default()).finish();

        let path = h.pipeline.search_path(Path::new("/mode/core.zip")).await;

        let jar = Path::new("platforms").join("android-34").join("android.jar");
        assert!(path.contains(&jar.display().to_string()));
        assert!(path.ends_with(&format!("{}/mode/core.zip", PATH_SEPARATOR)));
    }

    #[tokio::test]
    async fn test_search_path_without_sdk_is_empty() {
        let h = Harness::builder(FakeDevices::default()).without_sdk().finish();
        assert_eq!(h.pipeline.search_path(Path::new("/mode/core.zip")).await, "");
    }

    #[tokio::test]
    async fn test_requested_avd_overrides_remembered_one() {
        let h = Harness::builder(
            FakeDevices::with_emulator()
                .with_image(installed_image(34))
                .with_avd("phone1")
                .with_avd("tablet"),
        )
        .prefs(MemoryPreferences::with_avd("phone1"))
        .finish();

        h.pipeline.deploy_to_emulator(&h.sketch, Some("tablet")).await.unwrap();

        assert_eq!(h.prefs.last_avd().as_deref(), Some("tablet"));
        assert!(h.devices.called("start_emulator tablet"));
    }
}
