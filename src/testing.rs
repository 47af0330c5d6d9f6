//! Fakes of every collaborator, for pipeline-level tests

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use droid_deploy_build::{BuildError, SketchBuilder};
use droid_deploy_core::{
    BuildArtifact, BuildVariant, ComponentKind, DeployConfig, EventBus, EventSubscription, MemoryPreferences,
    Prompt, Prompter, Sketch,
};
use droid_deploy_emulator::{
    AdbError, AppInstaller, Device, DeviceError, DeviceManager, InstallError, RunningApp, SystemImage,
};
use droid_deploy_toolchain::{AcquireError, SdkHandle, SdkStateHolder, ToolchainAcquirer};
use parking_lot::Mutex;
use tempfile::TempDir;

use crate::pipeline::{Collaborators, DeploymentPipeline};

/// Lay out the smallest folder that validates as an SDK
pub fn fake_sdk(root: &Path) {
    std::fs::create_dir_all(root.join("platform-tools")).unwrap();
    let platform = root.join("platforms").join("android-34");
    std::fs::create_dir_all(&platform).unwrap();
    std::fs::write(platform.join("android.jar"), b"jar").unwrap();
}

pub fn artifact(component: ComponentKind) -> BuildArtifact {
    BuildArtifact {
        apk: PathBuf::from("/tmp/sketch/app-debug.apk"),
        package_name: "processing.test.sketch".into(),
        component,
        wear: component.is_wear(),
        variant: BuildVariant::Debug,
    }
}

pub fn installed_image(api_level: u32) -> SystemImage {
    SystemImage {
        path: Some(PathBuf::from(format!("/sdk/system-images/android-{}/google_apis/x86_64", api_level))),
        ..SystemImage::remote(api_level, "google_apis", "x86_64")
    }
}

/// Answers every confirmation with one fixed answer and records every dialog
pub struct RecordingPrompter {
    answer: bool,
    sdk_folder: Option<PathBuf>,
    confirms: Mutex<Vec<Prompt>>,
    advices: Mutex<Vec<(String, String)>>,
    warnings: Mutex<Vec<(String, String)>>,
}

impl RecordingPrompter {
    pub fn answering(answer: bool) -> Self {
        Self {
            answer,
            sdk_folder: None,
            confirms: Mutex::new(Vec::new()),
            advices: Mutex::new(Vec::new()),
            warnings: Mutex::new(Vec::new()),
        }
    }

    pub fn confirms(&self) -> Vec<Prompt> {
        self.confirms.lock().clone()
    }

    pub fn advices(&self) -> Vec<(String, String)> {
        self.advices.lock().clone()
    }

    pub fn advice_count(&self, title: &str) -> usize {
        self.advices.lock().iter().filter(|(t, _)| t == title).count()
    }

    pub fn warnings(&self) -> Vec<(String, String)> {
        self.warnings.lock().clone()
    }
}

impl Prompter for RecordingPrompter {
    fn confirm(&self, prompt: &Prompt) -> bool {
        self.confirms.lock().push(prompt.clone());
        self.answer
    }

    fn advise(&self, title: &str, body: &str) {
        self.advices.lock().push((title.to_string(), body.to_string()));
    }

    fn warn(&self, title: &str, body: &str) {
        self.warnings.lock().push((title.to_string(), body.to_string()));
    }

    fn ask_sdk_folder(&self) -> Option<PathBuf> {
        self.sdk_folder.clone()
    }
}

/// Finds the SDK at `root` without asking, or nothing at all
pub struct FakeAcquirer {
    root: Option<PathBuf>,
    /// Never finish searching
    hang: bool,
    loads: AtomicUsize,
}

impl FakeAcquirer {
    pub fn at(root: Option<PathBuf>) -> Self {
        Self {
            root,
            hang: false,
            loads: AtomicUsize::new(0),
        }
    }

    pub fn loads(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ToolchainAcquirer for FakeAcquirer {
    async fn load_non_interactive(&self) -> Result<Option<SdkHandle>, AcquireError> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        if self.hang {
            std::future::pending::<()>().await;
        }
        match &self.root {
            Some(root) => Ok(Some(SdkHandle::from_root(root).await?)),
            None => Ok(None),
        }
    }

    async fn locate_interactive(&self, ui: &dyn Prompter) -> Result<SdkHandle, AcquireError> {
        let folder = ui.ask_sdk_folder().ok_or(AcquireError::Cancelled)?;
        Ok(SdkHandle::from_root(&folder).await?)
    }
}

#[derive(Default)]
pub struct FakeDevices {
    pub emulator_installed: bool,
    pub images: Mutex<Vec<SystemImage>>,
    pub avds: Mutex<Vec<String>>,
    pub attached: Vec<Device>,
    calls: Mutex<Vec<String>>,
}

impl FakeDevices {
    pub fn with_emulator() -> Self {
        Self {
            emulator_installed: true,
            ..Self::default()
        }
    }

    pub fn with_image(self, image: SystemImage) -> Self {
        self.images.lock().push(image);
        self
    }

    pub fn with_avd(self, name: &str) -> Self {
        self.avds.lock().push(name.to_string());
        self
    }

    pub fn with_attached(mut self, device: Device) -> Self {
        self.attached.push(device);
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }

    pub fn called(&self, prefix: &str) -> bool {
        self.calls.lock().iter().any(|c| c.starts_with(prefix))
    }

    fn record(&self, call: String) {
        self.calls.lock().push(call);
    }
}

#[async_trait]
impl DeviceManager for FakeDevices {
    async fn emulator_installed(&self) -> bool {
        self.emulator_installed
    }

    async fn install_emulator(&self) -> Result<(), DeviceError> {
        self.record("install_emulator".into());
        Ok(())
    }

    async fn list_images(&self, wear: bool) -> Result<Vec<SystemImage>, DeviceError> {
        self.record(format!("list_images {}", wear));
        Ok(self.images.lock().clone())
    }

    async fn download_default_image(&self, wear: bool) -> Result<SystemImage, DeviceError> {
        self.record(format!("download_default_image {}", wear));
        let image = installed_image(34);
        self.images.lock().push(image.clone());
        Ok(image)
    }

    async fn avd_exists(&self, name: &str) -> Result<bool, DeviceError> {
        Ok(self.avds.lock().iter().any(|avd| avd == name))
    }

    async fn create_avd(&self, name: &str, profile: &str, _image: &str) -> Result<(), DeviceError> {
        self.record(format!("create_avd {} {}", name, profile));
        self.avds.lock().push(name.to_string());
        Ok(())
    }

    async fn list_attached_devices(&self, wearable_only: bool) -> Result<Vec<Device>, DeviceError> {
        self.record(format!("list_attached_devices {}", wearable_only));
        Ok(self
            .attached
            .iter()
            .filter(|d| d.wear == wearable_only)
            .cloned()
            .collect())
    }

    async fn start_emulator(&self, avd: &str, port: u16, wear: bool) -> Result<Device, DeviceError> {
        self.record(format!("start_emulator {} {}", avd, port));
        Ok(Device::emulator(port).with_wear(wear))
    }

    async fn wait_for_hardware(&self, wear: bool) -> Result<Device, DeviceError> {
        self.record(format!("wait_for_hardware {}", wear));
        self.attached
            .iter()
            .find(|d| d.wear == wear)
            .cloned()
            .ok_or_else(|| DeviceError::Timeout("no device came online".into()))
    }
}

/// Counts builds; produces an artifact unless told otherwise
#[derive(Default)]
pub struct FakeBuilder {
    pub produce_nothing: bool,
    builds: AtomicUsize,
}

impl FakeBuilder {
    pub fn builds(&self) -> usize {
        self.builds.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SketchBuilder for FakeBuilder {
    async fn build(&self, sketch: &Sketch, variant: BuildVariant) -> Result<Option<BuildArtifact>, BuildError> {
        self.builds.fetch_add(1, Ordering::SeqCst);
        if self.produce_nothing {
            return Ok(None);
        }
        Ok(Some(BuildArtifact {
            apk: sketch.folder.join("app-debug.apk"),
            package_name: sketch.package_name.clone(),
            component: sketch.component,
            wear: sketch.wear,
            variant,
        }))
    }

    fn component_kind(&self, sketch: &Sketch) -> ComponentKind {
        sketch.component
    }
}

#[derive(Default)]
pub struct FakeInstaller {
    pub fail_install: bool,
    calls: Mutex<Vec<String>>,
}

impl FakeInstaller {
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }
}

#[async_trait]
impl AppInstaller for FakeInstaller {
    async fn install(&self, device: &Device, _artifact: &BuildArtifact) -> Result<(), InstallError> {
        self.calls.lock().push(format!("install {}", device.serial));
        if self.fail_install {
            return Err(InstallError::Adb(AdbError::CommandFailed(
                "Failure [INSTALL_FAILED_INSUFFICIENT_STORAGE]".into(),
            )));
        }
        Ok(())
    }

    async fn start(&self, device: &Device, artifact: &BuildArtifact) -> Result<RunningApp, InstallError> {
        self.calls.lock().push(format!("start {}", device.serial));
        Ok(RunningApp {
            serial: device.serial.clone(),
            package_name: artifact.package_name.clone(),
            component: artifact.component,
        })
    }

    async fn stop(&self, running: &RunningApp) -> Result<(), InstallError> {
        self.calls.lock().push(format!("stop {}", running.serial));
        Ok(())
    }
}

/// A pipeline wired to fakes, with handles on each of them
pub struct Harness {
    pub pipeline: DeploymentPipeline,
    pub acquirer: Arc<FakeAcquirer>,
    pub devices: Arc<FakeDevices>,
    pub builder: Arc<FakeBuilder>,
    pub installer: Arc<FakeInstaller>,
    pub prefs: Arc<MemoryPreferences>,
    pub ui: Arc<RecordingPrompter>,
    pub events: EventSubscription,
    pub sketch: Sketch,
    _sdk: TempDir,
}

pub struct HarnessBuilder {
    devices: FakeDevices,
    builder: FakeBuilder,
    installer: FakeInstaller,
    prefs: MemoryPreferences,
    answer: bool,
    with_sdk: bool,
    sdk_search_hangs: bool,
    component: ComponentKind,
}

impl Harness {
    pub fn builder(devices: FakeDevices) -> HarnessBuilder {
        HarnessBuilder {
            devices,
            builder: FakeBuilder::default(),
            installer: FakeInstaller::default(),
            prefs: MemoryPreferences::new(),
            answer: true,
            with_sdk: true,
            sdk_search_hangs: false,
            component: ComponentKind::App,
        }
    }
}

impl HarnessBuilder {
    pub fn answering(mut self, answer: bool) -> Self {
        self.answer = answer;
        self
    }

    pub fn prefs(mut self, prefs: MemoryPreferences) -> Self {
        self.prefs = prefs;
        self
    }

    pub fn build_produces_nothing(mut self) -> Self {
        self.builder.produce_nothing = true;
        self
    }

    pub fn install_fails(mut self) -> Self {
        self.installer.fail_install = true;
        self
    }

    pub fn without_sdk(mut self) -> Self {
        self.with_sdk = false;
        self
    }

    pub fn sdk_search_hangs(mut self) -> Self {
        self.sdk_search_hangs = true;
        self
    }

    pub fn component(mut self, component: ComponentKind) -> Self {
        self.component = component;
        self
    }

    pub fn finish(self) -> Harness {
        let sdk = tempfile::tempdir().unwrap();
        fake_sdk(sdk.path());

        let root = self.with_sdk.then(|| sdk.path().to_path_buf());
        let acquirer = Arc::new(FakeAcquirer {
            hang: self.sdk_search_hangs,
            ..FakeAcquirer::at(root)
        });
        let devices = Arc::new(self.devices);
        let builder = Arc::new(self.builder);
        let installer = Arc::new(self.installer);
        let prefs = Arc::new(self.prefs);
        let ui = Arc::new(RecordingPrompter::answering(self.answer));
        let bus = Arc::new(EventBus::new());
        let events = bus.subscribe();

        let pipeline = DeploymentPipeline::new(
            Collaborators {
                holder: Arc::new(SdkStateHolder::new()),
                acquirer: acquirer.clone(),
                devices: devices.clone(),
                builder: builder.clone(),
                installer: installer.clone(),
                prefs: prefs.clone(),
                ui: ui.clone(),
            },
            &DeployConfig::default(),
            bus,
        );

        let sketch = Sketch::new(sdk.path().join("Bounce"), self.component);

        Harness {
            pipeline,
            acquirer,
            devices,
            builder,
            installer,
            prefs,
            ui,
            events,
            sketch,
            _sdk: sdk,
        }
    }
}
