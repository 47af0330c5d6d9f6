//! Session Controller
//!
//! Owns the one running sketch. A launch waits for its target, installs the
//! artifact and starts it; a new launch tears the previous session down.

use std::sync::Arc;

use droid_deploy_core::{BuildArtifact, ComponentKind, DeployError, Event, EventBus, RunnerListener};
use droid_deploy_emulator::{AppInstaller, Device, InstallError, ResolveError, RunningApp, TargetHandle};
use parking_lot::Mutex;
use tracing::{debug, info, warn};

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error(transparent)]
    Target(#[from] ResolveError),
    #[error(transparent)]
    Install(#[from] InstallError),
}

impl From<SessionError> for DeployError {
    fn from(err: SessionError) -> Self {
        match err {
            SessionError::Target(err) => err.into(),
            SessionError::Install(err) => err.into(),
        }
    }
}

pub struct SessionController {
    installer: Arc<dyn AppInstaller>,
    events: Arc<EventBus>,
    active: Mutex<Option<RunningApp>>,
    /// Serializes launches so only one can claim the active slot
    launching: tokio::sync::Mutex<()>,
}

impl SessionController {
    pub fn new(installer: Arc<dyn AppInstaller>, events: Arc<EventBus>) -> Self {
        Self {
            installer,
            events,
            active: Mutex::new(None),
            launching: tokio::sync::Mutex::new(()),
        }
    }

    /// The running sketch, if any
    pub fn active(&self) -> Option<RunningApp> {
        self.active.lock().clone()
    }

    /// Launch and report failures on the status line; returns whether the
    /// sketch is running
    pub async fn launch(
        &self,
        target: TargetHandle,
        artifact: &BuildArtifact,
        kind: ComponentKind,
        is_emulator: bool,
    ) -> bool {
        match self.try_launch(target, artifact, kind, is_emulator).await {
            Ok(_) => true,
            Err(err) => {
                warn!("Launch failed: {}", err);
                self.events.status_error(&DeployError::from(err).status_line());
                false
            }
        }
    }

    /// Wait for `target`, then install and start `artifact` on it
    pub async fn try_launch(
        &self,
        target: TargetHandle,
        artifact: &BuildArtifact,
        kind: ComponentKind,
        is_emulator: bool,
    ) -> Result<RunningApp, SessionError> {
        let _launching = self.launching.lock().await;
        self.teardown().await;

        let device = target.resolve().await?;
        self.events.emit(Event::TargetReady {
            serial: device.serial.clone(),
        });

        self.events
            .status_notice(&format!("Launching {} on {}...", artifact.package_name, target_label(&device, is_emulator)));
        info!("Launching {} ({}) on {}", artifact.package_name, kind.as_str(), device.serial);

        self.installer.install(&device, artifact).await?;
        let running = self.installer.start(&device, artifact).await?;

        *self.active.lock() = Some(running.clone());
        self.events.emit(Event::LaunchStarted {
            serial: running.serial.clone(),
            package: running.package_name.clone(),
        });
        Ok(running)
    }

    /// End the active session, if any
    ///
    /// Always clears the status line and the progress indicator.
    pub async fn stop(&self) {
        self.teardown().await;
        self.events.status_notice("");
        self.events.stop_indeterminate();
    }

    async fn teardown(&self) {
        let Some(running) = self.active.lock().take() else {
            return;
        };

        debug!("Stopping session on {}", running.serial);
        if let Err(err) = self.installer.stop(&running).await {
            warn!("Could not stop {} on {}: {}", running.package_name, running.serial, err);
        }
        self.events.emit(Event::LaunchStopped);
    }
}

fn target_label(device: &Device, is_emulator: bool) -> String {
    if is_emulator {
        "the emulator".to_string()
    } else {
        device.display_name()
    }
}
