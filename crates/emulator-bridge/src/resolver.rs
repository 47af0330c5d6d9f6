//! Target Resolver
//!
//! Turns a deployment request into a [`TargetHandle`] that later yields a
//! connected, ready device.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use droid_deploy_core::DeployError;
use tokio::sync::oneshot;
use tracing::{debug, info};

use crate::device::Device;
use crate::manager::{DeviceError, DeviceManager};
use crate::ports::PortRegistry;

#[derive(Debug, thiserror::Error)]
pub enum ResolveError {
    #[error("No devices found")]
    NoDevices,
    #[error("Target resolution was cancelled")]
    Cancelled,
    #[error("Timed out waiting for the target")]
    Timeout,
    #[error(transparent)]
    Device(#[from] DeviceError),
}

impl From<ResolveError> for DeployError {
    fn from(err: ResolveError) -> Self {
        match err {
            ResolveError::NoDevices => DeployError::NoDevicesFound,
            other => DeployError::LaunchFailed(other.to_string()),
        }
    }
}

/// What to deploy to
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TargetRequest {
    Physical { wear: bool },
    Emulator { avd_name: String, wear: bool },
}

impl TargetRequest {
    pub fn wear(&self) -> bool {
        match self {
            TargetRequest::Physical { wear } | TargetRequest::Emulator { wear, .. } => *wear,
        }
    }

    pub fn is_emulator(&self) -> bool {
        matches!(self, TargetRequest::Emulator { .. })
    }
}

/// A device that may not be ready yet
///
/// Resolves exactly once; [`resolve`](TargetHandle::resolve) consumes the
/// handle. When the producing side goes away without a result the handle
/// resolves to [`ResolveError::Cancelled`].
#[derive(Debug)]
pub struct TargetHandle {
    rx: oneshot::Receiver<Result<Device, ResolveError>>,
}

/// Producing side of a [`TargetHandle`]
#[derive(Debug)]
pub struct TargetSender {
    tx: oneshot::Sender<Result<Device, ResolveError>>,
}

impl TargetSender {
    pub fn send(self, result: Result<Device, ResolveError>) {
        // The handle may already be gone; nobody is waiting then
        let _ = self.tx.send(result);
    }
}

impl TargetHandle {
    pub fn pending() -> (TargetSender, Self) {
        let (tx, rx) = oneshot::channel();
        (TargetSender { tx }, Self { rx })
    }

    pub fn ready(device: Device) -> Self {
        let (tx, handle) = Self::pending();
        tx.send(Ok(device));
        handle
    }

    pub fn failed(err: ResolveError) -> Self {
        let (tx, handle) = Self::pending();
        tx.send(Err(err));
        handle
    }

    /// Resolve with the output of `future`, run on the runtime
    pub fn spawn<F>(future: F) -> Self
    where
        F: Future<Output = Result<Device, ResolveError>> + Send + 'static,
    {
        let (tx, handle) = Self::pending();
        tokio::spawn(async move {
            tx.send(future.await);
        });
        handle
    }

    /// Wait for the target
    pub async fn resolve(self) -> Result<Device, ResolveError> {
        self.rx.await.unwrap_or(Err(ResolveError::Cancelled))
    }

    /// Wait for the target for at most `timeout`
    pub async fn resolve_within(self, timeout: Duration) -> Result<Device, ResolveError> {
        tokio::time::timeout(timeout, self.resolve())
            .await
            .unwrap_or(Err(ResolveError::Timeout))
    }
}

pub struct TargetResolver {
    devices: Arc<dyn DeviceManager>,
    ports: Arc<PortRegistry>,
}

impl TargetResolver {
    pub fn new(devices: Arc<dyn DeviceManager>, ports: Arc<PortRegistry>) -> Self {
        Self { devices, ports }
    }

    pub fn ports(&self) -> &Arc<PortRegistry> {
        &self.ports
    }

    /// Physical devices a physical request could deploy to
    pub async fn attached_devices(&self, wear: bool) -> Result<Vec<Device>, ResolveError> {
        Ok(self.devices.list_attached_devices(wear).await?)
    }

    /// Start resolving `request`
    ///
    /// A physical request with no attached device fails without starting
    /// any wait.
    pub async fn resolve(&self, request: &TargetRequest) -> TargetHandle {
        match request {
            TargetRequest::Physical { wear } => {
                let wear = *wear;
                match self.attached_devices(wear).await {
                    Ok(devices) if devices.is_empty() => TargetHandle::failed(ResolveError::NoDevices),
                    Ok(_) => {
                        let devices = Arc::clone(&self.devices);
                        TargetHandle::spawn(async move { Ok(devices.wait_for_hardware(wear).await?) })
                    }
                    Err(e) => TargetHandle::failed(e),
                }
            }
            TargetRequest::Emulator { avd_name, wear } => {
                let port = match self.ports.port(avd_name) {
                    Some(port) => port,
                    None => match self.ports.reserve(avd_name) {
                        Ok(port) => port,
                        Err(e) => return TargetHandle::failed(e.into()),
                    },
                };
                info!("Resolving emulator {} on port {}", avd_name, port);

                let devices = Arc::clone(&self.devices);
                let ports = Arc::clone(&self.ports);
                let avd_name = avd_name.clone();
                let wear = *wear;
                TargetHandle::spawn(async move {
                    let mut port = port;
                    loop {
                        match devices.start_emulator(&avd_name, port, wear).await {
                            Ok(device) => {
                                debug!("Emulator {} ready as {}", avd_name, device.serial);
                                return Ok(device);
                            }
                            // Runs out with NoFreePort once every port is taken
                            Err(DeviceError::PortInUse { port: taken, running }) => {
                                port = ports.relocate(&avd_name, taken)?;
                                info!("Port {} runs {}, moving {} to port {}", taken, running, avd_name, port);
                            }
                            Err(e) => return Err(e.into()),
                        }
                    }
                })
            }
        }
    }
}
