//! Android Emulator Bridge
//!
//! Device management for deployments: AVDs, emulator instances, attached
//! devices, target resolution and app installation.

pub mod adb;
pub mod avd;
pub mod device;
pub mod emulator;
pub mod install;
pub mod manager;
pub mod ports;
pub mod provisioner;
pub mod resolver;

pub use adb::{AdbClient, AdbError};
pub use avd::{AvdConfig, AvdError, AvdInfo, AvdManager, SystemImage};
pub use device::{Device, DeviceState, DeviceType};
pub use emulator::{EmulatorError, EmulatorInstance, EmulatorLauncher, EmulatorOptions};
pub use install::{AdbInstaller, AppInstaller, InstallError, RunningApp};
pub use manager::{DeviceError, DeviceManager, SdkDeviceManager};
pub use ports::PortRegistry;
pub use provisioner::{ProvisionError, ProvisionedAvd, VirtualDeviceProvisioner};
pub use resolver::{ResolveError, TargetHandle, TargetRequest, TargetResolver, TargetSender};

/// Emulator console port range
pub const EMULATOR_PORT_RANGE: std::ops::Range<u16> = 5554..5584;

/// Get next available emulator port
pub fn next_emulator_port(used_ports: &[u16]) -> Option<u16> {
    EMULATOR_PORT_RANGE
        .step_by(2)
        .find(|port| !used_ports.contains(port))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_next_emulator_port() {
        assert_eq!(next_emulator_port(&[]), Some(5554));
        assert_eq!(next_emulator_port(&[5554, 5558]), Some(5556));
        let all: Vec<u16> = EMULATOR_PORT_RANGE.step_by(2).collect();
        assert_eq!(next_emulator_port(&all), None);
    }
}
