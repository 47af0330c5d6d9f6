//! Device Types and State
//!
//! Represents deployment targets (physical and emulated).

use serde::{Deserialize, Serialize};

/// Device state as reported by `adb devices`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeviceState {
    /// Device is online and ready
    Online,
    /// Device is offline
    Offline,
    /// Device is not authorized (need to accept on device)
    Unauthorized,
    /// Unknown state
    Unknown,
}

impl DeviceState {
    pub fn parse(value: &str) -> Self {
        match value {
            "device" => DeviceState::Online,
            "offline" => DeviceState::Offline,
            "unauthorized" => DeviceState::Unauthorized,
            _ => DeviceState::Unknown,
        }
    }

    pub fn is_usable(&self) -> bool {
        matches!(self, DeviceState::Online)
    }
}

/// Device type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeviceType {
    /// Physical device connected via USB/WiFi
    Physical,
    /// Android emulator
    Emulator,
}

/// A connected target
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Device {
    /// Device serial number
    pub serial: String,
    pub state: DeviceState,
    pub device_type: DeviceType,
    /// Device model (e.g., "Pixel_6")
    pub model: Option<String>,
    /// Whether the device reports itself as a watch
    pub wear: bool,
}

impl Device {
    /// An online physical device
    pub fn physical(serial: &str) -> Self {
        Self {
            serial: serial.to_string(),
            state: DeviceState::Online,
            device_type: DeviceType::Physical,
            model: None,
            wear: false,
        }
    }

    /// An online emulator listening on `port`
    pub fn emulator(port: u16) -> Self {
        Self {
            serial: emulator_serial(port),
            state: DeviceState::Online,
            device_type: DeviceType::Emulator,
            model: None,
            wear: false,
        }
    }

    pub fn with_wear(mut self, wear: bool) -> Self {
        self.wear = wear;
        self
    }

    /// Check if device is online and usable
    pub fn is_usable(&self) -> bool {
        self.state.is_usable()
    }

    pub fn is_emulator(&self) -> bool {
        self.device_type == DeviceType::Emulator
    }

    /// Get display name
    pub fn display_name(&self) -> String {
        if let Some(ref model) = self.model {
            format!("{} ({})", model.replace('_', " "), self.serial)
        } else {
            self.serial.clone()
        }
    }
}

/// ADB serial of the emulator on console port `port`
pub fn emulator_serial(port: u16) -> String {
    format!("emulator-{}", port)
}
