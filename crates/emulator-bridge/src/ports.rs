//! Emulator port bookkeeping
//!
//! Each AVD name keeps the console port it was first started on, so repeated
//! launches attach to the same emulator instead of spawning a second one.
//! Ports found serving some other emulator are kept out of circulation.

use std::collections::{HashMap, HashSet};

use parking_lot::Mutex;
use tracing::debug;

use crate::manager::DeviceError;
use crate::next_emulator_port;

#[derive(Debug, Default)]
struct Ports {
    by_avd: HashMap<String, u16>,
    foreign: HashSet<u16>,
}

#[derive(Debug, Default)]
pub struct PortRegistry {
    ports: Mutex<Ports>,
}

impl PortRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Port reserved for `avd_name`
    pub fn port(&self, avd_name: &str) -> Option<u16> {
        self.ports.lock().by_avd.get(avd_name).copied()
    }

    /// Reserve a port for `avd_name`, or return its existing reservation
    pub fn reserve(&self, avd_name: &str) -> Result<u16, DeviceError> {
        let mut ports = self.ports.lock();
        if let Some(port) = ports.by_avd.get(avd_name) {
            return Ok(*port);
        }
        Self::assign(&mut ports, avd_name)
    }

    /// Move `avd_name` off `taken`, which another emulator is using
    ///
    /// `taken` is not handed out again by this registry.
    pub fn relocate(&self, avd_name: &str, taken: u16) -> Result<u16, DeviceError> {
        let mut ports = self.ports.lock();
        ports.foreign.insert(taken);
        if ports.by_avd.get(avd_name) == Some(&taken) {
            ports.by_avd.remove(avd_name);
        }
        if let Some(port) = ports.by_avd.get(avd_name) {
            return Ok(*port);
        }
        Self::assign(&mut ports, avd_name)
    }

    pub fn release(&self, avd_name: &str) -> Option<u16> {
        self.ports.lock().by_avd.remove(avd_name)
    }

    fn assign(ports: &mut Ports, avd_name: &str) -> Result<u16, DeviceError> {
        let used: Vec<u16> = ports.by_avd.values().chain(ports.foreign.iter()).copied().collect();
        let port = next_emulator_port(&used).ok_or(DeviceError::NoFreePort)?;
        ports.by_avd.insert(avd_name.to_string(), port);
        debug!("Reserved port {} for {}", port, avd_name);
        Ok(port)
    }
}
