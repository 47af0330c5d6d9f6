//! Emulator Launcher
//!
//! Starts Android emulator instances on a given console port.

use std::path::PathBuf;
use std::process::Stdio;

use tokio::process::{Child, Command};
use tracing::{debug, info};

/// Emulator errors
#[derive(Debug, thiserror::Error)]
pub enum EmulatorError {
    #[error("Emulator not found at {0}")]
    NotFound(PathBuf),
    #[error("Emulator for {0} exited during boot")]
    Exited(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Emulator launch options
#[derive(Debug, Clone, Default)]
pub struct EmulatorOptions {
    /// GPU mode (auto, host, swiftshader_indirect, etc.)
    pub gpu: Option<String>,
    pub no_boot_anim: bool,
    pub no_window: bool,
    /// Additional arguments
    pub extra_args: Vec<String>,
}

impl EmulatorOptions {
    /// Default options for development
    pub fn for_development(gpu: &str) -> Self {
        Self {
            gpu: Some(gpu.to_string()),
            no_boot_anim: true,
            ..Default::default()
        }
    }

    /// Convert to command line arguments
    pub fn to_args(&self) -> Vec<String> {
        let mut args = Vec::new();

        if let Some(ref gpu) = self.gpu {
            args.push("-gpu".to_string());
            args.push(gpu.clone());
        }

        if self.no_boot_anim {
            args.push("-no-boot-anim".to_string());
        }

        if self.no_window {
            args.push("-no-window".to_string());
        }

        args.extend(self.extra_args.iter().cloned());
        args
    }
}

/// Running emulator instance
pub struct EmulatorInstance {
    pub avd_name: String,
    pub port: u16,
    process: Child,
}

impl EmulatorInstance {
    /// Check if the emulator process is still running
    pub fn is_running(&mut self) -> bool {
        matches!(self.process.try_wait(), Ok(None))
    }
}

#[cfg(test)]
impl EmulatorInstance {
    pub(crate) fn from_child(avd_name: &str, port: u16, process: Child) -> Self {
        Self {
            avd_name: avd_name.to_string(),
            port,
            process,
        }
    }
}

/// Emulator launcher
pub struct EmulatorLauncher {
    sdk_path: PathBuf,
}

impl EmulatorLauncher {
    pub fn new(sdk_path: PathBuf) -> Self {
        Self { sdk_path }
    }

    /// Get the emulator executable path
    fn emulator_path(&self) -> PathBuf {
        let emulator_dir = self.sdk_path.join("emulator");
        if cfg!(windows) {
            emulator_dir.join("emulator.exe")
        } else {
            emulator_dir.join("emulator")
        }
    }

    /// Check if emulator is available
    pub fn is_available(&self) -> bool {
        self.emulator_path().exists()
    }

    /// Arguments for starting `avd_name` on `port`
    pub fn launch_args(avd_name: &str, port: u16, options: &EmulatorOptions) -> Vec<String> {
        let mut args = vec![
            "-avd".to_string(),
            avd_name.to_string(),
            "-port".to_string(),
            port.to_string(),
        ];
        args.extend(options.to_args());
        args
    }

    /// Launch an emulator; the process outlives the launcher
    pub fn launch(
        &self,
        avd_name: &str,
        port: u16,
        options: &EmulatorOptions,
    ) -> Result<EmulatorInstance, EmulatorError> {
        let emulator = self.emulator_path();

        if !emulator.exists() {
            return Err(EmulatorError::NotFound(emulator));
        }

        info!("Launching emulator {} on port {}", avd_name, port);

        let args = Self::launch_args(avd_name, port, options);
        debug!("Emulator args: {:?}", args);

        let process = Command::new(&emulator)
            .args(&args)
            .env("ANDROID_SDK_ROOT", &self.sdk_path)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()?;

        Ok(EmulatorInstance {
            avd_name: avd_name.to_string(),
            port,
            process,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_launch_args() {
        let options = EmulatorOptions::for_development("auto");
        let args = EmulatorLauncher::launch_args("phone1", 5556, &options);
        assert_eq!(
            args,
            ["-avd", "phone1", "-port", "5556", "-gpu", "auto", "-no-boot-anim"]
        );
    }

    #[test]
    fn test_missing_emulator() {
        let dir = tempfile::tempdir().unwrap();
        let launcher = EmulatorLauncher::new(dir.path().to_path_buf());
        assert!(!launcher.is_available());
        assert!(matches!(
            launcher.launch("phone1", 5554, &EmulatorOptions::default()),
            Err(EmulatorError::NotFound(_))
        ));
    }
}
