//! SDK Manager
//!
//! Wraps the Android `sdkmanager` tool to install the emulator runtime and
//! system images.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::process::Command;
use tracing::{debug, info, warn};

/// SDK component types
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SdkComponent {
    Emulator,                                           // emulator
    SystemImage { api: u32, tag: String, abi: String }, // system-images;android-XX;tag;abi
}

impl SdkComponent {
    /// Get the SDK manager package name
    pub fn package_name(&self) -> String {
        match self {
            SdkComponent::Emulator => "emulator".to_string(),
            SdkComponent::SystemImage { api, tag, abi } => {
                format!("system-images;android-{};{};{}", api, tag, abi)
            }
        }
    }
}

/// SDK Manager errors
#[derive(Debug, thiserror::Error)]
pub enum SdkManagerError {
    #[error("SDK not found at {0}")]
    SdkNotFound(PathBuf),
    #[error("sdkmanager not found")]
    SdkManagerNotFound,
    #[error("Command failed: {0}")]
    CommandFailed(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Android SDK Manager wrapper
pub struct SdkManager {
    sdk_root: PathBuf,
    sdkmanager_path: PathBuf,
}

impl SdkManager {
    /// Create a new SDK manager
    pub fn new(sdk_root: PathBuf) -> Result<Self, SdkManagerError> {
        if !sdk_root.exists() {
            return Err(SdkManagerError::SdkNotFound(sdk_root));
        }

        let sdkmanager_path = Self::find_sdkmanager(&sdk_root)?;

        Ok(Self {
            sdk_root,
            sdkmanager_path,
        })
    }

    /// Find the sdkmanager executable
    fn find_sdkmanager(sdk_root: &Path) -> Result<PathBuf, SdkManagerError> {
        let exe_name = if cfg!(windows) { "sdkmanager.bat" } else { "sdkmanager" };

        // Try cmdline-tools/latest
        let path = sdk_root.join("cmdline-tools").join("latest").join("bin").join(exe_name);
        if path.exists() {
            return Ok(path);
        }

        // Try cmdline-tools/X.X (versioned)
        let cmdline_tools = sdk_root.join("cmdline-tools");
        if let Ok(entries) = std::fs::read_dir(&cmdline_tools) {
            for entry in entries.flatten() {
                let path = entry.path().join("bin").join(exe_name);
                if path.exists() {
                    return Ok(path);
                }
            }
        }

        // Try tools directory (legacy)
        let path = sdk_root.join("tools").join("bin").join(exe_name);
        if path.exists() {
            return Ok(path);
        }

        Err(SdkManagerError::SdkManagerNotFound)
    }

    /// Create the base command with environment variables
    fn create_command(&self) -> Command {
        let mut cmd = Command::new(&self.sdkmanager_path);
        cmd.env("ANDROID_SDK_ROOT", &self.sdk_root);
        cmd.env("ANDROID_HOME", &self.sdk_root);
        cmd
    }

    /// Accept all licenses
    pub async fn accept_licenses(&self) -> Result<(), SdkManagerError> {
        info!("Accepting Android SDK licenses...");

        let mut child = self
            .create_command()
            .arg("--licenses")
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()?;

        // Send 'y' repeatedly to accept all licenses
        if let Some(mut stdin) = child.stdin.take() {
            for _ in 0..20 {
                stdin.write_all(b"y\n").await?;
            }
        }

        let output = child.wait_with_output().await?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            warn!("License acceptance may have failed: {}", stderr);
        }

        Ok(())
    }

    /// Install SDK components
    pub async fn install(&self, components: &[SdkComponent]) -> Result<(), SdkManagerError> {
        let packages: Vec<String> = components.iter().map(|c| c.package_name()).collect();

        info!("Installing SDK packages: {:?}", packages);

        let mut cmd = self.create_command();
        cmd.args(&packages);

        let mut child = cmd
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()?;

        // Accept any prompts
        if let Some(mut stdin) = child.stdin.take() {
            for _ in 0..10 {
                stdin.write_all(b"y\n").await?;
            }
        }

        // Both pipes are drained together so neither can fill up and stall the tool
        let stdout = child.stdout.take();
        let stderr = child.stderr.take();
        let log_progress = async {
            if let Some(stdout) = stdout {
                let mut lines = BufReader::new(stdout).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    debug!("sdkmanager: {}", line);
                }
            }
        };
        let collect_errors = async {
            let mut errors = String::new();
            if let Some(mut stderr) = stderr {
                if let Err(e) = stderr.read_to_string(&mut errors).await {
                    warn!("Could not read sdkmanager errors: {}", e);
                }
            }
            errors
        };
        let ((), errors) = tokio::join!(log_progress, collect_errors);

        let status = child.wait().await?;
        if !status.success() {
            return Err(SdkManagerError::CommandFailed(format!(
                "Installation of {} failed with exit code {:?}: {}",
                packages.join(", "),
                status.code(),
                errors.trim()
            )));
        }

        info!("SDK packages installed successfully");
        Ok(())
    }

    /// Get the SDK root path
    pub fn sdk_root(&self) -> &Path {
        &self.sdk_root
    }
}
