//! Error types for droid-deploy
//!
//! Centralized error handling using thiserror. Lower crates keep their own
//! error enums; the deployment pipeline folds them into [`DeployError`].

use thiserror::Error;

/// Outcome taxonomy of a deployment attempt
#[derive(Error, Debug)]
pub enum DeployError {
    /// The user declined a prompt or cancelled a download
    #[error("Cancelled")]
    UserCancelled,

    #[error("Android SDK unavailable: {0}")]
    SdkUnavailable(String),

    #[error("Emulator unavailable: {0}")]
    EmulatorUnavailable(String),

    #[error("Virtual device provisioning failed: {0}")]
    ProvisioningFailed(String),

    #[error("No devices found")]
    NoDevicesFound,

    #[error("Build failed: {0}")]
    BuildFailed(String),

    #[error("Launch failed: {0}")]
    LaunchFailed(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),
}

/// Result type alias for droid-deploy operations
pub type Result<T> = std::result::Result<T, DeployError>;

impl DeployError {
    /// Cancellations unwind silently: the user already made the choice
    pub fn is_cancelled(&self) -> bool {
        matches!(self, DeployError::UserCancelled)
    }

    /// Dialog title for the advisory shown on failure
    pub fn title(&self) -> &'static str {
        match self {
            DeployError::UserCancelled => "Cancelled",
            DeployError::SdkUnavailable(_) => "Cannot load SDK",
            DeployError::EmulatorUnavailable(_) => "Emulator unavailable",
            DeployError::ProvisioningFailed(_) => "Cannot create emulator",
            DeployError::NoDevicesFound => "No devices found",
            DeployError::BuildFailed(_) => "Build failed",
            DeployError::LaunchFailed(_) => "Launch failed",
            DeployError::Config(_)
            | DeployError::Io(_)
            | DeployError::TomlParse(_)
            | DeployError::TomlSerialize(_) => "Configuration problem",
        }
    }

    /// Get a user-friendly error message that includes the cause
    pub fn user_message(&self) -> String {
        match self {
            DeployError::SdkUnavailable(cause) => format!(
                "The Android SDK could not be loaded.\n{}\nThe Android SDK is required to build and run sketches.",
                cause
            ),
            DeployError::EmulatorUnavailable(cause) => {
                format!("The Android emulator cannot be used: {}", cause)
            }
            DeployError::ProvisioningFailed(cause) => format!(
                "The default virtual device could not be set up: {}",
                cause
            ),
            DeployError::NoDevicesFound => {
                "No Android device is attached. Connect a device with USB debugging enabled and try again."
                    .to_string()
            }
            DeployError::BuildFailed(cause) => format!("The sketch could not be built: {}", cause),
            DeployError::LaunchFailed(cause) => {
                format!("The sketch was built but could not be started: {}", cause)
            }
            DeployError::UserCancelled => "Operation was cancelled".to_string(),
            _ => self.to_string(),
        }
    }

    /// Short text for the listener's status line
    pub fn status_line(&self) -> String {
        match self {
            DeployError::NoDevicesFound => "No devices found.".to_string(),
            DeployError::BuildFailed(_) => "Error while building the project.".to_string(),
            DeployError::LaunchFailed(_) => "Lost connection with the device while launching.".to_string(),
            DeployError::UserCancelled => String::new(),
            other => other.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cancel_is_silent() {
        let err = DeployError::UserCancelled;
        assert!(err.is_cancelled());
        assert!(err.status_line().is_empty());
        assert!(!DeployError::NoDevicesFound.is_cancelled());
    }

    #[test]
    fn test_message_includes_cause() {
        let err = DeployError::SdkUnavailable("no platforms folder".into());
        assert!(err.user_message().contains("no platforms folder"));
        assert_eq!(err.title(), "Cannot load SDK");
    }
}
