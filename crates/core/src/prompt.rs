//! User Interaction
//!
//! Confirmation prompts and advisory messages the deployment core asks for.
//! Front ends (terminal, GUI, tests) implement [`Prompter`].

use std::path::PathBuf;

/// Yes/no questions asked during provisioning
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Prompt {
    /// The emulator runtime is not installed
    InstallEmulator,
    /// No system image is installed locally
    DownloadSystemImage { wear: bool },
    /// The AVD chosen last time no longer exists
    FallBackToDefaultAvd { requested: String },
}

impl Prompt {
    pub fn title(&self) -> &'static str {
        match self {
            Prompt::InstallEmulator => "Emulator not found",
            Prompt::DownloadSystemImage { .. } => "No system image found",
            Prompt::FallBackToDefaultAvd { .. } => "Selected emulator not found",
        }
    }

    pub fn body(&self) -> String {
        match self {
            Prompt::InstallEmulator => {
                "The Android emulator does not appear to be installed.\nDo you want to download and install it now?"
                    .to_string()
            }
            Prompt::DownloadSystemImage { wear: true } => {
                "A Wear OS system image is required to create the emulator.\nDo you want to download it now?"
                    .to_string()
            }
            Prompt::DownloadSystemImage { wear: false } => {
                "A system image is required to create the emulator.\nDo you want to download it now?"
                    .to_string()
            }
            Prompt::FallBackToDefaultAvd { requested } => format!(
                "The emulator \"{}\" could not be found.\nDo you want to use the default emulator instead?",
                requested
            ),
        }
    }
}

/// Front-end contract for dialogs
pub trait Prompter: Send + Sync {
    /// Ask a yes/no question; `true` means yes
    fn confirm(&self, prompt: &Prompt) -> bool;

    /// Show an informational advisory
    fn advise(&self, title: &str, body: &str);

    /// Show a warning
    fn warn(&self, title: &str, body: &str);

    /// Ask the user where the Android SDK lives; `None` when they cancel
    fn ask_sdk_folder(&self) -> Option<PathBuf>;
}
