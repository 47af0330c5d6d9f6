//! Terminal front end
//!
//! Prompts through `dialoguer` and prints the event bus to stderr.

use std::path::PathBuf;
use std::thread::JoinHandle;

use dialoguer::{Confirm, Input};
use droid_deploy_core::{Event, EventSubscription, Prompt, Prompter};
use tracing::{debug, warn};

/// [`Prompter`] on the controlling terminal
pub struct TerminalPrompter {
    assume_yes: bool,
}

impl TerminalPrompter {
    /// With `assume_yes` every confirmation is accepted without asking
    pub fn new(assume_yes: bool) -> Self {
        Self { assume_yes }
    }
}

impl Prompter for TerminalPrompter {
    fn confirm(&self, prompt: &Prompt) -> bool {
        eprintln!("{}\n{}", prompt.title(), prompt.body());
        if self.assume_yes {
            return true;
        }

        match Confirm::new().with_prompt("Continue?").default(true).interact() {
            Ok(answer) => answer,
            Err(err) => {
                warn!("Could not read an answer: {}", err);
                false
            }
        }
    }

    fn advise(&self, title: &str, body: &str) {
        eprintln!("{}\n{}", title, body);
    }

    fn warn(&self, title: &str, body: &str) {
        eprintln!("warning: {}\n{}", title, body);
    }

    fn ask_sdk_folder(&self) -> Option<PathBuf> {
        let answer: String = match Input::new()
            .with_prompt("Android SDK folder (leave empty to cancel)")
            .allow_empty(true)
            .interact_text()
        {
            Ok(answer) => answer,
            Err(err) => {
                warn!("Could not read the SDK folder: {}", err);
                return None;
            }
        };

        let answer = answer.trim();
        if answer.is_empty() {
            None
        } else {
            Some(PathBuf::from(answer))
        }
    }
}

/// Print status lines from `events` until the bus goes away
pub fn spawn_status_printer(events: EventSubscription) -> JoinHandle<()> {
    std::thread::spawn(move || {
        for event in events.iter() {
            if let Some(line) = status_line(&event) {
                eprintln!("{}", line);
            }
        }
        debug!("Status printer finished");
    })
}

fn status_line(event: &Event) -> Option<String> {
    match event {
        Event::StatusNotice(text) if !text.is_empty() => Some(text.clone()),
        Event::StatusError(text) if !text.is_empty() => Some(format!("error: {}", text)),
        Event::SdkReady { root } => Some(format!("Using Android SDK at {}", root.display())),
        Event::AvdCreated { avd_name } => Some(format!("Created emulator {}", avd_name)),
        Event::BuildCompleted { apk } => Some(format!("Built {}", apk.display())),
        Event::LaunchStarted { serial, package } => Some(format!("{} is running on {}", package, serial)),
        _ => None,
    }
}
