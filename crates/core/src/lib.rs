//! droid-deploy Core - shared types
//!
//! This crate provides the types every other droid-deploy crate agrees on:
//! the deployment error taxonomy, the progress listener and event bus, the
//! user-interaction contract, the sketch model and configuration.

pub mod config;
pub mod error;
pub mod events;
pub mod project;
pub mod prompt;

pub use config::{DeployConfig, FilePreferences, MemoryPreferences, PreferenceStore};
pub use error::{DeployError, Result};
pub use events::{Event, EventBus, EventSubscription, RunnerListener};
pub use project::{BuildArtifact, BuildVariant, ComponentKind, Sketch};
pub use prompt::{Prompt, Prompter};

/// droid-deploy version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name
pub const APP_NAME: &str = "droid-deploy";
