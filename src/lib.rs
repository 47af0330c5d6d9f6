//! droid-deploy - build and run Android sketches
//!
//! Takes a sketch from source to a running app on an emulator or an attached
//! device: makes sure an Android SDK is available, provisions a virtual
//! device when needed, builds the sketch, waits for the target and launches
//! it there.
//!
//! ## Architecture
//!
//! - `droid-deploy-core`: error taxonomy, events, prompts, sketch model and configuration
//! - `droid-deploy-toolchain`: SDK validation and single-flight acquisition
//! - `droid-deploy-emulator`: devices, AVD provisioning, target resolution and install
//! - `droid-deploy-build`: the Gradle build collaborator
//!
//! This crate ties them together in [`DeploymentPipeline`].

#![warn(clippy::all)]

pub mod console;
pub mod notify;
pub mod pipeline;
pub mod session;

#[cfg(test)]
mod testing;

pub use droid_deploy_build as build;
pub use droid_deploy_core as core;
pub use droid_deploy_emulator as emulator;
pub use droid_deploy_toolchain as toolchain;

pub use notify::{Advisory, NotificationFlags, NotificationGate};
pub use pipeline::{Collaborators, DeploymentPipeline};
pub use session::{SessionController, SessionError};
