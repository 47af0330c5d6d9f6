//! Android Toolchain Management
//!
//! Handles the Android SDK for deployments:
//! - Validated SDK handles and the state holder that owns the current one
//! - Single-flight SDK acquisition shared by concurrent callers
//! - SDK detection and the `sdkmanager` wrapper

pub mod acquirer;
pub mod detector;
pub mod guard;
pub mod holder;
pub mod sdk;
pub mod sdk_manager;

pub use acquirer::{AcquireError, ToolchainAcquirer};
pub use detector::SdkLocator;
pub use guard::{AcquisitionState, SdkAcquisitionGuard};
pub use holder::SdkStateHolder;
pub use sdk::{SdkError, SdkHandle};
pub use sdk_manager::{SdkComponent, SdkManager, SdkManagerError};
