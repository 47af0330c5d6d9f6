//! Toolchain acquisition contract
//!
//! How the acquisition guard obtains an SDK handle: a quiet load, an
//! interactive locate flow, and revalidation of a known root.

use std::path::Path;

use async_trait::async_trait;
use droid_deploy_core::{DeployError, Prompter};

use crate::sdk::{SdkError, SdkHandle};

/// Acquisition failures
///
/// `Clone` so one acquisition round's outcome can be handed to every caller
/// that waited on it.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AcquireError {
    #[error("SDK search was cancelled")]
    Cancelled,
    #[error("Android SDK not found")]
    NotFound,
    #[error("{0}")]
    Failed(String),
}

impl From<SdkError> for AcquireError {
    fn from(err: SdkError) -> Self {
        AcquireError::Failed(err.to_string())
    }
}

impl From<AcquireError> for DeployError {
    fn from(err: AcquireError) -> Self {
        match err {
            AcquireError::Cancelled => DeployError::UserCancelled,
            AcquireError::NotFound => DeployError::SdkUnavailable("No Android SDK was found.".to_string()),
            AcquireError::Failed(cause) => DeployError::SdkUnavailable(cause),
        }
    }
}

#[async_trait]
pub trait ToolchainAcquirer: Send + Sync {
    /// Look for an SDK without asking the user; `Ok(None)` when none is found
    async fn load_non_interactive(&self) -> Result<Option<SdkHandle>, AcquireError>;

    /// Ask the user to locate an SDK
    async fn locate_interactive(&self, ui: &dyn Prompter) -> Result<SdkHandle, AcquireError>;

    /// Rebuild a handle from a previously validated root
    async fn revalidate(&self, root: &Path) -> Result<SdkHandle, SdkError> {
        SdkHandle::from_root(root).await
    }
}
