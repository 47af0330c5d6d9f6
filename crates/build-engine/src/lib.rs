//! Sketch Build Engine
//!
//! Produces an installable artifact from a sketch folder.

pub mod gradle_build;

pub use gradle_build::GradleBuild;

use async_trait::async_trait;
use droid_deploy_core::{BuildArtifact, BuildVariant, ComponentKind, DeployError, Sketch};

/// Build errors
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("Build failed: {0}")]
    BuildFailed(String),
    #[error("Toolchain not found: {0}")]
    ToolchainNotFound(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<BuildError> for DeployError {
    fn from(err: BuildError) -> Self {
        DeployError::BuildFailed(err.to_string())
    }
}

/// Build collaborator driven by the deployment pipeline
#[async_trait]
pub trait SketchBuilder: Send + Sync {
    /// Build `sketch`; `Ok(None)` when the build ran but left no artifact
    async fn build(&self, sketch: &Sketch, variant: BuildVariant) -> Result<Option<BuildArtifact>, BuildError>;

    /// Component kind the build produces
    fn component_kind(&self, sketch: &Sketch) -> ComponentKind;
}
