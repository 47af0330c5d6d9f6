//! Gradle Build for sketches
//!
//! Runs the sketch's Gradle wrapper and picks up the APK it produces.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;

use async_trait::async_trait;
use droid_deploy_core::{BuildArtifact, BuildVariant, ComponentKind, Sketch};
use droid_deploy_toolchain::SdkStateHolder;
use tokio::process::Command;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::{BuildError, SketchBuilder};

/// Number of output lines kept in a build failure
const FAILURE_TAIL_LINES: usize = 20;

/// Gradle build over the sketch folder's wrapper
pub struct GradleBuild {
    holder: Arc<SdkStateHolder>,
    module: String,
}

impl GradleBuild {
    pub fn new(holder: Arc<SdkStateHolder>) -> Self {
        Self {
            holder,
            module: "app".to_string(),
        }
    }

    /// Gradle module holding the application
    pub fn with_module(mut self, module: &str) -> Self {
        self.module = module.to_string();
        self
    }

    /// Get gradlew path
    fn gradlew_path(project_dir: &Path) -> PathBuf {
        let wrapper_name = if cfg!(windows) { "gradlew.bat" } else { "gradlew" };
        project_dir.join(wrapper_name)
    }

    /// Check if Gradle wrapper exists
    pub fn has_gradle_wrapper(project_dir: &Path) -> bool {
        Self::gradlew_path(project_dir).exists()
    }

    /// Folder Gradle writes `variant` APKs to
    pub fn output_dir(&self, project_dir: &Path, variant: BuildVariant) -> PathBuf {
        project_dir
            .join(&self.module)
            .join("build")
            .join("outputs")
            .join("apk")
            .join(variant.as_str())
    }
}

/// Most recently written APK under `dir`
pub fn newest_apk(dir: &Path) -> Option<PathBuf> {
    if !dir.exists() {
        return None;
    }

    WalkDir::new(dir)
        .max_depth(3)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file() && e.path().extension().map_or(false, |ext| ext == "apk"))
        .max_by_key(|e| {
            e.metadata()
                .ok()
                .and_then(|m| m.modified().ok())
                .unwrap_or(SystemTime::UNIX_EPOCH)
        })
        .map(|e| e.path().to_path_buf())
}

fn tail(output: &str, lines: usize) -> String {
    let all: Vec<&str> = output.lines().collect();
    all[all.len().saturating_sub(lines)..].join("\n")
}

#[async_trait]
impl SketchBuilder for GradleBuild {
    async fn build(&self, sketch: &Sketch, variant: BuildVariant) -> Result<Option<BuildArtifact>, BuildError> {
        let project_dir = &sketch.folder;
        if !Self::has_gradle_wrapper(project_dir) {
            return Err(BuildError::ToolchainNotFound(format!(
                "Gradle wrapper not found in {}",
                project_dir.display()
            )));
        }

        let task = format!("assemble{}", variant.gradle_task_suffix());
        info!("Building {} with Gradle ({})", sketch.name, task);

        let mut cmd = Command::new(Self::gradlew_path(project_dir));
        cmd.current_dir(project_dir).arg(&task).arg("--console=plain");

        if let Some(android_home) = self.holder.sdk_root() {
            cmd.env("ANDROID_HOME", &android_home);
            cmd.env("ANDROID_SDK_ROOT", &android_home);
        } else {
            warn!("Building without a loaded Android SDK");
        }

        debug!("Running: gradlew {} --console=plain", task);
        let output = cmd.output().await?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        for line in stdout.lines().filter(|l| l.starts_with("> Task")) {
            debug!("gradle: {}", line);
        }

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(BuildError::BuildFailed(tail(&stderr, FAILURE_TAIL_LINES)));
        }

        info!("Gradle build completed successfully");

        let Some(apk) = newest_apk(&self.output_dir(project_dir, variant)) else {
            warn!("Gradle succeeded but produced no APK");
            return Ok(None);
        };

        Ok(Some(BuildArtifact {
            apk,
            package_name: sketch.package_name.clone(),
            component: sketch.component,
            wear: sketch.wear,
            variant,
        }))
    }

    fn component_kind(&self, sketch: &Sketch) -> ComponentKind {
        sketch.component
    }
}
