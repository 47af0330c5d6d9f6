//! Sketch Model
//!
//! The sketch being deployed, the component kind it builds into, and the
//! artifact a build produces.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{DeployError, Result};

/// Package prefix used when a sketch does not declare its own
pub const BASE_PACKAGE: &str = "processing.test";

/// Metadata file read from the sketch folder
pub const SKETCH_FILE: &str = "sketch.toml";

/// Category of artifact being deployed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ComponentKind {
    #[default]
    App,
    Wallpaper,
    Watchface,
}

impl ComponentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ComponentKind::App => "app",
            ComponentKind::Wallpaper => "wallpaper",
            ComponentKind::Watchface => "watchface",
        }
    }

    /// Watch faces only run on wearables
    pub fn is_wear(&self) -> bool {
        matches!(self, ComponentKind::Watchface)
    }

    /// Apps have an activity to start; the others are picked by the user on
    /// the device after install
    pub fn has_launcher_activity(&self) -> bool {
        matches!(self, ComponentKind::App)
    }
}

impl std::str::FromStr for ComponentKind {
    type Err = DeployError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "app" => Ok(ComponentKind::App),
            "wallpaper" => Ok(ComponentKind::Wallpaper),
            "watchface" | "watch-face" => Ok(ComponentKind::Watchface),
            other => Err(DeployError::Config(format!("Unknown component kind: {}", other))),
        }
    }
}

/// Build variant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BuildVariant {
    #[default]
    Debug,
    Release,
}

impl BuildVariant {
    pub fn as_str(&self) -> &'static str {
        match self {
            BuildVariant::Debug => "debug",
            BuildVariant::Release => "release",
        }
    }

    pub fn gradle_task_suffix(&self) -> &'static str {
        match self {
            BuildVariant::Debug => "Debug",
            BuildVariant::Release => "Release",
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct SketchFile {
    name: Option<String>,
    package: Option<String>,
    component: Option<ComponentKind>,
    wear: Option<bool>,
}

/// A sketch folder ready to be built
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sketch {
    pub name: String,
    pub folder: PathBuf,
    pub package_name: String,
    pub component: ComponentKind,
    /// Targets a wearable (implied by watch faces)
    pub wear: bool,
}

impl Sketch {
    /// Create a sketch with default metadata derived from its folder name
    pub fn new(folder: impl Into<PathBuf>, component: ComponentKind) -> Self {
        let folder = folder.into();
        let name = folder
            .file_name()
            .and_then(|s| s.to_str())
            .unwrap_or("sketch")
            .to_string();
        Self {
            package_name: default_package(&name),
            name,
            folder,
            component,
            wear: component.is_wear(),
        }
    }

    /// Open a sketch folder, reading `sketch.toml` when present
    pub async fn open(folder: &Path) -> Result<Self> {
        if !folder.is_dir() {
            return Err(DeployError::Config(format!(
                "Sketch folder not found: {}",
                folder.display()
            )));
        }

        let mut sketch = Sketch::new(folder, ComponentKind::App);
        let meta_path = folder.join(SKETCH_FILE);
        if meta_path.exists() {
            debug!("Reading sketch metadata from {:?}", meta_path);
            let contents = tokio::fs::read_to_string(&meta_path).await?;
            let meta: SketchFile = toml::from_str(&contents)?;
            if let Some(name) = meta.name {
                sketch.package_name = default_package(&name);
                sketch.name = name;
            }
            if let Some(package) = meta.package {
                sketch.package_name = package;
            }
            if let Some(component) = meta.component {
                sketch.component = component;
            }
            sketch.wear = meta.wear.unwrap_or(false) || sketch.component.is_wear();
        }

        info!(
            "Opened sketch {} ({}, package {})",
            sketch.name,
            sketch.component.as_str(),
            sketch.package_name
        );
        Ok(sketch)
    }

    /// Override the component kind, keeping the wear flag consistent
    pub fn with_component(mut self, component: ComponentKind) -> Self {
        self.component = component;
        self.wear = self.wear || component.is_wear();
        self
    }
}

fn default_package(name: &str) -> String {
    format!("{}.{}", BASE_PACKAGE, name.to_lowercase())
}

/// Output of a successful build
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildArtifact {
    pub apk: PathBuf,
    pub package_name: String,
    pub component: ComponentKind,
    pub wear: bool,
    pub variant: BuildVariant,
}
