//! SDK Handle
//!
//! A validated Android SDK installation and the tool paths derived from it.

use std::io;
use std::path::{Path, PathBuf};

use tracing::debug;

/// SDK validation errors
#[derive(Debug, thiserror::Error)]
pub enum SdkError {
    #[error("SDK folder not found: {0}")]
    NotFound(PathBuf),
    #[error("Invalid SDK at {path}: {reason}")]
    Corrupt { path: PathBuf, reason: String },
    #[error("IO error reading SDK: {0}")]
    Io(#[from] io::Error),
}

impl SdkError {
    /// Whether retrying the same check could succeed without user action
    pub fn is_transient(&self) -> bool {
        match self {
            SdkError::Io(e) => matches!(
                e.kind(),
                io::ErrorKind::PermissionDenied
                    | io::ErrorKind::Interrupted
                    | io::ErrorKind::WouldBlock
                    | io::ErrorKind::TimedOut
            ),
            _ => false,
        }
    }

    fn corrupt(path: &Path, reason: &str) -> Self {
        SdkError::Corrupt {
            path: path.to_path_buf(),
            reason: reason.to_string(),
        }
    }
}

/// A validated Android SDK installation
///
/// Built only through [`SdkHandle::from_root`]; a handle never changes after
/// construction. Stale handles are replaced by revalidating from [`root`].
///
/// [`root`]: SdkHandle::root
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SdkHandle {
    root: PathBuf,
    platform_api: u32,
    platform_jar: PathBuf,
    platform_tools: PathBuf,
    build_tools: Option<PathBuf>,
}

impl SdkHandle {
    /// Validate the SDK installed at `root`
    ///
    /// Requires `platform-tools/` and at least one
    /// `platforms/android-N/android.jar`; the highest N wins.
    pub async fn from_root(root: &Path) -> Result<Self, SdkError> {
        if !root.is_dir() {
            return Err(SdkError::NotFound(root.to_path_buf()));
        }

        let platform_tools = root.join("platform-tools");
        if !platform_tools.is_dir() {
            return Err(SdkError::corrupt(root, "platform-tools folder is missing"));
        }

        let platforms_dir = root.join("platforms");
        if !platforms_dir.is_dir() {
            return Err(SdkError::corrupt(root, "platforms folder is missing"));
        }

        let mut best: Option<(u32, PathBuf)> = None;
        let mut entries = tokio::fs::read_dir(&platforms_dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name();
            let Some(api) = name
                .to_str()
                .and_then(|n| n.strip_prefix("android-"))
                .and_then(|v| v.parse::<u32>().ok())
            else {
                continue;
            };
            let jar = entry.path().join("android.jar");
            if jar.is_file() && best.as_ref().map_or(true, |(b, _)| api > *b) {
                best = Some((api, jar));
            }
        }

        let (platform_api, platform_jar) =
            best.ok_or_else(|| SdkError::corrupt(root, "no platform with android.jar installed"))?;

        let build_tools = latest_build_tools(&root.join("build-tools")).await?;

        debug!(
            "Validated SDK at {:?} (platform android-{})",
            root, platform_api
        );

        Ok(Self {
            root: root.to_path_buf(),
            platform_api,
            platform_jar,
            platform_tools,
            build_tools,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Platform library used on the compile classpath
    pub fn android_jar(&self) -> &Path {
        &self.platform_jar
    }

    pub fn platform_api(&self) -> u32 {
        self.platform_api
    }

    pub fn platform_tools(&self) -> &Path {
        &self.platform_tools
    }

    pub fn build_tools(&self) -> Option<&Path> {
        self.build_tools.as_deref()
    }

    /// Folder holding the emulator runtime
    pub fn emulator_dir(&self) -> PathBuf {
        self.root.join("emulator")
    }
}

async fn latest_build_tools(dir: &Path) -> Result<Option<PathBuf>, SdkError> {
    if !dir.is_dir() {
        return Ok(None);
    }

    let mut versions: Vec<(Vec<u32>, PathBuf)> = Vec::new();
    let mut entries = tokio::fs::read_dir(dir).await?;
    while let Some(entry) = entries.next_entry().await? {
        if !entry.path().is_dir() {
            continue;
        }
        if let Some(name) = entry.file_name().to_str() {
            let parts: Vec<u32> = name.split('.').filter_map(|p| p.parse().ok()).collect();
            if !parts.is_empty() {
                versions.push((parts, entry.path()));
            }
        }
    }

    versions.sort();
    Ok(versions.pop().map(|(_, path)| path))
}
