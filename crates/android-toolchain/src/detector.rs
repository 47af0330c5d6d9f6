//! Toolchain Detection
//!
//! Finds an existing Android SDK installation, quietly from well-known
//! locations or by asking the user for the folder.

use std::env;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use droid_deploy_core::Prompter;
use tracing::{debug, info};
use which::which;

use crate::acquirer::{AcquireError, ToolchainAcquirer};
use crate::sdk::SdkHandle;

/// SDK locator backed by the filesystem
#[derive(Debug, Clone, Default)]
pub struct SdkLocator {
    configured: Option<PathBuf>,
}

impl SdkLocator {
    /// `configured` is tried before any other candidate
    pub fn new(configured: Option<PathBuf>) -> Self {
        Self { configured }
    }

    /// SDK path candidates, most specific first
    pub fn sdk_candidates(&self) -> Vec<PathBuf> {
        let mut candidates = Vec::new();

        if let Some(path) = &self.configured {
            candidates.push(path.clone());
        }

        // Environment variable
        if let Ok(sdk_root) = env::var("ANDROID_SDK_ROOT") {
            candidates.push(PathBuf::from(sdk_root));
        }
        if let Ok(android_home) = env::var("ANDROID_HOME") {
            candidates.push(PathBuf::from(android_home));
        }

        // adb on PATH lives in <sdk>/platform-tools
        if let Ok(adb) = which("adb") {
            let adb = std::fs::canonicalize(&adb).unwrap_or(adb);
            if let Some(root) = sdk_root_from_adb(&adb) {
                candidates.push(root);
            }
        }

        // Common Windows paths
        if cfg!(windows) {
            if let Some(local) = dirs::data_local_dir() {
                candidates.push(local.join("Android").join("Sdk"));
            }
            candidates.push(PathBuf::from(r"C:\Android\sdk"));
            candidates.push(PathBuf::from(r"C:\Program Files\Android\sdk"));
        }

        // Common macOS paths
        if cfg!(target_os = "macos") {
            if let Some(home) = dirs::home_dir() {
                candidates.push(home.join("Library").join("Android").join("sdk"));
            }
        }

        // Common Unix paths
        if cfg!(unix) {
            if let Some(home) = dirs::home_dir() {
                candidates.push(home.join("Android").join("Sdk"));
                candidates.push(home.join("android-sdk"));
            }
            candidates.push(PathBuf::from("/opt/android-sdk"));
            candidates.push(PathBuf::from("/usr/local/android-sdk"));
        }

        candidates.dedup();
        candidates
    }
}

fn sdk_root_from_adb(adb: &Path) -> Option<PathBuf> {
    let platform_tools = adb.parent()?;
    if platform_tools.file_name()? != "platform-tools" {
        return None;
    }
    platform_tools.parent().map(Path::to_path_buf)
}

#[async_trait]
impl ToolchainAcquirer for SdkLocator {
    async fn load_non_interactive(&self) -> Result<Option<SdkHandle>, AcquireError> {
        info!("Detecting Android SDK...");

        for path in self.sdk_candidates() {
            match SdkHandle::from_root(&path).await {
                Ok(handle) => {
                    info!("Found Android SDK at {:?}", path);
                    return Ok(Some(handle));
                }
                Err(err) => debug!("Not an SDK: {}", err),
            }
        }

        Ok(None)
    }

    async fn locate_interactive(&self, ui: &dyn Prompter) -> Result<SdkHandle, AcquireError> {
        let folder = ui.ask_sdk_folder().ok_or(AcquireError::Cancelled)?;
        SdkHandle::from_root(&folder)
            .await
            .map_err(|err| AcquireError::Failed(format!("{} is not a usable SDK: {}", folder.display(), err)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sdk::tests::fake_sdk;
    use droid_deploy_core::Prompt;

    struct FolderPrompter(Option<PathBuf>);

    impl Prompter for FolderPrompter {
        fn confirm(&self, _prompt: &Prompt) -> bool {
            false
        }
        fn advise(&self, _title: &str, _body: &str) {}
        fn warn(&self, _title: &str, _body: &str) {}
        fn ask_sdk_folder(&self) -> Option<PathBuf> {
            self.0.clone()
        }
    }

    #[test]
    fn test_configured_path_comes_first() {
        let locator = SdkLocator::new(Some(PathBuf::from("/custom/sdk")));
        assert_eq!(locator.sdk_candidates()[0], PathBuf::from("/custom/sdk"));
    }

    #[test]
    fn test_sdk_root_from_adb() {
        let adb = Path::new("/opt/sdk/platform-tools/adb");
        assert_eq!(sdk_root_from_adb(adb), Some(PathBuf::from("/opt/sdk")));
        assert_eq!(sdk_root_from_adb(Path::new("/usr/bin/adb")), None);
    }

    #[tokio::test]
    async fn test_load_uses_configured_sdk() {
        let dir = tempfile::tempdir().unwrap();
        fake_sdk(dir.path(), &[34]);

        let locator = SdkLocator::new(Some(dir.path().to_path_buf()));
        let handle = locator.load_non_interactive().await.unwrap().unwrap();
        assert_eq!(handle.root(), dir.path());
    }

    #[tokio::test]
    async fn test_locate_cancel_and_failure() {
        let locator = SdkLocator::default();

        let cancelled = locator.locate_interactive(&FolderPrompter(None)).await;
        assert_eq!(cancelled.unwrap_err(), AcquireError::Cancelled);

        let empty = tempfile::tempdir().unwrap();
        let failed = locator
            .locate_interactive(&FolderPrompter(Some(empty.path().to_path_buf())))
            .await;
        assert!(matches!(failed, Err(AcquireError::Failed(_))));
    }
}
