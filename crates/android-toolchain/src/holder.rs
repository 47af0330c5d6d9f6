//! SDK State Holder
//!
//! The one place the current SDK handle lives. Readers get a shared
//! snapshot; writers swap the whole handle under the lock.

use std::path::PathBuf;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::debug;

use crate::sdk::SdkHandle;

/// Holds the validated SDK handle, if any
#[derive(Default)]
pub struct SdkStateHolder {
    current: RwLock<Option<Arc<SdkHandle>>>,
}

impl SdkStateHolder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Holder pre-loaded with a handle
    pub fn with_handle(handle: SdkHandle) -> Self {
        Self {
            current: RwLock::new(Some(Arc::new(handle))),
        }
    }

    /// Current handle snapshot
    pub fn get(&self) -> Option<Arc<SdkHandle>> {
        self.current.read().clone()
    }

    /// Root of the current SDK
    pub fn sdk_root(&self) -> Option<PathBuf> {
        self.current.read().as_ref().map(|h| h.root().to_path_buf())
    }

    pub fn is_present(&self) -> bool {
        self.current.read().is_some()
    }

    /// Swap in a new handle and return the shared copy
    pub fn replace(&self, handle: SdkHandle) -> Arc<SdkHandle> {
        let handle = Arc::new(handle);
        *self.current.write() = Some(Arc::clone(&handle));
        debug!("SDK handle replaced: {:?}", handle.root());
        handle
    }

    /// Discard the current handle
    pub fn clear(&self) {
        if self.current.write().take().is_some() {
            debug!("SDK handle discarded");
        }
    }
}
