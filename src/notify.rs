//! One-shot advisories
//!
//! Some advisories are only worth reading once. [`NotificationGate`] shows
//! each category at most once for its own lifetime.

use std::sync::Arc;

use droid_deploy_core::{ComponentKind, Prompter};
use parking_lot::Mutex;
use tracing::debug;

/// Guide for debugging a watch face over Bluetooth
pub const WATCH_FACE_DEBUG_URL: &str = "https://developer.android.com/training/wearables/apps/debugging.html";

/// Advisory categories shown at most once
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Advisory {
    WatchFaceDebug,
    WallpaperInstalled,
    WatchFaceInstalled,
}

impl Advisory {
    pub fn title(&self) -> &'static str {
        match self {
            Advisory::WatchFaceDebug => "Debugging a watch face",
            Advisory::WallpaperInstalled => "Wallpaper installed",
            Advisory::WatchFaceInstalled => "Watch face installed",
        }
    }

    pub fn body(&self) -> String {
        match self {
            Advisory::WatchFaceDebug => format!(
                "Watch faces run on the watch paired with your phone.\n\
                 Enable Bluetooth debugging on both devices before running the sketch.\n\
                 See {} for the steps.",
                WATCH_FACE_DEBUG_URL
            ),
            Advisory::WallpaperInstalled => "The wallpaper was installed on the device.\n\
                 Open the wallpaper picker on the device and select it to see it running."
                .to_string(),
            Advisory::WatchFaceInstalled => "The watch face was installed on the watch.\n\
                 Long-press the current watch face and select the new one to see it running."
                .to_string(),
        }
    }
}

/// Per-category "already shown" flags
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NotificationFlags {
    pub watch_face_debug: bool,
    pub wallpaper_installed: bool,
    pub watch_face_installed: bool,
}

impl NotificationFlags {
    fn slot(&mut self, advisory: Advisory) -> &mut bool {
        match advisory {
            Advisory::WatchFaceDebug => &mut self.watch_face_debug,
            Advisory::WallpaperInstalled => &mut self.wallpaper_installed,
            Advisory::WatchFaceInstalled => &mut self.watch_face_installed,
        }
    }
}

pub struct NotificationGate {
    ui: Arc<dyn Prompter>,
    flags: Mutex<NotificationFlags>,
}

impl NotificationGate {
    pub fn new(ui: Arc<dyn Prompter>) -> Self {
        Self {
            ui,
            flags: Mutex::new(NotificationFlags::default()),
        }
    }

    pub fn flags(&self) -> NotificationFlags {
        *self.flags.lock()
    }

    /// Show `advisory` unless it was shown before; returns whether it was shown
    pub fn show_once(&self, advisory: Advisory) -> bool {
        {
            let mut flags = self.flags.lock();
            let shown = flags.slot(advisory);
            if *shown {
                debug!("Advisory {:?} already shown", advisory);
                return false;
            }
            *shown = true;
        }
        self.ui.advise(advisory.title(), &advisory.body());
        true
    }

    /// A component kind was picked for the sketch
    pub fn component_selected(&self, kind: ComponentKind) {
        if kind == ComponentKind::Watchface {
            self.show_once(Advisory::WatchFaceDebug);
        }
    }

    /// A sketch of `kind` was launched on a physical device
    pub fn post_launch(&self, kind: ComponentKind) {
        match kind {
            ComponentKind::Wallpaper => {
                self.show_once(Advisory::WallpaperInstalled);
            }
            ComponentKind::Watchface => {
                self.show_once(Advisory::WatchFaceInstalled);
            }
            ComponentKind::App => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::RecordingPrompter;

    #[test]
    fn test_each_category_fires_once() {
        let ui = Arc::new(RecordingPrompter::answering(true));
        let gate = NotificationGate::new(ui.clone());

        for _ in 0..3 {
            gate.post_launch(ComponentKind::Wallpaper);
            gate.post_launch(ComponentKind::Watchface);
            gate.post_launch(ComponentKind::App);
        }

        assert_eq!(ui.advice_count("Wallpaper installed"), 1);
        assert_eq!(ui.advice_count("Watch face installed"), 1);
        assert_eq!(ui.advices().len(), 2);
        assert!(!gate.flags().watch_face_debug);
    }

    #[test]
    fn test_watch_face_selection_links_debug_guide() {
        let ui = Arc::new(RecordingPrompter::answering(true));
        let gate = NotificationGate::new(ui.clone());

        gate.component_selected(ComponentKind::App);
        assert!(ui.advices().is_empty());

        gate.component_selected(ComponentKind::Watchface);
        gate.component_selected(ComponentKind::Watchface);

        let advices = ui.advices();
        assert_eq!(advices.len(), 1);
        assert!(advices[0].1.contains(WATCH_FACE_DEBUG_URL));
    }

    #[test]
    fn test_gates_do_not_share_flags() {
        let ui = Arc::new(RecordingPrompter::answering(true));
        let first = NotificationGate::new(ui.clone());
        let second = NotificationGate::new(ui.clone());

        assert!(first.show_once(Advisory::WallpaperInstalled));
        assert!(!first.show_once(Advisory::WallpaperInstalled));
        assert!(second.show_once(Advisory::WallpaperInstalled));
    }
}
