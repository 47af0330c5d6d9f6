//! Event System
//!
//! Progress/status listener contract and a pub/sub event bus implementing it.

use std::path::PathBuf;

use crossbeam_channel::{unbounded, Receiver, Sender};
use parking_lot::RwLock;
use tracing::debug;

/// Progress and status sink for a running deployment
pub trait RunnerListener: Send + Sync {
    /// Show an indeterminate progress indicator
    fn start_indeterminate(&self);
    /// Hide the progress indicator
    fn stop_indeterminate(&self);
    /// Replace the status line with an informational notice
    fn status_notice(&self, text: &str);
    /// Replace the status line with an error
    fn status_error(&self, text: &str);
}

/// Events emitted while deploying a sketch
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    ProgressStarted,
    ProgressStopped,
    StatusNotice(String),
    StatusError(String),
    /// A validated SDK was stored in the state holder
    SdkReady { root: PathBuf },
    /// A default virtual device was created
    AvdCreated { avd_name: String },
    /// The build collaborator produced an artifact
    BuildCompleted { apk: PathBuf },
    /// The target handle resolved to a connected device
    TargetReady { serial: String },
    /// The artifact is running on the device
    LaunchStarted { serial: String, package: String },
    /// The active session was torn down
    LaunchStopped,
}

/// Subscriber handle for receiving events
#[derive(Clone)]
pub struct EventSubscription {
    receiver: Receiver<Event>,
}

impl EventSubscription {
    /// Drain everything received so far
    pub fn drain(&self) -> Vec<Event> {
        self.receiver.try_iter().collect()
    }

    /// Get an iterator over events
    pub fn iter(&self) -> impl Iterator<Item = Event> + '_ {
        self.receiver.iter()
    }
}

/// Event bus for publish/subscribe pattern
pub struct EventBus {
    subscribers: RwLock<Vec<Sender<Event>>>,
}

impl EventBus {
    /// Create a new event bus
    pub fn new() -> Self {
        Self {
            subscribers: RwLock::new(Vec::new()),
        }
    }

    /// Subscribe to events
    pub fn subscribe(&self) -> EventSubscription {
        let (sender, receiver) = unbounded();
        self.subscribers.write().push(sender);
        EventSubscription { receiver }
    }

    /// Emit an event to all subscribers
    pub fn emit(&self, event: Event) -> usize {
        let subscribers = self.subscribers.read();
        let mut delivered = 0;

        for sender in subscribers.iter() {
            if sender.send(event.clone()).is_ok() {
                delivered += 1;
            }
        }

        debug!("Event {:?} delivered to {} subscribers", event, delivered);
        delivered
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl RunnerListener for EventBus {
    fn start_indeterminate(&self) {
        self.emit(Event::ProgressStarted);
    }

    fn stop_indeterminate(&self) {
        self.emit(Event::ProgressStopped);
    }

    fn status_notice(&self, text: &str) {
        self.emit(Event::StatusNotice(text.to_string()));
    }

    fn status_error(&self, text: &str) {
        self.emit(Event::StatusError(text.to_string()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_bus() {
        let bus = EventBus::new();
        let sub1 = bus.subscribe();
        let sub2 = bus.subscribe();

        assert_eq!(bus.emit(Event::LaunchStopped), 2);
        assert_eq!(sub1.drain(), vec![Event::LaunchStopped]);
        assert_eq!(sub2.drain(), vec![Event::LaunchStopped]);

        drop(sub2);
        assert_eq!(bus.emit(Event::LaunchStopped), 1);
    }

    #[test]
    fn test_listener_calls_become_events() {
        let bus = EventBus::new();
        let sub = bus.subscribe();

        bus.start_indeterminate();
        bus.status_notice("Building project...");
        bus.status_error("No devices found.");
        bus.stop_indeterminate();

        assert_eq!(
            sub.drain(),
            vec![
                Event::ProgressStarted,
                Event::StatusNotice("Building project...".into()),
                Event::StatusError("No devices found.".into()),
                Event::ProgressStopped,
            ]
        );
    }
}
