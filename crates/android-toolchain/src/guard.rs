//! SDK Acquisition Guard
//!
//! Single-flight validation of the Android SDK. The first caller of
//! [`SdkAcquisitionGuard::ensure_valid_sdk`] runs the check; callers arriving
//! while it is in flight wait for it and inherit its outcome.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use droid_deploy_core::config::AcquisitionConfig;
use droid_deploy_core::Prompter;
use parking_lot::Mutex;
use tokio::sync::watch;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::acquirer::{AcquireError, ToolchainAcquirer};
use crate::holder::SdkStateHolder;
use crate::sdk::{SdkError, SdkHandle};

/// Title of the warning shown when a known SDK folder turns out broken
pub const BROKEN_SDK_TITLE: &str = "Cannot load SDK";

/// Delay before retrying a revalidation that failed with a transient error
const TRANSIENT_RETRY_DELAY: Duration = Duration::from_millis(250);

/// Finished rounds whose outcome a late waiter can still collect
const KEPT_OUTCOMES: usize = 8;

/// Snapshot of the process-wide acquisition flags
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AcquisitionState {
    /// An acquisition round is in flight
    pub checking: bool,
    /// The user cancelled; acquisition stays suppressed until reset
    pub user_cancelled: bool,
}

#[derive(Default)]
struct GuardState {
    flags: AcquisitionState,
    round: u64,
    outcomes: VecDeque<(u64, Result<(), AcquireError>)>,
}

enum Entry {
    Lead,
    Wait(u64),
}

pub struct SdkAcquisitionGuard {
    holder: Arc<SdkStateHolder>,
    acquirer: Arc<dyn ToolchainAcquirer>,
    state: Mutex<GuardState>,
    /// Number of the last finished round
    finished: watch::Sender<u64>,
    poll_interval: Duration,
    max_wait: Duration,
}

impl SdkAcquisitionGuard {
    pub fn new(holder: Arc<SdkStateHolder>, acquirer: Arc<dyn ToolchainAcquirer>) -> Self {
        let (finished, _) = watch::channel(0);
        let defaults = AcquisitionConfig::default();
        Self {
            holder,
            acquirer,
            state: Mutex::new(GuardState::default()),
            finished,
            poll_interval: defaults.poll_interval(),
            max_wait: defaults.max_wait(),
        }
    }

    /// Apply wait bounds from configuration
    pub fn with_config(mut self, config: &AcquisitionConfig) -> Self {
        self.poll_interval = config.poll_interval();
        self.max_wait = config.max_wait();
        self
    }

    pub fn holder(&self) -> &Arc<SdkStateHolder> {
        &self.holder
    }

    pub fn state(&self) -> AcquisitionState {
        self.state.lock().flags
    }

    /// Allow acquisition again after the user cancelled it
    pub fn reset_cancellation(&self) {
        self.state.lock().flags.user_cancelled = false;
    }

    /// Make sure the holder carries a valid SDK handle
    ///
    /// Returns `Ok(())` without doing anything when `interrupt` fires while
    /// waiting on another caller's round. After a cancellation every call
    /// returns [`AcquireError::Cancelled`] until [`reset_cancellation`].
    ///
    /// [`reset_cancellation`]: SdkAcquisitionGuard::reset_cancellation
    pub async fn ensure_valid_sdk(
        &self,
        ui: &dyn Prompter,
        interrupt: &CancellationToken,
    ) -> Result<(), AcquireError> {
        let entry = {
            let mut state = self.state.lock();
            if state.flags.checking {
                Entry::Wait(state.round)
            } else if state.flags.user_cancelled {
                debug!("SDK acquisition suppressed: the user cancelled it earlier");
                return Err(AcquireError::Cancelled);
            } else {
                state.flags.checking = true;
                state.round += 1;
                Entry::Lead
            }
        };

        match entry {
            Entry::Wait(round) => self.wait_for_round(round, interrupt).await,
            Entry::Lead => {
                let mut round = RoundGuard {
                    guard: self,
                    done: false,
                };
                let outcome = self.acquire(ui).await;
                round.finish(outcome.clone());
                outcome
            }
        }
    }

    async fn acquire(&self, ui: &dyn Prompter) -> Result<(), AcquireError> {
        if let Some(current) = self.holder.get() {
            match self.revalidate(current.root()).await {
                Ok(handle) => {
                    self.publish(handle);
                    return Ok(());
                }
                Err(err) => {
                    warn!("SDK at {:?} failed revalidation: {}", current.root(), err);
                    ui.warn(
                        BROKEN_SDK_TITLE,
                        &format!(
                            "The SDK folder {} appears to be broken:\n{}\nLooking for another SDK.",
                            current.root().display(),
                            err
                        ),
                    );
                    self.holder.clear();
                }
            }
        }

        let handle = match self.acquirer.load_non_interactive().await? {
            Some(handle) => handle,
            None => {
                info!("No SDK found automatically, asking the user to locate one");
                self.acquirer.locate_interactive(ui).await?
            }
        };

        self.publish(handle);
        Ok(())
    }

    /// Transient I/O failures get one more try before the handle counts as broken
    async fn revalidate(&self, root: &std::path::Path) -> Result<SdkHandle, SdkError> {
        match self.acquirer.revalidate(root).await {
            Err(err) if err.is_transient() => {
                warn!("Transient error revalidating SDK, retrying: {}", err);
                tokio::time::sleep(TRANSIENT_RETRY_DELAY).await;
                self.acquirer.revalidate(root).await
            }
            other => other,
        }
    }

    fn publish(&self, handle: SdkHandle) {
        let handle = self.holder.replace(handle);
        info!(
            "Using Android SDK at {:?} (android-{})",
            handle.root(),
            handle.platform_api()
        );
    }

    async fn wait_for_round(
        &self,
        round: u64,
        interrupt: &CancellationToken,
    ) -> Result<(), AcquireError> {
        debug!("SDK check already in progress, waiting for it to finish");
        let mut finished = self.finished.subscribe();
        let deadline = Instant::now() + self.max_wait;

        loop {
            let done = *finished.borrow_and_update() >= round;
            if done {
                return self.outcome_of(round);
            }
            if Instant::now() >= deadline {
                warn!("Gave up waiting for the in-flight SDK check");
                return Err(AcquireError::Failed(
                    "Timed out waiting for another SDK check to finish".into(),
                ));
            }

            tokio::select! {
                _ = interrupt.cancelled() => {
                    debug!("Wait for SDK check interrupted");
                    return Ok(());
                }
                _ = finished.changed() => {}
                _ = tokio::time::sleep(self.poll_interval) => {}
            }
        }
    }

    /// Outcome of `round`, which has finished
    fn outcome_of(&self, round: u64) -> Result<(), AcquireError> {
        let kept = self
            .state
            .lock()
            .outcomes
            .iter()
            .find(|(r, _)| *r == round)
            .map(|(_, outcome)| outcome.clone());

        match kept {
            Some(outcome) => outcome,
            None if self.holder.is_present() => Ok(()),
            None => Err(AcquireError::Failed("The SDK check finished without loading an SDK".into())),
        }
    }

    fn complete(&self, outcome: Result<(), AcquireError>) {
        let round = {
            let mut state = self.state.lock();
            if matches!(outcome, Err(AcquireError::Cancelled)) {
                state.flags.user_cancelled = true;
            }
            let round = state.round;
            state.outcomes.push_back((round, outcome));
            if state.outcomes.len() > KEPT_OUTCOMES {
                state.outcomes.pop_front();
            }
            state.flags.checking = false;
            round
        };
        self.finished.send_replace(round);
    }
}

/// Clears `checking` when the leading call ends, including when its future is
/// dropped mid-flight
struct RoundGuard<'a> {
    guard: &'a SdkAcquisitionGuard,
    done: bool,
}

impl RoundGuard<'_> {
    fn finish(&mut self, outcome: Result<(), AcquireError>) {
        self.done = true;
        self.guard.complete(outcome);
    }
}

impl Drop for RoundGuard<'_> {
    fn drop(&mut self) {
        if !self.done {
            self.guard
                .complete(Err(AcquireError::Failed("SDK check was aborted".into())));
        }
    }
}
