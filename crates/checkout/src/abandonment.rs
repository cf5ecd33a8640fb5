//! Cart abandonment monitor.
//!
//! Two independent, cancellable timers scoped to the lifetime of a
//! non-empty cart:
//!
//! - the **recovery modal** fires after a configurable period of cart
//!   inactivity (default 5 minutes). The deadline re-arms on every cart
//!   mutation and the elapsed time is re-checked at fire time, so activity
//!   that lands between scheduling and firing suppresses the prompt.
//! - the **recovery banner** fires a fixed 3 minutes after the cart first
//!   becomes non-empty, independent of later activity. It fires at most
//!   once per session and stays quiet after the user dismisses it.
//!
//! Both deadlines are cancelled the moment the cart empties (checkout
//! completed, or the user removed everything) and the task is aborted on
//! teardown - a stale timer must never fire against a cart that no longer
//! exists.

use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, sleep_until};
use tracing::debug;

use crate::cart::CartObservation;

/// Fixed delay before the recovery banner fires.
pub const BANNER_DELAY: Duration = Duration::from_secs(3 * 60);

/// Default inactivity threshold for the recovery modal.
pub const DEFAULT_MODAL_DELAY: Duration = Duration::from_secs(5 * 60);

/// Far enough ahead that a disabled deadline never fires.
const FAR_FUTURE: Duration = Duration::from_secs(60 * 60 * 24 * 365);

/// Recovery prompts emitted by the monitor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoveryPrompt {
    /// Show the recovery modal (cart inactive past the threshold).
    Modal,
    /// Show the recovery banner.
    Banner,
}

/// Monitor tuning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AbandonmentSettings {
    /// Inactivity threshold for the recovery modal.
    pub modal_delay: Duration,
}

impl Default for AbandonmentSettings {
    fn default() -> Self {
        Self {
            modal_delay: DEFAULT_MODAL_DELAY,
        }
    }
}

#[derive(Debug)]
enum Command {
    DismissBanner,
    Shutdown,
}

/// Handle to the running monitor task.
///
/// Dropping the handle aborts the task, which is the teardown path when a
/// checkout session ends.
#[derive(Debug)]
pub struct AbandonmentMonitor {
    commands: mpsc::UnboundedSender<Command>,
    handle: JoinHandle<()>,
}

impl AbandonmentMonitor {
    /// Spawn the monitor over a cart observation channel. Prompts are
    /// delivered on `prompts`.
    #[must_use]
    pub fn spawn(
        observations: watch::Receiver<CartObservation>,
        settings: AbandonmentSettings,
        prompts: mpsc::UnboundedSender<RecoveryPrompt>,
    ) -> Self {
        let (commands, command_rx) = mpsc::unbounded_channel();
        let handle = tokio::spawn(run(observations, command_rx, settings, prompts));
        Self { commands, handle }
    }

    /// Record that the user dismissed the banner; it will not fire again
    /// this session.
    pub fn dismiss_banner(&self) {
        let _ = self.commands.send(Command::DismissBanner);
    }

    /// Stop the monitor. Equivalent to dropping the handle, but lets the
    /// task wind down through its own loop.
    pub fn shutdown(&self) {
        let _ = self.commands.send(Command::Shutdown);
    }
}

impl Drop for AbandonmentMonitor {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

fn deadline_or_far(deadline: Option<Instant>) -> Instant {
    deadline.unwrap_or_else(|| Instant::now() + FAR_FUTURE)
}

#[allow(clippy::cognitive_complexity)]
async fn run(
    mut observations: watch::Receiver<CartObservation>,
    mut commands: mpsc::UnboundedReceiver<Command>,
    settings: AbandonmentSettings,
    prompts: mpsc::UnboundedSender<RecoveryPrompt>,
) {
    let mut last_activity: Option<Instant> = None;
    let mut modal_deadline: Option<Instant> = None;
    let mut banner_deadline: Option<Instant> = None;
    // Fired or dismissed: either way the banner stays quiet for the session.
    let mut banner_done = false;

    // Seed from the current cart state: a cart restored non-empty from
    // storage arms both timers immediately.
    let initial = *observations.borrow_and_update();
    let mut seen_revision = initial.revision;
    let mut prev_items = initial.items;
    if initial.items > 0 {
        let now = Instant::now();
        last_activity = Some(now);
        modal_deadline = Some(now + settings.modal_delay);
        banner_deadline = Some(now + BANNER_DELAY);
    }

    loop {
        tokio::select! {
            changed = observations.changed() => {
                if changed.is_err() {
                    // Cart store dropped; nothing left to observe.
                    break;
                }
                let observed = *observations.borrow_and_update();
                let now = Instant::now();
                if observed.items == 0 {
                    // Cancel everything: a prompt must not fire against an
                    // emptied or checked-out cart.
                    last_activity = None;
                    modal_deadline = None;
                    banner_deadline = None;
                } else {
                    if observed.revision != seen_revision {
                        // New activity re-arms the modal timer.
                        last_activity = Some(now);
                        modal_deadline = Some(now + settings.modal_delay);
                    }
                    if prev_items == 0 && !banner_done {
                        // Cart just became non-empty; the banner deadline is
                        // fixed from this moment regardless of later activity.
                        banner_deadline = Some(now + BANNER_DELAY);
                    }
                }
                seen_revision = observed.revision;
                prev_items = observed.items;
            }

            Some(command) = commands.recv() => match command {
                Command::DismissBanner => {
                    banner_done = true;
                    banner_deadline = None;
                }
                Command::Shutdown => break,
            },

            () = sleep_until(deadline_or_far(modal_deadline)), if modal_deadline.is_some() => {
                modal_deadline = None;
                // Re-validate at fire time: activity may have refreshed the
                // deadline after this sleep was scheduled.
                if let Some(at) = last_activity {
                    if at.elapsed() >= settings.modal_delay {
                        debug!("cart inactive past threshold, signalling recovery modal");
                        if prompts.send(RecoveryPrompt::Modal).is_err() {
                            break;
                        }
                    } else {
                        modal_deadline = Some(at + settings.modal_delay);
                    }
                }
            }

            () = sleep_until(deadline_or_far(banner_deadline)), if banner_deadline.is_some() => {
                banner_deadline = None;
                banner_done = true;
                debug!("signalling recovery banner");
                if prompts.send(RecoveryPrompt::Banner).is_err() {
                    break;
                }
            }
        }
    }
}
