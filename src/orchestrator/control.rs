//! Job lifecycle control — pause, resume, stop.
//!
//! Control is cooperative: the job loop polls a checkpoint between items, so
//! an in-flight download or upload always completes (or cleanly fails) before
//! suspension takes effect. Stop is terminal and sticky — a stopped job
//! finalizes whatever it accumulated and cannot be resumed; pause/resume flip
//! freely while the job runs.

use std::sync::Arc;
use tokio::sync::watch;

/// Current control state of the job loop
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ControlState {
    /// Items are being processed
    Running,
    /// The loop is suspended between items
    Paused,
    /// The job is terminating; the result is finalized with what was accumulated
    Stopped,
}

/// What the job loop should do at an item boundary
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Checkpoint {
    /// Process the next item
    Continue,
    /// Finalize and return
    Stop,
}

/// Shared pause/stop signal for the running job
#[derive(Clone)]
pub struct JobControl {
    tx: Arc<watch::Sender<ControlState>>,
}

impl JobControl {
    pub(crate) fn new() -> Self {
        let (tx, _rx) = watch::channel(ControlState::Running);
        Self { tx: Arc::new(tx) }
    }

    /// Request a pause. Takes effect at the next item boundary.
    ///
    /// Returns true if the state changed (the job was running).
    pub fn pause(&self) -> bool {
        self.tx.send_if_modified(|state| {
            if *state == ControlState::Running {
                *state = ControlState::Paused;
                true
            } else {
                false
            }
        })
    }

    /// Resume a paused job at the next unprocessed item.
    ///
    /// Returns true if the state changed (the job was paused).
    pub fn resume(&self) -> bool {
        self.tx.send_if_modified(|state| {
            if *state == ControlState::Paused {
                *state = ControlState::Running;
                true
            } else {
                false
            }
        })
    }

    /// Request a terminal stop. Already-persisted items remain persisted and
    /// the job result is finalized with whatever was accumulated.
    ///
    /// Returns true if the state changed.
    pub fn stop(&self) -> bool {
        self.tx.send_if_modified(|state| {
            if *state != ControlState::Stopped {
                *state = ControlState::Stopped;
                true
            } else {
                false
            }
        })
    }

    /// Current state
    pub fn state(&self) -> ControlState {
        *self.tx.borrow()
    }

    /// Rearm the control for a new job
    pub(crate) fn reset(&self) {
        self.tx.send_replace(ControlState::Running);
    }

    /// Item-boundary poll: returns immediately while running, blocks through
    /// a pause, and reports a stop.
    pub(crate) async fn checkpoint(&self) -> Checkpoint {
        let mut rx = self.tx.subscribe();
        loop {
            let state = *rx.borrow_and_update();
            match state {
                ControlState::Running => return Checkpoint::Continue,
                ControlState::Stopped => return Checkpoint::Stop,
                ControlState::Paused => {
                    if rx.changed().await.is_err() {
                        return Checkpoint::Stop;
                    }
                }
            }
        }
    }
}
