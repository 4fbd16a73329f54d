//! Periodic whole-buffer persistence of the active document.
//!
//! The timer runs as a tokio task and only posts
//! [`SessionMessage::AutosaveTick`]; the write itself happens on the main
//! loop in [`autosave_active`], which is where the session lives.
//!
//! A tick always targets whatever document is active when it is handled,
//! whether or not it has unsaved changes. Untitled documents are skipped
//! without prompting. A failed write is reported to the caller and the
//! timer keeps going.

use std::path::PathBuf;
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::document::{DocumentId, Session};
use crate::event::SessionMessage;
use crate::CoreError;

/// Repeating timer that drives autosave.
///
/// Started once per session. Dropping the scheduler stops the timer.
pub struct AutosaveScheduler {
    interval: Duration,
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

impl AutosaveScheduler {
    /// Spawns the timer task on `runtime`. The first tick fires one
    /// `interval` from now.
    pub fn start(
        interval: Duration,
        sender: mpsc::UnboundedSender<SessionMessage>,
        runtime: &Handle,
    ) -> Self {
        let cancel = CancellationToken::new();
        let token = cancel.clone();

        let handle = runtime.spawn(async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + interval, interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = ticker.tick() => {
                        if sender.send(SessionMessage::AutosaveTick).is_err() {
                            // Session is gone
                            break;
                        }
                    }
                }
            }
            tracing::debug!("Autosave timer stopped");
        });

        tracing::info!("Autosave every {}s", interval.as_secs());
        Self {
            interval,
            cancel,
            handle,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Returns true until the timer task has exited.
    pub fn is_running(&self) -> bool {
        !self.handle.is_finished()
    }

    /// Stops the timer. No tick is posted after this returns.
    pub fn stop(&self) {
        self.cancel.cancel();
    }
}

impl Drop for AutosaveScheduler {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// What one autosave tick did.
#[derive(Debug)]
pub enum AutosaveOutcome {
    /// The session has no documents
    NoActiveDocument,
    /// The active document was never saved, so there is nowhere to write
    Untitled(DocumentId),
    /// The whole buffer was written
    Saved { id: DocumentId, path: PathBuf },
    /// The write failed; the next tick will try again
    Failed {
        id: DocumentId,
        path: PathBuf,
        error: CoreError,
    },
}

/// Handles one tick: overwrites the active document's file with its buffer.
pub fn autosave_active(session: &mut Session) -> AutosaveOutcome {
    let Some(doc) = session.active_mut() else {
        return AutosaveOutcome::NoActiveDocument;
    };
    let id = doc.id();
    let Some(path) = doc.path().map(|p| p.to_path_buf()) else {
        return AutosaveOutcome::Untitled(id);
    };

    match doc.save() {
        Ok(_) => AutosaveOutcome::Saved { id, path },
        Err(error) => AutosaveOutcome::Failed { id, path, error },
    }
}
