//! Notifications out of the session, and messages back into it.
//!
//! Two directions, two channels:
//! - [`EditorEvent`]s go out to any number of observers (the UI, logging)
//!   over a `tokio::sync::broadcast` bus.
//! - [`SessionMessage`]s come in from background tasks (autosave timer,
//!   build processes) over an `mpsc` channel. Only the owner of the session
//!   applies them, so session state keeps a single writer.

use std::path::PathBuf;
use tokio::sync::broadcast;

use crate::build::BuildId;
use crate::document::DocumentId;
use crate::theme::ColorScheme;

/// Events that can occur in the session.
#[derive(Debug, Clone)]
pub enum EditorEvent {
    // Document events
    /// A document was opened
    DocumentOpened(DocumentId),
    /// A document was closed
    DocumentClosed(DocumentId),
    /// A document was saved (explicitly or by autosave)
    DocumentSaved(DocumentId),
    /// A document became the active tab
    DocumentFocused(DocumentId),

    // Presentation
    /// The global color scheme changed
    ThemeChanged(ColorScheme),

    // Workspace
    /// A project tree was indexed
    WorkspaceOpened(PathBuf),

    /// Informational message for the user
    Notice(String),

    /// An autosave write failed; the scheduler keeps running
    AutosaveFailed { path: PathBuf, error: String },

    // Build/run
    /// A build/run command was dispatched
    BuildStarted { id: BuildId, command: String },
    /// A build/run command exited (or failed to spawn)
    BuildFinished { id: BuildId, exit_code: Option<i32> },
    /// A build/run command was cancelled
    BuildCancelled(BuildId),

    /// The session is shutting down
    Quit,
}

/// Messages posted back onto the main loop by background tasks.
#[derive(Debug, Clone)]
pub enum SessionMessage {
    /// The autosave timer fired
    AutosaveTick,
    /// A build/run process exited
    BuildFinished {
        id: BuildId,
        result: Result<Option<i32>, String>,
    },
    /// A build/run process was cancelled before it exited
    BuildCancelled(BuildId),
}

/// Event bus for broadcasting editor events.
///
/// Lagged receivers lose old events instead of blocking senders.
pub struct EventBus {
    sender: broadcast::Sender<EditorEvent>,
}

impl EventBus {
    /// Creates a new event bus.
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(256);
        Self { sender }
    }

    /// Emits an event to all subscribers.
    pub fn emit(&self, event: EditorEvent) {
        // No receivers is fine
        let _ = self.sender.send(event);
    }

    /// Subscribes to events.
    ///
    /// Returns a receiver that will get all future events.
    pub fn subscribe(&self) -> broadcast::Receiver<EditorEvent> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for EventBus {
    fn clone(&self) -> Self {
        Self {
            sender: self.sender.clone(),
        }
    }
}

/// Helper for processing events asynchronously.
///
/// ## Example
///
/// ```ignore
/// let mut handler = EventHandler::new(context.subscribe());
///
/// tokio::spawn(async move {
///     while let Some(event) = handler.next().await {
///         if let EditorEvent::Notice(text) = event {
///             status_bar.show(text);
///         }
///     }
/// });
/// ```
pub struct EventHandler {
    receiver: broadcast::Receiver<EditorEvent>,
}

impl EventHandler {
    /// Creates a new event handler.
    pub fn new(receiver: broadcast::Receiver<EditorEvent>) -> Self {
        Self { receiver }
    }

    /// Waits for the next event.
    pub async fn next(&mut self) -> Option<EditorEvent> {
        loop {
            match self.receiver.recv().await {
                Ok(event) => return Some(event),
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    tracing::warn!("Event handler lagged, missed {} events", n);
                    continue;
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    /// Returns the next event if one is already queued.
    pub fn try_next(&mut self) -> Option<EditorEvent> {
        loop {
            match self.receiver.try_recv() {
                Ok(event) => return Some(event),
                Err(broadcast::error::TryRecvError::Lagged(_)) => continue,
                Err(_) => return None,
            }
        }
    }
}
