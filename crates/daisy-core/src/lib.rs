//! # Daisy Core
//!
//! Session state and background services for a tabbed source editor.
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                  EditorSessionContext                    │
//! │  ┌──────────┐ ┌──────────┐ ┌──────────┐ ┌─────────────┐  │
//! │  │  Config  │ │  Theme   │ │ FileTree │ │  EventBus   │──┼──► UI
//! │  └──────────┘ └──────────┘ └──────────┘ └─────────────┘  │
//! │  ┌────────────────────────────────────┐                  │
//! │  │              Session               │                  │
//! │  │  ┌───────┐ ┌───────┐ ┌───────┐     │                  │
//! │  │  │ Doc 1 │ │ Doc 2 │ │ Doc 3 │     │                  │
//! │  │  └───────┘ └───────┘ └───────┘     │                  │
//! │  └────────────────────────────────────┘                  │
//! │        ▲ SessionMessage (mpsc)                           │
//! │  ┌─────┴──────────┐  ┌──────────────────┐                │
//! │  │ Autosave timer │  │ Build dispatcher │──► processes   │
//! │  └────────────────┘  └──────────────────┘                │
//! └──────────────────────────────────────────────────────────┘
//! ```
//!
//! Background tasks never touch the session directly. They post a
//! [`SessionMessage`] and the owner applies it with
//! [`EditorSessionContext::handle_message`].

pub mod autosave;
pub mod build;
pub mod command;
pub mod config;
pub mod context;
pub mod document;
pub mod event;
pub mod file_tree;
pub mod language;
pub mod theme;

use std::path::PathBuf;

pub use autosave::{AutosaveOutcome, AutosaveScheduler};
pub use build::{BuildDispatcher, BuildError, BuildId, BuildPlan, ProcessLauncher, ShellLauncher};
pub use command::Command;
pub use config::{Config, ConfigError};
pub use context::{EditorSessionContext, FileDialog, NoDialog};
pub use document::{Document, DocumentId, Session};
pub use event::{EditorEvent, EventBus, EventHandler, SessionMessage};
pub use file_tree::{FileTree, FileTreeNode, NodeKind};
pub use language::{LanguageId, detect_language};
pub use theme::{ColorScheme, ThemeState};

/// Result type for core operations
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors that can occur in core operations
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Document not found: {0}")]
    DocumentNotFound(DocumentId),

    #[error("No active document")]
    NoActiveDocument,

    #[error("File not found: {0}")]
    FileNotFound(String),

    #[error("Not a directory: {}", .0.display())]
    NotADirectory(PathBuf),

    #[error("Document {0} has never been saved")]
    Untitled(DocumentId),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Buffer error: {0}")]
    Buffer(#[from] daisy_buffer::BufferError),

    #[error(transparent)]
    Build(#[from] BuildError),

    #[error("Cancelled")]
    Cancelled,

    #[error("No tokio runtime to run background work on")]
    NoRuntime,

    #[error("Invalid operation: {0}")]
    InvalidOperation(String),
}
