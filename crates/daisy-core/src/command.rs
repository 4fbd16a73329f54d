//! Menu and shortcut actions as values.
//!
//! Every entry the UI offers (File menu, tab strip, theme toggle, tree
//! double-click) maps to one [`Command`], which
//! [`EditorSessionContext::execute`](crate::EditorSessionContext::execute)
//! runs against the session. Commands that need a path either carry one or
//! leave it `None` to ask the [`FileDialog`](crate::FileDialog).

use std::path::PathBuf;

/// Built-in editor commands.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum Command {
    // File commands
    NewFile,
    OpenFile { path: Option<PathBuf> },
    Save,
    SaveAs { path: Option<PathBuf> },
    CloseFile,
    Quit,

    // Tabs
    SwitchTab { index: usize },

    // View
    SetDarkMode(bool),
    ToggleDarkMode,

    // Build/run
    BuildRun,
    CancelBuilds,

    // Project tree
    OpenWorkspace { path: PathBuf },
    ActivateTreeNode { path: PathBuf },
}

impl Command {
    /// Returns the command's display name.
    pub fn display_name(&self) -> &'static str {
        match self {
            Command::NewFile => "New File",
            Command::OpenFile { .. } => "Open",
            Command::Save => "Save",
            Command::SaveAs { .. } => "Save As",
            Command::CloseFile => "Close File",
            Command::Quit => "Quit",
            Command::SwitchTab { .. } => "Switch Tab",
            Command::SetDarkMode(_) => "Dark Mode",
            Command::ToggleDarkMode => "Toggle Dark Mode",
            Command::BuildRun => "Build/Run",
            Command::CancelBuilds => "Cancel Build/Run",
            Command::OpenWorkspace { .. } => "Open Folder",
            Command::ActivateTreeNode { .. } => "Open From Tree",
        }
    }

    /// Entries of the File menu, in display order.
    pub fn file_menu() -> Vec<Command> {
        vec![
            Command::NewFile,
            Command::OpenFile { path: None },
            Command::Save,
            Command::SaveAs { path: None },
            Command::CloseFile,
            Command::BuildRun,
            Command::Quit,
        ]
    }

    /// Whether the command acts on the active document.
    pub fn needs_active_document(&self) -> bool {
        matches!(
            self,
            Command::Save | Command::SaveAs { .. } | Command::CloseFile | Command::BuildRun
        )
    }
}
