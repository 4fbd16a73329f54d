//! Session orchestration.
//!
//! `EditorSessionContext` is the one owner of all editing state: the open
//! documents, the dark-mode flag, the project tree, the autosave timer and
//! the running builds. Every user action (from the UI collaborator, via
//! [`Command`] or the direct methods) and every background message goes
//! through it on the main loop.
//!
//! Operations that need an active document treat an empty session as a
//! no-op with a [`EditorEvent::Notice`], never a panic.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::runtime::Handle;
use tokio::sync::{broadcast, mpsc};

use crate::autosave::{AutosaveOutcome, AutosaveScheduler, autosave_active};
use crate::build::{BuildDispatcher, BuildId, ProcessLauncher, ShellLauncher, plan_build};
use crate::command::Command;
use crate::config::Config;
use crate::document::{Document, DocumentId, Session, UNTITLED};
use crate::event::{EditorEvent, EventBus, SessionMessage};
use crate::file_tree::FileTree;
use crate::language::{LanguageId, detect_language};
use crate::theme::ThemeState;
use crate::{CoreError, CoreResult};

/// The path picker the UI provides for Open and Save As.
///
/// `None` means the user cancelled.
pub trait FileDialog {
    fn pick_open(&mut self) -> Option<PathBuf>;
    fn pick_save(&mut self, suggested_name: &str) -> Option<PathBuf>;
}

/// A dialog that always cancels, for headless use.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoDialog;

impl FileDialog for NoDialog {
    fn pick_open(&mut self) -> Option<PathBuf> {
        None
    }

    fn pick_save(&mut self, _suggested_name: &str) -> Option<PathBuf> {
        None
    }
}

/// All state of one editing session.
pub struct EditorSessionContext {
    /// Open documents and the active one
    session: Session,

    /// Global light/dark flag
    theme: ThemeState,

    /// Editor configuration
    config: Config,

    /// Project tree, once a workspace is opened
    tree: Option<FileTree>,

    /// Outgoing notifications
    events: EventBus,

    /// Build/run processes
    builds: BuildDispatcher,

    /// Autosave timer, once started
    autosave: Option<AutosaveScheduler>,

    /// Runtime for background tasks, if the session was created inside one
    runtime: Option<Handle>,

    /// Inbound messages from background tasks
    message_tx: mpsc::UnboundedSender<SessionMessage>,
    message_rx: mpsc::UnboundedReceiver<SessionMessage>,

    should_quit: bool,
}

impl EditorSessionContext {
    /// Creates a session that runs builds through `launcher`.
    ///
    /// When called inside a tokio runtime, background work keeps running on
    /// that runtime even if later calls come from another thread. Otherwise
    /// autosave and build/run use whatever runtime is current when they
    /// start, and report [`CoreError::NoRuntime`] if there is none.
    pub fn new(config: Config, launcher: Arc<dyn ProcessLauncher>) -> Self {
        let (message_tx, message_rx) = mpsc::unbounded_channel();
        let runtime = Handle::try_current().ok();
        Self {
            session: Session::new(),
            theme: ThemeState::new(config.session.dark_mode),
            builds: BuildDispatcher::new(launcher, message_tx.clone(), runtime.clone()),
            config,
            tree: None,
            events: EventBus::new(),
            autosave: None,
            runtime,
            message_tx,
            message_rx,
            should_quit: false,
        }
    }

    /// Creates a session that runs builds in the platform shell.
    pub fn with_shell(config: Config) -> Self {
        let launcher = Arc::new(ShellLauncher::from_config(&config.build));
        Self::new(config, launcher)
    }

    /// Starts the autosave timer. Calling it again has no effect.
    pub fn start_autosave(&mut self) -> CoreResult<()> {
        if self.autosave.is_some() {
            return Ok(());
        }
        let Some(runtime) = self.runtime.clone().or_else(|| Handle::try_current().ok()) else {
            self.notify("Autosave needs a running tokio runtime.".to_string());
            return Err(CoreError::NoRuntime);
        };

        let interval = self.config.session.autosave_interval();
        self.autosave = Some(AutosaveScheduler::start(
            interval,
            self.message_tx.clone(),
            &runtime,
        ));
        Ok(())
    }

    // ==================== Document Operations ====================

    /// Appends a document built from already-read content and focuses it.
    ///
    /// The document takes the current global color scheme.
    pub fn open_document(
        &mut self,
        content: &str,
        path: Option<PathBuf>,
        language: Option<LanguageId>,
    ) -> DocumentId {
        let title = Document::title_for(path.as_deref());
        let doc = Document::new(title, content, path, language, self.theme.scheme());
        let id = self.session.open(doc);

        tracing::info!(
            "Opened {} ({})",
            self.session.get(id).map(Document::title).unwrap_or(UNTITLED),
            language.map(|l| l.as_str()).unwrap_or("plain text")
        );
        self.emit(EditorEvent::DocumentOpened(id));
        self.emit(EditorEvent::DocumentFocused(id));
        id
    }

    /// Creates a new, empty, untitled document.
    pub fn new_document(&mut self) -> DocumentId {
        self.open_document("", None, None)
    }

    /// Opens a file from disk, or focuses it if it is already open.
    ///
    /// Paths are canonicalized first, so `dir/../main.rs` and the tree's
    /// entry for the same file share one tab.
    pub fn open_file(&mut self, path: impl AsRef<Path>) -> CoreResult<DocumentId> {
        let requested = path.as_ref();
        let canonical = requested.canonicalize().ok();
        let path = canonical.as_deref().unwrap_or(requested);

        if let Some(id) = self.session.find_by_path(path) {
            self.switch_to(id)?;
            return Ok(id);
        }

        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(err) => {
                tracing::warn!("Cannot open {}: {}", path.display(), err);
                self.notify(format!("Could not open {}: {}", path.display(), err));
                return Err(match err.kind() {
                    std::io::ErrorKind::NotFound => {
                        CoreError::FileNotFound(path.display().to_string())
                    }
                    _ => CoreError::Io(err),
                });
            }
        };

        let language = detect_language(path);
        Ok(self.open_document(&content, Some(path.to_path_buf()), language))
    }

    /// Asks the dialog for a file and opens it.
    pub fn open_with_dialog(&mut self, dialog: &mut dyn FileDialog) -> CoreResult<DocumentId> {
        let path = dialog.pick_open().ok_or_else(|| self.cancelled("Open"))?;
        self.open_file(path)
    }

    /// Closes a document. Unsaved changes are discarded.
    pub fn close_document(&mut self, id: DocumentId) -> CoreResult<()> {
        let removed = self.session.close(id)?;
        if removed.is_modified() {
            tracing::debug!("Discarded unsaved changes in {}", removed.title());
        }
        tracing::info!("Closed {}", removed.title());

        self.emit(EditorEvent::DocumentClosed(id));
        if let Some(active) = self.session.active_id() {
            self.emit(EditorEvent::DocumentFocused(active));
        }
        Ok(())
    }

    /// Closes the active document.
    pub fn close_active(&mut self) -> CoreResult<()> {
        let id = self.require_active("close")?;
        self.close_document(id)
    }

    /// Makes a document the active tab.
    pub fn switch_to(&mut self, id: DocumentId) -> CoreResult<()> {
        self.session.set_active(id)?;
        self.emit(EditorEvent::DocumentFocused(id));
        Ok(())
    }

    /// Makes the tab at `index` active.
    pub fn switch_to_index(&mut self, index: usize) -> CoreResult<DocumentId> {
        let id = self.session.set_active_index(index)?;
        self.emit(EditorEvent::DocumentFocused(id));
        Ok(id)
    }

    /// Returns the active document, or `None` if nothing is open.
    pub fn active_document(&self) -> Option<&Document> {
        self.session.active()
    }

    pub fn document(&self, id: DocumentId) -> Option<&Document> {
        self.session.get(id)
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Replaces a document's buffer with the widget's current text.
    pub fn update_text(&mut self, id: DocumentId, text: &str) -> CoreResult<()> {
        let doc = self
            .session
            .get_mut(id)
            .ok_or(CoreError::DocumentNotFound(id))?;
        doc.buffer_mut().replace_contents(text);
        Ok(())
    }

    /// Saves the active document, asking for a path if it has none.
    pub fn save_active(&mut self, dialog: &mut dyn FileDialog) -> CoreResult<PathBuf> {
        let id = self.require_active("save")?;
        let doc = self
            .session
            .get(id)
            .ok_or(CoreError::DocumentNotFound(id))?;

        match doc.path() {
            Some(path) => {
                let path = path.to_path_buf();
                self.save_document_to(id, path)
            }
            None => {
                let suggested = doc.title().to_string();
                match dialog.pick_save(&suggested) {
                    Some(path) => self.save_document_to(id, path),
                    None => Err(self.cancelled("Save")),
                }
            }
        }
    }

    /// Saves the active document under a new path.
    ///
    /// The title and language follow the new path.
    pub fn save_active_as(&mut self, path: impl Into<PathBuf>) -> CoreResult<PathBuf> {
        let id = self.require_active("save")?;
        self.save_document_to(id, path.into())
    }

    fn save_document_to(&mut self, id: DocumentId, path: PathBuf) -> CoreResult<PathBuf> {
        let doc = self
            .session
            .get_mut(id)
            .ok_or(CoreError::DocumentNotFound(id))?;

        let saved = if doc.path() == Some(path.as_path()) {
            doc.save().map(|_| ())
        } else {
            doc.save_to(path.clone())
        };
        let bytes = doc.buffer().len_bytes();

        if let Err(err) = saved {
            tracing::warn!("Saving {} failed: {}", path.display(), err);
            self.notify(format!("Could not save {}: {}", path.display(), err));
            return Err(err);
        }

        tracing::info!("Saved {} ({} bytes)", path.display(), bytes);
        self.emit(EditorEvent::DocumentSaved(id));
        Ok(path)
    }

    // ==================== Theme ====================

    pub fn dark_mode(&self) -> bool {
        self.theme.dark_mode()
    }

    /// Sets dark mode and re-applies it to every open document.
    pub fn set_dark_mode(&mut self, enabled: bool) {
        if self.theme.set_dark_mode(enabled, self.session.iter_mut()) {
            let scheme = self.theme.scheme();
            tracing::info!("Color scheme is now {}", scheme);
            self.emit(EditorEvent::ThemeChanged(scheme));
        }
    }

    /// Flips dark mode. Returns the new value.
    pub fn toggle_dark_mode(&mut self) -> bool {
        let enabled = !self.theme.dark_mode();
        self.set_dark_mode(enabled);
        enabled
    }

    // ==================== Build/Run ====================

    /// Builds and runs the active document in the background.
    ///
    /// Fails with [`CoreError::Build`], after a notice, when the active file
    /// cannot be built or there is no runtime to run it on. Nothing is
    /// spawned then.
    pub fn build_and_run(&mut self) -> CoreResult<BuildId> {
        let started = plan_build(self.session.active(), &self.config.build)
            .and_then(|plan| Ok((self.builds.dispatch(&plan)?, plan.command)));

        match started {
            Ok((id, command)) => {
                self.emit(EditorEvent::BuildStarted { id, command });
                Ok(id)
            }
            Err(err) => {
                self.notify(err.to_string());
                Err(err.into())
            }
        }
    }

    /// Cancels one build. Returns false if it is not running.
    pub fn cancel_build(&self, id: BuildId) -> bool {
        self.builds.cancel(id)
    }

    /// Cancels every running build.
    pub fn cancel_builds(&self) {
        self.builds.cancel_all();
    }

    pub fn running_builds(&self) -> usize {
        self.builds.running_count()
    }

    // ==================== Workspace ====================

    /// Indexes `root` as the project tree, replacing any previous one.
    pub fn open_workspace(&mut self, root: impl AsRef<Path>) -> CoreResult<&FileTree> {
        let tree = FileTree::build(root, &self.config.tree)?;
        tracing::info!(
            "Workspace {} ({} entries)",
            tree.root.path.display(),
            tree.node_count()
        );
        if tree.truncated() {
            self.notify("Project tree is too large and was cut short.".to_string());
        }
        self.emit(EditorEvent::WorkspaceOpened(tree.root.path.clone()));
        Ok(self.tree.insert(tree))
    }

    pub fn tree(&self) -> Option<&FileTree> {
        self.tree.as_ref()
    }

    /// Opens the file behind a tree leaf (a double-click in the browser).
    pub fn activate_tree_node(&mut self, path: impl AsRef<Path>) -> CoreResult<DocumentId> {
        let path = path.as_ref();
        let node = self
            .tree
            .as_ref()
            .and_then(|tree| tree.find(path))
            .ok_or_else(|| CoreError::FileNotFound(path.display().to_string()))?;

        if node.is_directory() {
            return Err(CoreError::InvalidOperation(format!(
                "{} is a directory",
                path.display()
            )));
        }
        let path = node.path.clone();
        self.open_file(path)
    }

    // ==================== Autosave ====================

    /// Runs one autosave tick against the active document.
    pub fn autosave_tick(&mut self) -> AutosaveOutcome {
        let outcome = autosave_active(&mut self.session);
        match &outcome {
            AutosaveOutcome::NoActiveDocument => tracing::trace!("Autosave: nothing open"),
            AutosaveOutcome::Untitled(_) => {
                tracing::trace!("Autosave: active document is untitled")
            }
            AutosaveOutcome::Saved { id, path } => {
                tracing::debug!("Autosaved {}", path.display());
                self.emit(EditorEvent::DocumentSaved(*id));
            }
            AutosaveOutcome::Failed { path, error, .. } => {
                tracing::warn!("Autosave of {} failed: {}", path.display(), error);
                self.emit(EditorEvent::AutosaveFailed {
                    path: path.clone(),
                    error: error.to_string(),
                });
            }
        }
        outcome
    }

    // ==================== Main Loop ====================

    /// Waits for the next message from a background task.
    pub async fn next_message(&mut self) -> Option<SessionMessage> {
        self.message_rx.recv().await
    }

    /// Returns a message if one is already queued.
    pub fn try_next_message(&mut self) -> Option<SessionMessage> {
        self.message_rx.try_recv().ok()
    }

    /// Applies a background message to the session.
    pub fn handle_message(&mut self, message: SessionMessage) {
        match message {
            SessionMessage::AutosaveTick => {
                self.autosave_tick();
            }
            SessionMessage::BuildFinished { id, result } => {
                self.builds.finish(id);
                let exit_code = match result {
                    Ok(code) => {
                        tracing::info!("Build/Run {} exited with {:?}", id, code);
                        code
                    }
                    Err(err) => {
                        tracing::warn!("Build/Run {} could not start: {}", id, err);
                        self.notify(format!("Build/Run could not start: {err}"));
                        None
                    }
                };
                self.emit(EditorEvent::BuildFinished { id, exit_code });
            }
            SessionMessage::BuildCancelled(id) => {
                self.builds.finish(id);
                tracing::info!("Build/Run {} cancelled", id);
                self.emit(EditorEvent::BuildCancelled(id));
            }
        }
    }

    /// Runs a menu command.
    pub fn execute(&mut self, command: Command, dialog: &mut dyn FileDialog) -> CoreResult<()> {
        tracing::debug!("Command: {}", command.display_name());
        match command {
            Command::NewFile => {
                self.new_document();
            }
            Command::OpenFile { path: Some(path) } => {
                self.open_file(path)?;
            }
            Command::OpenFile { path: None } => {
                self.open_with_dialog(dialog)?;
            }
            Command::Save => {
                self.save_active(dialog)?;
            }
            Command::SaveAs { path } => {
                let id = self.require_active("save")?;
                let path = match path {
                    Some(path) => path,
                    None => {
                        let suggested = self
                            .session
                            .get(id)
                            .map(|d| d.title().to_string())
                            .unwrap_or_else(|| UNTITLED.to_string());
                        dialog
                            .pick_save(&suggested)
                            .ok_or_else(|| self.cancelled("Save"))?
                    }
                };
                self.save_document_to(id, path)?;
            }
            Command::CloseFile => self.close_active()?,
            Command::SwitchTab { index } => {
                self.switch_to_index(index)?;
            }
            Command::SetDarkMode(enabled) => self.set_dark_mode(enabled),
            Command::ToggleDarkMode => {
                self.toggle_dark_mode();
            }
            Command::BuildRun => {
                self.build_and_run()?;
            }
            Command::CancelBuilds => self.cancel_builds(),
            Command::OpenWorkspace { path } => {
                self.open_workspace(path)?;
            }
            Command::ActivateTreeNode { path } => {
                self.activate_tree_node(path)?;
            }
            Command::Quit => self.quit(),
        }
        Ok(())
    }

    // ==================== Lifecycle ====================

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Signals that the session should end.
    pub fn quit(&mut self) {
        self.should_quit = true;
        self.emit(EditorEvent::Quit);
    }

    pub fn should_quit(&self) -> bool {
        self.should_quit
    }

    /// Stops the autosave timer and cancels every running build.
    pub fn shutdown(&mut self) {
        if let Some(autosave) = self.autosave.take() {
            autosave.stop();
        }
        self.builds.cancel_all();
        tracing::info!("Session shut down");
    }

    pub fn autosave_running(&self) -> bool {
        self.autosave.as_ref().is_some_and(AutosaveScheduler::is_running)
    }

    // ==================== Events ====================

    /// Subscribes to session events.
    pub fn subscribe(&self) -> broadcast::Receiver<EditorEvent> {
        self.events.subscribe()
    }

    /// Shows an informational message to the user.
    pub fn notify(&self, text: String) {
        tracing::info!("{}", text);
        self.emit(EditorEvent::Notice(text));
    }

    fn emit(&self, event: EditorEvent) {
        self.events.emit(event);
    }

    fn cancelled(&self, action: &str) -> CoreError {
        self.notify(format!("{action} cancelled."));
        CoreError::Cancelled
    }

    fn require_active(&self, action: &str) -> CoreResult<DocumentId> {
        match self.session.active_id() {
            Some(id) => Ok(id),
            None => {
                self.notify(format!("No document to {action}."));
                Err(CoreError::NoActiveDocument)
            }
        }
    }
}

impl Drop for EditorSessionContext {
    fn drop(&mut self) {
        self.builds.cancel_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::build::BuildError;
    use crate::build::tests::RecordingLauncher;
    use crate::event::EventHandler;
    use crate::theme::ColorScheme;
    use std::time::Duration;
    use tempfile::tempdir;

    /// Answers dialogs from fixed paths.
    #[derive(Default)]
    struct ScriptedDialog {
        open: Option<PathBuf>,
        save: Option<PathBuf>,
        save_prompts: Vec<String>,
    }

    impl FileDialog for ScriptedDialog {
        fn pick_open(&mut self) -> Option<PathBuf> {
            self.open.take()
        }

        fn pick_save(&mut self, suggested_name: &str) -> Option<PathBuf> {
            self.save_prompts.push(suggested_name.to_string());
            self.save.take()
        }
    }

    fn context() -> (EditorSessionContext, Arc<RecordingLauncher>) {
        let launcher = Arc::new(RecordingLauncher::default());
        let mut config = Config::default();
        config.build.output_dir = Some(std::env::temp_dir());
        (EditorSessionContext::new(config, launcher.clone()), launcher)
    }

    fn notices(handler: &mut EventHandler) -> Vec<String> {
        std::iter::from_fn(|| handler.try_next())
            .filter_map(|event| match event {
                EditorEvent::Notice(text) => Some(text),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_empty_session_is_a_no_op() {
        let (mut ctx, launcher) = context();
        let mut events = EventHandler::new(ctx.subscribe());

        assert!(ctx.active_document().is_none());
        assert!(matches!(
            ctx.build_and_run(),
            Err(CoreError::Build(BuildError::Unsaved))
        ));
        assert!(matches!(ctx.save_active(&mut NoDialog), Err(CoreError::NoActiveDocument)));
        assert!(matches!(ctx.close_active(), Err(CoreError::NoActiveDocument)));
        assert!(matches!(ctx.autosave_tick(), AutosaveOutcome::NoActiveDocument));
        ctx.toggle_dark_mode();

        assert_eq!(
            notices(&mut events),
            vec![
                "Save the file before running.".to_string(),
                "No document to save.".to_string(),
                "No document to close.".to_string(),
            ]
        );
        assert!(launcher.commands.lock().unwrap().is_empty());
    }

    #[test]
    fn test_unsaved_document_is_not_built() {
        let (mut ctx, launcher) = context();
        let mut events = EventHandler::new(ctx.subscribe());

        ctx.open_document("int main(){return 0;}", None, detect_language("main.c"));
        assert!(matches!(
            ctx.build_and_run(),
            Err(CoreError::Build(BuildError::Unsaved))
        ));
        assert!(matches!(
            ctx.execute(Command::BuildRun, &mut NoDialog),
            Err(CoreError::Build(BuildError::Unsaved))
        ));

        assert_eq!(notices(&mut events), vec!["Save the file before running.".to_string(); 2]);
        assert!(launcher.commands.lock().unwrap().is_empty());
        assert_eq!(ctx.running_builds(), 0);
    }

    #[test]
    fn test_background_work_without_runtime_is_reported() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("main.c");
        std::fs::write(&path, "int main(){return 0;}").unwrap();

        // Plain test thread: no tokio runtime anywhere
        let (mut ctx, launcher) = context();
        let mut events = EventHandler::new(ctx.subscribe());
        ctx.open_file(&path).unwrap();

        assert!(matches!(
            ctx.build_and_run(),
            Err(CoreError::Build(BuildError::NoRuntime))
        ));
        assert!(matches!(ctx.start_autosave(), Err(CoreError::NoRuntime)));
        assert!(!ctx.autosave_running());
        assert!(launcher.commands.lock().unwrap().is_empty());
        assert_eq!(ctx.running_builds(), 0);
        assert_eq!(notices(&mut events).len(), 2);

        // The session is still usable afterwards
        let id = ctx.active_document().unwrap().id();
        ctx.update_text(id, "int main(){return 1;}").unwrap();
        ctx.save_active(&mut NoDialog).unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "int main(){return 1;}");
    }

    #[test]
    fn test_session_created_in_runtime_builds_from_plain_thread() {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        let dir = tempdir().unwrap();
        let path = dir.path().join("main.rs");
        std::fs::write(&path, "fn main() {}").unwrap();

        let (mut ctx, launcher) = {
            let _guard = runtime.enter();
            context()
        };
        ctx.open_file(&path).unwrap();
        let id = ctx.build_and_run().unwrap();

        let message = runtime.block_on(ctx.next_message()).unwrap();
        assert!(matches!(message, SessionMessage::BuildFinished { id: done, .. } if done == id));
        assert_eq!(launcher.commands.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_open_round_trip() {
        let (mut ctx, _) = context();
        let content = "fn main() {\n    println!(\"héllo\");\n}\n";
        let id = ctx.open_document(content, Some(PathBuf::from("/w/main.rs")), Some(LanguageId::Rust));

        let doc = ctx.active_document().unwrap();
        assert_eq!(doc.id(), id);
        assert_eq!(doc.text(), content);
        assert_eq!(doc.title(), "main.rs");
        assert_eq!(doc.language(), Some(LanguageId::Rust));
    }

    #[test]
    fn test_close_middle_tab_keeps_active_identity() {
        let (mut ctx, _) = context();
        let _a = ctx.open_document("A", None, None);
        let b = ctx.open_document("B", None, None);
        let c = ctx.open_document("C", None, None);

        ctx.close_document(b).unwrap();

        let active = ctx.active_document().unwrap();
        assert_eq!(active.id(), c);
        assert_eq!(active.text(), "C");
        assert_eq!(ctx.session().active_index(), Some(1));
    }

    #[test]
    fn test_close_last_document_clears_active() {
        let (mut ctx, _) = context();
        let a = ctx.open_document("A", None, None);
        ctx.update_text(a, "unsaved edit").unwrap();

        ctx.close_document(a).unwrap();
        assert!(ctx.active_document().is_none());
        assert_eq!(ctx.session().active_index(), None);
    }

    #[test]
    fn test_dark_mode_round_trip_and_inheritance() {
        let (mut ctx, _) = context();
        let a = ctx.open_document("A", None, None);
        let b = ctx.open_document("B", None, None);
        let scheme_of = |ctx: &EditorSessionContext, id| ctx.document(id).unwrap().scheme();

        ctx.toggle_dark_mode();
        assert_eq!(scheme_of(&ctx, a), ColorScheme::Dark);
        assert_eq!(scheme_of(&ctx, b), ColorScheme::Dark);

        let c = ctx.open_document("C", None, None);
        assert_eq!(scheme_of(&ctx, c), ColorScheme::Dark);

        ctx.toggle_dark_mode();
        for id in [a, b, c] {
            assert_eq!(scheme_of(&ctx, id), ColorScheme::Classic);
        }
        assert!(!ctx.dark_mode());
    }

    #[test]
    fn test_config_dark_mode_applies_from_start() {
        let mut config = Config::default();
        config.session.dark_mode = true;
        let mut ctx = EditorSessionContext::new(config, Arc::new(RecordingLauncher::default()));

        let id = ctx.new_document();
        assert_eq!(ctx.document(id).unwrap().scheme(), ColorScheme::Dark);
        assert_eq!(ctx.document(id).unwrap().title(), UNTITLED);
    }

    #[test]
    fn test_open_file_and_refocus() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("site.css");
        std::fs::write(&path, "body {}").unwrap();

        let (mut ctx, _) = context();
        let first = ctx.open_file(&path).unwrap();
        let other = ctx.new_document();
        assert_eq!(ctx.session().active_id(), Some(other));

        let again = ctx.open_file(&path).unwrap();
        assert_eq!(again, first);
        assert_eq!(ctx.session().len(), 2);
        assert_eq!(ctx.active_document().unwrap().language(), Some(LanguageId::Css));
    }

    #[test]
    fn test_open_missing_file_creates_no_tab() {
        let dir = tempdir().unwrap();
        let (mut ctx, _) = context();
        let mut events = EventHandler::new(ctx.subscribe());

        let err = ctx.open_file(dir.path().join("nope.c")).unwrap_err();
        assert!(matches!(err, CoreError::FileNotFound(_)));
        assert!(ctx.session().is_empty());
        assert_eq!(notices(&mut events).len(), 1);
    }

    #[test]
    fn test_save_untitled_asks_for_path() {
        let dir = tempdir().unwrap();
        let target = dir.path().join("hello.rs");
        let (mut ctx, _) = context();
        let id = ctx.new_document();
        ctx.update_text(id, "fn main() {}").unwrap();

        let mut events = EventHandler::new(ctx.subscribe());
        let mut cancel = ScriptedDialog::default();
        assert!(matches!(ctx.save_active(&mut cancel), Err(CoreError::Cancelled)));
        assert_eq!(cancel.save_prompts, vec![UNTITLED.to_string()]);
        assert_eq!(notices(&mut events), vec!["Save cancelled.".to_string()]);
        assert!(ctx.active_document().unwrap().path().is_none());

        let mut dialog = ScriptedDialog {
            save: Some(target.clone()),
            ..ScriptedDialog::default()
        };
        assert_eq!(ctx.save_active(&mut dialog).unwrap(), target);

        let doc = ctx.active_document().unwrap();
        assert_eq!(doc.title(), "hello.rs");
        assert_eq!(doc.language(), Some(LanguageId::Rust));
        assert!(!doc.is_modified());
        assert_eq!(std::fs::read_to_string(&target).unwrap(), "fn main() {}");

        // With a path, no dialog is shown
        ctx.update_text(id, "fn main() { }").unwrap();
        let mut untouched = ScriptedDialog::default();
        ctx.save_active(&mut untouched).unwrap();
        assert!(untouched.save_prompts.is_empty());
        assert_eq!(std::fs::read_to_string(&target).unwrap(), "fn main() { }");
    }

    #[test]
    fn test_save_failure_is_surfaced() {
        let dir = tempdir().unwrap();
        let (mut ctx, _) = context();
        ctx.open_document("x", Some(dir.path().join("missing/x.c")), None);

        let err = ctx.save_active(&mut NoDialog).unwrap_err();
        assert!(matches!(err, CoreError::Buffer(_)));
    }

    #[test]
    fn test_failed_save_as_keeps_the_old_binding() {
        let dir = tempdir().unwrap();
        let original = dir.path().join("main.c");
        std::fs::write(&original, "int main(){return 0;}").unwrap();

        let (mut ctx, _) = context();
        let id = ctx.open_file(&original).unwrap();
        let bound = ctx.document(id).unwrap().path().unwrap().to_path_buf();

        let err = ctx.save_active_as(dir.path().join("missing/lib.rs")).unwrap_err();
        assert!(matches!(err, CoreError::Buffer(_)));

        let doc = ctx.document(id).unwrap();
        assert_eq!(doc.title(), "main.c");
        assert_eq!(doc.path(), Some(bound.as_path()));
        assert_eq!(doc.language(), Some(LanguageId::C));
    }

    #[test]
    fn test_autosave_failure_keeps_going() {
        let dir = tempdir().unwrap();
        let bad = dir.path().join("missing/a.c");
        let good = dir.path().join("b.c");

        let (mut ctx, _) = context();
        let mut events = EventHandler::new(ctx.subscribe());
        let a = ctx.open_document("a", Some(bad.clone()), None);
        let b = ctx.open_document("b", Some(good.clone()), None);

        ctx.switch_to(a).unwrap();
        ctx.handle_message(SessionMessage::AutosaveTick);
        let failed = std::iter::from_fn(|| events.try_next())
            .any(|e| matches!(e, EditorEvent::AutosaveFailed { ref path, .. } if *path == bad));
        assert!(failed);

        ctx.switch_to(b).unwrap();
        ctx.handle_message(SessionMessage::AutosaveTick);
        assert_eq!(std::fs::read_to_string(&good).unwrap(), "b");
    }

    #[test]
    fn test_tree_activation_opens_with_language() {
        let dir = tempdir().unwrap();
        std::fs::create_dir(dir.path().join(".git")).unwrap();
        std::fs::write(dir.path().join("main.rs"), "fn main() {}").unwrap();

        let (mut ctx, _) = context();
        let tree = ctx.open_workspace(dir.path()).unwrap();
        assert!(tree.root.children.iter().all(|n| n.name != ".git"));
        let leaf = tree
            .root
            .children
            .iter()
            .find(|n| n.name == "main.rs")
            .unwrap()
            .path
            .clone();
        let root = tree.root.path.clone();

        let id = ctx.activate_tree_node(&leaf).unwrap();
        let doc = ctx.document(id).unwrap();
        assert_eq!(doc.language(), Some(LanguageId::Rust));
        assert_eq!(doc.text(), "fn main() {}");

        assert!(matches!(
            ctx.activate_tree_node(&root),
            Err(CoreError::InvalidOperation(_))
        ));
        assert!(matches!(
            ctx.activate_tree_node(root.join(".git")),
            Err(CoreError::FileNotFound(_))
        ));
    }

    #[test]
    fn test_same_file_under_two_spellings_shares_a_tab() {
        let dir = tempdir().unwrap();
        std::fs::create_dir(dir.path().join("sub")).unwrap();
        std::fs::write(dir.path().join("main.rs"), "fn main() {}").unwrap();

        let (mut ctx, _) = context();
        let first = ctx.open_file(dir.path().join("sub/../main.rs")).unwrap();

        let leaf = ctx
            .open_workspace(dir.path())
            .unwrap()
            .root
            .children
            .iter()
            .find(|n| n.name == "main.rs")
            .unwrap()
            .path
            .clone();
        let second = ctx.activate_tree_node(&leaf).unwrap();

        assert_eq!(first, second);
        assert_eq!(ctx.session().len(), 1);
        assert_eq!(ctx.document(first).unwrap().path(), Some(leaf.as_path()));
    }

    #[tokio::test]
    async fn test_build_and_run_round_trip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("main.c");
        std::fs::write(&path, "int main(){return 0;}").unwrap();

        let (mut ctx, launcher) = context();
        let mut events = EventHandler::new(ctx.subscribe());
        ctx.open_file(&path).unwrap();

        let id = ctx.build_and_run().unwrap();
        assert_eq!(ctx.running_builds(), 1);

        let message = tokio::time::timeout(Duration::from_secs(5), ctx.next_message())
            .await
            .unwrap()
            .unwrap();
        ctx.handle_message(message);
        assert_eq!(ctx.running_builds(), 0);

        let source = path.canonicalize().unwrap();
        let commands = launcher.commands.lock().unwrap().clone();
        assert_eq!(commands.len(), 1);
        assert!(commands[0].starts_with(&format!("gcc \"{}\" -o ", source.display())));

        let finished = std::iter::from_fn(|| events.try_next()).any(|e| {
            matches!(e, EditorEvent::BuildFinished { id: done, exit_code: Some(0) } if done == id)
        });
        assert!(finished);
    }

    #[tokio::test]
    async fn test_unsupported_extension_spawns_nothing() {
        let (mut ctx, launcher) = context();
        ctx.open_document("body {}", Some(PathBuf::from("/w/site.css")), Some(LanguageId::Css));
        assert!(matches!(
            ctx.build_and_run(),
            Err(CoreError::Build(BuildError::Unsupported { .. }))
        ));
        assert!(launcher.commands.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_autosave_timer_and_shutdown() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("notes.rs");

        let mut config = Config::default();
        config.session.autosave_interval_secs = 1;
        let mut ctx = EditorSessionContext::new(config, Arc::new(RecordingLauncher::default()));
        ctx.open_document("// autosaved", Some(path.clone()), Some(LanguageId::Rust));
        ctx.start_autosave().unwrap();
        ctx.start_autosave().unwrap();
        assert!(ctx.autosave_running());

        let message = tokio::time::timeout(Duration::from_secs(5), ctx.next_message())
            .await
            .unwrap()
            .unwrap();
        assert!(matches!(message, SessionMessage::AutosaveTick));
        ctx.handle_message(message);
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "// autosaved");

        ctx.shutdown();
        assert!(!ctx.autosave_running());
    }

    #[test]
    fn test_execute_commands() {
        let dir = tempdir().unwrap();
        let src = dir.path().join("app.js");
        std::fs::write(&src, "console.log(1)").unwrap();

        let (mut ctx, _) = context();
        let mut dialog = ScriptedDialog {
            open: Some(src.clone()),
            ..ScriptedDialog::default()
        };

        ctx.execute(Command::OpenFile { path: None }, &mut dialog).unwrap();
        assert_eq!(ctx.active_document().unwrap().language(), Some(LanguageId::JavaScript));

        ctx.execute(Command::NewFile, &mut dialog).unwrap();
        ctx.execute(Command::SwitchTab { index: 0 }, &mut dialog).unwrap();
        let canonical = src.canonicalize().unwrap();
        assert_eq!(ctx.active_document().unwrap().path(), Some(canonical.as_path()));

        ctx.execute(Command::SetDarkMode(true), &mut dialog).unwrap();
        assert!(ctx.dark_mode());

        let copy = dir.path().join("copy.js");
        ctx.execute(Command::SaveAs { path: Some(copy.clone()) }, &mut dialog).unwrap();
        assert_eq!(std::fs::read_to_string(&copy).unwrap(), "console.log(1)");

        ctx.execute(Command::CloseFile, &mut dialog).unwrap();
        assert_eq!(ctx.session().len(), 1);

        assert!(matches!(
            ctx.execute(Command::OpenFile { path: None }, &mut dialog),
            Err(CoreError::Cancelled)
        ));

        ctx.execute(Command::Quit, &mut dialog).unwrap();
        assert!(ctx.should_quit());
    }
}
