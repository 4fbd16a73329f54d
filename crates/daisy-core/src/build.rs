//! Build/run dispatch keyed on file extension.
//!
//! Planning is pure: [`plan_build`] turns the active document into a shell
//! command, or explains why it cannot. Execution goes through a
//! [`ProcessLauncher`] on a tokio task, so the main loop stays responsive
//! while a compile-and-run is in flight. Completion (or cancellation) comes
//! back as a [`SessionMessage`]; nothing here touches session state.
//!
//! The child's output is not captured and its exit code is only logged.
//!
//! On unix the shell runs in its own process group, and cancelling a build
//! kills the whole group: the compiler or the compiled program as well as
//! the shell.

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::hash::{DefaultHasher, Hash, Hasher};
use std::io;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::config::BuildConfig;
use crate::document::Document;
use crate::event::SessionMessage;
use crate::language::extension_of;

/// Identifies one dispatched build/run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BuildId(u64);

impl fmt::Display for BuildId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Why a document cannot be built.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BuildError {
    #[error("Save the file before running.")]
    Unsaved,

    #[error("Build/Run not supported for this file type.")]
    Unsupported { extension: Option<String> },

    #[error("Build/Run needs a running tokio runtime.")]
    NoRuntime,
}

/// What a build/run does with the source file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BuildKind {
    /// Compile to `artifact`, then execute it
    Compile { artifact: PathBuf },
    /// Hand the file to the platform's default handler
    Open,
}

/// A fully composed build/run command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildPlan {
    pub source: PathBuf,
    pub kind: BuildKind,
    pub command: String,
}

static NEXT_ARTIFACT: AtomicU64 = AtomicU64::new(0);

/// Maps the document's extension to a command.
///
/// | extension | command |
/// |---|---|
/// | `c` | `<c_compiler> "<src>" -o "<out>" && "<out>"` |
/// | `cpp` | same, with `<cpp_compiler>` |
/// | `rs` | same, with `<rust_compiler>` |
/// | `html`, `js` | `<opener> "<src>"` |
///
/// Every compile gets its own artifact path, so two builds never write the
/// same executable.
pub fn plan_build(
    document: Option<&Document>,
    config: &BuildConfig,
) -> Result<BuildPlan, BuildError> {
    let source = document
        .and_then(Document::path)
        .ok_or(BuildError::Unsaved)?;
    let ext = extension_of(source);

    let compiler = match ext {
        Some("c") => Some(&config.c_compiler),
        Some("cpp") => Some(&config.cpp_compiler),
        Some("rs") => Some(&config.rust_compiler),
        Some("html" | "js") => None,
        _ => {
            return Err(BuildError::Unsupported {
                extension: ext.map(str::to_string),
            });
        }
    };

    let plan = match compiler {
        Some(compiler) => {
            let artifact = artifact_path(&config.output_dir(), source);
            let command = format!(
                "{compiler} \"{src}\" -o \"{out}\" && \"{out}\"",
                src = source.display(),
                out = artifact.display(),
            );
            BuildPlan {
                source: source.to_path_buf(),
                kind: BuildKind::Compile { artifact },
                command,
            }
        }
        None => BuildPlan {
            source: source.to_path_buf(),
            kind: BuildKind::Open,
            command: format!("{} \"{}\"", config.opener(), source.display()),
        },
    };
    Ok(plan)
}

/// `<dir>/daisy-run-<pid>-<counter>-<source hash>[.exe]`
fn artifact_path(dir: &Path, source: &Path) -> PathBuf {
    let mut hasher = DefaultHasher::new();
    source.hash(&mut hasher);
    let n = NEXT_ARTIFACT.fetch_add(1, Ordering::Relaxed);
    dir.join(format!(
        "daisy-run-{}-{}-{:016x}{}",
        std::process::id(),
        n,
        hasher.finish(),
        std::env::consts::EXE_SUFFIX
    ))
}

/// Future returned by [`ProcessLauncher::launch`]: the exit code, if any.
pub type LaunchFuture = Pin<Box<dyn Future<Output = io::Result<Option<i32>>> + Send + 'static>>;

/// Runs a composed command string in a shell.
///
/// Dropping the returned future must stop the process and everything it
/// started.
pub trait ProcessLauncher: Send + Sync {
    fn launch(&self, command: &str) -> LaunchFuture;
}

/// Launches commands through the platform shell with tokio.
#[derive(Debug, Clone, Default)]
pub struct ShellLauncher {
    shell: Option<String>,
}

impl ShellLauncher {
    pub fn new(shell: Option<String>) -> Self {
        Self { shell }
    }

    pub fn from_config(config: &BuildConfig) -> Self {
        Self::new(config.shell.clone())
    }
}

impl ProcessLauncher for ShellLauncher {
    fn launch(&self, command: &str) -> LaunchFuture {
        let (default_shell, flag) = if cfg!(windows) { ("cmd", "/C") } else { ("sh", "-c") };
        let mut cmd = tokio::process::Command::new(self.shell.as_deref().unwrap_or(default_shell));
        cmd.arg(flag).arg(command).kill_on_drop(true);
        #[cfg(unix)]
        cmd.process_group(0);

        Box::pin(async move {
            let mut child = cmd.spawn()?;
            #[cfg(unix)]
            let mut group = child.id().and_then(ProcessGroup::of_leader);

            let status = child.wait().await?;

            #[cfg(unix)]
            if let Some(group) = group.as_mut() {
                group.release();
            }
            Ok::<_, io::Error>(status.code())
        })
    }
}

/// Kills a process group when dropped, unless released first.
#[cfg(unix)]
struct ProcessGroup {
    pgid: Option<nix::unistd::Pid>,
}

#[cfg(unix)]
impl ProcessGroup {
    fn of_leader(pid: u32) -> Option<Self> {
        let pid = i32::try_from(pid).ok()?;
        Some(Self {
            pgid: Some(nix::unistd::Pid::from_raw(pid)),
        })
    }

    /// The leader exited on its own; leave the group alone.
    fn release(&mut self) {
        self.pgid = None;
    }
}

#[cfg(unix)]
impl Drop for ProcessGroup {
    fn drop(&mut self) {
        use nix::sys::signal::{Signal, killpg};

        if let Some(pgid) = self.pgid.take() {
            match killpg(pgid, Signal::SIGKILL) {
                Ok(()) => tracing::debug!("Killed process group {}", pgid),
                Err(err) => tracing::debug!("Process group {} already gone: {}", pgid, err),
            }
        }
    }
}

/// Spawns build/run commands and tracks the ones still running.
pub struct BuildDispatcher {
    launcher: Arc<dyn ProcessLauncher>,
    runtime: Option<Handle>,
    sender: mpsc::UnboundedSender<SessionMessage>,
    running: HashMap<BuildId, CancellationToken>,
    next_id: u64,
}

impl BuildDispatcher {
    /// Builds run on `runtime`, or on the runtime current at dispatch time
    /// when none is given.
    pub fn new(
        launcher: Arc<dyn ProcessLauncher>,
        sender: mpsc::UnboundedSender<SessionMessage>,
        runtime: Option<Handle>,
    ) -> Self {
        Self {
            launcher,
            runtime,
            sender,
            running: HashMap::new(),
            next_id: 1,
        }
    }

    /// Starts `plan` on a background task and returns immediately.
    ///
    /// Fails with [`BuildError::NoRuntime`] when there is no runtime to run
    /// it on; nothing is spawned then.
    pub fn dispatch(&mut self, plan: &BuildPlan) -> Result<BuildId, BuildError> {
        let runtime = self
            .runtime
            .clone()
            .or_else(|| Handle::try_current().ok())
            .ok_or(BuildError::NoRuntime)?;

        let id = BuildId(self.next_id);
        self.next_id += 1;

        let token = CancellationToken::new();
        self.running.insert(id, token.clone());

        tracing::info!("Running {}: {}", id, plan.command);
        let launch = self.launcher.launch(&plan.command);
        let sender = self.sender.clone();

        runtime.spawn(async move {
            let message = tokio::select! {
                _ = token.cancelled() => SessionMessage::BuildCancelled(id),
                result = launch => SessionMessage::BuildFinished {
                    id,
                    result: result.map_err(|e| e.to_string()),
                },
            };
            let _ = sender.send(message);
        });

        Ok(id)
    }

    /// Requests cancellation of a running build. Returns false if unknown.
    pub fn cancel(&self, id: BuildId) -> bool {
        match self.running.get(&id) {
            Some(token) => {
                token.cancel();
                true
            }
            None => false,
        }
    }

    /// Cancels every running build.
    pub fn cancel_all(&self) {
        for token in self.running.values() {
            token.cancel();
        }
    }

    /// Forgets a build once its completion message was handled.
    pub fn finish(&mut self, id: BuildId) {
        self.running.remove(&id);
    }

    pub fn is_running(&self, id: BuildId) -> bool {
        self.running.contains_key(&id)
    }

    /// Returns the number of builds not yet finished.
    pub fn running_count(&self) -> usize {
        self.running.len()
    }
}
