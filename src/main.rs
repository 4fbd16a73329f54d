//! # Daisy - A Small Tabbed Source Editor
//!
//! Headless front end for the editing session. It opens files and a project
//! folder, then either builds and runs the active file once or keeps the
//! session alive with autosave until Ctrl-C.
//!
//! ## Quick Start
//!
//! ```bash
//! # Open files and autosave them every 60 seconds
//! cargo run -- src/main.c notes.rs
//!
//! # Compile and run a C file, exit with its status
//! cargo run -- --run hello.c
//!
//! # Index a project folder
//! cargo run -- --workspace path/to/project -v
//! ```

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use daisy_core::{BuildId, Config, EditorEvent, EditorSessionContext, EventHandler, SessionMessage};

/// Daisy - a small tabbed source editor
#[derive(Parser, Debug)]
#[command(name = "daisy")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Files to open, one tab each; the last one is active
    #[arg(value_name = "FILE")]
    files: Vec<PathBuf>,

    /// Workspace directory to index
    #[arg(short, long, value_name = "DIR")]
    workspace: Option<PathBuf>,

    /// Start in dark mode
    #[arg(long)]
    dark: bool,

    /// Build/run the active file and exit with its status
    #[arg(long)]
    run: bool,

    /// Config file to use instead of the default location
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Autosave interval in seconds
    #[arg(long, value_name = "SECS")]
    autosave_secs: Option<u64>,

    /// Verbose logging
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    // Parse command line arguments
    let args = Args::parse();

    // Initialize logging
    let log_level = match args.verbose {
        0 => tracing::Level::WARN,
        1 => tracing::Level::INFO,
        2 => tracing::Level::DEBUG,
        _ => tracing::Level::TRACE,
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_level(true),
        )
        .with(tracing_subscriber::filter::LevelFilter::from_level(
            log_level,
        ))
        .init();

    tracing::info!("Starting Daisy v{}", env!("CARGO_PKG_VERSION"));

    let config = load_config(&args)?;
    let mut ctx = EditorSessionContext::with_shell(config);

    // Notices go to stderr, the way a status bar would show them
    let mut events = EventHandler::new(ctx.subscribe());
    let printer = tokio::spawn(async move {
        while let Some(event) = events.next().await {
            match event {
                EditorEvent::Notice(text) => eprintln!("{text}"),
                EditorEvent::AutosaveFailed { path, error } => {
                    eprintln!("Autosave of {} failed: {}", path.display(), error)
                }
                EditorEvent::Quit => break,
                _ => {}
            }
        }
    });

    if let Some(dir) = &args.workspace {
        let tree = ctx
            .open_workspace(dir)
            .with_context(|| format!("Cannot open workspace {}", dir.display()))?;
        tracing::info!("{} files in workspace", tree.files().count());
    }

    for file in &args.files {
        // A failed open has already been reported as a notice
        if let Err(err) = ctx.open_file(file) {
            tracing::debug!("Skipping {}: {}", file.display(), err);
        }
    }

    let status = if args.run {
        run_active(&mut ctx).await
    } else {
        edit_until_interrupted(&mut ctx).await.map(|()| ExitCode::SUCCESS)
    };

    ctx.shutdown();
    ctx.quit();
    if let Err(err) = printer.await {
        tracing::debug!("Notice printer ended abnormally: {}", err);
    }

    status
}

/// Reads the config named on the command line, or the default one.
fn load_config(args: &Args) -> anyhow::Result<Config> {
    let mut config = match &args.config {
        Some(path) => Config::load_from(path)
            .with_context(|| format!("Cannot load config {}", path.display()))?,
        None => Config::load(),
    };

    if args.dark {
        config.session.dark_mode = true;
    }
    if let Some(secs) = args.autosave_secs {
        config.session.autosave_interval_secs = secs;
    }
    Ok(config)
}

/// Builds and runs the active document, waiting for it to finish.
async fn run_active(ctx: &mut EditorSessionContext) -> anyhow::Result<ExitCode> {
    // A refused build has already been reported as a notice
    let Ok(id) = ctx.build_and_run() else {
        return Ok(ExitCode::FAILURE);
    };

    loop {
        tokio::select! {
            message = ctx.next_message() => {
                let message = message.context("Session message channel closed")?;
                let outcome = build_outcome(&message, id);
                ctx.handle_message(message);
                if let Some(code) = outcome {
                    return Ok(code);
                }
            }
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Interrupted, cancelling {}", id);
                ctx.cancel_build(id);
            }
        }
    }
}

/// The exit status for `id`, once `message` reports that it ended.
fn build_outcome(message: &SessionMessage, id: BuildId) -> Option<ExitCode> {
    match message {
        SessionMessage::BuildFinished { id: done, result } if *done == id => Some(match result {
            Ok(Some(code)) => ExitCode::from(u8::try_from(*code).unwrap_or(1)),
            Ok(None) | Err(_) => ExitCode::FAILURE,
        }),
        SessionMessage::BuildCancelled(done) if *done == id => Some(ExitCode::FAILURE),
        _ => None,
    }
}

/// Keeps the session alive with autosave until Ctrl-C.
async fn edit_until_interrupted(ctx: &mut EditorSessionContext) -> anyhow::Result<()> {
    ctx.start_autosave().context("Cannot start autosave")?;
    loop {
        tokio::select! {
            Some(message) = ctx.next_message() => ctx.handle_message(message),
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Interrupted");
                break;
            }
        }
    }

    if ctx.session().has_unsaved_changes() {
        tracing::warn!("Exiting with unsaved changes");
    }
    Ok(())
}
