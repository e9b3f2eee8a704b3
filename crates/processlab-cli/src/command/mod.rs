//! Subcommands.

mod document;
mod edit;
mod history;
mod offline;

use clap::Subcommand;
use processlab_api::ApiServices;
use processlab_session::{EditBridge, ProcessSession, SessionContext, VersionStore};

pub use self::edit::EditArgs;
pub use self::history::{CreateArgs, DiffArgs, RestoreArgs, SaveArgs, ShowArgs, VersionsArgs};
pub use self::offline::{ConvertArgs, LintArgs};
use crate::config::{Cli, create_services};

/// Available subcommands.
#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// List the versions of a process
    Versions(VersionsArgs),
    /// Print a version's document
    Show(ShowArgs),
    /// Create a new, empty process
    Create(CreateArgs),
    /// Save a local document as a new version
    Save(SaveArgs),
    /// Make an earlier version current again
    Restore(RestoreArgs),
    /// Compare two versions
    Diff(DiffArgs),
    /// Apply a change described in plain words
    Edit(EditArgs),
    /// Convert a document between JSON and BPMN XML
    Convert(ConvertArgs),
    /// Check a local document for structural problems
    Lint(LintArgs),
}

impl Command {
    /// Returns `true` for commands that never contact the API.
    pub fn is_offline(&self) -> bool {
        matches!(self, Self::Convert(_) | Self::Lint(_))
    }

    /// Runs the command and returns what to print.
    pub async fn run(self, cli: &Cli) -> anyhow::Result<String> {
        match self {
            Self::Convert(args) => args.run().await,
            Self::Lint(args) => args.run().await,
            command => {
                let editor = Editor::new(cli.session.to_context(), create_services(cli)?);
                command.run_online(&editor).await
            }
        }
    }

    async fn run_online(self, editor: &Editor) -> anyhow::Result<String> {
        match self {
            Self::Versions(args) => args.run(editor).await,
            Self::Show(args) => args.run(editor).await,
            Self::Create(args) => args.run(editor).await,
            Self::Save(args) => args.run(editor).await,
            Self::Restore(args) => args.run(editor).await,
            Self::Diff(args) => args.run(editor).await,
            Self::Edit(args) => args.run(editor).await,
            Self::Convert(args) => args.run().await,
            Self::Lint(args) => args.run().await,
        }
    }
}

/// A session and its edit bridge, wired to one set of API services.
#[derive(Debug, Clone)]
pub struct Editor {
    pub session: ProcessSession,
    pub bridge: EditBridge,
}

impl Editor {
    pub fn new(context: SessionContext, services: ApiServices) -> Self {
        let session = ProcessSession::new(VersionStore::new(context, services.versions));
        let bridge = EditBridge::new(session.clone(), services.edits);
        Self { session, bridge }
    }
}
