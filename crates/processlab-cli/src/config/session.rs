//! Identity and placement of the editing session.

use clap::Args;
use processlab_session::SessionContext;
use serde::{Deserialize, Serialize};

/// Session context options.
#[derive(Debug, Clone, Default, Args, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Name recorded as the author of changes
    #[arg(long = "actor", env = "PROCESSLAB_ACTOR")]
    pub actor: Option<String>,

    /// Workspace the session belongs to
    #[arg(long = "workspace", env = "PROCESSLAB_WORKSPACE_ID")]
    pub workspace_id: Option<String>,

    /// Project new processes are created in
    #[arg(long = "project", env = "PROCESSLAB_PROJECT_ID")]
    pub project_id: Option<String>,

    /// Folder new processes are created in
    #[arg(long = "folder", env = "PROCESSLAB_FOLDER_ID")]
    pub folder_id: Option<String>,
}

impl SessionConfig {
    /// Builds the session context.
    pub fn to_context(&self) -> SessionContext {
        SessionContext {
            actor: self.actor.clone(),
            workspace_id: self.workspace_id.clone(),
            project_id: self.project_id.clone(),
            folder_id: self.folder_id.clone(),
        }
    }
}
