//! Error taxonomy for project generation
//!
//! Everything raised by the library ends up in [`Error`]. Variants map onto the
//! failure classes the CLI reports: bad user input (recoverable by asking
//! again), external tool failures, patch failures, filesystem preconditions and
//! unsupported deployment combinations.

use crate::config::patch::PatchError;
use crate::features::Feature;
use crate::planner::DeploymentProfile;
use crate::runtime::invoker::ToolStatus;
use std::path::PathBuf;
use thiserror::Error;

/// Invalid name or flag combination
#[derive(Debug, Error)]
pub enum UserInputError {
    #[error("invalid project name '{name}': {reason}")]
    InvalidName { name: String, reason: String },

    #[error("feature '{first}' cannot be combined with '{second}'")]
    ConfigurationConflict { first: Feature, second: Feature },

    #[error("feature '{feature}' requires '{required}' to be selected")]
    MissingRequirement { feature: Feature, required: Feature },

    #[error("unknown feature '{0}'")]
    UnknownFeature(String),
}

/// Library-wide error
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    UserInput(#[from] UserInputError),

    #[error("`{command}` failed: {status}")]
    ExternalTool { command: String, status: ToolStatus },

    #[error("`{command}` could not be started: {source}")]
    ToolSpawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Patch(#[from] PatchError),

    #[error("{}: {reason}", path.display())]
    FilesystemPrecondition { path: PathBuf, reason: String },

    #[error("the {profile} profile does not support '{feature}'")]
    UnsupportedProfileCombination {
        profile: DeploymentProfile,
        feature: Feature,
    },

    #[error("missing required runtimes:\n{0}")]
    MissingRuntimes(String),

    #[error("template '{0}' not found")]
    TemplateNotFound(String),

    #[error("template pack {location}: {reason}")]
    TemplatePack { location: String, reason: String },

    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },
}

impl Error {
    pub(crate) fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    /// Whether re-prompting the user could fix this error
    pub fn is_user_input(&self) -> bool {
        matches!(self, Error::UserInput(_))
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
