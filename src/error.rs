//! Failure kinds a mandatory check can end with.
use std::path::{Path, PathBuf};
use std::time::Duration;

use thiserror::Error;

use crate::config::Format;

/// A fatal check result. The first one produced ends the audit.
#[derive(Debug, Error)]
pub enum CheckFailure {
    #[error("MISSING: {}", .path.display())]
    MissingConfigFile { path: PathBuf },

    #[error("{detail}")]
    BindingMismatch { file: PathBuf, detail: String },

    #[error("UNREADABLE: {} is not valid {format}: {reason}", .file.display())]
    UnreadableConfig {
        file: PathBuf,
        format: Format,
        reason: String,
    },

    #[error("BUILD FAILED: `{command}` exited with {status}")]
    BuildFailure { command: String, status: String },

    #[error("AUTH ERROR: cloud CLI cannot reach {project_id} from this environment")]
    AuthUnreachable { project_id: String, ci_note: String },

    #[error("TIMED OUT: {step} did not finish within {}s", .after.as_secs())]
    TimedOut { step: String, after: Duration },

    #[error("UNAVAILABLE: could not run `{program}` for {step}: {source}")]
    CommandUnavailable {
        step: String,
        program: String,
        #[source]
        source: std::io::Error,
    },
}

impl CheckFailure {
    /// The file a failure is about, when it is about one.
    pub fn subject(&self) -> Option<&Path> {
        match self {
            CheckFailure::MissingConfigFile { path } => Some(path),
            CheckFailure::BindingMismatch { file, .. }
            | CheckFailure::UnreadableConfig { file, .. } => Some(file),
            _ => None,
        }
    }

    /// Follow-up guidance printed under the failure line.
    pub fn hint(&self) -> Option<String> {
        match self {
            CheckFailure::BuildFailure { .. } => {
                Some("Check the build configuration or dependencies.".to_string())
            }
            CheckFailure::AuthUnreachable { ci_note, .. } if !ci_note.is_empty() => {
                Some(format!("Note: {ci_note}"))
            }
            _ => None,
        }
    }
}
