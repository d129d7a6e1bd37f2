use serde::Serialize;
use std::fmt;

/// A secondary failure that happened after the primary squash outcome was
/// already decided. These never replace the outcome; they ride along with it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SquashWarning {
    /// The ephemeral branch could not be deleted
    CleanupFailure { branch: String, reason: String },
    /// The isolated working-tree changes could not be re-applied.
    /// The stash entry carrying `label` is still in the stash list.
    StashRestoreFailure { label: String, reason: String },
}

impl fmt::Display for SquashWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SquashWarning::CleanupFailure { branch, reason } => {
                write!(f, "could not delete temporary branch '{branch}': {reason}")
            }
            SquashWarning::StashRestoreFailure { label, reason } => write!(
                f,
                "could not restore stashed changes ({reason}); they are kept in the stash as '{label}'"
            ),
        }
    }
}

/// git-at Error Types
#[derive(Debug, thiserror::Error)]
pub enum AtError {
    /// A branch, ref or target could not be resolved to a commit
    #[error("Not found: {0}")]
    NotFound(String),

    /// Replaying a commit onto the temporary branch failed
    #[error("Replay of {commit} ({subject}) failed: {reason}")]
    Conflict {
        commit: String,
        subject: String,
        reason: String,
        conflicted_files: Vec<String>,
        warnings: Vec<SquashWarning>,
    },

    /// A git invocation exited unsuccessfully
    #[error("git {command} failed{}: {stderr}", exit_suffix(.code))]
    Command {
        command: String,
        code: Option<i32>,
        stderr: String,
    },

    /// libgit2 errors
    #[error("Git error: {0}")]
    Git(#[from] git2::Error),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Branch state errors (detached HEAD, unexpected ref values)
    #[error("Branch error: {0}")]
    Branch(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Validation errors
    #[error("Validation error: {0}")]
    Validation(String),
}

fn exit_suffix(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!(" (exit {code})"),
        None => String::new(),
    }
}

impl AtError {
    pub fn not_found<S: Into<String>>(msg: S) -> Self {
        AtError::NotFound(msg.into())
    }

    pub fn config<S: Into<String>>(msg: S) -> Self {
        AtError::Config(msg.into())
    }

    pub fn branch<S: Into<String>>(msg: S) -> Self {
        AtError::Branch(msg.into())
    }

    pub fn validation<S: Into<String>>(msg: S) -> Self {
        AtError::Validation(msg.into())
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, AtError::NotFound(_))
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, AtError::Conflict { .. })
    }

    /// Warnings produced while cleaning up after this error
    pub fn warnings(&self) -> &[SquashWarning] {
        match self {
            AtError::Conflict { warnings, .. } => warnings,
            _ => &[],
        }
    }
}

pub type Result<T> = std::result::Result<T, AtError>;
