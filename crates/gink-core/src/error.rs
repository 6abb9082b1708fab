//! Error types for the scaffold pipeline

use std::error::Error as _;
use std::fmt;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Filesystem operation that failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FsOp {
    CreateDir,
    CreateFile,
    Open,
    Read,
    Write,
    Remove,
    Rename,
    Stat,
    SetPermissions,
}

impl fmt::Display for FsOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            FsOp::CreateDir => "create directory",
            FsOp::CreateFile => "create file",
            FsOp::Open => "open",
            FsOp::Read => "read",
            FsOp::Write => "write",
            FsOp::Remove => "remove",
            FsOp::Rename => "rename",
            FsOp::Stat => "inspect",
            FsOp::SetPermissions => "set permissions on",
        };
        f.write_str(s)
    }
}

/// Errors raised by the fetch, extract, rewrite and orchestration steps
#[derive(Debug, Error)]
pub enum ScaffoldError {
    #[error("working directory is unavailable")]
    WorkingDirectoryUnavailable(#[source] io::Error),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("version '{tag}' not found ({detail})")]
    VersionNotFound { tag: String, detail: String },

    #[error("failed to fetch {url}")]
    NetworkFailure {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("failed to build HTTP client")]
    HttpClient(#[source] reqwest::Error),

    #[error("invalid archive URL '{0}'")]
    InvalidUrl(String),

    #[error("archive {} is corrupt: {reason}", path.display())]
    ArchiveCorrupt { path: PathBuf, reason: String },

    #[error("failed to {op} {}", path.display())]
    Filesystem {
        op: FsOp,
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("operation cancelled")]
    Cancelled,

    #[error("background task failed")]
    Task(#[from] tokio::task::JoinError),
}

impl ScaffoldError {
    pub(crate) fn fs(op: FsOp, path: impl Into<PathBuf>, source: io::Error) -> Self {
        ScaffoldError::Filesystem {
            op,
            path: path.into(),
            source,
        }
    }

    /// Path involved in the failure, if the error is tied to one
    pub fn path(&self) -> Option<&std::path::Path> {
        match self {
            ScaffoldError::Filesystem { path, .. } | ScaffoldError::ArchiveCorrupt { path, .. } => {
                Some(path)
            }
            _ => None,
        }
    }
}

/// Pipeline stage, used to give errors their context
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// Before the first stage; only reported for runs cancelled up front
    Start,
    Validate,
    CheckExisting,
    RemoveExisting,
    Fetch,
    Extract,
    Rename,
    Rewrite,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Stage::Start => "starting",
            Stage::Validate => "validating request",
            Stage::CheckExisting => "checking existing project",
            Stage::RemoveExisting => "removing existing project",
            Stage::Fetch => "downloading template",
            Stage::Extract => "extracting template",
            Stage::Rename => "renaming project",
            Stage::Rewrite => "replacing package names",
        };
        f.write_str(s)
    }
}

/// A [`ScaffoldError`] tagged with the stage it happened in
#[derive(Debug, Error)]
#[error("{}", describe(.stage, .source))]
pub struct StageError {
    pub stage: Stage,
    #[source]
    pub source: ScaffoldError,
}

impl StageError {
    pub fn new(stage: Stage, source: ScaffoldError) -> Self {
        Self { stage, source }
    }

    /// The whole cause chain on one line, for user-facing output
    pub fn report(&self) -> String {
        let mut line = self.to_string();
        let mut cause = self.source.source();
        while let Some(err) = cause {
            line.push_str(": ");
            line.push_str(&err.to_string());
            cause = err.source();
        }
        line
    }
}

fn describe(stage: &Stage, source: &ScaffoldError) -> String {
    match (stage, source) {
        (Stage::Start, ScaffoldError::Cancelled) => {
            "cancelled before any work started".to_string()
        }
        (stage, ScaffoldError::Cancelled) => format!("cancelled while {stage}"),
        (stage, source) => format!("{stage} failed: {source}"),
    }
}

/// Result alias for component-level operations
pub type Result<T, E = ScaffoldError> = std::result::Result<T, E>;
