use std::path::PathBuf;

use thiserror::Error;

use crate::model::TargetCpu;

/// The error type used throughout this crate.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum RelinkerError {
    #[error("no libraries were supplied to the planner")]
    EmptyInput,

    #[error("cycle detected in the library dependency graph at node {0}")]
    CyclicLibraryGraph(String),

    #[error("no toolchain is registered for cpu {0:?}")]
    UnknownCpu(TargetCpu),

    #[error("symbols-needed artifact is missing: {0}")]
    MissingSymbolArtifact(PathBuf),

    #[error("toolchain command {command} failed: {stderr}")]
    ToolchainError { command: String, stderr: String },

    #[error("link of {0} produced a malformed result: {1}")]
    LinkError(PathBuf, String),

    #[error("invalid manifest: {0}")]
    InvalidManifest(String),

    #[error("I/O error on {path}: {source}")]
    IoError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl RelinkerError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        RelinkerError::IoError {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, RelinkerError>;
