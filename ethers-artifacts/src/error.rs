use std::{io, path::PathBuf};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, ArtifactsError>;

/// Various error types
#[derive(Debug, Error)]
pub enum ArtifactsError {
    /// Failed to walk the contracts directory
    #[error("Failed to discover sources: {0}")]
    Discovery(#[from] walkdir::Error),
    /// The contracts root exists but is a file
    #[error("Failed to discover sources: \"{}\" is not a directory", .0.display())]
    NotADirectory(PathBuf),
    /// The compiler failed for a batch of sources
    #[error("Toolchain Error: {0}")]
    Toolchain(String),
    /// An artifacts file exists but can't be used
    #[error("Invalid artifacts file \"{}\": {message}", path.display())]
    PersistedState { path: PathBuf, message: String },
    #[error(transparent)]
    SemverError(#[from] semver::Error),
    /// Deserialization error
    #[error(transparent)]
    SerdeJson(#[from] serde_json::Error),
    /// Filesystem IO error
    #[error(transparent)]
    Io(#[from] ArtifactsIoError),
    /// General purpose message
    #[error("{0}")]
    Message(String),
}

impl ArtifactsError {
    pub(crate) fn io(err: io::Error, path: impl Into<PathBuf>) -> Self {
        ArtifactsIoError::new(err, path).into()
    }
    pub(crate) fn toolchain(msg: impl Into<String>) -> Self {
        ArtifactsError::Toolchain(msg.into())
    }
    pub(crate) fn persisted(path: impl Into<PathBuf>, msg: impl ToString) -> Self {
        ArtifactsError::PersistedState { path: path.into(), message: msg.to_string() }
    }
    pub(crate) fn msg(msg: impl Into<String>) -> Self {
        ArtifactsError::Message(msg.into())
    }

    /// Whether the sources couldn't be enumerated
    pub fn is_discovery(&self) -> bool {
        matches!(self, ArtifactsError::Discovery(_) | ArtifactsError::NotADirectory(_))
    }

    /// Whether this error was raised by the compiler toolchain
    pub fn is_toolchain(&self) -> bool {
        matches!(self, ArtifactsError::Toolchain(_))
    }
}

#[derive(Debug, Error)]
#[error("\"{}\": {io}", self.path.display())]
pub struct ArtifactsIoError {
    io: io::Error,
    path: PathBuf,
}

impl ArtifactsIoError {
    pub fn new(io: io::Error, path: impl Into<PathBuf>) -> Self {
        Self { io, path: path.into() }
    }
}
