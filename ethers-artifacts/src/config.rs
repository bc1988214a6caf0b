use crate::{cache::ARTIFACTS_FILE_NAME, error::ArtifactsIoError};
use std::{
    ffi::OsString,
    path::{Path, PathBuf},
};

/// Where to find all files or where to write them
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct ProjectPathsConfig {
    /// Directory that is searched for contract sources
    pub root: PathBuf,
    /// The artifacts file
    pub artifacts: PathBuf,
}

impl ProjectPathsConfig {
    pub fn builder() -> ProjectPathsConfigBuilder {
        ProjectPathsConfigBuilder::default()
    }

    /// Creates a new config with the current directory as root and `./contracts.json` as
    /// artifacts file
    pub fn current() -> Result<Self, ArtifactsIoError> {
        Self::builder().build()
    }

    /// The file that is locked while the artifacts file is regenerated: `<artifacts>.lock`.
    ///
    /// It is created on the first run and never removed.
    pub fn lock_file(&self) -> PathBuf {
        let mut lock = OsString::from(self.artifacts.as_os_str());
        lock.push(".lock");
        PathBuf::from(lock)
    }
}

#[derive(Debug, Clone, Default)]
pub struct ProjectPathsConfigBuilder {
    root: Option<PathBuf>,
    artifacts: Option<PathBuf>,
}

impl ProjectPathsConfigBuilder {
    pub fn root(mut self, root: impl Into<PathBuf>) -> Self {
        self.root = Some(root.into());
        self
    }

    pub fn artifacts(mut self, artifacts: impl Into<PathBuf>) -> Self {
        self.artifacts = Some(artifacts.into());
        self
    }

    /// Resolves relative paths against the current working directory.
    ///
    /// The root is canonicalized if it exists, a missing root is only reported once the project
    /// is compiled.
    pub fn build(self) -> Result<ProjectPathsConfig, ArtifactsIoError> {
        let cwd = std::env::current_dir().map_err(|err| ArtifactsIoError::new(err, "."))?;
        let root = self.root.map(|root| cwd.join(root)).unwrap_or_else(|| cwd.clone());
        let root = dunce::canonicalize(&root).unwrap_or(root);
        let artifacts =
            cwd.join(self.artifacts.unwrap_or_else(|| PathBuf::from(ARTIFACTS_FILE_NAME)));
        Ok(ProjectPathsConfig { root, artifacts })
    }

    /// Same as [`Self::build`] but with relative paths resolved against `base`
    pub fn build_with_root(self, base: impl AsRef<Path>) -> ProjectPathsConfig {
        let base = base.as_ref();
        let root = self.root.map(|root| base.join(root)).unwrap_or_else(|| base.to_path_buf());
        let artifacts =
            base.join(self.artifacts.unwrap_or_else(|| PathBuf::from(ARTIFACTS_FILE_NAME)));
        ProjectPathsConfig { root, artifacts }
    }
}
