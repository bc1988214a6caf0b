//! Support for reading and writing the artifacts file
use crate::{
    artifacts::ArtifactsMap,
    error::{ArtifactsError, Result},
};
use fs4::FileExt;
use std::{
    fs::{self, File, OpenOptions},
    io::{self, Write},
    path::{Path, PathBuf},
};

/// The file name of the default artifacts file
pub const ARTIFACTS_FILE_NAME: &str = "contracts.json";

/// The artifacts file of a project, see [`ArtifactsMap`]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ArtifactsFile {
    path: PathBuf,
    lock_path: PathBuf,
}

impl ArtifactsFile {
    pub fn new(path: impl Into<PathBuf>, lock_path: impl Into<PathBuf>) -> Self {
        Self { path: path.into(), lock_path: lock_path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads the artifacts json file.
    ///
    /// Returns `Ok(None)` if there's no artifacts file yet. An artifacts file that exists but
    /// can't be read or parsed is an error, so that valid cache data is never silently
    /// discarded.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use ethers_artifacts::cache::ArtifactsFile;
    ///
    /// let file = ArtifactsFile::new("contracts.json", "contracts.json.lock");
    /// let artifacts = file.read().unwrap().unwrap_or_default();
    /// ```
    #[tracing::instrument(skip_all, name = "artifacts-file::read")]
    pub fn read(&self) -> Result<Option<ArtifactsMap>> {
        let path = self.path.as_path();
        tracing::trace!("reading artifacts file at {}", path.display());
        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                tracing::trace!("no artifacts file at {}", path.display());
                return Ok(None)
            }
            Err(err) => return Err(ArtifactsError::persisted(path, err)),
        };
        let artifacts: ArtifactsMap =
            serde_json::from_str(&content).map_err(|err| ArtifactsError::persisted(path, err))?;
        tracing::trace!("read artifacts file with {} entries", artifacts.len());
        Ok(Some(artifacts))
    }

    /// Replaces the artifacts file with the given artifacts.
    ///
    /// The json is written to a temporary file next to the artifacts file first and then
    /// renamed, so the file is either the old or the new version, never a mix. The new file
    /// keeps the permissions of the file it replaces, a new file is created `0644` on unix.
    #[tracing::instrument(skip_all, name = "artifacts-file::write")]
    pub fn write(&self, artifacts: &ArtifactsMap) -> Result<()> {
        let path = self.path.as_path();
        let dir = parent_dir(path);
        fs::create_dir_all(dir).map_err(|err| ArtifactsError::io(err, dir))?;

        let mut file =
            tempfile::NamedTempFile::new_in(dir).map_err(|err| ArtifactsError::io(err, dir))?;
        tracing::trace!("writing {} artifacts to \"{}\"", artifacts.len(), path.display());
        serde_json::to_writer_pretty(&mut file, artifacts)?;
        file.write_all(b"\n").map_err(|err| ArtifactsError::io(err, file.path()))?;
        if let Some(permissions) = target_permissions(path)? {
            file.as_file()
                .set_permissions(permissions)
                .map_err(|err| ArtifactsError::io(err, file.path()))?;
        }
        file.persist(path).map_err(|err| ArtifactsError::io(err.error, path))?;
        tracing::trace!("artifacts file located: \"{}\"", path.display());
        Ok(())
    }

    /// Blocks until this process holds the exclusive lock of the artifacts file.
    ///
    /// The lock is released when the returned guard is dropped. The lock file itself stays in
    /// place, removing it would let another process lock a different file of the same name.
    pub fn lock(&self) -> Result<ArtifactsLock> {
        let path = self.lock_path.as_path();
        let dir = parent_dir(path);
        fs::create_dir_all(dir).map_err(|err| ArtifactsError::io(err, dir))?;
        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .open(path)
            .map_err(|err| ArtifactsError::io(err, path))?;
        tracing::trace!("acquiring lock {}", path.display());
        FileExt::lock_exclusive(&file).map_err(|err| ArtifactsError::io(err, path))?;
        Ok(ArtifactsLock { file, path: path.to_path_buf() })
    }
}

/// Exclusive lock of an artifacts file, see [`ArtifactsFile::lock`]
#[derive(Debug)]
pub struct ArtifactsLock {
    file: File,
    path: PathBuf,
}

impl Drop for ArtifactsLock {
    fn drop(&mut self) {
        if let Err(err) = FileExt::unlock(&self.file) {
            tracing::warn!("failed to release lock {}: {}", self.path.display(), err);
        } else {
            tracing::trace!("released lock {}", self.path.display());
        }
    }
}

/// The permissions the artifacts file at `path` should have after it was replaced
fn target_permissions(path: &Path) -> Result<Option<fs::Permissions>> {
    match fs::metadata(path) {
        Ok(metadata) => Ok(Some(metadata.permissions())),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(default_permissions()),
        Err(err) => Err(ArtifactsError::io(err, path)),
    }
}

#[cfg(unix)]
fn default_permissions() -> Option<fs::Permissions> {
    use std::os::unix::fs::PermissionsExt;
    Some(fs::Permissions::from_mode(0o644))
}

#[cfg(not(unix))]
fn default_permissions() -> Option<fs::Permissions> {
    None
}

fn parent_dir(path: &Path) -> &Path {
    match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    }
}
