//! Utilities for mocking project workspaces
use crate::{
    artifacts::{ArtifactsMap, CompactArtifact},
    compile::{Compiler, Compilers, SOLIDITY_EXTENSIONS},
    config::ProjectPathsConfig,
    error::{ArtifactsError, Result},
    utils, Project, ProjectCompileOutput,
};
use once_cell::sync::Lazy;
use regex::Regex;
use sha2::{Digest, Sha256};
use std::{
    collections::{BTreeMap, BTreeSet},
    fs,
    path::{Path, PathBuf},
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Mutex,
    },
};
use tempfile::TempDir;

static RE_CONTRACT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(?:contract|library|interface)\s+(?P<name>\w+)").unwrap());

/// A [`Compiler`] for `.sol` files that doesn't need `solc` and records every invocation.
///
/// Every `contract`, `library` or `interface` declaration becomes an artifact whose bytecode is
/// derived from the file content, so any change to a file changes the bytecode of everything
/// declared in it. Clones share the recorded calls.
#[derive(Debug, Clone, Default)]
pub struct MockCompiler {
    calls: Arc<Mutex<Vec<BTreeSet<PathBuf>>>>,
    failing: Arc<AtomicBool>,
}

impl MockCompiler {
    /// Makes every following `compile_batch` call fail
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// The number of `compile_batch` calls so far
    pub fn calls(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    /// The files of every `compile_batch` call so far
    pub fn batches(&self) -> Vec<BTreeSet<PathBuf>> {
        self.calls.lock().unwrap().clone()
    }

    /// All files that were compiled so far
    pub fn compiled_files(&self) -> BTreeSet<PathBuf> {
        self.batches().into_iter().flatten().collect()
    }

    pub fn reset(&self) {
        self.calls.lock().unwrap().clear();
    }

    fn artifact(name: &str, content: &str) -> CompactArtifact {
        let digest = |prefix: &str| {
            let digest = Sha256::new().chain_update(prefix).chain_update(name);
            hex::encode(digest.chain_update(content).finalize())
        };
        CompactArtifact {
            abi: serde_json::json!([{
                "type": "function",
                "name": format!("{}Id", name),
                "inputs": [],
                "outputs": []
            }]),
            bytecode: digest("creation"),
            bytecode_runtime: digest("runtime"),
        }
    }
}

impl Compiler for MockCompiler {
    fn language(&self) -> &str {
        "Solidity"
    }

    fn extensions(&self) -> &[&'static str] {
        SOLIDITY_EXTENSIONS
    }

    fn compile_batch(
        &self,
        root: &Path,
        files: &BTreeSet<PathBuf>,
    ) -> Result<BTreeMap<String, CompactArtifact>> {
        self.calls.lock().unwrap().push(files.clone());
        if self.failing.load(Ordering::SeqCst) {
            return Err(ArtifactsError::toolchain("mock compiler failure"))
        }
        let mut artifacts = BTreeMap::new();
        for file in files {
            let path = root.join(file);
            let content = fs::read_to_string(&path).map_err(|err| ArtifactsError::io(err, &path))?;
            for cap in RE_CONTRACT.captures_iter(&content) {
                let name = &cap["name"];
                artifacts.insert(
                    format!("{}:{}", utils::source_name(file), name),
                    Self::artifact(name, &content),
                );
            }
        }
        Ok(artifacts)
    }
}

/// A [`Project`] wrapper that lives in a new temporary directory and compiles with a
/// [`MockCompiler`]
///
/// Once `TempProject` is dropped, the temp dir is automatically removed, see [`TempDir::drop()`]
pub struct TempProject {
    /// temporary workspace root
    _root: TempDir,
    /// actual project workspace with the `root` tempdir as its root
    inner: Project,
    compiler: MockCompiler,
}

impl TempProject {
    /// Creates a new temp project with a `contracts` source directory and the artifacts file at
    /// `<tmp>/contracts.json`
    pub fn mocked() -> Result<Self> {
        let tmp_dir = tempfile::Builder::new()
            .prefix("temp-project")
            .tempdir()
            .map_err(|err| ArtifactsError::io(err, std::env::temp_dir()))?;
        let root = dunce::canonicalize(tmp_dir.path())
            .map_err(|err| ArtifactsError::io(err, tmp_dir.path()))?;
        let paths = ProjectPathsConfig::builder().root("contracts").build_with_root(&root);
        fs::create_dir_all(&paths.root).map_err(|err| ArtifactsError::io(err, &paths.root))?;

        let compiler = MockCompiler::default();
        let inner = Project::builder()
            .paths(paths)
            .compilers(Compilers::empty().with(compiler.clone()))
            .build()?;
        Ok(Self { _root: tmp_dir, inner, compiler })
    }

    pub fn project(&self) -> &Project {
        &self.inner
    }

    pub fn compile(&self) -> Result<ProjectCompileOutput> {
        self.project().compile()
    }

    /// The configured paths of the project
    pub fn paths(&self) -> &ProjectPathsConfig {
        &self.project().paths
    }

    /// The spy compiler of the project
    pub fn compiler(&self) -> &MockCompiler {
        &self.compiler
    }

    /// Returns the path to the sources directory
    pub fn sources_path(&self) -> &Path {
        &self.paths().root
    }

    /// Returns the path to the artifacts file
    pub fn artifacts_path(&self) -> &Path {
        &self.paths().artifacts
    }

    /// Writes a source file relative to the sources directory, creating parent directories
    pub fn add_source(&self, name: impl AsRef<Path>, content: impl AsRef<str>) -> Result<PathBuf> {
        let path = self.sources_path().join(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|err| ArtifactsError::io(err, parent))?;
        }
        fs::write(&path, content.as_ref()).map_err(|err| ArtifactsError::io(err, &path))?;
        Ok(path)
    }

    pub fn remove_source(&self, name: impl AsRef<Path>) -> Result<()> {
        let path = self.sources_path().join(name);
        fs::remove_file(&path).map_err(|err| ArtifactsError::io(err, &path))
    }

    /// The raw content of the artifacts file
    pub fn artifacts_file_content(&self) -> Result<String> {
        let path = self.artifacts_path();
        fs::read_to_string(path).map_err(|err| ArtifactsError::io(err, path))
    }

    /// Overwrites the artifacts file with raw content
    pub fn write_artifacts_file(&self, content: impl AsRef<str>) -> Result<()> {
        let path = self.artifacts_path();
        fs::write(path, content.as_ref()).map_err(|err| ArtifactsError::io(err, path))
    }

    /// The parsed artifacts file
    pub fn artifacts(&self) -> Result<ArtifactsMap> {
        utils::read_json_file(self.artifacts_path())
    }

    /// Compiles the project twice and makes sure the second run neither invokes the compiler
    /// nor changes the artifacts file
    pub fn ensure_recompile_unchanged(&self) -> Result<()> {
        self.compile()?;
        let before = self.artifacts_file_content()?;
        let calls = self.compiler.calls();
        let output = self.compile()?;
        if !output.is_unchanged() {
            return Err(ArtifactsError::msg(format!("expected unchanged output, got {}", output)))
        }
        if self.compiler.calls() != calls {
            return Err(ArtifactsError::msg("compiler invoked for unchanged sources"))
        }
        if self.artifacts_file_content()? != before {
            return Err(ArtifactsError::msg("artifacts file changed for unchanged sources"))
        }
        Ok(())
    }
}
