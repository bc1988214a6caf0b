//! Support for compiling contracts
use crate::{
    artifacts::{CompactArtifact, CompilerInput, CompilerOutput, Source},
    error::{ArtifactsError, Result},
    utils,
};
use semver::Version;
use serde::Serialize;
use std::{
    collections::{BTreeMap, BTreeSet, VecDeque},
    fmt, fs,
    io::BufRead,
    path::{Path, PathBuf},
    process::{Command, Output, Stdio},
    str::FromStr,
    sync::Arc,
};

/// The name of the `solc` binary on the system
pub const SOLC: &str = "solc";

/// File extensions handled by [`Solc`]
pub const SOLIDITY_EXTENSIONS: &[&str] = &["sol"];

/// A compiler toolchain that turns a batch of source files into artifacts.
///
/// Every supported language implements this and is registered in [`Compilers`] for the file
/// extensions it handles.
pub trait Compiler: fmt::Debug {
    /// The name of the language this compiler handles, e.g. `Solidity`
    fn language(&self) -> &str;

    /// The file extensions (without the leading `.`) this compiler is responsible for
    fn extensions(&self) -> &[&'static str];

    /// Serializes the source into the form that is fed into [`utils::checksum`].
    ///
    /// The default is the unmodified source.
    fn parse(&self, code: &[u8]) -> Result<Vec<u8>> {
        Ok(code.to_vec())
    }

    /// Returns the checksum of the given source
    fn checksum(&self, code: &[u8]) -> Result<String> {
        Ok(utils::checksum(self.parse(code)?))
    }

    /// Compiles all `files` in a single invocation.
    ///
    /// `files` are relative to `root`. The returned map is keyed by `"<file>:<Contract>"` and
    /// only contains contracts declared in one of `files`. Fails if any of the files fails to
    /// compile.
    fn compile_batch(
        &self,
        root: &Path,
        files: &BTreeSet<PathBuf>,
    ) -> Result<BTreeMap<String, CompactArtifact>>;
}

/// Abstraction over `solc` command line utility
#[derive(Debug, Clone, Eq, PartialEq, PartialOrd, Ord)]
pub struct Solc(pub PathBuf);

impl Default for Solc {
    fn default() -> Self {
        std::env::var("SOLC_PATH").map(Solc::new).unwrap_or_else(|_| Solc::new(SOLC))
    }
}

impl Solc {
    /// A new instance which points to `solc`
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Solc(path.into())
    }

    /// Run `solc --standard-json` in `root` and return the `solc`'s output as
    /// `CompilerOutput`
    ///
    /// # Example
    ///
    /// ```no_run
    /// # fn main() -> Result<(), Box<dyn std::error::Error>> {
    /// use ethers_artifacts::{artifacts::{CompilerInput, Source}, Solc};
    /// use std::collections::BTreeMap;
    ///
    /// let mut sources = BTreeMap::new();
    /// sources.insert("A.sol".to_string(), Source { content: "contract A {}".to_string() });
    /// let input = CompilerInput::with_selection(sources, &["A.sol".to_string()]);
    /// let output = Solc::default().compile(".", &input)?;
    /// # Ok(())
    /// # }
    /// ```
    pub fn compile<T: Serialize>(
        &self,
        root: impl AsRef<Path>,
        input: &T,
    ) -> Result<CompilerOutput> {
        let output = self.compile_output(root, input)?;
        serde_json::from_slice(&output)
            .map_err(|err| ArtifactsError::toolchain(format!("invalid solc output: {}", err)))
    }

    pub fn compile_output<T: Serialize>(
        &self,
        root: impl AsRef<Path>,
        input: &T,
    ) -> Result<Vec<u8>> {
        let mut child = Command::new(&self.0)
            .current_dir(root)
            .arg("--standard-json")
            .stdin(Stdio::piped())
            .stderr(Stdio::piped())
            .stdout(Stdio::piped())
            .spawn()
            .map_err(|err| self.spawn_error(err))?;
        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| ArtifactsError::toolchain("failed to open solc stdin"))?;

        serde_json::to_writer(stdin, input)?;
        compile_output(child.wait_with_output().map_err(|err| self.spawn_error(err))?)
    }

    /// Returns the version from the configured `solc`
    pub fn version(&self) -> Result<Version> {
        version_from_output(
            Command::new(&self.0)
                .arg("--version")
                .stdin(Stdio::piped())
                .stderr(Stdio::piped())
                .stdout(Stdio::piped())
                .output()
                .map_err(|err| self.spawn_error(err))?,
        )
    }

    /// Reads the requested files and everything they import into a source set keyed by source
    /// unit name.
    ///
    /// Imports that can't be found under `root` are skipped, `solc` reports them.
    pub(crate) fn read_sources(
        root: &Path,
        files: &BTreeSet<PathBuf>,
    ) -> Result<BTreeMap<String, Source>> {
        let mut sources = BTreeMap::new();
        let mut queue: VecDeque<PathBuf> = files.iter().cloned().collect();
        while let Some(file) = queue.pop_front() {
            let name = utils::source_name(&file);
            if sources.contains_key(&name) {
                continue
            }
            let path = root.join(&file);
            let content = fs::read_to_string(&path).map_err(|err| ArtifactsError::io(err, &path))?;
            for import in utils::find_import_paths(&content) {
                match utils::resolve_import(&file, import) {
                    Some(resolved) if root.join(&resolved).is_file() => queue.push_back(resolved),
                    _ => tracing::trace!("unresolved import \"{}\" in {}", import, name),
                }
            }
            sources.insert(name, Source { content });
        }
        Ok(sources)
    }

    fn spawn_error(&self, err: std::io::Error) -> ArtifactsError {
        ArtifactsError::toolchain(format!("failed to run \"{}\": {}", self.0.display(), err))
    }
}

impl Compiler for Solc {
    fn language(&self) -> &str {
        "Solidity"
    }

    fn extensions(&self) -> &[&'static str] {
        SOLIDITY_EXTENSIONS
    }

    #[tracing::instrument(skip_all, name = "solc::compile_batch", fields(files = files.len()))]
    fn compile_batch(
        &self,
        root: &Path,
        files: &BTreeSet<PathBuf>,
    ) -> Result<BTreeMap<String, CompactArtifact>> {
        let sources = Self::read_sources(root, files)?;
        let selected: Vec<String> = files.iter().map(|file| utils::source_name(file)).collect();
        tracing::debug!(
            "compiling {} file(s) with {} source(s) in context",
            selected.len(),
            sources.len()
        );
        let input = CompilerInput::with_selection(sources, &selected);
        let output = self.compile(root, &input)?;

        for warning in output.warnings() {
            tracing::warn!("{}", warning);
        }
        if output.has_error() {
            let errors = output.errors().map(|err| err.to_string()).collect::<Vec<_>>();
            return Err(ArtifactsError::toolchain(errors.join("\n")))
        }
        Ok(output.into_artifacts())
    }
}

fn compile_output(output: Output) -> Result<Vec<u8>> {
    if output.status.success() {
        Ok(output.stdout)
    } else {
        Err(ArtifactsError::toolchain(String::from_utf8_lossy(&output.stderr).to_string()))
    }
}

fn version_from_output(output: Output) -> Result<Version> {
    if output.status.success() {
        let version = output
            .stdout
            .lines()
            .last()
            .ok_or_else(|| ArtifactsError::toolchain("version not found in solc output"))?
            .map_err(|err| ArtifactsError::toolchain(err.to_string()))?;
        // NOTE: semver doesn't like `+` in g++ in build metadata which is invalid semver
        Ok(Version::from_str(&version.trim_start_matches("Version: ").replace(".g++", ".gcc"))?)
    } else {
        Err(ArtifactsError::toolchain(String::from_utf8_lossy(&output.stderr).to_string()))
    }
}

impl AsRef<Path> for Solc {
    fn as_ref(&self) -> &Path {
        &self.0
    }
}

impl<T: Into<PathBuf>> From<T> for Solc {
    fn from(solc: T) -> Self {
        Solc(solc.into())
    }
}

/// The set of compilers of a project, selected by file extension.
///
/// If two compilers claim the same extension, the one registered first wins.
#[derive(Debug, Clone)]
pub struct Compilers {
    compilers: Vec<Arc<dyn Compiler>>,
}

impl Compilers {
    /// A registry without any compiler
    pub fn empty() -> Self {
        Self { compilers: Vec::new() }
    }

    /// Registers another compiler
    pub fn with(mut self, compiler: impl Compiler + 'static) -> Self {
        self.push(Arc::new(compiler));
        self
    }

    pub fn push(&mut self, compiler: Arc<dyn Compiler>) {
        self.compilers.push(compiler);
    }

    /// Returns the index of the compiler responsible for the file, if any
    pub fn position(&self, file: &Path) -> Option<usize> {
        let ext = utils::extension(file)?;
        self.compilers
            .iter()
            .position(|compiler| compiler.extensions().iter().any(|candidate| *candidate == ext))
    }

    /// Returns the compiler responsible for the file, if any
    pub fn for_file(&self, file: &Path) -> Option<&Arc<dyn Compiler>> {
        self.position(file).map(|idx| &self.compilers[idx])
    }

    pub fn get(&self, idx: usize) -> Option<&Arc<dyn Compiler>> {
        self.compilers.get(idx)
    }
}

impl Default for Compilers {
    fn default() -> Self {
        Self::empty().with(Solc::default())
    }
}

impl From<Solc> for Compilers {
    fn from(solc: Solc) -> Self {
        Self::empty().with(solc)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::create_dir_all;

    fn solc() -> Option<Solc> {
        let solc = Solc::default();
        solc.version().is_ok().then_some(solc)
    }

    #[test]
    fn can_parse_version_metadata() {
        let _version = Version::from_str("0.6.6+commit.6c089d02.Linux.gcc").unwrap();
    }

    #[test]
    fn selects_compiler_by_extension() {
        let compilers = Compilers::default();
        assert_eq!(compilers.position(Path::new("src/A.sol")), Some(0));
        assert_eq!(compilers.for_file(Path::new("A.sol")).unwrap().language(), "Solidity");
        assert!(compilers.for_file(Path::new("A.vy")).is_none());
        assert!(compilers.for_file(Path::new("README")).is_none());
        assert!(Compilers::empty().for_file(Path::new("A.sol")).is_none());
    }

    #[test]
    fn default_checksum_hashes_raw_source() {
        let solc = Solc::new("solc");
        assert_eq!(solc.checksum(b"contract A {}").unwrap(), utils::checksum(b"contract A {}"));
    }

    #[test]
    fn missing_binary_is_a_toolchain_error() {
        let solc = Solc::new("this-solc-does-not-exist");
        assert!(solc.version().unwrap_err().is_toolchain());
    }

    #[test]
    fn reads_transitive_imports() {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path();
        create_dir_all(root.join("lib")).unwrap();
        fs::write(root.join("A.sol"), "import \"./lib/Math.sol\";\ncontract Alpha {}").unwrap();
        fs::write(root.join("lib/Math.sol"), "import \"../Base.sol\";\nlibrary Math {}").unwrap();
        fs::write(root.join("Base.sol"), "contract Base {}").unwrap();
        fs::write(root.join("Unrelated.sol"), "contract Unrelated {}").unwrap();

        let files = BTreeSet::from([PathBuf::from("A.sol")]);
        let sources = Solc::read_sources(root, &files).unwrap();
        assert_eq!(
            sources.keys().cloned().collect::<Vec<_>>(),
            vec!["A.sol".to_string(), "Base.sol".to_string(), "lib/Math.sol".to_string()]
        );
    }

    #[test]
    fn missing_requested_file_is_io_error() {
        let tmp = tempfile::tempdir().unwrap();
        let files = BTreeSet::from([PathBuf::from("Missing.sol")]);
        let err = Solc::read_sources(tmp.path(), &files).unwrap_err();
        assert!(matches!(err, ArtifactsError::Io(_)));
    }

    #[test]
    fn solc_compile_batch_works() {
        let Some(solc) = solc() else { return };
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path();
        fs::write(
            root.join("A.sol"),
            "// SPDX-License-Identifier: MIT\npragma solidity >=0.4.0;\n\
             import \"./B.sol\";\ncontract Alpha is Beta {}\n",
        )
        .unwrap();
        fs::write(
            root.join("B.sol"),
            "// SPDX-License-Identifier: MIT\npragma solidity >=0.4.0;\ncontract Beta {}\n",
        )
        .unwrap();

        let files = BTreeSet::from([PathBuf::from("A.sol")]);
        let artifacts = solc.compile_batch(root, &files).unwrap();
        assert_eq!(artifacts.keys().cloned().collect::<Vec<_>>(), vec!["A.sol:Alpha".to_string()]);
        assert!(!artifacts["A.sol:Alpha"].bytecode.is_empty());
    }

    #[test]
    fn solc_reports_compile_errors() {
        let Some(solc) = solc() else { return };
        let tmp = tempfile::tempdir().unwrap();
        fs::write(tmp.path().join("Broken.sol"), "contract Broken {").unwrap();
        let files = BTreeSet::from([PathBuf::from("Broken.sol")]);
        let err = solc.compile_batch(tmp.path(), &files).unwrap_err();
        assert!(err.is_toolchain());
    }
}
