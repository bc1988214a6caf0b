//! A single named contract and its lazily derived checksum and artifacts

use crate::{
    artifacts::{ArtifactEntry, CompactArtifact},
    compile::Compiler,
    error::{ArtifactsError, Result},
    utils,
};
use once_cell::unsync::OnceCell;
use std::{
    collections::BTreeSet,
    path::{Path, PathBuf},
    sync::Arc,
};

/// A named contract declared in a source file of the project.
///
/// The checksum and the compiled outputs are derived on first access and cached for the
/// lifetime of the value. The abi, bytecode and runtime bytecode live in a single cell, they are
/// either all set or none of them is.
#[derive(Debug)]
pub struct Contract {
    name: String,
    /// project root the `source` is relative to
    root: PathBuf,
    source: PathBuf,
    /// content of the `source` file
    code: Vec<u8>,
    compiler: Arc<dyn Compiler>,
    checksum: OnceCell<String>,
    output: OnceCell<CompactArtifact>,
}

impl Contract {
    pub fn new(
        name: impl Into<String>,
        root: impl Into<PathBuf>,
        source: impl Into<PathBuf>,
        code: impl Into<Vec<u8>>,
        compiler: Arc<dyn Compiler>,
    ) -> Self {
        Self {
            name: name.into(),
            root: root.into(),
            source: source.into(),
            code: code.into(),
            compiler,
            checksum: OnceCell::new(),
            output: OnceCell::new(),
        }
    }

    /// Seeds the compiled outputs with the artifact the compiler already produced for this
    /// contract
    pub fn with_output(self, artifact: CompactArtifact) -> Self {
        // freshly constructed, so the cell is empty
        let _ = self.output.set(artifact);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The source file, relative to the project root
    pub fn source(&self) -> &Path {
        &self.source
    }

    /// Returns `true` if the compiled outputs are available without invoking the compiler
    pub fn is_compiled(&self) -> bool {
        self.output.get().is_some()
    }

    /// Returns the checksum of the contract's source
    pub fn checksum(&self) -> Result<&str> {
        self.checksum.get_or_try_init(|| self.compiler.checksum(&self.code)).map(String::as_str)
    }

    pub fn abi(&self) -> Result<&serde_json::Value> {
        Ok(&self.output()?.abi)
    }

    pub fn bytecode(&self) -> Result<&str> {
        Ok(&self.output()?.bytecode)
    }

    pub fn bytecode_runtime(&self) -> Result<&str> {
        Ok(&self.output()?.bytecode_runtime)
    }

    /// Takes over the artifacts of a previous run if they were compiled from the same source.
    ///
    /// Returns `true` if the artifact was taken. If the checksums differ, or the entry has none,
    /// nothing changes and the contract is compiled once its outputs are requested.
    pub fn absorb(&self, prior: &ArtifactEntry) -> Result<bool> {
        let checksum = self.checksum()?;
        if prior.checksum.as_deref() != Some(checksum) {
            tracing::trace!("checksum of {} changed, discarding cached artifact", self.name);
            return Ok(false)
        }
        Ok(self.output.set(prior.artifact()).is_ok())
    }

    /// Returns the persistable form of the contract, compiling it first if necessary
    pub fn export(&self) -> Result<ArtifactEntry> {
        let artifact = self.output()?.clone();
        Ok(ArtifactEntry::new(artifact, self.checksum()?))
    }

    fn output(&self) -> Result<&CompactArtifact> {
        self.output.get_or_try_init(|| self.compile())
    }

    fn compile(&self) -> Result<CompactArtifact> {
        tracing::debug!("compiling {} from {}", self.name, self.source.display());
        let files = BTreeSet::from([self.source.clone()]);
        self.compiler
            .compile_batch(&self.root, &files)?
            .into_iter()
            .find(|(qualified, _)| utils::contract_name(qualified) == self.name)
            .map(|(_, artifact)| artifact)
            .ok_or_else(|| {
                ArtifactsError::toolchain(format!(
                    "compiling \"{}\" did not produce contract {}",
                    self.source.display(),
                    self.name
                ))
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::project_util::MockCompiler;
    use std::fs;

    struct Fixture {
        dir: tempfile::TempDir,
        compiler: MockCompiler,
    }

    impl Fixture {
        fn new() -> Self {
            Fixture { dir: tempfile::tempdir().unwrap(), compiler: MockCompiler::default() }
        }

        fn contract(&self, name: &str, file: &str, code: &str) -> Contract {
            fs::write(self.dir.path().join(file), code).unwrap();
            Contract::new(name, self.dir.path(), file, code, Arc::new(self.compiler.clone()))
        }
    }

    #[test]
    fn checksum_is_derived_from_source() {
        let fixture = Fixture::new();
        let contract = fixture.contract("Alpha", "A.sol", "contract Alpha {}");
        assert_eq!(contract.checksum().unwrap(), utils::checksum("contract Alpha {}"));
        assert_eq!(fixture.compiler.calls(), 0);
    }

    #[test]
    fn compiles_lazily_once() {
        let fixture = Fixture::new();
        let contract = fixture.contract("Alpha", "A.sol", "contract Alpha {}");
        assert!(!contract.is_compiled());

        let bytecode = contract.bytecode().unwrap().to_string();
        assert!(contract.is_compiled());
        assert!(contract.abi().unwrap().is_array());
        assert!(!contract.bytecode_runtime().unwrap().is_empty());
        assert_eq!(contract.bytecode().unwrap(), bytecode);
        assert_eq!(fixture.compiler.calls(), 1);
    }

    #[test]
    fn absorbs_matching_artifact() {
        let fixture = Fixture::new();
        let contract = fixture.contract("Alpha", "A.sol", "contract Alpha {}");
        let prior = ArtifactEntry {
            abi: serde_json::json!([]),
            bytecode: "cafe".to_string(),
            bytecode_runtime: "beef".to_string(),
            checksum: Some(utils::checksum("contract Alpha {}")),
        };

        assert!(contract.absorb(&prior).unwrap());
        assert_eq!(contract.bytecode().unwrap(), "cafe");
        assert_eq!(contract.export().unwrap(), prior);
        assert_eq!(fixture.compiler.calls(), 0);
    }

    #[test]
    fn ignores_mismatched_or_missing_checksum() {
        let fixture = Fixture::new();
        let contract = fixture.contract("Alpha", "A.sol", "contract Alpha {}");
        let mut prior = ArtifactEntry {
            abi: serde_json::json!([]),
            bytecode: "cafe".to_string(),
            bytecode_runtime: "beef".to_string(),
            checksum: Some(utils::checksum("contract Alpha { }")),
        };
        assert!(!contract.absorb(&prior).unwrap());
        prior.checksum = None;
        assert!(!contract.absorb(&prior).unwrap());
        assert!(!contract.is_compiled());

        assert_ne!(contract.bytecode().unwrap(), "cafe");
        assert_eq!(fixture.compiler.calls(), 1);
    }

    #[test]
    fn seeded_output_is_kept() {
        let fixture = Fixture::new();
        let seeded = CompactArtifact {
            abi: serde_json::json!([]),
            bytecode: "01".to_string(),
            bytecode_runtime: "02".to_string(),
        };
        let contract =
            fixture.contract("Alpha", "A.sol", "contract Alpha {}").with_output(seeded.clone());
        let prior = ArtifactEntry::new(
            CompactArtifact { bytecode: "ff".to_string(), ..seeded },
            utils::checksum("contract Alpha {}"),
        );
        assert!(!contract.absorb(&prior).unwrap());
        assert_eq!(contract.bytecode().unwrap(), "01");
        assert_eq!(fixture.compiler.calls(), 0);
    }

    #[test]
    fn failed_compile_leaves_outputs_unset() {
        let fixture = Fixture::new();
        let contract = fixture.contract("Alpha", "A.sol", "contract Alpha {}");
        fixture.compiler.set_failing(true);

        assert!(contract.abi().unwrap_err().is_toolchain());
        assert!(!contract.is_compiled());
        assert!(contract.bytecode().is_err());
        assert!(contract.bytecode_runtime().is_err());
        assert!(contract.export().is_err());

        fixture.compiler.set_failing(false);
        assert!(contract.bytecode_runtime().is_ok());
        assert!(contract.is_compiled());
    }

    #[test]
    fn missing_contract_in_output_is_an_error() {
        let fixture = Fixture::new();
        let contract = fixture.contract("Gamma", "A.sol", "contract Alpha {}");
        assert!(contract.export().unwrap_err().is_toolchain());
        assert!(!contract.is_compiled());
        assert_eq!(fixture.compiler.calls(), 1);
    }
}
