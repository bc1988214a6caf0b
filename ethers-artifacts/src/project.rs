//! The project compiler that keeps the artifacts file in sync with the sources
//!
//! A run goes through these steps:
//!
//! 1. lock the artifacts file
//! 2. find all source files and group them by the compiler responsible for their extension
//! 3. read the artifacts file of the previous run, if any
//! 4. every source file whose checksum is recorded in the artifacts file is unchanged, its
//!    contracts are restored from the artifacts file
//! 5. all remaining files of a group are compiled in a single batch
//! 6. artifacts of contracts that no longer exist are dropped and the artifacts file is replaced
//!
//! Any error aborts the run before the artifacts file is touched.

use crate::{
    artifacts::{ArtifactEntry, ArtifactsMap},
    cache::ArtifactsFile,
    compile::{Compiler, Compilers, Solc},
    config::ProjectPathsConfig,
    contract::Contract,
    error::{ArtifactsError, Result},
    utils,
};
use std::{
    collections::{BTreeMap, BTreeSet, HashMap},
    fmt, fs,
    path::PathBuf,
    sync::Arc,
};

/// Handles contract compiling
#[derive(Debug, Clone)]
pub struct Project {
    /// Where to find sources and where to write artifacts
    pub paths: ProjectPathsConfig,
    /// The compilers, selected by file extension
    pub compilers: Compilers,
}

impl Project {
    /// Configure the current project
    ///
    /// # Example
    ///
    /// ```rust
    /// use ethers_artifacts::Project;
    /// let project = Project::builder().build().unwrap();
    /// ```
    pub fn builder() -> ProjectBuilder {
        ProjectBuilder::default()
    }

    /// The artifacts file of this project
    pub fn artifacts_file(&self) -> ArtifactsFile {
        ArtifactsFile::new(&self.paths.artifacts, self.paths.lock_file())
    }

    /// Returns all source files found under the project's root, grouped by the compiler that
    /// handles them
    pub fn sources(&self) -> Result<Vec<SourceGroup>> {
        let root = &self.paths.root;
        let mut groups: BTreeMap<usize, BTreeMap<PathBuf, Vec<u8>>> = BTreeMap::new();
        for file in utils::source_files(root)? {
            let Some(idx) = self.compilers.position(&file) else {
                tracing::trace!("ignoring {}", file.display());
                continue
            };
            let path = root.join(&file);
            let code = fs::read(&path).map_err(|err| ArtifactsError::io(err, &path))?;
            if code.is_empty() {
                tracing::debug!("skipping empty source {}", file.display());
                continue
            }
            groups.entry(idx).or_default().insert(file, code);
        }
        Ok(groups
            .into_iter()
            .filter_map(|(idx, files)| {
                let compiler = self.compilers.get(idx)?.clone();
                Some(SourceGroup { compiler, files })
            })
            .collect())
    }

    /// Brings the artifacts file up to date with the sources.
    ///
    /// Only sources that changed since the last run are passed to the compiler, all other
    /// artifacts are taken from the existing artifacts file.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use ethers_artifacts::{Project, ProjectPathsConfig};
    ///
    /// let paths = ProjectPathsConfig::builder()
    ///     .root("./contracts")
    ///     .artifacts("./contracts.json")
    ///     .build()
    ///     .unwrap();
    /// let project = Project::builder().paths(paths).build().unwrap();
    /// let output = project.compile().unwrap();
    /// println!("{}", output);
    /// ```
    #[tracing::instrument(skip_all, name = "project::compile")]
    pub fn compile(&self) -> Result<ProjectCompileOutput> {
        let artifacts_file = self.artifacts_file();
        let _lock = artifacts_file.lock()?;

        let groups = self.sources()?;
        let prior = artifacts_file.read()?.unwrap_or_default();
        tracing::debug!(
            "found {} source file(s), {} cached artifact(s)",
            groups.iter().map(|group| group.files.len()).sum::<usize>(),
            prior.len()
        );

        let mut reconciler = Reconciler::new(&self.paths, &prior);
        for group in groups {
            reconciler.add_group(group)?;
        }
        let output = reconciler.finish()?;

        artifacts_file.write(&output.artifacts)?;
        tracing::info!("{} -> {}", output, self.paths.artifacts.display());
        Ok(output)
    }
}

/// All source files of a project that are handled by the same compiler
#[derive(Debug)]
pub struct SourceGroup {
    pub compiler: Arc<dyn Compiler>,
    /// file path relative to the root -> content
    pub files: BTreeMap<PathBuf, Vec<u8>>,
}

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
enum Origin {
    Cached,
    Compiled,
}

/// Merges the sources of a run with the artifacts of the previous run
struct Reconciler<'a> {
    paths: &'a ProjectPathsConfig,
    prior: &'a ArtifactsMap,
    /// checksum -> all previous artifacts compiled from a source with that checksum
    by_checksum: HashMap<&'a str, Vec<(&'a String, &'a ArtifactEntry)>>,
    contracts: Vec<Contract>,
    /// every file that was passed to a compiler
    compiled_sources: BTreeSet<PathBuf>,
}

impl<'a> Reconciler<'a> {
    fn new(paths: &'a ProjectPathsConfig, prior: &'a ArtifactsMap) -> Self {
        let mut by_checksum: HashMap<&str, Vec<_>> = HashMap::new();
        for (name, entry) in prior {
            if let Some(checksum) = entry.checksum.as_deref() {
                by_checksum.entry(checksum).or_default().push((name, entry));
            }
        }
        Self { paths, prior, by_checksum, contracts: Vec::new(), compiled_sources: BTreeSet::new() }
    }

    /// Restores the contracts of unchanged files and compiles all other files of the group in a
    /// single batch
    fn add_group(&mut self, group: SourceGroup) -> Result<()> {
        let SourceGroup { compiler, files } = group;
        let root = &self.paths.root;

        let mut dirty = BTreeMap::new();
        for (file, code) in files {
            let checksum = compiler.checksum(&code)?;
            match self.by_checksum.get(checksum.as_str()) {
                Some(entries) => {
                    tracing::trace!("{} unchanged", file.display());
                    for (name, entry) in entries {
                        let contract =
                            Contract::new(*name, root, &file, code.clone(), compiler.clone());
                        contract.absorb(entry)?;
                        self.contracts.push(contract);
                    }
                }
                None => {
                    dirty.insert(file, code);
                }
            }
        }
        if dirty.is_empty() {
            return Ok(())
        }

        let batch: BTreeSet<PathBuf> = dirty.keys().cloned().collect();
        tracing::info!("compiling {} {} file(s)", batch.len(), compiler.language());
        let compiled = compiler.compile_batch(root, &batch)?;
        self.compiled_sources.extend(batch.iter().cloned());

        let by_source_name: HashMap<String, &PathBuf> =
            batch.iter().map(|file| (utils::source_name(file), file)).collect();
        for (qualified, artifact) in compiled {
            let (file, name) = utils::split_qualified_name(&qualified);
            let Some(file) = file.and_then(|file| by_source_name.get(file)) else {
                tracing::warn!("ignoring {}, it is not declared in a compiled source", qualified);
                continue
            };
            let code = dirty[*file].clone();
            let contract =
                Contract::new(name, root, *file, code, compiler.clone()).with_output(artifact);
            self.contracts.push(contract);
        }
        Ok(())
    }

    /// Exports all contracts, later source files win if a contract name is declared twice
    fn finish(mut self) -> Result<ProjectCompileOutput> {
        self.contracts.sort_by(|a, b| a.source().cmp(b.source()));

        let mut contracts: BTreeMap<String, Contract> = BTreeMap::new();
        for contract in self.contracts {
            let name = contract.name().to_string();
            if let Some(previous) = contracts.insert(name, contract) {
                tracing::warn!(
                    "contract {} is declared in \"{}\" and \"{}\", keeping the latter",
                    previous.name(),
                    previous.source().display(),
                    contracts[previous.name()].source().display()
                );
            }
        }

        let mut output =
            ProjectCompileOutput { compiled_sources: self.compiled_sources, ..Default::default() };
        for (name, contract) in contracts {
            let origin = if contract.is_compiled() &&
                self.prior.get(&name).and_then(|entry| entry.checksum.as_deref()) ==
                    Some(contract.checksum()?)
            {
                Origin::Cached
            } else {
                Origin::Compiled
            };
            output.artifacts.insert(name.clone(), contract.export()?);
            match origin {
                Origin::Cached => output.cached.insert(name),
                Origin::Compiled => output.compiled.insert(name),
            };
        }
        output.removed = self
            .prior
            .keys()
            .filter(|name| !output.artifacts.contains_key(*name))
            .cloned()
            .collect();
        Ok(output)
    }
}

/// The result of [`Project::compile`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProjectCompileOutput {
    /// Everything that was written to the artifacts file
    pub artifacts: ArtifactsMap,
    /// Contracts whose artifacts were taken from the previous artifacts file
    pub cached: BTreeSet<String>,
    /// Contracts that were (re)compiled
    pub compiled: BTreeSet<String>,
    /// Contracts of the previous artifacts file that no longer exist
    pub removed: BTreeSet<String>,
    /// Source files that were passed to the compiler, relative to the root.
    ///
    /// This can be non-empty while `compiled` is empty, e.g. for a file whose only contract is
    /// shadowed by a contract of the same name in a later file.
    pub compiled_sources: BTreeSet<PathBuf>,
}

impl ProjectCompileOutput {
    /// Whether the artifacts are the same as in the previous run and the compiler wasn't
    /// invoked
    pub fn is_unchanged(&self) -> bool {
        self.compiled.is_empty() && self.removed.is_empty() && self.compiled_sources.is_empty()
    }
}

impl fmt::Display for ProjectCompileOutput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_unchanged() {
            return write!(f, "Nothing to compile, {} cached artifact(s)", self.cached.len())
        }
        write!(
            f,
            "Compiled {} contract(s) from {} source file(s), {} cached, {} removed",
            self.compiled.len(),
            self.compiled_sources.len(),
            self.cached.len(),
            self.removed.len()
        )
    }
}

#[derive(Debug, Default)]
pub struct ProjectBuilder {
    /// The layout of the project
    paths: Option<ProjectPathsConfig>,
    /// The compilers to use, defaults to `solc`
    compilers: Option<Compilers>,
}

impl ProjectBuilder {
    pub fn paths(mut self, paths: ProjectPathsConfig) -> Self {
        self.paths = Some(paths);
        self
    }

    /// Compile `.sol` files with the given `solc`
    pub fn solc(mut self, solc: impl Into<Solc>) -> Self {
        self.compilers = Some(Compilers::from(solc.into()));
        self
    }

    pub fn compilers(mut self, compilers: Compilers) -> Self {
        self.compilers = Some(compilers);
        self
    }

    pub fn build(self) -> Result<Project> {
        let Self { paths, compilers } = self;
        Ok(Project {
            paths: paths.map(Ok).unwrap_or_else(ProjectPathsConfig::current)?,
            compilers: compilers.unwrap_or_default(),
        })
    }
}
