//! # ethers-artifacts
//!
//! Keeps a single json artifacts file with the abi, creation and runtime bytecode of every
//! contract in a directory of solidity sources.
//!
//! Every artifact is stored together with the checksum of the source file it was compiled from.
//! When the artifacts file is regenerated, only the sources whose checksum isn't recorded are
//! passed to `solc`, the artifacts of all other contracts are reused as is.
//!
//! ```no_run
//! use ethers_artifacts::{Project, ProjectPathsConfig};
//!
//! let paths = ProjectPathsConfig::builder().root("./contracts").build().unwrap();
//! let project = Project::builder().paths(paths).build().unwrap();
//! let output = project.compile().unwrap();
//! for name in &output.compiled {
//!     println!("compiled {}", name);
//! }
//! ```
//!
//! The artifacts file looks like this:
//!
//! ```json
//! {
//!   "Token": {
//!     "abi": [],
//!     "bytecode": "6080...",
//!     "bytecode_runtime": "6080...",
//!     "checksum": "0x5f70bf18a086007016e948b04aed3b82103a36bea41755b6cddfaf10ace3c6ef"
//!   }
//! }
//! ```

pub mod artifacts;
pub use artifacts::{ArtifactEntry, ArtifactsMap, CompactArtifact};

pub mod cache;

mod compile;
pub use compile::{Compiler, Compilers, Solc, SOLC, SOLIDITY_EXTENSIONS};

mod config;
pub use config::{ProjectPathsConfig, ProjectPathsConfigBuilder};

mod contract;
pub use contract::Contract;

mod project;
pub use project::{Project, ProjectBuilder, ProjectCompileOutput, SourceGroup};

pub mod error;
pub mod utils;

/// Utilities for creating, mocking and testing of (temporary) projects
#[cfg(any(test, feature = "project-util"))]
pub mod project_util;
