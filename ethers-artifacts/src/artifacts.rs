//! Solc standard json types and the artifact types that get persisted

use serde::{Deserialize, Serialize};
use std::{collections::BTreeMap, fmt};

/// All persisted artifacts of a project, keyed by contract name
pub type ArtifactsMap = BTreeMap<String, ArtifactEntry>;

/// The compiled outputs of a single contract.
///
/// These are only ever produced together, either by a single compiler run or by a single read
/// of the artifacts file.
#[derive(Clone, Debug, Serialize, Deserialize, Eq, PartialEq)]
pub struct CompactArtifact {
    /// The Ethereum Contract ABI. See https://docs.soliditylang.org/en/develop/abi-spec.html
    pub abi: serde_json::Value,
    /// The creation bytecode as hex string
    pub bytecode: String,
    /// The deployed bytecode as hex string
    pub bytecode_runtime: String,
}

/// A single entry in the artifacts file
///
/// ```json
/// {
///   "abi": [],
///   "bytecode": "...",
///   "bytecode_runtime": "...",
///   "checksum": "0x..."
/// }
/// ```
#[derive(Clone, Debug, Serialize, Deserialize, Eq, PartialEq)]
pub struct ArtifactEntry {
    pub abi: serde_json::Value,
    pub bytecode: String,
    pub bytecode_runtime: String,
    /// Checksum of the source the artifact was compiled from, entries without one are never
    /// reused
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checksum: Option<String>,
}

impl ArtifactEntry {
    pub fn new(artifact: CompactArtifact, checksum: impl Into<String>) -> Self {
        let CompactArtifact { abi, bytecode, bytecode_runtime } = artifact;
        Self { abi, bytecode, bytecode_runtime, checksum: Some(checksum.into()) }
    }

    /// Returns the compiled outputs of this entry
    pub fn artifact(&self) -> CompactArtifact {
        CompactArtifact {
            abi: self.abi.clone(),
            bytecode: self.bytecode.clone(),
            bytecode_runtime: self.bytecode_runtime.clone(),
        }
    }
}

/// Input type `solc` expects
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CompilerInput {
    pub language: String,
    pub sources: BTreeMap<String, Source>,
    pub settings: Settings,
}

impl CompilerInput {
    /// Creates a new input for the given sources that only requests artifacts for the
    /// `selected` source names, every other source is only available for imports.
    pub fn with_selection<'a>(
        sources: BTreeMap<String, Source>,
        selected: impl IntoIterator<Item = &'a String>,
    ) -> Self {
        let output_selection = selected
            .into_iter()
            .map(|name| {
                let mut contracts = BTreeMap::new();
                contracts.insert("*".to_string(), Settings::artifact_outputs());
                (name.clone(), contracts)
            })
            .collect();
        Self {
            language: "Solidity".to_string(),
            sources,
            settings: Settings { output_selection },
        }
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    #[serde(default)]
    pub output_selection: BTreeMap<String, BTreeMap<String, Vec<String>>>,
}

impl Settings {
    /// The output selection for the abi, creation and deployed bytecode
    pub fn artifact_outputs() -> Vec<String> {
        vec![
            "abi".to_string(),
            "evm.bytecode.object".to_string(),
            "evm.deployedBytecode.object".to_string(),
        ]
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, Eq, PartialEq)]
pub struct Source {
    pub content: String,
}

/// Output type `solc` produces
#[derive(Clone, Debug, Default, Serialize, Deserialize, Eq, PartialEq)]
pub struct CompilerOutput {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<Error>,
    #[serde(default)]
    pub contracts: BTreeMap<String, BTreeMap<String, Contract>>,
}

impl CompilerOutput {
    /// Whether the output contains a compiler error
    pub fn has_error(&self) -> bool {
        self.errors.iter().any(|err| err.is_error())
    }

    /// Returns all diagnostics with severity `error`
    pub fn errors(&self) -> impl Iterator<Item = &Error> {
        self.errors.iter().filter(|err| err.is_error())
    }

    /// Returns all diagnostics that are not errors
    pub fn warnings(&self) -> impl Iterator<Item = &Error> {
        self.errors.iter().filter(|err| !err.is_error())
    }

    /// Converts the output into the compact artifacts keyed by `"<file>:<Contract>"`
    pub fn into_artifacts(self) -> BTreeMap<String, CompactArtifact> {
        self.contracts
            .into_iter()
            .flat_map(|(file, contracts)| {
                contracts.into_iter().map(move |(name, contract)| {
                    (format!("{}:{}", file, name), contract.into_compact())
                })
            })
            .collect()
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, Eq, PartialEq)]
pub struct Contract {
    /// The Ethereum Contract ABI. If empty, it is represented as an empty
    /// array. See https://docs.soliditylang.org/en/develop/abi-spec.html
    #[serde(default = "empty_abi")]
    pub abi: serde_json::Value,
    /// EVM-related outputs
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub evm: Option<Evm>,
}

fn empty_abi() -> serde_json::Value {
    serde_json::Value::Array(Vec::new())
}

impl Contract {
    pub fn into_compact(self) -> CompactArtifact {
        let (bytecode, bytecode_runtime) = self
            .evm
            .map(|evm| {
                (
                    evm.bytecode.map(|b| b.object).unwrap_or_default(),
                    evm.deployed_bytecode.map(|b| b.object).unwrap_or_default(),
                )
            })
            .unwrap_or_default();
        CompactArtifact { abi: self.abi, bytecode, bytecode_runtime }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, Eq, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Evm {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bytecode: Option<Bytecode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deployed_bytecode: Option<Bytecode>,
}

#[derive(Clone, Debug, Serialize, Deserialize, Eq, PartialEq)]
pub struct Bytecode {
    /// The bytecode as a hex string.
    #[serde(default)]
    pub object: String,
}

#[derive(Clone, Debug, Serialize, Deserialize, Eq, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Error {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_location: Option<SourceLocation>,
    pub r#type: String,
    pub component: String,
    pub severity: String,
    #[serde(default)]
    pub error_code: Option<String>,
    pub message: String,
    #[serde(default)]
    pub formatted_message: Option<String>,
}

impl Error {
    pub fn is_error(&self) -> bool {
        self.severity.eq_ignore_ascii_case("error")
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(msg) = &self.formatted_message {
            return f.write_str(msg.trim_end())
        }
        if let Some(loc) = &self.source_location {
            write!(f, "{}:{}: ", loc.file, loc.start)?;
        }
        write!(f, "{}: {}", self.r#type, self.message)
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, Eq, PartialEq)]
pub struct SourceLocation {
    pub file: String,
    pub start: i32,
    pub end: i32,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn can_parse_compiler_output() {
        let output = include_str!("../test-data/standard-json-out.json");
        let output: CompilerOutput = serde_json::from_str(output).unwrap();
        assert!(!output.has_error());
        assert_eq!(output.warnings().count(), 1);

        let artifacts = output.into_artifacts();
        assert_eq!(
            artifacts.keys().cloned().collect::<Vec<_>>(),
            vec!["A.sol:Alpha".to_string(), "nested/B.sol:Beta".to_string()]
        );
        let alpha = &artifacts["A.sol:Alpha"];
        assert_eq!(alpha.bytecode, "6080604052348015600f57600080fd5b50");
        assert_eq!(alpha.bytecode_runtime, "6080604052600080fd");
        assert!(alpha.abi.is_array());
    }

    #[test]
    fn output_selection_is_limited_to_selected_files() {
        let mut sources = BTreeMap::new();
        sources.insert("A.sol".to_string(), Source { content: "contract Alpha {}".to_string() });
        sources.insert("Lib.sol".to_string(), Source { content: "library Lib {}".to_string() });
        let selected = vec!["A.sol".to_string()];
        let input = CompilerInput::with_selection(sources, &selected);

        let json = serde_json::to_value(&input).unwrap();
        assert_eq!(json["language"], "Solidity");
        assert_eq!(json["sources"].as_object().unwrap().len(), 2);
        let selection = json["settings"]["outputSelection"].as_object().unwrap();
        assert_eq!(selection.keys().collect::<Vec<_>>(), vec!["A.sol"]);
        assert_eq!(
            selection["A.sol"]["*"],
            serde_json::json!(["abi", "evm.bytecode.object", "evm.deployedBytecode.object"])
        );
    }

    #[test]
    fn entry_without_checksum_is_readable() {
        let entry: ArtifactEntry =
            serde_json::from_str(r#"{"abi":[],"bytecode":"00","bytecode_runtime":"01"}"#).unwrap();
        assert_eq!(entry.checksum, None);
        assert_eq!(entry.artifact().bytecode_runtime, "01");
    }

    #[test]
    fn diagnostics_prefer_formatted_message() {
        let err: Error = serde_json::from_value(serde_json::json!({
            "type": "ParserError",
            "component": "general",
            "severity": "error",
            "message": "Expected ';'",
            "formattedMessage": "ParserError: Expected ';'\n --> A.sol:3:1\n"
        }))
        .unwrap();
        assert!(err.is_error());
        assert_eq!(err.to_string(), "ParserError: Expected ';'\n --> A.sol:3:1");
    }
}
