//! Utility functions

use crate::error::{ArtifactsError, Result};
use once_cell::sync::Lazy;
use path_slash::PathExt;
use regex::Regex;
use serde::de::DeserializeOwned;
use sha2::{Digest, Sha256};
use std::{
    fs,
    path::{Component, Path, PathBuf},
};
use walkdir::WalkDir;

/// A regex that matches the import path and identifier of a solidity import
/// statement with the named groups "path", "id".
// Adapted from https://github.com/nomiclabs/hardhat/blob/cced766c65b25d3d0beb39ef847246ac9618bdd9/packages/hardhat-core/src/internal/solidity/parse.ts#L100
pub static RE_SOL_IMPORT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"import\s+(?:(?:"(?P<p1>[^;]*)"|'(?P<p2>[^;]*)')(?:;|\s+as\s+(?P<id>[^;]*);)|.+from\s+(?:"(?P<p3>.*)"|'(?P<p4>.*)');)"#).unwrap()
});

/// Returns the `0x` prefixed hex encoded sha256 digest of the given bytes.
///
/// This is the key every cached artifact is stored under, so it must not change between
/// releases.
///
/// # Example
///
/// ```
/// use ethers_artifacts::utils;
/// assert_eq!(
///     utils::checksum(b""),
///     "0xe3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
/// );
/// ```
pub fn checksum(bytes: impl AsRef<[u8]>) -> String {
    format!("0x{}", hex::encode(Sha256::digest(bytes.as_ref())))
}

/// Returns all path parts from any solidity import statement in a string,
/// `import "./contracts/Contract.sol";` -> `"./contracts/Contract.sol"`.
///
/// See also https://docs.soliditylang.org/en/v0.8.9/grammar.html
pub fn find_import_paths(contract: &str) -> Vec<&str> {
    RE_SOL_IMPORT
        .captures_iter(contract)
        .filter_map(|cap| {
            cap.name("p1").or_else(|| cap.name("p2")).or_else(|| cap.name("p3")).or_else(|| {
                cap.name("p4")
            })
        })
        .map(|m| m.as_str())
        .collect()
}

/// Returns a sorted list of all files under the root, as paths relative to `root`.
///
/// Unlike a lenient walk, any error encountered while walking the directory (a missing root,
/// an unreadable subdirectory) is returned, as is a root that isn't a directory. Symlinked
/// files are listed under the name of the link.
///
/// # Example
///
/// ```no_run
/// use ethers_artifacts::utils;
/// let files = utils::source_files("./contracts").unwrap();
/// ```
pub fn source_files(root: impl AsRef<Path>) -> Result<Vec<PathBuf>> {
    let root = root.as_ref();
    if root.exists() && !root.is_dir() {
        return Err(ArtifactsError::NotADirectory(root.to_path_buf()))
    }
    let mut files = Vec::new();
    for entry in WalkDir::new(root).sort_by_file_name() {
        let entry = entry?;
        // `file_type` describes the link itself, `is_file` follows it
        if !entry.path().is_file() {
            continue
        }
        let rel = entry.path().strip_prefix(root).unwrap_or_else(|_| entry.path());
        files.push(rel.to_path_buf());
    }
    files.sort();
    Ok(files)
}

/// Returns the file extension as str, if any
pub fn extension(path: &Path) -> Option<&str> {
    path.extension().and_then(|ext| ext.to_str())
}

/// Returns the solc source unit name of a path relative to the project root, which always uses
/// `/` as separator: `nested\Token.sol` -> `nested/Token.sol`
pub fn source_name(path: &Path) -> String {
    path.to_slash_lossy().into_owned()
}

/// Resolves an import of `importer` to a path relative to the project root.
///
/// Imports starting with `./` or `../` are relative to the importing file, everything else is
/// treated as relative to the root. Returns `None` if the resolved path escapes the root.
pub fn resolve_import(importer: &Path, import: &str) -> Option<PathBuf> {
    let import = Path::new(import);
    let joined = if import.starts_with(".") || import.starts_with("..") {
        importer.parent().unwrap_or_else(|| Path::new("")).join(import)
    } else {
        import.to_path_buf()
    };
    normalize(&joined)
}

/// Lexically removes `.` and `..` components, returns `None` if the path leaves its base
fn normalize(path: &Path) -> Option<PathBuf> {
    let mut normalized = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !normalized.pop() {
                    return None
                }
            }
            Component::Normal(part) => normalized.push(part),
            Component::RootDir | Component::Prefix(_) => return None,
        }
    }
    Some(normalized)
}

/// Strips the file qualifier of a compiler output key: `src/Token.sol:Token` -> `Token`
pub fn contract_name(qualified: &str) -> &str {
    qualified.rsplit_once(':').map(|(_, name)| name).unwrap_or(qualified)
}

/// Splits a compiler output key into its file and contract part:
/// `src/Token.sol:Token` -> `(Some("src/Token.sol"), "Token")`
pub fn split_qualified_name(qualified: &str) -> (Option<&str>, &str) {
    match qualified.rsplit_once(':') {
        Some((file, name)) => (Some(file), name),
        None => (None, qualified),
    }
}

/// Reads the json file and deserialize it into the provided type
pub fn read_json_file<T: DeserializeOwned>(path: impl AsRef<Path>) -> Result<T> {
    let path = path.as_ref();
    let content = fs::read_to_string(path).map_err(|err| ArtifactsError::io(err, path))?;
    Ok(serde_json::from_str(&content)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::{create_dir_all, File};

    #[test]
    fn checksum_is_prefixed_sha256() {
        let sum = checksum("contract A {}");
        assert!(sum.starts_with("0x"));
        assert_eq!(sum.len(), 66);
        assert_eq!(sum, checksum(b"contract A {}".to_vec()));
        assert_ne!(sum, checksum("contract A { }"));
    }

    #[test]
    fn can_find_source_files_sorted() {
        let tmp_dir = tempfile::tempdir().unwrap();

        let file_b = tmp_dir.path().join("b.sol");
        let file_a = tmp_dir.path().join("a.sol");
        let nested = tmp_dir.path().join("nested");
        let file_c = nested.join("c.vy");
        let nested_deep = nested.join("deep");
        let file_d = nested_deep.join("d.sol");
        File::create(&file_b).unwrap();
        File::create(&file_a).unwrap();
        create_dir_all(nested_deep).unwrap();
        File::create(&file_c).unwrap();
        File::create(&file_d).unwrap();

        let files = source_files(tmp_dir.path()).unwrap();
        let expected: Vec<PathBuf> = vec![
            "a.sol".into(),
            "b.sol".into(),
            Path::new("nested").join("c.vy"),
            Path::new("nested").join("deep").join("d.sol"),
        ];
        assert_eq!(files, expected);
    }

    #[test]
    fn missing_root_is_an_error() {
        let tmp_dir = tempfile::tempdir().unwrap();
        let err = source_files(tmp_dir.path().join("missing")).unwrap_err();
        assert!(matches!(err, ArtifactsError::Discovery(_)));
        assert!(err.is_discovery());
    }

    #[test]
    fn file_as_root_is_an_error() {
        let tmp_dir = tempfile::tempdir().unwrap();
        let file = tmp_dir.path().join("A.sol");
        fs::write(&file, "contract Alpha {}").unwrap();
        let err = source_files(&file).unwrap_err();
        assert!(matches!(err, ArtifactsError::NotADirectory(ref path) if path == &file));
        assert!(err.is_discovery());
    }

    #[cfg(unix)]
    #[test]
    fn follows_symlinked_files() {
        let tmp_dir = tempfile::tempdir().unwrap();
        let target = tmp_dir.path().join("target");
        create_dir_all(&target).unwrap();
        fs::write(target.join("Linked.sol"), "contract Linked {}").unwrap();
        let root = tmp_dir.path().join("contracts");
        create_dir_all(&root).unwrap();
        std::os::unix::fs::symlink(target.join("Linked.sol"), root.join("Linked.sol")).unwrap();
        std::os::unix::fs::symlink(root.join("Missing.sol"), root.join("Dangling.sol")).unwrap();

        assert_eq!(source_files(&root).unwrap(), vec![PathBuf::from("Linked.sol")]);
    }

    #[test]
    fn can_find_import_paths() {
        let s = r##"//SPDX-License-Identifier: Unlicense
pragma solidity ^0.8.0;
import "hardhat/console.sol";
import "../contract/Contract.sol";
import { Ownable } from './access/Ownable.sol';
"##;
        assert_eq!(
            vec!["hardhat/console.sol", "../contract/Contract.sol", "./access/Ownable.sol"],
            find_import_paths(s)
        );
    }

    #[test]
    fn can_resolve_imports() {
        let importer = Path::new("src").join("tokens").join("Token.sol");
        assert_eq!(
            resolve_import(&importer, "./Base.sol"),
            Some(Path::new("src").join("tokens").join("Base.sol"))
        );
        assert_eq!(
            resolve_import(&importer, "../lib/Math.sol"),
            Some(Path::new("src").join("lib").join("Math.sol"))
        );
        assert_eq!(
            resolve_import(&importer, "src/Other.sol"),
            Some(Path::new("src").join("Other.sol"))
        );
        assert_eq!(resolve_import(Path::new("A.sol"), "../../Outside.sol"), None);
    }

    #[test]
    fn can_strip_qualifier() {
        assert_eq!(contract_name("src/A.sol:Alpha"), "Alpha");
        assert_eq!(contract_name("C:\\proj\\A.sol:Alpha"), "Alpha");
        assert_eq!(contract_name("Alpha"), "Alpha");
        assert_eq!(split_qualified_name("A.sol:Alpha"), (Some("A.sol"), "Alpha"));
        assert_eq!(split_qualified_name("Alpha"), (None, "Alpha"));
    }

    #[test]
    fn source_names_use_forward_slashes() {
        assert_eq!(source_name(&Path::new("nested").join("Token.sol")), "nested/Token.sol");
    }
}
