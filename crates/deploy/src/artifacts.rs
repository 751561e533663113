//! Compiled contract artifacts.
//!
//! Compilation happens elsewhere; this module only reads the creation
//! bytecode out of hardhat-style artifact files (`<Name>.json` with a
//! `bytecode` field).

use std::{
    collections::HashMap,
    path::{Path, PathBuf},
};

use alloy_core::primitives::Bytes;
use anyhow::Context;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
struct ArtifactFile {
    bytecode: Bytes,
}

/// Creation bytecode keyed by artifact name.
#[derive(Debug, Clone, Default)]
pub struct Artifacts {
    bytecode: HashMap<String, Bytes>,
}

impl Artifacts {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load the named artifacts from `dir`.
    ///
    /// Names without a file are left out, so that units which never need
    /// deploying don't require one; the executor reports any that do.
    pub fn load<'a>(dir: &Path, names: impl IntoIterator<Item = &'a str>) -> anyhow::Result<Self> {
        let mut artifacts = Self::new();
        for name in names {
            let path = artifact_path(dir, name);
            if !path.exists() {
                tracing::debug!(artifact = name, path = %path.display(), "Artifact file not found");
                continue;
            }

            let content = std::fs::read_to_string(&path)
                .with_context(|| format!("Failed to read artifact {}", path.display()))?;
            let file: ArtifactFile = serde_json::from_str(&content)
                .with_context(|| format!("Failed to parse artifact {}", path.display()))?;

            if file.bytecode.is_empty() {
                anyhow::bail!(
                    "Artifact {} has empty bytecode (abstract contract or interface?)",
                    path.display()
                );
            }

            artifacts.insert(name, file.bytecode);
        }
        Ok(artifacts)
    }

    pub fn insert(&mut self, name: impl Into<String>, bytecode: Bytes) {
        self.bytecode.insert(name.into(), bytecode);
    }

    pub fn get(&self, name: &str) -> Option<&Bytes> {
        self.bytecode.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.bytecode.contains_key(name)
    }
}

fn artifact_path(dir: &Path, name: &str) -> PathBuf {
    dir.join(format!("{name}.json"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempdir::TempDir;

    #[test]
    fn test_load_reads_bytecode() {
        let temp_dir = TempDir::new("keystone-test").expect("Failed to create temp dir");
        std::fs::write(
            temp_dir.path().join("TriumphTreasury.json"),
            r#"{"contractName": "TriumphTreasury", "abi": [], "bytecode": "0x6080604052"}"#,
        )
        .unwrap();

        let artifacts =
            Artifacts::load(temp_dir.path(), ["TriumphTreasury", "Distributor"]).unwrap();

        assert_eq!(
            artifacts.get("TriumphTreasury").unwrap().as_ref(),
            &[0x60, 0x80, 0x60, 0x40, 0x52]
        );
        assert!(!artifacts.contains("Distributor"));
    }

    #[test]
    fn test_empty_bytecode_is_rejected() {
        let temp_dir = TempDir::new("keystone-test").expect("Failed to create temp dir");
        std::fs::write(temp_dir.path().join("IERC20.json"), r#"{"bytecode": "0x"}"#).unwrap();

        assert!(Artifacts::load(temp_dir.path(), ["IERC20"]).is_err());
    }

    #[test]
    fn test_malformed_artifact_is_rejected() {
        let temp_dir = TempDir::new("keystone-test").expect("Failed to create temp dir");
        std::fs::write(temp_dir.path().join("Broken.json"), "not json").unwrap();

        assert!(Artifacts::load(temp_dir.path(), ["Broken"]).is_err());
    }
}
