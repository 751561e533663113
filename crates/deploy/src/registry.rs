//! Deployment registry: the persistent record of deployed units.
//!
//! The registry is the single source of truth for "already deployed". It is
//! stored as a pretty-printed JSON file and rewritten (temp file + rename)
//! after every successful deployment. While a registry is open for writing,
//! an exclusive advisory lock on `<file>.lock` keeps other writers out.
//! Read-only views take no lock.

use std::{
    collections::BTreeMap,
    fs::{File, OpenOptions},
    path::{Path, PathBuf},
};

use alloy_core::primitives::{Address, TxHash};
use anyhow::Context;
use fs2::FileExt;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::{
    abi::{self, AbiValue},
    error::DeployError,
    unit::UnitName,
};

/// A confirmed deployment of a single unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeploymentRecord {
    pub name: UnitName,
    pub address: Address,
    /// Artifact the unit was deployed from.
    pub artifact: String,
    /// Hash of the creation transaction.
    pub tx_hash: TxHash,
    /// Block that included the creation transaction, when reported.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub block_number: Option<u64>,
    /// SHA-256 of the encoded constructor arguments.
    pub args_hash: String,
    /// Unix timestamp (seconds) of the confirmation.
    pub deployed_at: i64,
    /// Whether the record was created during the current run.
    #[serde(skip)]
    pub newly_deployed: bool,
}

/// Compute the fingerprint stored in [`DeploymentRecord::args_hash`].
///
/// The same arguments always produce the same hash.
pub fn args_fingerprint(args: &[AbiValue]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(abi::encode_args(args));
    hex::encode(hasher.finalize())
}

#[derive(Deserialize)]
struct RegistryFile {
    network: String,
    #[serde(default)]
    deployments: BTreeMap<UnitName, DeploymentRecord>,
}

#[derive(Serialize)]
struct RegistryFileRef<'a> {
    network: &'a str,
    deployments: &'a BTreeMap<UnitName, DeploymentRecord>,
}

struct RegistryStore {
    path: PathBuf,
    // Held for the lifetime of the registry; closing it releases the lock.
    // `None` for a read-only view.
    lock: Option<File>,
}

/// Mapping from unit name to its deployment record.
pub struct Registry {
    network: String,
    records: BTreeMap<UnitName, DeploymentRecord>,
    store: Option<RegistryStore>,
}

impl Registry {
    /// A registry that lives only for the current process.
    pub fn in_memory(network: impl Into<String>) -> Self {
        Self {
            network: network.into(),
            records: BTreeMap::new(),
            store: None,
        }
    }

    /// Open (or create) the registry file at `path` for `network`.
    ///
    /// Fails if another process holds the registry lock, if the file is
    /// malformed, or if it belongs to a different network.
    pub fn open(path: &Path, network: &str) -> Result<Self, DeployError> {
        Self::open_inner(path, network).map_err(DeployError::Registry)
    }

    /// Load the registry file at `path` without locking or creating anything.
    ///
    /// A missing file reads as an empty registry. The result cannot record
    /// deployments.
    pub fn open_read_only(path: &Path, network: &str) -> Result<Self, DeployError> {
        let records = load_records(path, network).map_err(DeployError::Registry)?;
        Ok(Self {
            network: network.to_string(),
            records,
            store: Some(RegistryStore {
                path: path.to_path_buf(),
                lock: None,
            }),
        })
    }

    fn open_inner(path: &Path, network: &str) -> anyhow::Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create registry directory {}", parent.display())
            })?;
        }

        let lock_path = sibling_path(path, "lock");
        let lock = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .truncate(false)
            .open(&lock_path)
            .with_context(|| format!("Failed to open lock file {}", lock_path.display()))?;
        lock.try_lock_exclusive().with_context(|| {
            format!(
                "Registry {} is locked by another process",
                path.display()
            )
        })?;

        let records = load_records(path, network)?;

        tracing::debug!(
            path = %path.display(),
            network,
            records = records.len(),
            "Registry opened"
        );

        Ok(Self {
            network: network.to_string(),
            records,
            store: Some(RegistryStore {
                path: path.to_path_buf(),
                lock: Some(lock),
            }),
        })
    }

    pub fn network(&self) -> &str {
        &self.network
    }

    /// Backing file, if the registry is persisted.
    pub fn path(&self) -> Option<&Path> {
        self.store.as_ref().map(|store| store.path.as_path())
    }

    pub fn get(&self, name: &str) -> Option<&DeploymentRecord> {
        self.records.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.records.contains_key(name)
    }

    pub fn address_of(&self, name: &str) -> Option<Address> {
        self.get(name).map(|record| record.address)
    }

    /// Records ordered by unit name.
    pub fn records(&self) -> impl Iterator<Item = &DeploymentRecord> {
        self.records.values()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Store a confirmed deployment and persist the registry.
    ///
    /// A previous record for the same unit is replaced; only forced
    /// redeployments do this.
    pub fn record(&mut self, record: DeploymentRecord) -> Result<(), DeployError> {
        let name = record.name.clone();
        let previous = self.records.insert(name.clone(), record);

        if let Err(err) = self.persist() {
            // Keep memory consistent with disk.
            match previous {
                Some(previous) => {
                    self.records.insert(name, previous);
                }
                None => {
                    self.records.remove(&name);
                }
            }
            return Err(DeployError::Registry(err));
        }

        Ok(())
    }

    fn persist(&self) -> anyhow::Result<()> {
        let Some(store) = &self.store else {
            return Ok(());
        };
        if store.lock.is_none() {
            anyhow::bail!("Registry {} was opened read-only", store.path.display());
        }

        let json = serde_json::to_string_pretty(&RegistryFileRef {
            network: &self.network,
            deployments: &self.records,
        })
        .context("Failed to serialize registry")?;

        let tmp_path = sibling_path(&store.path, "tmp");
        std::fs::write(&tmp_path, json)
            .with_context(|| format!("Failed to write registry to {}", tmp_path.display()))?;
        std::fs::rename(&tmp_path, &store.path).with_context(|| {
            format!(
                "Failed to move registry into place at {}",
                store.path.display()
            )
        })?;

        Ok(())
    }
}

fn load_records(path: &Path, network: &str) -> anyhow::Result<BTreeMap<UnitName, DeploymentRecord>> {
    if !path.exists() {
        return Ok(BTreeMap::new());
    }

    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read registry {}", path.display()))?;
    let file: RegistryFile = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse registry {}", path.display()))?;

    if file.network != network {
        anyhow::bail!(
            "Registry {} belongs to network '{}', not '{}'",
            path.display(),
            file.network,
            network
        );
    }

    if let Some((key, record)) = file
        .deployments
        .iter()
        .find(|(key, record)| **key != record.name)
    {
        anyhow::bail!(
            "Registry entry '{}' holds a record for '{}'",
            key,
            record.name
        );
    }

    Ok(file.deployments)
}

fn sibling_path(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".");
    name.push(suffix);
    PathBuf::from(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_core::primitives::U256;
    use tempdir::TempDir;

    fn sample_record(name: &str, last_byte: u8) -> DeploymentRecord {
        DeploymentRecord {
            name: name.into(),
            address: Address::with_last_byte(last_byte),
            artifact: "TriumphTreasury".to_string(),
            tx_hash: TxHash::with_last_byte(last_byte),
            block_number: Some(42),
            args_hash: args_fingerprint(&[]),
            deployed_at: 1737316800,
            newly_deployed: true,
        }
    }

    #[test]
    fn test_fingerprint_determinism() {
        let args = [AbiValue::Address(Address::with_last_byte(1)), U256::from(7u64).into()];

        let hash1 = args_fingerprint(&args);
        let hash2 = args_fingerprint(&args);

        assert_eq!(hash1, hash2, "Hash should be deterministic");
        assert_eq!(hash1.len(), 64, "SHA-256 hash should be 64 hex characters");
        assert_ne!(hash1, args_fingerprint(&args[..1]));
    }

    #[test]
    fn test_in_memory_record_and_lookup() {
        let mut registry = Registry::in_memory("localhost");
        registry.record(sample_record("treasury", 5)).unwrap();

        assert!(registry.contains("treasury"));
        assert_eq!(registry.address_of("treasury"), Some(Address::with_last_byte(5)));
        assert!(registry.get("staking").is_none());
        assert_eq!(registry.len(), 1);
        assert!(registry.path().is_none());
    }

    #[test]
    fn test_persist_and_reopen() {
        let temp_dir = TempDir::new("keystone-test").expect("Failed to create temp dir");
        let path = temp_dir.path().join("deployments").join("localhost.json");

        {
            let mut registry = Registry::open(&path, "localhost").expect("Failed to open");
            registry.record(sample_record("authority", 1)).unwrap();
            registry.record(sample_record("toc", 2)).unwrap();
        }

        let registry = Registry::open(&path, "localhost").expect("Failed to reopen");
        assert_eq!(registry.len(), 2);

        let toc = registry.get("toc").unwrap();
        assert_eq!(toc.address, Address::with_last_byte(2));
        assert_eq!(toc.block_number, Some(42));
        assert!(!toc.newly_deployed, "newly_deployed is not persisted");
    }

    #[test]
    fn test_second_open_is_locked_out() {
        let temp_dir = TempDir::new("keystone-test").expect("Failed to create temp dir");
        let path = temp_dir.path().join("localhost.json");

        let _first = Registry::open(&path, "localhost").expect("Failed to open");
        let second = Registry::open(&path, "localhost");

        assert!(matches!(second, Err(DeployError::Registry(_))));
    }

    #[test]
    fn test_read_only_open_ignores_lock_and_creates_nothing() {
        let temp_dir = TempDir::new("keystone-test").expect("Failed to create temp dir");
        let path = temp_dir.path().join("deployments").join("localhost.json");

        let empty = Registry::open_read_only(&path, "localhost").unwrap();
        assert!(empty.is_empty());
        assert!(!temp_dir.path().join("deployments").exists());

        let mut writer = Registry::open(&path, "localhost").unwrap();
        writer.record(sample_record("authority", 1)).unwrap();

        // Readable while the writer holds the lock.
        let mut reader = Registry::open_read_only(&path, "localhost").unwrap();
        assert_eq!(reader.address_of("authority"), Some(Address::with_last_byte(1)));
        assert!(!sibling_path(&path, "tmp").exists());

        assert!(reader.record(sample_record("toc", 2)).is_err());
        assert!(!reader.contains("toc"));
    }

    #[test]
    fn test_network_mismatch_is_rejected() {
        let temp_dir = TempDir::new("keystone-test").expect("Failed to create temp dir");
        let path = temp_dir.path().join("registry.json");

        {
            let mut registry = Registry::open(&path, "sepolia").unwrap();
            registry.record(sample_record("authority", 1)).unwrap();
        }

        assert!(Registry::open(&path, "mainnet").is_err());
    }

    #[test]
    fn test_corrupted_file_is_rejected() {
        let temp_dir = TempDir::new("keystone-test").expect("Failed to create temp dir");
        let path = temp_dir.path().join("registry.json");
        std::fs::write(&path, "{ invalid json }").unwrap();

        assert!(Registry::open(&path, "localhost").is_err());
    }
}
