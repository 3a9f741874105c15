//! # Genesis Descriptor

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use shared_types::{BlockHeader, BlockId, ChainId, Checksum256, PublicKey, SignedBlock, TimePoint};
use thiserror::Error;
use tracing::{info, warn};

/// Block production interval.
pub const BLOCK_INTERVAL_MS: i64 = 500;

/// Producer name recorded on the genesis block.
const GENESIS_PRODUCER: &str = "genesis";

/// Genesis descriptor errors.
#[derive(Debug, Error)]
pub enum GenesisError {
    #[error("Failed to access genesis file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Invalid genesis file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to encode genesis state: {0}")]
    Encode(String),
}

/// Initial chain limits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainParameters {
    pub max_block_net_usage: u64,
    pub max_block_cpu_usage: u32,
    pub max_transaction_lifetime: u32,
    pub max_authority_depth: u16,
}

impl Default for ChainParameters {
    fn default() -> Self {
        Self {
            max_block_net_usage: 1024 * 1024,
            max_block_cpu_usage: 200_000,
            max_transaction_lifetime: 60 * 60,
            max_authority_depth: 6,
        }
    }
}

/// Initial chain parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenesisState {
    pub initial_timestamp: TimePoint,
    pub initial_key: PublicKey,
    pub initial_configuration: ChainParameters,
}

impl Default for GenesisState {
    fn default() -> Self {
        Self {
            initial_timestamp: Utc
                .with_ymd_and_hms(2018, 5, 28, 0, 0, 0)
                .single()
                .unwrap_or_default(),
            initial_key: "EVT6MRyAjQq8ud7hVNYcfnVPJqcVpscN5So8BhtHuGYqET5GDW5CV".to_string(),
            initial_configuration: ChainParameters::default(),
        }
    }
}

impl GenesisState {
    /// Load the descriptor at `path`, writing a default one first if the
    /// file does not exist.
    pub fn load_or_create(path: &Path) -> Result<Self, GenesisError> {
        if !path.exists() {
            warn!(file = %path.display(), "Generating default genesis file");
            let default = Self::default();
            default.save(path)?;
        }

        let raw = fs::read_to_string(path).map_err(|e| GenesisError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
        let genesis: Self = serde_json::from_str(&raw).map_err(|e| GenesisError::Parse {
            path: path.to_path_buf(),
            source: e,
        })?;

        info!(file = %path.display(), timestamp = %genesis.initial_timestamp, "Genesis state loaded");
        Ok(genesis)
    }

    /// Write the descriptor as pretty JSON.
    pub fn save(&self, path: &Path) -> Result<(), GenesisError> {
        let io_err = |e| GenesisError::Io {
            path: path.to_path_buf(),
            source: e,
        };
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(io_err)?;
        }
        let json = serde_json::to_string_pretty(self).map_err(|e| GenesisError::Parse {
            path: path.to_path_buf(),
            source: e,
        })?;
        fs::write(path, json).map_err(io_err)
    }

    /// SHA-256 of the binary-encoded descriptor.
    pub fn chain_id(&self) -> Result<ChainId, GenesisError> {
        let bytes = bincode::serialize(self).map_err(|e| GenesisError::Encode(e.to_string()))?;
        Ok(ChainId(Sha256::digest(&bytes).into()))
    }

    /// The first block of the chain, at height 1.
    #[must_use]
    pub fn genesis_block(&self) -> SignedBlock {
        SignedBlock {
            header: BlockHeader {
                timestamp: self.initial_timestamp,
                producer: GENESIS_PRODUCER.to_string(),
                confirmed: 1,
                previous: BlockId::default(),
                transaction_mroot: Checksum256::default(),
                action_mroot: Checksum256::default(),
                schedule_version: 0,
            },
            producer_signature: String::new(),
            transactions: Vec::new(),
        }
    }
}

/// Move `now` forward to the next block interval boundary.
#[must_use]
pub fn snap_to_block_interval(now: DateTime<Utc>) -> DateTime<Utc> {
    let millis = now.timestamp_millis();
    let snapped = (millis.div_euclid(BLOCK_INTERVAL_MS) + 1) * BLOCK_INTERVAL_MS;
    DateTime::from_timestamp_millis(snapped).unwrap_or(now)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_is_generated() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config").join("genesis.json");

        let genesis = GenesisState::load_or_create(&path).unwrap();

        assert_eq!(genesis, GenesisState::default());
        let written: GenesisState =
            serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(written, genesis);
    }

    #[test]
    fn test_existing_file_is_loaded() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("genesis.json");
        let custom = GenesisState {
            initial_key: "EVT_custom".to_string(),
            ..GenesisState::default()
        };
        custom.save(&path).unwrap();

        assert_eq!(GenesisState::load_or_create(&path).unwrap(), custom);
    }

    #[test]
    fn test_malformed_file_is_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("genesis.json");
        fs::write(&path, "{ not json").unwrap();

        assert!(matches!(
            GenesisState::load_or_create(&path),
            Err(GenesisError::Parse { .. })
        ));
    }

    #[test]
    fn test_chain_id_depends_on_content() {
        let a = GenesisState::default();
        let b = GenesisState {
            initial_timestamp: a.initial_timestamp + Duration::seconds(1),
            ..a.clone()
        };
        assert_eq!(a.chain_id().unwrap(), a.chain_id().unwrap());
        assert_ne!(a.chain_id().unwrap(), b.chain_id().unwrap());
    }

    #[test]
    fn test_genesis_block_is_height_one() {
        let block = GenesisState::default().genesis_block();
        assert_eq!(block.block_num(), 1);
        assert_eq!(block.id().num(), 1);
    }

    #[test]
    fn test_snap_moves_to_next_boundary() {
        let base = Utc.with_ymd_and_hms(2026, 10, 18, 9, 0, 0).unwrap();

        let mid = base + Duration::milliseconds(120);
        assert_eq!(snap_to_block_interval(mid), base + Duration::milliseconds(500));

        let late = base + Duration::milliseconds(740);
        assert_eq!(snap_to_block_interval(late), base + Duration::milliseconds(1000));

        // Already on a boundary still moves forward one interval.
        assert_eq!(snap_to_block_interval(base), base + Duration::milliseconds(500));
    }
}
