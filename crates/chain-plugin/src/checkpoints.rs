//! # Checkpoints
//!
//! Pinned `(height, id)` pairs. Parsed at configure time from JSON pairs
//! such as `[1200,"000004b0..."]` and immutable afterwards.

use std::collections::BTreeMap;

use shared_types::{BlockId, LedgerError, SignedBlock};

use crate::errors::ChainError;

/// Height to expected block id.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CheckpointSet {
    pinned: BTreeMap<u32, BlockId>,
}

impl CheckpointSet {
    /// Parse every entry; a later entry for the same height wins.
    pub fn parse<S: AsRef<str>>(entries: &[S]) -> Result<Self, ChainError> {
        let mut pinned = BTreeMap::new();
        for entry in entries {
            let entry = entry.as_ref();
            let (num, id): (u32, BlockId) =
                serde_json::from_str(entry).map_err(|e| ChainError::InvalidCheckpoint {
                    entry: entry.to_string(),
                    reason: e.to_string(),
                })?;
            pinned.insert(num, id);
        }
        Ok(Self { pinned })
    }

    #[must_use]
    pub fn get(&self, block_num: u32) -> Option<&BlockId> {
        self.pinned.get(&block_num)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.pinned.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pinned.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (u32, &BlockId)> + '_ {
        self.pinned.iter().map(|(n, id)| (*n, id))
    }

    /// Reject `block` if its height is pinned to a different id.
    pub fn verify(&self, block: &SignedBlock) -> Result<(), LedgerError> {
        let block_num = block.block_num();
        match self.pinned.get(&block_num) {
            Some(expected) => {
                let actual = block.id();
                if actual == *expected {
                    Ok(())
                } else {
                    Err(LedgerError::CheckpointMismatch {
                        block_num,
                        expected: *expected,
                        actual,
                    })
                }
            }
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::genesis::GenesisState;

    fn pair(num: u32, id: &BlockId) -> String {
        format!("[{num},\"{id}\"]")
    }

    #[test]
    fn test_parse_pairs() {
        let genesis = GenesisState::default().genesis_block();
        let set = CheckpointSet::parse(&[pair(1, &genesis.id())]).unwrap();
        assert_eq!(set.len(), 1);
        assert_eq!(set.get(1), Some(&genesis.id()));
    }

    #[test]
    fn test_malformed_entry_is_config_error() {
        let err = CheckpointSet::parse(&["[1, \"not-an-id\"]"]).unwrap_err();
        assert!(matches!(err, ChainError::InvalidCheckpoint { .. }));

        let err = CheckpointSet::parse(&["{\"num\": 1}"]).unwrap_err();
        assert!(matches!(err, ChainError::InvalidCheckpoint { .. }));
    }

    #[test]
    fn test_verify() {
        let genesis = GenesisState::default().genesis_block();
        let matching = CheckpointSet::parse(&[pair(1, &genesis.id())]).unwrap();
        assert!(matching.verify(&genesis).is_ok());

        let wrong = CheckpointSet::parse(&[pair(1, &BlockId::from_digest([9; 32], 1))]).unwrap();
        assert!(matches!(
            wrong.verify(&genesis),
            Err(LedgerError::CheckpointMismatch { block_num: 1, .. })
        ));

        assert!(CheckpointSet::default().verify(&genesis).is_ok());
    }
}
