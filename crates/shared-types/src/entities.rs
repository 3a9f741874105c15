//! # Chain Entities
//!
//! Defines the blocks, transactions and ledger by-products that flow through
//! the node's channels and method slots.
//!
//! ## Clusters
//!
//! - **Identity**: `BlockId`, `TransactionId`, `ChainId`, `Checksum256`
//! - **Blocks**: `BlockHeader`, `SignedBlock`, `BlockState`, `HeaderConfirmation`
//! - **Transactions**: `Transaction`, `PackedTransaction`, `TransactionMetadata`,
//!   `TransactionTrace`

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha256};

use crate::errors::{CodecError, IdParseError};

/// Wall-clock instant used for block and genesis timestamps.
pub type TimePoint = DateTime<Utc>;

/// Opaque textual public key (e.g. `EVT6Qz3w...`).
pub type PublicKey = String;

/// Opaque textual signature.
pub type Signature = String;

// =============================================================================
// IDENTITY
// =============================================================================

macro_rules! digest_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
        pub struct $name(pub [u8; 32]);

        impl $name {
            /// Raw digest bytes.
            #[must_use]
            pub fn as_bytes(&self) -> &[u8; 32] {
                &self.0
            }

            /// True for the all-zero placeholder value.
            #[must_use]
            pub fn is_zero(&self) -> bool {
                self.0 == [0u8; 32]
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&hex::encode(self.0))
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), self)
            }
        }

        impl FromStr for $name {
            type Err = IdParseError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                if s.len() != 64 {
                    return Err(IdParseError::new(s, "expected 64 hex characters"));
                }
                let mut bytes = [0u8; 32];
                hex::decode_to_slice(s, &mut bytes)
                    .map_err(|e| IdParseError::new(s, e.to_string()))?;
                Ok(Self(bytes))
            }
        }

        impl Serialize for $name {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.serialize_str(&self.to_string())
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let s = String::deserialize(deserializer)?;
                s.parse().map_err(serde::de::Error::custom)
            }
        }
    };
}

digest_id!(
    /// A SHA-256 digest (merkle roots, generic checksums).
    Checksum256
);

digest_id!(
    /// Block identifier. The leading four bytes hold the block height
    /// big-endian; the remainder is the header digest.
    BlockId
);

digest_id!(
    /// Transaction identifier: SHA-256 of the packed transaction bytes.
    TransactionId
);

digest_id!(
    /// Chain identifier: SHA-256 of the encoded genesis descriptor.
    ChainId
);

impl BlockId {
    /// Height encoded in the id.
    #[must_use]
    pub fn num(&self) -> u32 {
        u32::from_be_bytes([self.0[0], self.0[1], self.0[2], self.0[3]])
    }

    /// Reference prefix used by transactions to pin a recent block.
    ///
    /// Little-endian `u32` taken from bytes `8..12` of the id.
    #[must_use]
    pub fn ref_block_prefix(&self) -> u32 {
        u32::from_le_bytes([self.0[8], self.0[9], self.0[10], self.0[11]])
    }

    /// Build an id from a header digest and the height it belongs to.
    #[must_use]
    pub fn from_digest(digest: [u8; 32], block_num: u32) -> Self {
        let mut bytes = digest;
        bytes[..4].copy_from_slice(&block_num.to_be_bytes());
        Self(bytes)
    }
}

// =============================================================================
// BLOCKS
// =============================================================================

/// Header of a produced block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockHeader {
    /// Slot timestamp of the block.
    pub timestamp: TimePoint,
    /// Producer account name.
    pub producer: String,
    /// Number of prior blocks this producer confirms.
    pub confirmed: u16,
    /// Id of the parent block.
    pub previous: BlockId,
    /// Merkle root of the transaction receipts.
    pub transaction_mroot: Checksum256,
    /// Merkle root of the executed actions.
    pub action_mroot: Checksum256,
    /// Producer schedule version in effect.
    pub schedule_version: u32,
}

impl BlockHeader {
    /// Height of this block (one past its parent).
    #[must_use]
    pub fn block_num(&self) -> u32 {
        self.previous.num().wrapping_add(1)
    }

    /// Compute the block id from the header fields.
    #[must_use]
    pub fn id(&self) -> BlockId {
        let mut hasher = Sha256::new();
        hasher.update(self.timestamp.timestamp_millis().to_be_bytes());
        hasher.update((self.producer.len() as u32).to_be_bytes());
        hasher.update(self.producer.as_bytes());
        hasher.update(self.confirmed.to_be_bytes());
        hasher.update(self.previous.0);
        hasher.update(self.transaction_mroot.0);
        hasher.update(self.action_mroot.0);
        hasher.update(self.schedule_version.to_be_bytes());
        BlockId::from_digest(hasher.finalize().into(), self.block_num())
    }
}

/// Execution status recorded in a transaction receipt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionStatus {
    Executed,
    SoftFail,
    HardFail,
    Delayed,
    Expired,
}

/// A transaction as included in a block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionReceipt {
    pub status: TransactionStatus,
    pub trx: PackedTransaction,
}

/// A block signed by its producer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedBlock {
    pub header: BlockHeader,
    pub producer_signature: Signature,
    #[serde(default)]
    pub transactions: Vec<TransactionReceipt>,
}

impl SignedBlock {
    #[must_use]
    pub fn id(&self) -> BlockId {
        self.header.id()
    }

    #[must_use]
    pub fn block_num(&self) -> u32 {
        self.header.block_num()
    }

    #[must_use]
    pub fn previous(&self) -> BlockId {
        self.header.previous
    }

    /// Binary encoding used for on-disk storage.
    pub fn encode(&self) -> Result<Vec<u8>, CodecError> {
        bincode::serialize(self).map_err(|e| CodecError::Encode(e.to_string()))
    }

    /// Decode a block previously produced by [`SignedBlock::encode`].
    pub fn decode(bytes: &[u8]) -> Result<Self, CodecError> {
        bincode::deserialize(bytes).map_err(|e| CodecError::Decode(e.to_string()))
    }
}

/// Ledger-core view of an accepted block.
#[derive(Debug, Clone)]
pub struct BlockState {
    pub id: BlockId,
    pub block_num: u32,
    pub header: BlockHeader,
    pub block: Arc<SignedBlock>,
    pub validated: bool,
}

impl BlockState {
    /// Wrap a block, deriving id and height from its header.
    #[must_use]
    pub fn new(block: Arc<SignedBlock>, validated: bool) -> Self {
        Self {
            id: block.id(),
            block_num: block.block_num(),
            header: block.header.clone(),
            block,
            validated,
        }
    }
}

/// A producer's confirmation of a block header.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeaderConfirmation {
    pub block_id: BlockId,
    pub producer: String,
    pub producer_signature: Signature,
}

// =============================================================================
// TRANSACTIONS
// =============================================================================

/// A single action inside a transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Action {
    pub name: String,
    pub domain: String,
    pub key: String,
    #[serde(with = "hex_bytes")]
    pub data: Vec<u8>,
    /// Keys whose signatures authorize this action.
    #[serde(default)]
    pub authorizers: Vec<PublicKey>,
}

/// An unsigned transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub expiration: TimePoint,
    pub ref_block_num: u16,
    pub ref_block_prefix: u32,
    #[serde(default)]
    pub max_charge: u32,
    pub actions: Vec<Action>,
}

impl Transaction {
    /// Every key named as an authorizer, in first-seen order.
    #[must_use]
    pub fn authorizers(&self) -> Vec<&PublicKey> {
        let mut keys: Vec<&PublicKey> = Vec::new();
        for key in self.actions.iter().flat_map(|a| a.authorizers.iter()) {
            if !keys.contains(&key) {
                keys.push(key);
            }
        }
        keys
    }
}

/// Compression applied to `packed_trx`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Compression {
    #[default]
    None,
}

/// A signed, binary-encoded transaction as submitted by clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackedTransaction {
    #[serde(default)]
    pub signatures: Vec<Signature>,
    #[serde(default)]
    pub compression: Compression,
    #[serde(with = "hex_bytes")]
    pub packed_trx: Vec<u8>,
}

impl PackedTransaction {
    /// Pack a transaction with the given signatures.
    pub fn new(trx: &Transaction, signatures: Vec<Signature>) -> Result<Self, CodecError> {
        let packed_trx = bincode::serialize(trx).map_err(|e| CodecError::Encode(e.to_string()))?;
        Ok(Self {
            signatures,
            compression: Compression::None,
            packed_trx,
        })
    }

    #[must_use]
    pub fn id(&self) -> TransactionId {
        TransactionId(Sha256::digest(&self.packed_trx).into())
    }

    /// Decode the inner transaction.
    pub fn unpack(&self) -> Result<Transaction, CodecError> {
        bincode::deserialize(&self.packed_trx).map_err(|e| CodecError::Decode(e.to_string()))
    }
}

/// Ledger-core bookkeeping for a transaction it has seen.
#[derive(Debug, Clone)]
pub struct TransactionMetadata {
    pub id: TransactionId,
    pub packed: Arc<PackedTransaction>,
    /// Generated by the ledger itself rather than submitted.
    pub implicit: bool,
    pub accepted: bool,
}

impl TransactionMetadata {
    #[must_use]
    pub fn new(packed: Arc<PackedTransaction>) -> Self {
        Self {
            id: packed.id(),
            packed,
            implicit: false,
            accepted: false,
        }
    }
}

/// Trace of one executed action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionTrace {
    pub action: Action,
    pub elapsed_us: u64,
    #[serde(default)]
    pub console: String,
}

/// Result of applying a transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionTrace {
    pub id: TransactionId,
    pub block_num: u32,
    pub elapsed_us: u64,
    pub action_traces: Vec<ActionTrace>,
    #[serde(default)]
    pub except: Option<String>,
}

/// Serde adapter rendering byte vectors as lowercase hex strings.
pub mod hex_bytes {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&hex::encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(deserializer)?;
        hex::decode(s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn header(previous: BlockId) -> BlockHeader {
        BlockHeader {
            timestamp: Utc.with_ymd_and_hms(2018, 5, 31, 12, 0, 0).unwrap(),
            producer: "evt".to_string(),
            confirmed: 0,
            previous,
            transaction_mroot: Checksum256::default(),
            action_mroot: Checksum256::default(),
            schedule_version: 0,
        }
    }

    #[test]
    fn test_block_id_encodes_height() {
        let genesis = header(BlockId::default());
        assert_eq!(genesis.block_num(), 1);
        assert_eq!(genesis.id().num(), 1);

        let next = header(genesis.id());
        assert_eq!(next.id().num(), 2);
    }

    #[test]
    fn test_block_id_hex_round_trip() {
        let id = header(BlockId::default()).id();
        let parsed: BlockId = id.to_string().parse().unwrap();
        assert_eq!(parsed, id);
        assert_eq!(serde_json::to_value(id).unwrap(), serde_json::json!(id.to_string()));
    }

    #[test]
    fn test_block_id_rejects_malformed_input() {
        assert!("123".parse::<BlockId>().is_err());
        assert!("zz".repeat(32).parse::<BlockId>().is_err());
    }

    #[test]
    fn test_ref_block_prefix_reads_second_word() {
        let mut bytes = [0u8; 32];
        bytes[8..12].copy_from_slice(&0xdead_beefu32.to_le_bytes());
        assert_eq!(BlockId(bytes).ref_block_prefix(), 0xdead_beef);
    }

    #[test]
    fn test_signed_block_binary_encoding() {
        let block = SignedBlock {
            header: header(BlockId::default()),
            producer_signature: "SIG_K1_test".to_string(),
            transactions: vec![],
        };
        let decoded = SignedBlock::decode(&block.encode().unwrap()).unwrap();
        assert_eq!(decoded, block);
        assert!(SignedBlock::decode(&[0xff, 0x01]).is_err());
    }

    #[test]
    fn test_transaction_authorizers_are_deduplicated() {
        let action = |keys: &[&str]| Action {
            name: "transfer".to_string(),
            domain: "cookie".to_string(),
            key: "t1".to_string(),
            data: vec![],
            authorizers: keys.iter().map(|k| k.to_string()).collect(),
        };
        let trx = Transaction {
            expiration: Utc.with_ymd_and_hms(2018, 5, 31, 12, 0, 30).unwrap(),
            ref_block_num: 1,
            ref_block_prefix: 0,
            max_charge: 0,
            actions: vec![action(&["A", "B"]), action(&["B", "C"])],
        };
        assert_eq!(trx.authorizers(), vec!["A", "B", "C"]);

        let packed = PackedTransaction::new(&trx, vec![]).unwrap();
        assert_eq!(packed.unpack().unwrap(), trx);
        assert!(!packed.id().is_zero());
    }
}
