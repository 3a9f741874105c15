//! # Read-Only API
//!
//! Queries answered straight from the ledger core. JSON shaping of ledger
//! structures is delegated to the ABI codec; this module only adds the
//! fields clients expect on top.

use std::collections::BTreeSet;
use std::sync::{Arc, Weak};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use shared_types::{hex_bytes, BlockId, LedgerError, PublicKey, SignedBlock, TimePoint};
use tracing::debug;

use crate::errors::{AbiError, ApiError};
use crate::ports::{AbiSerializer, LedgerCore};

/// Node status reported by `get_info`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GetInfoResult {
    pub server_version: String,
    pub abi_version: String,
    pub head_block_num: u32,
    pub last_irreversible_block_num: u32,
    pub last_irreversible_block_id: BlockId,
    pub head_block_id: BlockId,
    pub head_block_time: TimePoint,
    pub head_block_producer: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AbiJsonToBinParams {
    pub action: String,
    pub args: Value,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AbiJsonToBinResult {
    #[serde(with = "hex_bytes")]
    pub binargs: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AbiBinToJsonParams {
    pub action: String,
    #[serde(with = "hex_bytes")]
    pub binargs: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AbiBinToJsonResult {
    pub args: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GetRequiredKeysParams {
    /// Unsigned transaction in JSON form.
    pub transaction: Value,
    pub available_keys: BTreeSet<PublicKey>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GetRequiredKeysResult {
    pub required_keys: BTreeSet<PublicKey>,
}

/// Packed `major.minor.patch` of this crate as eight hex digits.
#[must_use]
pub fn server_version() -> String {
    let part = |s: &str| s.parse::<u32>().unwrap_or(0) & 0xff;
    let packed = (part(env!("CARGO_PKG_VERSION_MAJOR")) << 24)
        | (part(env!("CARGO_PKG_VERSION_MINOR")) << 16)
        | part(env!("CARGO_PKG_VERSION_PATCH"));
    format!("{packed:08x}")
}

/// Read-only query surface.
///
/// Holds the ledger weakly: once the chain plugin stops, every query fails
/// with `NotStarted` and the ledger is gone.
#[derive(Clone)]
pub struct ReadOnlyApi {
    ledger: Weak<dyn LedgerCore>,
    abi: Arc<dyn AbiSerializer>,
}

impl ReadOnlyApi {
    #[must_use]
    pub fn new(ledger: &Arc<dyn LedgerCore>, abi: Arc<dyn AbiSerializer>) -> Self {
        Self {
            ledger: Arc::downgrade(ledger),
            abi,
        }
    }

    fn ledger(&self) -> Result<Arc<dyn LedgerCore>, ApiError> {
        self.ledger
            .upgrade()
            .ok_or(ApiError::Ledger(LedgerError::NotStarted))
    }

    pub fn get_info(&self) -> Result<GetInfoResult, ApiError> {
        let ledger = self.ledger()?;
        Ok(GetInfoResult {
            server_version: server_version(),
            abi_version: self.abi.version(),
            head_block_num: ledger.head_block_num(),
            last_irreversible_block_num: ledger.last_irreversible_block_num(),
            last_irreversible_block_id: ledger.last_irreversible_block_id(),
            head_block_id: ledger.head_block_id(),
            head_block_time: ledger.head_block_time(),
            head_block_producer: ledger.head_block_producer(),
        })
    }

    /// Look a block up by id, falling back to height.
    ///
    /// A well-formed id that is not found is retried as a height. Input
    /// that is neither an id nor a height is `InvalidBlockId`.
    pub fn get_block(&self, block_num_or_id: &str) -> Result<Value, ApiError> {
        let block = self.find_block(block_num_or_id)?.ok_or_else(|| ApiError::UnknownBlock {
            block: block_num_or_id.to_string(),
        })?;

        let mut value = self.abi.block_to_variant(&block)?;
        let id = block.id();
        if let Some(object) = value.as_object_mut() {
            object.insert("id".to_string(), Value::from(id.to_string()));
            object.insert("block_num".to_string(), Value::from(block.block_num()));
            object.insert(
                "ref_block_prefix".to_string(),
                Value::from(id.ref_block_prefix()),
            );
        }
        Ok(value)
    }

    fn find_block(&self, block_num_or_id: &str) -> Result<Option<Arc<SignedBlock>>, ApiError> {
        let ledger = self.ledger()?;
        let input = block_num_or_id.trim().trim_matches('"');
        let by_number = |input: &str| input.parse::<u32>().ok().map(|n| ledger.fetch_block_by_number(n));

        match input.parse::<BlockId>() {
            Ok(id) => {
                if let Some(block) = ledger.fetch_block_by_id(&id) {
                    return Ok(Some(block));
                }
                debug!(%id, "Block id not found, retrying as a height");
                Ok(by_number(input).flatten())
            }
            Err(_) => by_number(input).ok_or_else(|| ApiError::InvalidBlockId {
                input: block_num_or_id.to_string(),
            }),
        }
    }

    pub fn abi_json_to_bin(&self, params: &AbiJsonToBinParams) -> Result<AbiJsonToBinResult, ApiError> {
        let binargs = self.abi.json_to_bin(&params.action, &params.args)?;
        Ok(AbiJsonToBinResult { binargs })
    }

    pub fn abi_bin_to_json(&self, params: &AbiBinToJsonParams) -> Result<AbiBinToJsonResult, ApiError> {
        let args = self.abi.bin_to_json(&params.action, &params.binargs)?;
        Ok(AbiBinToJsonResult { args })
    }

    pub fn get_required_keys(
        &self,
        params: &GetRequiredKeysParams,
    ) -> Result<GetRequiredKeysResult, ApiError> {
        let ledger = self.ledger()?;
        let trx = self
            .abi
            .transaction_from_variant(&params.transaction)
            .map_err(|e| match e {
                AbiError::Deserialize(reason) => ApiError::InvalidTransaction(reason),
                other => ApiError::Abi(other),
            })?;
        let required_keys = ledger.get_required_keys(&trx, &params.available_keys)?;
        Ok(GetRequiredKeysResult { required_keys })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_server_version_is_eight_hex_digits() {
        let version = server_version();
        assert_eq!(version.len(), 8);
        assert!(version.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
        let major: u32 = env!("CARGO_PKG_VERSION_MAJOR").parse().unwrap();
        assert_eq!(u32::from_str_radix(&version[..2], 16).unwrap(), major);
    }

    #[test]
    fn test_binargs_render_as_hex() {
        let result = AbiJsonToBinResult {
            binargs: vec![0xde, 0xad],
        };
        assert_eq!(
            serde_json::to_value(&result).unwrap(),
            serde_json::json!({"binargs": "dead"})
        );
    }
}
