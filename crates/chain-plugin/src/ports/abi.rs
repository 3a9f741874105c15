//! # ABI Codec Port
//!
//! JSON/binary translation of action arguments and JSON rendering of
//! ledger structures. All response shaping goes through this trait.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use shared_types::{PackedTransaction, SignedBlock, Transaction, TransactionTrace};

use crate::errors::AbiError;

/// One field of an action struct.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldDef {
    pub name: String,
    #[serde(rename = "type")]
    pub type_name: String,
}

/// ABI-driven serialization codec.
pub trait AbiSerializer: Send + Sync {
    /// ABI version string reported by `get_info`.
    fn version(&self) -> String;

    /// Struct type of `action`, if the action is known.
    fn action_type(&self, action: &str) -> Option<String>;

    /// Fields of `type_name`, if it is a known struct.
    fn struct_fields(&self, type_name: &str) -> Option<Vec<FieldDef>>;

    fn json_to_bin(&self, action: &str, args: &Value) -> Result<Vec<u8>, AbiError>;

    fn bin_to_json(&self, action: &str, binargs: &[u8]) -> Result<Value, AbiError>;

    fn block_to_variant(&self, block: &SignedBlock) -> Result<Value, AbiError>;

    fn trace_to_variant(&self, trace: &TransactionTrace) -> Result<Value, AbiError>;

    fn packed_transaction_from_variant(&self, value: &Value) -> Result<PackedTransaction, AbiError>;

    /// Decode an unsigned transaction. Action `data` is either hex or the
    /// action's arguments in JSON form.
    fn transaction_from_variant(&self, value: &Value) -> Result<Transaction, AbiError>;
}
