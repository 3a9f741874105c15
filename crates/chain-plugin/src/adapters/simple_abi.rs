//! # Simple ABI Codec
//!
//! Table-driven [`AbiSerializer`]: each action maps to a struct of typed
//! fields, and each field is encoded with bincode in declaration order.
//!
//! Supported field types: `string`, `name`, `public_key`, `time_point`,
//! `bool`, `u8`, `u16`, `u32`, `u64`, `i32`, `i64`, `bytes` (hex in JSON),
//! any known struct, and `T[]` of any of those.

use std::collections::BTreeMap;

use serde_json::{Map, Value};
use shared_types::{Action, PackedTransaction, SignedBlock, Transaction, TransactionTrace};

use crate::errors::AbiError;
use crate::ports::abi::{AbiSerializer, FieldDef};

const ABI_VERSION: &str = "chain::abi/1.0";

/// Nested structs deeper than this are rejected.
const MAX_DEPTH: usize = 16;

/// In-memory ABI definition.
#[derive(Debug, Clone, Default)]
pub struct SimpleAbi {
    actions: BTreeMap<String, String>,
    structs: BTreeMap<String, Vec<FieldDef>>,
}

impl SimpleAbi {
    /// An ABI with no actions.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// The token ABI used by the development chain.
    #[must_use]
    pub fn token() -> Self {
        Self::empty()
            .with_struct("newdomain", &[("name", "name"), ("creator", "public_key")])
            .with_struct(
                "issuetoken",
                &[("domain", "name"), ("names", "name[]"), ("owner", "public_key[]")],
            )
            .with_struct(
                "transfer",
                &[
                    ("domain", "name"),
                    ("name", "name"),
                    ("to", "public_key[]"),
                    ("memo", "string"),
                ],
            )
            .with_action("newdomain", "newdomain")
            .with_action("issuetoken", "issuetoken")
            .with_action("transfer", "transfer")
    }

    #[must_use]
    pub fn with_struct(mut self, name: &str, fields: &[(&str, &str)]) -> Self {
        let fields = fields
            .iter()
            .map(|(field, type_name)| FieldDef {
                name: (*field).to_string(),
                type_name: (*type_name).to_string(),
            })
            .collect();
        self.structs.insert(name.to_string(), fields);
        self
    }

    #[must_use]
    pub fn with_action(mut self, action: &str, type_name: &str) -> Self {
        self.actions
            .insert(action.to_string(), type_name.to_string());
        self
    }

    fn prototype(&self, type_name: &str) -> Value {
        self.structs
            .get(type_name)
            .and_then(|fields| serde_json::to_value(fields).ok())
            .unwrap_or(Value::Null)
    }

    fn encode(&self, type_name: &str, value: &Value, out: &mut Vec<u8>, depth: usize) -> Result<(), String> {
        if depth > MAX_DEPTH {
            return Err("struct nesting too deep".to_string());
        }

        if let Some(inner) = type_name.strip_suffix("[]") {
            let items = value
                .as_array()
                .ok_or_else(|| format!("expected array for {type_name}"))?;
            put(out, &(items.len() as u64))?;
            for item in items {
                self.encode(inner, item, out, depth + 1)?;
            }
            return Ok(());
        }

        match type_name {
            "string" | "name" | "public_key" | "time_point" => {
                put(out, &as_str(value, type_name)?)
            }
            "bool" => put(
                out,
                &value
                    .as_bool()
                    .ok_or_else(|| "expected bool".to_string())?,
            ),
            "u8" => put(out, &narrow::<u8>(value, type_name)?),
            "u16" => put(out, &narrow::<u16>(value, type_name)?),
            "u32" => put(out, &narrow::<u32>(value, type_name)?),
            "u64" => put(
                out,
                &value
                    .as_u64()
                    .ok_or_else(|| "expected u64".to_string())?,
            ),
            "i32" => {
                let v = value.as_i64().ok_or_else(|| "expected i32".to_string())?;
                put(out, &i32::try_from(v).map_err(|e| e.to_string())?)
            }
            "i64" => put(
                out,
                &value
                    .as_i64()
                    .ok_or_else(|| "expected i64".to_string())?,
            ),
            "bytes" => {
                let bytes = hex::decode(as_str(value, type_name)?).map_err(|e| e.to_string())?;
                put(out, &bytes)
            }
            other => {
                let fields = self
                    .structs
                    .get(other)
                    .ok_or_else(|| format!("unknown type {other}"))?;
                let object = value
                    .as_object()
                    .ok_or_else(|| format!("expected object for {other}"))?;
                for field in fields {
                    let field_value = object
                        .get(&field.name)
                        .ok_or_else(|| format!("missing field {}", field.name))?;
                    self.encode(&field.type_name, field_value, out, depth + 1)?;
                }
                Ok(())
            }
        }
    }

    fn decode(&self, type_name: &str, input: &mut &[u8], depth: usize) -> Result<Value, String> {
        if depth > MAX_DEPTH {
            return Err("struct nesting too deep".to_string());
        }

        if let Some(inner) = type_name.strip_suffix("[]") {
            let len: u64 = take(input)?;
            let mut items = Vec::new();
            for _ in 0..len {
                items.push(self.decode(inner, input, depth + 1)?);
            }
            return Ok(Value::Array(items));
        }

        let value = match type_name {
            "string" | "name" | "public_key" | "time_point" => Value::from(take::<String>(input)?),
            "bool" => Value::from(take::<bool>(input)?),
            "u8" => Value::from(take::<u8>(input)?),
            "u16" => Value::from(take::<u16>(input)?),
            "u32" => Value::from(take::<u32>(input)?),
            "u64" => Value::from(take::<u64>(input)?),
            "i32" => Value::from(take::<i32>(input)?),
            "i64" => Value::from(take::<i64>(input)?),
            "bytes" => Value::from(hex::encode(take::<Vec<u8>>(input)?)),
            other => {
                let fields = self
                    .structs
                    .get(other)
                    .ok_or_else(|| format!("unknown type {other}"))?;
                let mut object = Map::new();
                for field in fields {
                    let field_value = self.decode(&field.type_name, input, depth + 1)?;
                    object.insert(field.name.clone(), field_value);
                }
                Value::Object(object)
            }
        };
        Ok(value)
    }

    /// An action with its data decoded when the ABI knows the action.
    fn action_to_variant(&self, action: &Action) -> Result<Value, AbiError> {
        let mut value = serde_json::to_value(action).map_err(|e| AbiError::Serialize(e.to_string()))?;
        if let Ok(args) = self.bin_to_json(&action.name, &action.data) {
            if let Some(object) = value.as_object_mut() {
                object.insert("hex_data".to_string(), Value::from(hex::encode(&action.data)));
                object.insert("data".to_string(), args);
            }
        }
        Ok(value)
    }
}

fn put<T: serde::Serialize + ?Sized>(out: &mut Vec<u8>, value: &T) -> Result<(), String> {
    bincode::serialize_into(out, value).map_err(|e| e.to_string())
}

fn take<T: serde::de::DeserializeOwned>(input: &mut &[u8]) -> Result<T, String> {
    bincode::deserialize_from(input).map_err(|e| e.to_string())
}

fn as_str<'a>(value: &'a Value, type_name: &str) -> Result<&'a str, String> {
    value
        .as_str()
        .ok_or_else(|| format!("expected string for {type_name}"))
}

fn narrow<T: TryFrom<u64>>(value: &Value, type_name: &str) -> Result<T, String>
where
    T::Error: std::fmt::Display,
{
    let wide = value
        .as_u64()
        .ok_or_else(|| format!("expected {type_name}"))?;
    T::try_from(wide).map_err(|e| format!("{type_name}: {e}"))
}

impl AbiSerializer for SimpleAbi {
    fn version(&self) -> String {
        ABI_VERSION.to_string()
    }

    fn action_type(&self, action: &str) -> Option<String> {
        self.actions.get(action).cloned()
    }

    fn struct_fields(&self, type_name: &str) -> Option<Vec<FieldDef>> {
        self.structs.get(type_name).cloned()
    }

    fn json_to_bin(&self, action: &str, args: &Value) -> Result<Vec<u8>, AbiError> {
        let type_name = self
            .action_type(action)
            .ok_or_else(|| AbiError::UnknownAction {
                action: action.to_string(),
            })?;

        let mut out = Vec::new();
        self.encode(&type_name, args, &mut out, 0)
            .map_err(|_| AbiError::InvalidArgs {
                action: action.to_string(),
                args: args.clone(),
                proto: self.prototype(&type_name),
            })?;
        Ok(out)
    }

    fn bin_to_json(&self, action: &str, binargs: &[u8]) -> Result<Value, AbiError> {
        let type_name = self
            .action_type(action)
            .ok_or_else(|| AbiError::UnknownAction {
                action: action.to_string(),
            })?;

        let invalid = |reason: String| AbiError::InvalidBinary {
            action: action.to_string(),
            reason,
        };
        let mut input = binargs;
        let value = self.decode(&type_name, &mut input, 0).map_err(invalid)?;
        if !input.is_empty() {
            return Err(invalid(format!("{} trailing bytes", input.len())));
        }
        Ok(value)
    }

    fn block_to_variant(&self, block: &SignedBlock) -> Result<Value, AbiError> {
        let mut value = serde_json::to_value(block).map_err(|e| AbiError::Serialize(e.to_string()))?;

        if let Some(receipts) = value.get_mut("transactions").and_then(Value::as_array_mut) {
            for (receipt, original) in receipts.iter_mut().zip(&block.transactions) {
                let Ok(trx) = original.trx.unpack() else {
                    continue;
                };
                let actions = trx
                    .actions
                    .iter()
                    .map(|a| self.action_to_variant(a))
                    .collect::<Result<Vec<_>, _>>()?;
                let mut unpacked =
                    serde_json::to_value(&trx).map_err(|e| AbiError::Serialize(e.to_string()))?;
                if let Some(object) = unpacked.as_object_mut() {
                    object.insert("actions".to_string(), Value::Array(actions));
                }
                if let Some(object) = receipt.as_object_mut() {
                    object.insert("id".to_string(), Value::from(original.trx.id().to_string()));
                    object.insert("transaction".to_string(), unpacked);
                }
            }
        }
        Ok(value)
    }

    fn trace_to_variant(&self, trace: &TransactionTrace) -> Result<Value, AbiError> {
        let mut value = serde_json::to_value(trace).map_err(|e| AbiError::Serialize(e.to_string()))?;
        if let Some(traces) = value.get_mut("action_traces").and_then(Value::as_array_mut) {
            for (rendered, original) in traces.iter_mut().zip(&trace.action_traces) {
                if let Some(object) = rendered.as_object_mut() {
                    object.insert("action".to_string(), self.action_to_variant(&original.action)?);
                }
            }
        }
        Ok(value)
    }

    fn packed_transaction_from_variant(&self, value: &Value) -> Result<PackedTransaction, AbiError> {
        serde_json::from_value(value.clone()).map_err(|e| AbiError::Deserialize(e.to_string()))
    }

    fn transaction_from_variant(&self, value: &Value) -> Result<Transaction, AbiError> {
        let mut value = value.clone();
        if let Some(actions) = value.get_mut("actions").and_then(Value::as_array_mut) {
            for action in actions {
                let Some(name) = action.get("name").and_then(Value::as_str).map(str::to_string)
                else {
                    continue;
                };
                let Some(args) = action.get("data").filter(|data| !data.is_string()).cloned()
                else {
                    continue;
                };
                let binargs = self.json_to_bin(&name, &args)?;
                if let Some(object) = action.as_object_mut() {
                    object.insert("data".to_string(), Value::from(hex::encode(binargs)));
                }
            }
        }
        serde_json::from_value(value).map_err(|e| AbiError::Deserialize(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_json_bin_json() {
        let abi = SimpleAbi::token();
        let args = json!({
            "domain": "cookie",
            "name": "t1",
            "to": ["EVT_alice", "EVT_bob"],
            "memo": "hi"
        });

        let bin = abi.json_to_bin("transfer", &args).unwrap();
        assert_eq!(abi.bin_to_json("transfer", &bin).unwrap(), args);
    }

    #[test]
    fn test_unknown_action() {
        let abi = SimpleAbi::token();
        assert_eq!(
            abi.json_to_bin("mint", &json!({})).unwrap_err(),
            AbiError::UnknownAction {
                action: "mint".into()
            }
        );
    }

    #[test]
    fn test_invalid_args_reports_prototype() {
        let abi = SimpleAbi::token();
        let err = abi
            .json_to_bin("newdomain", &json!({"name": "cookie"}))
            .unwrap_err();
        match err {
            AbiError::InvalidArgs { action, proto, .. } => {
                assert_eq!(action, "newdomain");
                assert_eq!(
                    proto,
                    json!([
                        {"name": "name", "type": "name"},
                        {"name": "creator", "type": "public_key"}
                    ])
                );
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_trailing_bytes_rejected() {
        let abi = SimpleAbi::token();
        let mut bin = abi
            .json_to_bin("newdomain", &json!({"name": "cookie", "creator": "EVT_a"}))
            .unwrap();
        bin.push(0);
        assert!(matches!(
            abi.bin_to_json("newdomain", &bin),
            Err(AbiError::InvalidBinary { .. })
        ));
    }

    #[test]
    fn test_numeric_range_checked() {
        let abi = SimpleAbi::empty()
            .with_struct("small", &[("v", "u8")])
            .with_action("small", "small");
        assert!(abi.json_to_bin("small", &json!({"v": 255})).is_ok());
        assert!(abi.json_to_bin("small", &json!({"v": 256})).is_err());
    }

    #[test]
    fn test_transaction_variant_accepts_json_args() {
        let abi = SimpleAbi::token();
        let args = json!({"name": "cookie", "creator": "EVT_a"});
        let variant = json!({
            "expiration": "2026-10-18T12:00:00Z",
            "ref_block_num": 1,
            "ref_block_prefix": 0,
            "max_charge": 10000,
            "actions": [{
                "name": "newdomain",
                "domain": "domain",
                "key": "cookie",
                "data": args,
                "authorizers": ["EVT_a"]
            }]
        });

        let trx = abi.transaction_from_variant(&variant).unwrap();
        assert_eq!(trx.actions[0].data, abi.json_to_bin("newdomain", &args).unwrap());
    }

    #[test]
    fn test_packed_variant_errors_are_deserialize() {
        let abi = SimpleAbi::token();
        assert!(matches!(
            abi.packed_transaction_from_variant(&json!({"bogus": true})),
            Err(AbiError::Deserialize(_))
        ));
    }
}
