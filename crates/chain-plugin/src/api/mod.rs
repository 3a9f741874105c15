//! # Chain API
//!
//! Request handlers behind the node's RPC layer. Transport, routing and
//! HTTP status mapping belong to that layer; failures here are [`ApiError`]
//! values with a stable code.
//!
//! [`ApiError`]: crate::errors::ApiError

pub mod read_only;
pub mod read_write;

pub use read_only::{
    server_version, AbiBinToJsonParams, AbiBinToJsonResult, AbiJsonToBinParams,
    AbiJsonToBinResult, GetInfoResult, GetRequiredKeysParams, GetRequiredKeysResult, ReadOnlyApi,
};
pub use read_write::{PushTransactionResult, ReadWriteApi};
