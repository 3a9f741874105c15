//! # Method Kinds
//!
//! Compile-time identities of the node's method slots. The chain plugin
//! binds the providers; peer sync, RPC and the submission pipeline call them.

use std::sync::Arc;

use shared_types::{BlockId, LedgerError, PackedTransaction, SignedBlock, TransactionTrace};

use crate::method::MethodKind;

/// Fetch a block by height.
#[derive(Debug, Clone, Copy)]
pub struct GetBlockByNumber;

impl MethodKind for GetBlockByNumber {
    type Args = u32;
    type Output = Option<Arc<SignedBlock>>;
    const NAME: &'static str = "get_block_by_number";
}

/// Fetch a block by id.
#[derive(Debug, Clone, Copy)]
pub struct GetBlockById;

impl MethodKind for GetBlockById {
    type Args = BlockId;
    type Output = Option<Arc<SignedBlock>>;
    const NAME: &'static str = "get_block_by_id";
}

/// Id of the current head block.
#[derive(Debug, Clone, Copy)]
pub struct GetHeadBlockId;

impl MethodKind for GetHeadBlockId {
    type Args = ();
    type Output = BlockId;
    const NAME: &'static str = "get_head_block_id";
}

/// Height of the last irreversible block.
#[derive(Debug, Clone, Copy)]
pub struct GetLastIrreversibleBlockNumber;

impl MethodKind for GetLastIrreversibleBlockNumber {
    type Args = ();
    type Output = u32;
    const NAME: &'static str = "get_last_irreversible_block_number";
}

/// Apply an incoming block.
#[derive(Debug, Clone, Copy)]
pub struct BlockSync;

impl MethodKind for BlockSync {
    type Args = Arc<SignedBlock>;
    type Output = Result<(), LedgerError>;
    const NAME: &'static str = "block_sync";
}

/// Apply an incoming transaction.
///
/// The flag marks the transaction as unconditional (already known to be
/// accepted); externally submitted transactions pass `false`.
#[derive(Debug, Clone, Copy)]
pub struct TransactionSync;

impl MethodKind for TransactionSync {
    type Args = (Arc<PackedTransaction>, bool);
    type Output = Result<Arc<TransactionTrace>, LedgerError>;
    const NAME: &'static str = "transaction_sync";
}
