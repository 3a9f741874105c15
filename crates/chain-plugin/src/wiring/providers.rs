//! # Method Providers
//!
//! Binds the ledger-backed providers for every method slot the chain plugin
//! owns. Each provider holds its own `Arc` to the ledger, so the slot keeps
//! working until its handle is released.

use std::sync::Arc;

use shared_bus::interfaces::{
    BlockSync, GetBlockById, GetBlockByNumber, GetHeadBlockId, GetLastIrreversibleBlockNumber,
    TransactionSync,
};
use shared_bus::{NodeBus, ProviderHandle};
use tracing::warn;

use crate::checkpoints::CheckpointSet;
use crate::ports::LedgerCore;

/// Bind all six providers.
///
/// When `checkpoints` is given, block sync rejects blocks contradicting it
/// before they reach the ledger.
///
/// # Panics
///
/// If any of the slots already has a provider.
pub fn bind_providers(
    bus: &NodeBus,
    ledger: &Arc<dyn LedgerCore>,
    checkpoints: Option<Arc<CheckpointSet>>,
) -> Vec<ProviderHandle> {
    let by_number = {
        let ledger = Arc::clone(ledger);
        bus.method::<GetBlockByNumber>()
            .bind(move |num| ledger.fetch_block_by_number(num))
    };

    let by_id = {
        let ledger = Arc::clone(ledger);
        bus.method::<GetBlockById>()
            .bind(move |id| ledger.fetch_block_by_id(&id))
    };

    let head_id = {
        let ledger = Arc::clone(ledger);
        bus.method::<GetHeadBlockId>()
            .bind(move |()| ledger.head_block_id())
    };

    let lib_num = {
        let ledger = Arc::clone(ledger);
        bus.method::<GetLastIrreversibleBlockNumber>()
            .bind(move |()| ledger.last_irreversible_block_num())
    };

    let block_sync = {
        let ledger = Arc::clone(ledger);
        bus.method::<BlockSync>().bind(move |block| {
            if let Some(checkpoints) = &checkpoints {
                if let Err(e) = checkpoints.verify(&block) {
                    warn!(block_num = block.block_num(), error = %e, "Block rejected by checkpoint");
                    return Err(e);
                }
            }
            ledger.push_block(block)
        })
    };

    let trx_sync = {
        let ledger = Arc::clone(ledger);
        bus.method::<TransactionSync>()
            .bind(move |(trx, unconditional)| ledger.push_transaction(trx, unconditional))
    };

    vec![by_number, by_id, head_id, lib_num, block_sync, trx_sync]
}
