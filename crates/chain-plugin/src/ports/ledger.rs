//! # Ledger Core Port
//!
//! What the chain plugin consumes from the consensus/state-transition
//! engine. The engine is constructed by a [`LedgerFactory`] at configure
//! time and owned by the lifecycle controller.

use std::collections::BTreeSet;
use std::sync::Arc;

use shared_bus::Channel;
use shared_types::{
    BlockId, BlockState, HeaderConfirmation, LedgerError, PackedTransaction, PublicKey,
    SignedBlock, TimePoint, Transaction, TransactionMetadata, TransactionTrace,
};

use crate::container::ChainConfig;

/// The ledger core's own signals, relayed onto node channels at start.
#[derive(Debug, Clone)]
pub struct LedgerSignals {
    pub accepted_block_header: Channel<Arc<BlockState>>,
    pub accepted_block: Channel<Arc<BlockState>>,
    pub irreversible_block: Channel<Arc<BlockState>>,
    pub accepted_transaction: Channel<Arc<TransactionMetadata>>,
    pub applied_transaction: Channel<Arc<TransactionTrace>>,
    pub accepted_confirmation: Channel<HeaderConfirmation>,
}

impl Default for LedgerSignals {
    fn default() -> Self {
        Self {
            accepted_block_header: Channel::new("ledger.accepted_block_header"),
            accepted_block: Channel::new("ledger.accepted_block"),
            irreversible_block: Channel::new("ledger.irreversible_block"),
            accepted_transaction: Channel::new("ledger.accepted_transaction"),
            applied_transaction: Channel::new("ledger.applied_transaction"),
            accepted_confirmation: Channel::new("ledger.accepted_confirmation"),
        }
    }
}

/// Consensus/state-transition engine.
pub trait LedgerCore: Send + Sync {
    /// Open storage and replay persisted blocks.
    fn startup(&self) -> Result<(), LedgerError>;

    fn head_block_num(&self) -> u32;
    fn head_block_id(&self) -> BlockId;
    fn head_block_time(&self) -> TimePoint;
    fn head_block_producer(&self) -> String;

    fn last_irreversible_block_num(&self) -> u32;
    fn last_irreversible_block_id(&self) -> BlockId;

    fn fetch_block_by_number(&self, block_num: u32) -> Option<Arc<SignedBlock>>;
    fn fetch_block_by_id(&self, id: &BlockId) -> Option<Arc<SignedBlock>>;

    /// Apply a block on top of the head.
    fn push_block(&self, block: Arc<SignedBlock>) -> Result<(), LedgerError>;

    /// Apply a transaction. `unconditional` marks it as already known to be
    /// accepted.
    fn push_transaction(
        &self,
        trx: Arc<PackedTransaction>,
        unconditional: bool,
    ) -> Result<Arc<TransactionTrace>, LedgerError>;

    /// Subset of `available` needed to authorize `trx`.
    fn get_required_keys(
        &self,
        trx: &Transaction,
        available: &BTreeSet<PublicKey>,
    ) -> Result<BTreeSet<PublicKey>, LedgerError>;

    fn signals(&self) -> &LedgerSignals;
}

/// Builds the ledger core from resolved configuration.
pub trait LedgerFactory: Send + Sync {
    fn create(&self, config: &ChainConfig) -> Result<Arc<dyn LedgerCore>, LedgerError>;
}

impl<F> LedgerFactory for F
where
    F: Fn(&ChainConfig) -> Result<Arc<dyn LedgerCore>, LedgerError> + Send + Sync,
{
    fn create(&self, config: &ChainConfig) -> Result<Arc<dyn LedgerCore>, LedgerError> {
        self(config)
    }
}
