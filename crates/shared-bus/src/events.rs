//! # Channel Kinds
//!
//! Compile-time identities of the node's event channels. The six ledger
//! relay channels carry exactly what the ledger core signals; the incoming
//! block channel is fed by peer sync.

use std::sync::Arc;

use shared_types::{BlockState, HeaderConfirmation, SignedBlock, TransactionMetadata, TransactionTrace};

/// Compile-time identity of a channel and its payload type.
pub trait ChannelKind: 'static {
    type Payload: Send + Sync + 'static;
    const NAME: &'static str;
}

macro_rules! channel_kind {
    ($(#[$meta:meta])* $kind:ident, $payload:ty, $name:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy)]
        pub struct $kind;

        impl ChannelKind for $kind {
            type Payload = $payload;
            const NAME: &'static str = $name;
        }
    };
}

channel_kind!(
    /// A block header was accepted by the ledger core.
    AcceptedBlockHeader,
    Arc<BlockState>,
    "accepted_block_header"
);

channel_kind!(
    /// A full block was accepted by the ledger core.
    AcceptedBlock,
    Arc<BlockState>,
    "accepted_block"
);

channel_kind!(
    /// A block became irreversible.
    IrreversibleBlock,
    Arc<BlockState>,
    "irreversible_block"
);

channel_kind!(
    /// A transaction was accepted into the pending state.
    AcceptedTransaction,
    Arc<TransactionMetadata>,
    "accepted_transaction"
);

channel_kind!(
    /// A transaction was applied and produced a trace.
    AppliedTransaction,
    Arc<TransactionTrace>,
    "applied_transaction"
);

channel_kind!(
    /// A producer confirmation was accepted.
    AcceptedConfirmation,
    HeaderConfirmation,
    "accepted_confirmation"
);

channel_kind!(
    /// A block arrived from the network, before validation.
    IncomingBlock,
    Arc<SignedBlock>,
    "incoming_block"
);
