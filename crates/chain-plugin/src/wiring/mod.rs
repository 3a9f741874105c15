//! # Ledger Wiring
//!
//! Connects a started ledger core to the node bus:
//!
//! ```text
//!   ledger.signals ──relay──► NodeBus channels (6)
//!   NodeBus method slots (6) ──provider──► ledger
//! ```
//!
//! [`Wiring`] owns every token created here. Dropping it (or calling
//! [`Wiring::disconnect`]) releases all of them.

pub mod providers;
pub mod relay;

use std::sync::Arc;

use shared_bus::events::{
    AcceptedBlock, AcceptedBlockHeader, AcceptedConfirmation, AcceptedTransaction,
    AppliedTransaction, IrreversibleBlock,
};
use shared_bus::{NodeBus, ProviderHandle, Subscription};
use tracing::debug;

use crate::checkpoints::CheckpointSet;
use crate::ports::LedgerCore;

pub use providers::bind_providers;
pub use relay::relay;

/// Tokens tying a ledger core to the node bus.
#[derive(Debug, Default)]
pub struct Wiring {
    subscriptions: Vec<Subscription>,
    providers: Vec<ProviderHandle>,
}

impl Wiring {
    /// Bind the method providers, then relay all six ledger signals.
    pub fn connect(
        bus: &NodeBus,
        ledger: &Arc<dyn LedgerCore>,
        checkpoints: Option<Arc<CheckpointSet>>,
    ) -> Self {
        let providers = bind_providers(bus, ledger, checkpoints);

        let signals = ledger.signals();
        let subscriptions = vec![
            relay::<AcceptedBlockHeader>(&signals.accepted_block_header, bus),
            relay::<AcceptedBlock>(&signals.accepted_block, bus),
            relay::<IrreversibleBlock>(&signals.irreversible_block, bus),
            relay::<AcceptedTransaction>(&signals.accepted_transaction, bus),
            relay::<AppliedTransaction>(&signals.applied_transaction, bus),
            relay::<AcceptedConfirmation>(&signals.accepted_confirmation, bus),
        ];

        debug!(
            subscriptions = subscriptions.len(),
            providers = providers.len(),
            "Ledger wired to node bus"
        );
        Self {
            subscriptions,
            providers,
        }
    }

    /// Release every token.
    pub fn disconnect(&mut self) {
        for subscription in &mut self.subscriptions {
            subscription.release();
        }
        for provider in &mut self.providers {
            provider.release();
        }
        self.subscriptions.clear();
        self.providers.clear();
    }

    #[must_use]
    pub fn subscription_count(&self) -> usize {
        self.subscriptions.len()
    }

    #[must_use]
    pub fn provider_count(&self) -> usize {
        self.providers.len()
    }
}
