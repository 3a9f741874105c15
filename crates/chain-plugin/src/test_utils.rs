//! Builders for blocks and transactions shared by unit and integration tests.

use chrono::Duration;
use shared_types::{
    Action, BlockHeader, Checksum256, PackedTransaction, SignedBlock, TimePoint, Transaction,
    TransactionReceipt, TransactionStatus,
};

use crate::genesis::{GenesisState, BLOCK_INTERVAL_MS};

pub fn make_genesis_block() -> SignedBlock {
    GenesisState::default().genesis_block()
}

/// A block on top of `parent`, one interval later.
pub fn make_child_block(parent: &SignedBlock, transactions: Vec<PackedTransaction>) -> SignedBlock {
    SignedBlock {
        header: BlockHeader {
            timestamp: parent.header.timestamp + Duration::milliseconds(BLOCK_INTERVAL_MS),
            producer: "producer.a".to_string(),
            confirmed: 0,
            previous: parent.id(),
            transaction_mroot: Checksum256::default(),
            action_mroot: Checksum256::default(),
            schedule_version: 0,
        },
        producer_signature: String::new(),
        transactions: transactions
            .into_iter()
            .map(|trx| TransactionReceipt {
                status: TransactionStatus::Executed,
                trx,
            })
            .collect(),
    }
}

/// `count` blocks chained on top of `parent`.
pub fn make_chain(parent: &SignedBlock, count: usize) -> Vec<SignedBlock> {
    let mut blocks: Vec<SignedBlock> = Vec::with_capacity(count);
    for _ in 0..count {
        let next = make_child_block(blocks.last().unwrap_or(parent), Vec::new());
        blocks.push(next);
    }
    blocks
}

pub fn make_action(name: &str, data: Vec<u8>, authorizers: &[&str]) -> Action {
    Action {
        name: name.to_string(),
        domain: "domain".to_string(),
        key: "key".to_string(),
        data,
        authorizers: authorizers.iter().map(|k| (*k).to_string()).collect(),
    }
}

pub fn make_transaction(expiration: TimePoint, actions: Vec<Action>) -> Transaction {
    Transaction {
        expiration,
        ref_block_num: 1,
        ref_block_prefix: 0,
        max_charge: 10_000,
        actions,
    }
}

/// A packed single-action transaction; `nonce` makes ids distinct.
pub fn make_packed_transaction(nonce: u8, authorizers: &[&str]) -> PackedTransaction {
    let genesis = make_genesis_block();
    let mut trx = make_transaction(
        genesis.header.timestamp + Duration::hours(1),
        vec![make_action("transfer", vec![nonce], authorizers)],
    );
    trx.ref_block_prefix = genesis.id().ref_block_prefix();
    PackedTransaction::new(&trx, vec![format!("SIG_{nonce}")])
        .unwrap_or_else(|e| panic!("packing test transaction: {e}"))
}

/// A packed transaction whose payload does not decode.
pub fn make_malformed_transaction() -> PackedTransaction {
    PackedTransaction {
        signatures: Vec::new(),
        compression: Default::default(),
        packed_trx: vec![0xff, 0x01],
    }
}
