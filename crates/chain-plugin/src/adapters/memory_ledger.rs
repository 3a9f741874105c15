//! # In-Memory Ledger
//!
//! Development [`LedgerCore`]: an in-memory chain seeded with the genesis
//! block, with irreversible blocks appended to the block log and the
//! reversible tail kept in the reversible store.
//!
//! ## Irreversibility
//!
//! A block becomes irreversible once it is `irreversibility_distance` blocks
//! behind head. It is then appended to the block log and removed from the
//! reversible store, in that order; a crash in between leaves a duplicate
//! that replay skips.
//!
//! ## Locking
//!
//! `chain` is always taken before `stores`. Signals are published after both
//! are released so subscribers may call back into the ledger.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::sync::Arc;
use std::time::Instant;

use block_storage::{BlockLog, ReversibleStore, StoreError};
use parking_lot::{Mutex, RwLock};
use shared_bus::Channel;
use shared_types::{
    ActionTrace, BlockId, BlockState, HeaderConfirmation, LedgerError, PackedTransaction,
    PublicKey, SignedBlock, TimePoint, Transaction, TransactionId, TransactionMetadata,
    TransactionTrace,
};
use tracing::{debug, info, warn};

use crate::container::ChainConfig;
use crate::ports::{LedgerCore, LedgerFactory, LedgerSignals};

/// Blocks behind head at which a block becomes irreversible.
pub const DEFAULT_IRREVERSIBILITY_DISTANCE: u32 = 2;

#[derive(Debug, Default)]
struct Chain {
    started: bool,
    blocks: BTreeMap<u32, Arc<SignedBlock>>,
    ids: HashMap<BlockId, u32>,
    lib: u32,
    applied: HashSet<TransactionId>,
}

impl Chain {
    fn head(&self) -> Option<&Arc<SignedBlock>> {
        self.blocks.values().next_back()
    }

    fn head_id(&self) -> BlockId {
        self.head().map(|b| b.id()).unwrap_or_default()
    }

    /// Append `block` if it extends the head.
    fn link(&mut self, block: Arc<SignedBlock>) -> Result<(), LedgerError> {
        let block_num = block.block_num();
        if !self.blocks.is_empty() && block.previous() != self.head_id() {
            return Err(LedgerError::UnlinkableBlock {
                block_num,
                previous: block.previous(),
            });
        }
        for receipt in &block.transactions {
            self.applied.insert(receipt.trx.id());
        }
        self.ids.insert(block.id(), block_num);
        self.blocks.insert(block_num, block);
        Ok(())
    }

    /// Most recent block whose low 16 height bits equal `ref_block_num`.
    fn reference_block(&self, ref_block_num: u16) -> Option<&Arc<SignedBlock>> {
        self.blocks
            .iter()
            .rev()
            .find(|(num, _)| (**num & 0xffff) as u16 == ref_block_num)
            .map(|(_, block)| block)
    }
}

struct Stores {
    log: BlockLog,
    /// `None` when read-only and no store exists yet.
    reversible: Option<ReversibleStore>,
}

/// In-memory ledger core backed by the block log and the reversible store.
pub struct MemoryLedger {
    config: ChainConfig,
    irreversibility_distance: u32,
    chain: RwLock<Chain>,
    stores: Mutex<Option<Stores>>,
    signals: LedgerSignals,
}

impl MemoryLedger {
    #[must_use]
    pub fn new(config: ChainConfig) -> Self {
        Self {
            config,
            irreversibility_distance: DEFAULT_IRREVERSIBILITY_DISTANCE,
            chain: RwLock::new(Chain::default()),
            stores: Mutex::new(None),
            signals: LedgerSignals::default(),
        }
    }

    #[must_use]
    pub fn with_irreversibility_distance(mut self, distance: u32) -> Self {
        self.irreversibility_distance = distance;
        self
    }

    /// Accept a producer confirmation for a known block.
    pub fn push_confirmation(&self, confirmation: HeaderConfirmation) -> Result<(), LedgerError> {
        {
            let chain = self.chain.read();
            if !chain.started {
                return Err(LedgerError::NotStarted);
            }
            if !chain.ids.contains_key(&confirmation.block_id) {
                return Err(LedgerError::UnknownBlock {
                    block: confirmation.block_id.to_string(),
                });
            }
        }
        emit(&self.signals.accepted_confirmation, &confirmation);
        Ok(())
    }

    /// Number of blocks held in the reversible store.
    #[must_use]
    pub fn reversible_len(&self) -> usize {
        self.stores
            .lock()
            .as_ref()
            .and_then(|s| s.reversible.as_ref())
            .map_or(0, ReversibleStore::len)
    }

    fn open_reversible(&self) -> Result<Option<ReversibleStore>, LedgerError> {
        let dir = &self.config.reversible_dir;
        if self.config.read_only {
            match ReversibleStore::open_read_only(dir) {
                Ok(store) => Ok(Some(store)),
                Err(StoreError::Missing { .. }) => Ok(None),
                Err(e) => Err(store_error(e)),
            }
        } else {
            ReversibleStore::open_read_write(dir, self.config.reversible_cache_size)
                .map(Some)
                .map_err(store_error)
        }
    }
}

impl LedgerCore for MemoryLedger {
    fn startup(&self) -> Result<(), LedgerError> {
        let mut chain = self.chain.write();
        if chain.started {
            return Ok(());
        }

        let genesis = Arc::new(self.config.genesis.genesis_block());
        let (mut log, logged) = BlockLog::open(&self.config.blocks_dir).map_err(store_error)?;

        let mut restored = Chain::default();
        if logged.is_empty() {
            if !self.config.read_only {
                log.append(genesis.block_num(), encode_block(&genesis)?)
                    .map_err(store_error)?;
            }
            restored.link(Arc::clone(&genesis))?;
        } else {
            for record in logged {
                let block = decode_block(&record.packed_block)?;
                if record.block_num == genesis.block_num() && block.id() != genesis.id() {
                    return Err(LedgerError::Storage(format!(
                        "block log starts with {} but genesis is {}",
                        block.id(),
                        genesis.id()
                    )));
                }
                restored.link(Arc::new(block))?;
            }
        }
        restored.lib = restored.head().map_or(0, |b| b.block_num());

        let reversible = self.open_reversible()?;
        if let Some(store) = &reversible {
            for (block_num, bytes) in store.records() {
                if block_num <= restored.lib {
                    debug!(block_num, "Skipping reversible block already in block log");
                    continue;
                }
                restored.link(Arc::new(decode_block(bytes)?))?;
            }
        }

        restored.started = true;
        info!(
            head = restored.head().map_or(0, |b| b.block_num()),
            lib = restored.lib,
            read_only = self.config.read_only,
            "Ledger started"
        );
        *chain = restored;
        *self.stores.lock() = Some(Stores { log, reversible });
        Ok(())
    }

    fn head_block_num(&self) -> u32 {
        self.chain.read().head().map_or(0, |b| b.block_num())
    }

    fn head_block_id(&self) -> BlockId {
        self.chain.read().head_id()
    }

    fn head_block_time(&self) -> TimePoint {
        self.chain
            .read()
            .head()
            .map_or(self.config.genesis.initial_timestamp, |b| b.header.timestamp)
    }

    fn head_block_producer(&self) -> String {
        self.chain
            .read()
            .head()
            .map(|b| b.header.producer.clone())
            .unwrap_or_default()
    }

    fn last_irreversible_block_num(&self) -> u32 {
        self.chain.read().lib
    }

    fn last_irreversible_block_id(&self) -> BlockId {
        let chain = self.chain.read();
        chain
            .blocks
            .get(&chain.lib)
            .map(|b| b.id())
            .unwrap_or_default()
    }

    fn fetch_block_by_number(&self, block_num: u32) -> Option<Arc<SignedBlock>> {
        self.chain.read().blocks.get(&block_num).cloned()
    }

    fn fetch_block_by_id(&self, id: &BlockId) -> Option<Arc<SignedBlock>> {
        let chain = self.chain.read();
        chain
            .ids
            .get(id)
            .and_then(|num| chain.blocks.get(num))
            .cloned()
    }

    fn push_block(&self, block: Arc<SignedBlock>) -> Result<(), LedgerError> {
        if self.config.read_only {
            return Err(LedgerError::ReadOnly);
        }

        let block_num = block.block_num();
        for receipt in &block.transactions {
            receipt.trx.unpack().map_err(|e| {
                LedgerError::InvalidBlock(format!(
                    "block #{block_num} carries undecodable transaction {}: {e}",
                    receipt.trx.id()
                ))
            })?;
        }
        let packed = encode_block(&block)?;

        let mut chain = self.chain.write();
        if !chain.started {
            return Err(LedgerError::NotStarted);
        }
        if block.previous() != chain.head_id() {
            return Err(LedgerError::UnlinkableBlock {
                block_num,
                previous: block.previous(),
            });
        }

        let mut guard = self.stores.lock();
        let stores = guard.as_mut().ok_or(LedgerError::NotStarted)?;
        let reversible = stores.reversible.as_mut().ok_or(LedgerError::ReadOnly)?;
        reversible.insert(block_num, packed).map_err(store_error)?;
        chain.link(Arc::clone(&block))?;

        let target = block_num.saturating_sub(self.irreversibility_distance);
        let mut irreversible = Vec::new();
        while chain.lib < target {
            let next = chain.lib + 1;
            let Some(settled) = chain.blocks.get(&next).cloned() else {
                break;
            };
            stores
                .log
                .append(next, encode_block(&settled)?)
                .map_err(store_error)?;
            chain.lib = next;
            irreversible.push(settled);
        }
        if !irreversible.is_empty() {
            reversible.remove_through(chain.lib).map_err(store_error)?;
        }
        let lib = chain.lib;
        drop(guard);
        drop(chain);

        debug!(block_num, lib, "Block applied");

        let state = Arc::new(BlockState::new(block, true));
        emit(&self.signals.accepted_block_header, &state);
        emit(&self.signals.accepted_block, &state);
        for settled in irreversible {
            emit(
                &self.signals.irreversible_block,
                &Arc::new(BlockState::new(settled, true)),
            );
        }
        Ok(())
    }

    fn push_transaction(
        &self,
        trx: Arc<PackedTransaction>,
        unconditional: bool,
    ) -> Result<Arc<TransactionTrace>, LedgerError> {
        if self.config.read_only {
            return Err(LedgerError::ReadOnly);
        }

        let started_at = Instant::now();
        let transaction = trx
            .unpack()
            .map_err(|e| LedgerError::InvalidTransaction(e.to_string()))?;
        if transaction.actions.is_empty() {
            return Err(LedgerError::InvalidTransaction(
                "transaction has no actions".to_string(),
            ));
        }

        let id = trx.id();
        let pending_block_num = {
            let mut chain = self.chain.write();
            if !chain.started {
                return Err(LedgerError::NotStarted);
            }
            if !unconditional && chain.applied.contains(&id) {
                return Err(LedgerError::DuplicateTransaction { id });
            }
            if self.config.force_all_checks {
                check_reference_block(&chain, &transaction)?;
            }
            chain.applied.insert(id);
            chain.head().map_or(0, |b| b.block_num()).saturating_add(1)
        };

        let action_traces: Vec<ActionTrace> = transaction
            .actions
            .into_iter()
            .map(|action| ActionTrace {
                console: String::new(),
                elapsed_us: 0,
                action,
            })
            .collect();
        if self.config.contracts_console {
            for trace in &action_traces {
                info!(
                    trx = %id,
                    action = %trace.action.name,
                    domain = %trace.action.domain,
                    key = %trace.action.key,
                    "Action applied"
                );
            }
        }

        let trace = Arc::new(TransactionTrace {
            id,
            block_num: pending_block_num,
            elapsed_us: u64::try_from(started_at.elapsed().as_micros()).unwrap_or(u64::MAX),
            action_traces,
            except: None,
        });

        let mut metadata = TransactionMetadata::new(trx);
        metadata.accepted = true;
        emit(&self.signals.accepted_transaction, &Arc::new(metadata));
        emit(&self.signals.applied_transaction, &trace);
        Ok(trace)
    }

    fn get_required_keys(
        &self,
        trx: &Transaction,
        available: &BTreeSet<PublicKey>,
    ) -> Result<BTreeSet<PublicKey>, LedgerError> {
        let mut required = BTreeSet::new();
        for key in trx.authorizers() {
            if !available.contains(key) {
                return Err(LedgerError::UnsatisfiedAuthorization { key: key.clone() });
            }
            required.insert(key.clone());
        }
        Ok(required)
    }

    fn signals(&self) -> &LedgerSignals {
        &self.signals
    }
}

/// Builds a [`MemoryLedger`] per configuration.
#[derive(Debug, Clone, Copy)]
pub struct MemoryLedgerFactory {
    pub irreversibility_distance: u32,
}

impl Default for MemoryLedgerFactory {
    fn default() -> Self {
        Self {
            irreversibility_distance: DEFAULT_IRREVERSIBILITY_DISTANCE,
        }
    }
}

impl LedgerFactory for MemoryLedgerFactory {
    fn create(&self, config: &ChainConfig) -> Result<Arc<dyn LedgerCore>, LedgerError> {
        Ok(Arc::new(
            MemoryLedger::new(config.clone())
                .with_irreversibility_distance(self.irreversibility_distance),
        ))
    }
}

fn check_reference_block(chain: &Chain, trx: &Transaction) -> Result<(), LedgerError> {
    let block = chain.reference_block(trx.ref_block_num).ok_or_else(|| {
        LedgerError::InvalidTransaction(format!(
            "reference block {} is unknown",
            trx.ref_block_num
        ))
    })?;
    if block.id().ref_block_prefix() != trx.ref_block_prefix {
        return Err(LedgerError::InvalidTransaction(format!(
            "reference block prefix {} does not match block #{}",
            trx.ref_block_prefix,
            block.block_num()
        )));
    }
    Ok(())
}

fn emit<T: 'static>(channel: &Channel<T>, value: &T) {
    if let Err(e) = channel.publish(value) {
        warn!(channel = channel.name(), error = %e, "Ledger signal delivery failed");
    }
}

fn encode_block(block: &SignedBlock) -> Result<Vec<u8>, LedgerError> {
    block
        .encode()
        .map_err(|e| LedgerError::InvalidBlock(e.to_string()))
}

fn decode_block(bytes: &[u8]) -> Result<SignedBlock, LedgerError> {
    SignedBlock::decode(bytes).map_err(|e| LedgerError::Storage(e.to_string()))
}

fn store_error(err: StoreError) -> LedgerError {
    match err {
        StoreError::CacheExhausted { .. } => LedgerError::OutOfMemory {
            detail: err.to_string(),
        },
        StoreError::Dirty { .. } => LedgerError::DatabaseDirty(err.to_string()),
        StoreError::ReadOnly => LedgerError::ReadOnly,
        other => LedgerError::Storage(other.to_string()),
    }
}
