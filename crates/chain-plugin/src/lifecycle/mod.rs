//! # Lifecycle Controller
//!
//! Owns the ledger core and every bus token derived from it.
//!
//! ```text
//!   Unconfigured ──configure──► Configured ──start──► Started ──stop──► Stopped
//! ```
//!
//! - `configure` resolves paths, parses checkpoints, runs maintenance,
//!   loads genesis and creates the ledger core.
//! - `start` starts the ledger, binds the method providers and relays the
//!   ledger signals onto the node channels.
//! - `stop` releases every token, then drops the ledger core. It is a no-op
//!   in any state other than `Started`.

pub mod maintenance;

use std::fmt;
use std::sync::Arc;

use block_storage::{BlockLogRepair, DirectoryBlockLog, SystemTimeSource, TimeSource};
use shared_bus::NodeBus;
use shared_types::{BlockId, ChainId};
use tracing::{info, warn};

use crate::adapters::{MemoryLedgerFactory, SimpleAbi};
use crate::api::{ReadOnlyApi, ReadWriteApi};
use crate::checkpoints::CheckpointSet;
use crate::container::{ChainConfig, ChainOptions, GenesisTimestamp, NodeDirs};
use crate::errors::ChainError;
use crate::genesis::{snap_to_block_interval, GenesisState};
use crate::ports::{AbiSerializer, LedgerCore, LedgerFactory};
use crate::submission::{EmergencyShutdown, SubmissionPipeline};
use crate::wiring::Wiring;

pub use maintenance::{Maintenance, MaintenanceAction};

/// Lifecycle state of the chain plugin.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    Unconfigured,
    Configured,
    Started,
    Stopped,
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LifecycleState::Unconfigured => "unconfigured",
            LifecycleState::Configured => "configured",
            LifecycleState::Started => "started",
            LifecycleState::Stopped => "stopped",
        };
        f.write_str(name)
    }
}

/// The chain plugin: lifecycle controller for one ledger core.
pub struct ChainPlugin {
    bus: Arc<NodeBus>,
    factory: Arc<dyn LedgerFactory>,
    abi: Arc<dyn AbiSerializer>,
    block_log: Arc<dyn BlockLogRepair>,
    clock: Arc<dyn TimeSource>,
    state: LifecycleState,
    config: Option<ChainConfig>,
    checkpoints: Arc<CheckpointSet>,
    enforce_checkpoints: bool,
    chain_id: Option<ChainId>,
    // Declared before `ledger` so tokens are released first on drop.
    wiring: Wiring,
    ledger: Option<Arc<dyn LedgerCore>>,
}

impl ChainPlugin {
    /// A plugin using the development ledger, the token ABI and the
    /// filesystem block-log repair.
    #[must_use]
    pub fn new(bus: Arc<NodeBus>) -> Self {
        Self {
            bus,
            factory: Arc::new(MemoryLedgerFactory::default()),
            abi: Arc::new(SimpleAbi::token()),
            block_log: Arc::new(DirectoryBlockLog::default()),
            clock: Arc::new(SystemTimeSource),
            state: LifecycleState::Unconfigured,
            config: None,
            checkpoints: Arc::new(CheckpointSet::default()),
            enforce_checkpoints: false,
            chain_id: None,
            wiring: Wiring::default(),
            ledger: None,
        }
    }

    #[must_use]
    pub fn with_ledger_factory(mut self, factory: Arc<dyn LedgerFactory>) -> Self {
        self.factory = factory;
        self
    }

    #[must_use]
    pub fn with_abi(mut self, abi: Arc<dyn AbiSerializer>) -> Self {
        self.abi = abi;
        self
    }

    #[must_use]
    pub fn with_block_log(mut self, block_log: Arc<dyn BlockLogRepair>) -> Self {
        self.block_log = block_log;
        self
    }

    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn TimeSource>) -> Self {
        self.clock = clock;
        self
    }

    /// Resolve configuration, run maintenance and create the ledger core.
    ///
    /// # Errors
    ///
    /// - `InvalidState` unless unconfigured
    /// - configuration, checkpoint and genesis errors
    /// - `FixedReversibleDb` after a standalone reversible-store fix
    pub fn configure(&mut self, options: &ChainOptions, dirs: &NodeDirs) -> Result<(), ChainError> {
        self.require(LifecycleState::Unconfigured, "configure")?;

        let mut config = ChainConfig::resolve(options, dirs)?;
        let checkpoints = CheckpointSet::parse(&options.checkpoints)?;
        if !checkpoints.is_empty() {
            info!(count = checkpoints.len(), enforced = options.enforce_checkpoints, "Checkpoints loaded");
        }

        if let Some(action) = options.maintenance() {
            Maintenance::new(&config, self.block_log.as_ref(), Arc::clone(&self.clock)).run(action)?;
        }

        let mut genesis = GenesisState::load_or_create(&config.genesis_json)?;
        if let Some(timestamp) = &options.genesis_timestamp {
            genesis.initial_timestamp = match timestamp {
                GenesisTimestamp::Now => snap_to_block_interval(self.clock.now()),
                GenesisTimestamp::At(at) => *at,
            };
            info!(timestamp = %genesis.initial_timestamp, "Adjusting genesis timestamp");
        }
        let chain_id = genesis.chain_id()?;
        config.genesis = genesis;

        let ledger = self.factory.create(&config)?;

        info!(
            chain_id = %chain_id,
            blocks_dir = %config.blocks_dir.display(),
            read_only = config.read_only,
            "Chain plugin configured"
        );
        self.config = Some(config);
        self.checkpoints = Arc::new(checkpoints);
        self.enforce_checkpoints = options.enforce_checkpoints;
        self.chain_id = Some(chain_id);
        self.ledger = Some(ledger);
        self.state = LifecycleState::Configured;
        Ok(())
    }

    /// Start the ledger core and wire it to the bus.
    ///
    /// # Errors
    ///
    /// `InvalidState` unless configured; ledger startup failures.
    ///
    /// # Panics
    ///
    /// If another component already bound one of the chain method slots.
    pub fn start(&mut self) -> Result<(), ChainError> {
        self.require(LifecycleState::Configured, "start")?;
        let ledger = self.ledger.clone().ok_or(ChainError::InvalidState {
            operation: "start",
            state: self.state,
        })?;

        ledger.startup()?;
        if let Some(config) = &self.config {
            if !config.read_only {
                info!("Starting chain in read/write mode");
            }
        }

        let checkpoints = self
            .enforce_checkpoints
            .then(|| Arc::clone(&self.checkpoints));
        self.wiring = Wiring::connect(&self.bus, &ledger, checkpoints);
        self.state = LifecycleState::Started;

        info!(
            "Blockchain started; head block is #{}, genesis timestamp is {}",
            ledger.head_block_num(),
            self.config
                .as_ref()
                .map(|c| c.genesis.initial_timestamp.to_rfc3339())
                .unwrap_or_default()
        );
        Ok(())
    }

    /// Release all tokens and drop the ledger core.
    pub fn stop(&mut self) {
        if self.state != LifecycleState::Started {
            return;
        }
        self.wiring.disconnect();
        self.ledger = None;
        self.state = LifecycleState::Stopped;
        info!("Chain plugin stopped");
    }

    #[must_use]
    pub fn state(&self) -> LifecycleState {
        self.state
    }

    /// Resolved configuration; readable while configured or started.
    pub fn chain_config(&self) -> Result<&ChainConfig, ChainError> {
        self.require_active("read chain configuration")?;
        self.config.as_ref().ok_or(ChainError::InvalidState {
            operation: "read chain configuration",
            state: self.state,
        })
    }

    /// Chain id derived from the genesis descriptor.
    pub fn chain_id(&self) -> Result<ChainId, ChainError> {
        self.require_active("read chain id")?;
        self.chain_id.ok_or(ChainError::InvalidState {
            operation: "read chain id",
            state: self.state,
        })
    }

    #[must_use]
    pub fn checkpoints(&self) -> &CheckpointSet {
        &self.checkpoints
    }

    /// The ledger core, between configure and stop.
    #[must_use]
    pub fn ledger(&self) -> Option<Arc<dyn LedgerCore>> {
        self.ledger.clone()
    }

    #[must_use]
    pub fn bus(&self) -> &Arc<NodeBus> {
        &self.bus
    }

    /// True if the block at `id`'s height is `id` itself.
    #[must_use]
    pub fn block_is_on_preferred_chain(&self, id: &BlockId) -> bool {
        self.ledger
            .as_ref()
            .and_then(|ledger| ledger.fetch_block_by_number(id.num()))
            .is_some_and(|block| block.id() == *id)
    }

    /// Query surface over the running ledger.
    pub fn read_only_api(&self) -> Result<ReadOnlyApi, ChainError> {
        let ledger = self.started_ledger("open the read-only API")?;
        Ok(ReadOnlyApi::new(&ledger, Arc::clone(&self.abi)))
    }

    /// Mutation surface; submissions go through the bus method slots.
    pub fn read_write_api(&self, shutdown: EmergencyShutdown) -> Result<ReadWriteApi, ChainError> {
        self.started_ledger("open the read-write API")?;
        let pipeline = SubmissionPipeline::new(Arc::clone(&self.bus), shutdown);
        Ok(ReadWriteApi::new(pipeline, Arc::clone(&self.abi)))
    }

    fn started_ledger(&self, operation: &'static str) -> Result<Arc<dyn LedgerCore>, ChainError> {
        self.require(LifecycleState::Started, operation)?;
        self.ledger.clone().ok_or(ChainError::InvalidState {
            operation,
            state: self.state,
        })
    }

    fn require(&self, expected: LifecycleState, operation: &'static str) -> Result<(), ChainError> {
        if self.state == expected {
            Ok(())
        } else {
            warn!(%operation, state = %self.state, "Lifecycle operation out of order");
            Err(ChainError::InvalidState {
                operation,
                state: self.state,
            })
        }
    }

    fn require_active(&self, operation: &'static str) -> Result<(), ChainError> {
        match self.state {
            LifecycleState::Configured | LifecycleState::Started => Ok(()),
            state => Err(ChainError::InvalidState { operation, state }),
        }
    }
}

impl fmt::Debug for ChainPlugin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChainPlugin")
            .field("state", &self.state)
            .field("chain_id", &self.chain_id)
            .field("checkpoints", &self.checkpoints.len())
            .field("wiring", &self.wiring)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn dirs(dir: &TempDir) -> NodeDirs {
        NodeDirs::new(dir.path().join("data"), dir.path().join("config"))
    }

    #[test]
    fn test_state_display() {
        assert_eq!(LifecycleState::Unconfigured.to_string(), "unconfigured");
        assert_eq!(LifecycleState::Started.to_string(), "started");
    }

    #[test]
    fn test_config_readable_only_while_active() {
        let dir = TempDir::new().unwrap();
        let mut plugin = ChainPlugin::new(Arc::new(NodeBus::new()));
        assert!(plugin.chain_config().is_err());

        plugin.configure(&ChainOptions::default(), &dirs(&dir)).unwrap();
        assert!(plugin.chain_config().is_ok());
        assert!(plugin.chain_id().is_ok());

        plugin.start().unwrap();
        assert!(plugin.chain_config().is_ok());

        plugin.stop();
        assert!(matches!(
            plugin.chain_config(),
            Err(ChainError::InvalidState {
                state: LifecycleState::Stopped,
                ..
            })
        ));
    }

    #[test]
    fn test_configure_twice_fails() {
        let dir = TempDir::new().unwrap();
        let mut plugin = ChainPlugin::new(Arc::new(NodeBus::new()));
        plugin.configure(&ChainOptions::default(), &dirs(&dir)).unwrap();
        assert!(matches!(
            plugin.configure(&ChainOptions::default(), &dirs(&dir)),
            Err(ChainError::InvalidState {
                operation: "configure",
                ..
            })
        ));
    }

    #[test]
    fn test_preferred_chain() {
        let dir = TempDir::new().unwrap();
        let mut plugin = ChainPlugin::new(Arc::new(NodeBus::new()));
        plugin.configure(&ChainOptions::default(), &dirs(&dir)).unwrap();
        plugin.start().unwrap();

        let head = plugin.ledger().unwrap().head_block_id();
        assert!(plugin.block_is_on_preferred_chain(&head));
        assert!(!plugin.block_is_on_preferred_chain(&BlockId::from_digest([1; 32], 1)));
        assert!(!plugin.block_is_on_preferred_chain(&BlockId::from_digest([1; 32], 50)));
    }
}
