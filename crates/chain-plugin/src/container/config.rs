//! # Chain Configuration
//!
//! [`ChainOptions`] is the raw option surface (defaults overlaid with
//! `CHAIN_*` environment variables). [`ChainConfig`] is the resolved form
//! handed to the ledger core: every path absolute, sizes in bytes.
//!
//! ## Environment Variables
//!
//! | variable | option |
//! |---|---|
//! | `CHAIN_DATA_DIR` / `CHAIN_CONFIG_DIR` | base directories |
//! | `CHAIN_GENESIS_JSON` | genesis file (relative to the config dir) |
//! | `CHAIN_GENESIS_TIMESTAMP` | ISO timestamp or `now` |
//! | `CHAIN_BLOCKS_DIR` / `CHAIN_TOKENDB_DIR` | relative to the data dir |
//! | `CHAIN_CHECKPOINTS` | `;`-separated `[num,"id"]` pairs |
//! | `CHAIN_STATE_DB_SIZE_MB` / `CHAIN_REVERSIBLE_BLOCKS_DB_SIZE_MB` | sizes |
//! | `CHAIN_DELETE_ALL_BLOCKS`, `CHAIN_HARD_REPLAY`, `CHAIN_REPLAY`, `CHAIN_FIX_REVERSIBLE_BLOCKS` | maintenance |
//! | `CHAIN_FORCE_ALL_CHECKS`, `CHAIN_CONTRACTS_CONSOLE`, `CHAIN_READ_ONLY`, `CHAIN_ENFORCE_CHECKPOINTS` | behavior flags |

use std::path::{Path, PathBuf};

use block_storage::REVERSIBLE_BLOCKS_DIR_NAME;
use chrono::{DateTime, NaiveDateTime, Utc};
use shared_types::TimePoint;

use crate::errors::ChainError;
use crate::genesis::GenesisState;
use crate::lifecycle::maintenance::MaintenanceAction;

/// State directory name inside the data directory.
pub const DEFAULT_STATE_DIR_NAME: &str = "state";

const MIB: u64 = 1024 * 1024;

/// Base directories supplied by the node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeDirs {
    pub data_dir: PathBuf,
    pub config_dir: PathBuf,
}

impl Default for NodeDirs {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./data"),
            config_dir: PathBuf::from("./config"),
        }
    }
}

impl NodeDirs {
    pub fn new(data_dir: impl Into<PathBuf>, config_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            config_dir: config_dir.into(),
        }
    }

    /// Defaults overridden by `CHAIN_DATA_DIR` and `CHAIN_CONFIG_DIR`.
    pub fn from_env() -> Self {
        let mut dirs = Self::default();
        if let Ok(dir) = std::env::var("CHAIN_DATA_DIR") {
            dirs.data_dir = PathBuf::from(dir);
        }
        if let Ok(dir) = std::env::var("CHAIN_CONFIG_DIR") {
            dirs.config_dir = PathBuf::from(dir);
        }
        dirs
    }
}

/// Genesis timestamp override.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GenesisTimestamp {
    /// Current time snapped forward to the next block interval.
    Now,
    At(TimePoint),
}

impl GenesisTimestamp {
    /// Parse `now`, an RFC 3339 timestamp, or a zone-less ISO timestamp
    /// taken as UTC.
    pub fn parse(input: &str) -> Result<Self, ChainError> {
        let input = input.trim();
        if input.eq_ignore_ascii_case("now") {
            return Ok(Self::Now);
        }
        if let Ok(ts) = DateTime::parse_from_rfc3339(input) {
            return Ok(Self::At(ts.with_timezone(&Utc)));
        }
        NaiveDateTime::parse_from_str(input, "%Y-%m-%dT%H:%M:%S%.f")
            .map(|ts| Self::At(ts.and_utc()))
            .map_err(|e| ChainError::Config(format!("invalid genesis timestamp '{input}': {e}")))
    }
}

/// Raw chain options.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainOptions {
    /// Genesis file, relative paths resolve against the config dir.
    pub genesis_json: PathBuf,
    pub genesis_timestamp: Option<GenesisTimestamp>,
    /// Relative paths resolve against the data dir.
    pub blocks_dir: PathBuf,
    pub token_db_dir: PathBuf,
    /// `[num,"id"]` JSON pairs.
    pub checkpoints: Vec<String>,
    pub state_db_size_mb: u64,
    pub reversible_blocks_db_size_mb: u64,
    pub delete_all_blocks: bool,
    pub hard_replay_blockchain: bool,
    pub replay_blockchain: bool,
    pub fix_reversible_blocks: bool,
    pub force_all_checks: bool,
    pub contracts_console: bool,
    pub read_only: bool,
    /// Reject blocks that contradict a checkpoint.
    pub enforce_checkpoints: bool,
}

impl Default for ChainOptions {
    fn default() -> Self {
        Self {
            genesis_json: PathBuf::from("genesis.json"),
            genesis_timestamp: None,
            blocks_dir: PathBuf::from("blocks"),
            token_db_dir: PathBuf::from("tokendb"),
            checkpoints: Vec::new(),
            state_db_size_mb: 1024,
            reversible_blocks_db_size_mb: 340,
            delete_all_blocks: false,
            hard_replay_blockchain: false,
            replay_blockchain: false,
            fix_reversible_blocks: false,
            force_all_checks: false,
            contracts_console: false,
            read_only: false,
            enforce_checkpoints: false,
        }
    }
}

impl ChainOptions {
    /// Defaults overlaid with `CHAIN_*` environment variables.
    pub fn from_env() -> Result<Self, ChainError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Defaults overlaid with whatever `lookup` returns per variable.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ChainError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut options = Self::default();

        if let Some(v) = lookup("CHAIN_GENESIS_JSON") {
            options.genesis_json = PathBuf::from(v);
        }
        if let Some(v) = lookup("CHAIN_GENESIS_TIMESTAMP") {
            options.genesis_timestamp = Some(GenesisTimestamp::parse(&v)?);
        }
        if let Some(v) = lookup("CHAIN_BLOCKS_DIR") {
            options.blocks_dir = PathBuf::from(v);
        }
        if let Some(v) = lookup("CHAIN_TOKENDB_DIR") {
            options.token_db_dir = PathBuf::from(v);
        }
        if let Some(v) = lookup("CHAIN_CHECKPOINTS") {
            options.checkpoints = v
                .split(';')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect();
        }
        if let Some(v) = lookup("CHAIN_STATE_DB_SIZE_MB") {
            options.state_db_size_mb = parse_size("CHAIN_STATE_DB_SIZE_MB", &v)?;
        }
        if let Some(v) = lookup("CHAIN_REVERSIBLE_BLOCKS_DB_SIZE_MB") {
            options.reversible_blocks_db_size_mb =
                parse_size("CHAIN_REVERSIBLE_BLOCKS_DB_SIZE_MB", &v)?;
        }

        let flag = |key: &str| lookup(key).is_some_and(|v| v == "1" || v.eq_ignore_ascii_case("true"));
        options.delete_all_blocks = flag("CHAIN_DELETE_ALL_BLOCKS");
        options.hard_replay_blockchain = flag("CHAIN_HARD_REPLAY");
        options.replay_blockchain = flag("CHAIN_REPLAY");
        options.fix_reversible_blocks = flag("CHAIN_FIX_REVERSIBLE_BLOCKS");
        options.force_all_checks = flag("CHAIN_FORCE_ALL_CHECKS");
        options.contracts_console = flag("CHAIN_CONTRACTS_CONSOLE");
        options.read_only = flag("CHAIN_READ_ONLY");
        options.enforce_checkpoints = flag("CHAIN_ENFORCE_CHECKPOINTS");

        Ok(options)
    }

    /// The pre-start maintenance action, first match wins.
    #[must_use]
    pub fn maintenance(&self) -> Option<MaintenanceAction> {
        if self.delete_all_blocks {
            Some(MaintenanceAction::DeleteAll)
        } else if self.hard_replay_blockchain {
            Some(MaintenanceAction::HardReplay {
                fix_reversible: self.fix_reversible_blocks,
            })
        } else if self.replay_blockchain {
            Some(MaintenanceAction::Replay {
                fix_reversible: self.fix_reversible_blocks,
            })
        } else if self.fix_reversible_blocks {
            Some(MaintenanceAction::FixReversible)
        } else {
            None
        }
    }
}

fn parse_size(key: &str, value: &str) -> Result<u64, ChainError> {
    value
        .trim()
        .parse()
        .map_err(|e| ChainError::Config(format!("{key}='{value}': {e}")))
}

/// Resolved configuration handed to the ledger core.
#[derive(Debug, Clone, PartialEq)]
pub struct ChainConfig {
    pub blocks_dir: PathBuf,
    /// `<blocks_dir>/reversible`
    pub reversible_dir: PathBuf,
    /// `<data_dir>/state`
    pub state_dir: PathBuf,
    pub token_db_dir: PathBuf,
    pub genesis_json: PathBuf,
    pub genesis: GenesisState,
    /// State database budget in bytes.
    pub state_size: u64,
    /// Reversible store budget in bytes.
    pub reversible_cache_size: u64,
    pub read_only: bool,
    pub force_all_checks: bool,
    pub contracts_console: bool,
}

impl ChainConfig {
    /// Resolve every path against `dirs` and convert sizes to bytes.
    ///
    /// The genesis descriptor is left at its default; the caller loads it.
    pub fn resolve(options: &ChainOptions, dirs: &NodeDirs) -> Result<Self, ChainError> {
        let data_dir = absolute(&dirs.data_dir)?;
        let config_dir = absolute(&dirs.config_dir)?;

        let blocks_dir = resolve_against(&data_dir, &options.blocks_dir);
        Ok(Self {
            reversible_dir: blocks_dir.join(REVERSIBLE_BLOCKS_DIR_NAME),
            blocks_dir,
            state_dir: data_dir.join(DEFAULT_STATE_DIR_NAME),
            token_db_dir: resolve_against(&data_dir, &options.token_db_dir),
            genesis_json: resolve_against(&config_dir, &options.genesis_json),
            genesis: GenesisState::default(),
            state_size: options.state_db_size_mb.saturating_mul(MIB),
            reversible_cache_size: options.reversible_blocks_db_size_mb.saturating_mul(MIB),
            read_only: options.read_only,
            force_all_checks: options.force_all_checks,
            contracts_console: options.contracts_console,
        })
    }
}

fn absolute(path: &Path) -> Result<PathBuf, ChainError> {
    std::path::absolute(path)
        .map_err(|e| ChainError::Config(format!("cannot resolve {}: {e}", path.display())))
}

fn resolve_against(base: &Path, path: &Path) -> PathBuf {
    if path.is_relative() {
        base.join(path)
    } else {
        path.to_path_buf()
    }
}
