//! In-process reference node
//!
//! Keeps a raw block log, a block index over it, a chainstate (transparent
//! UTXOs, revealed serials, published commitments) and a mempool. Blocks are
//! mined on demand with [`MockChain::generate`]. Both indexes can be rebuilt
//! from the raw log, which is what the reindex recovery modes exercise.

use std::{
    collections::{HashMap, HashSet},
    path::Path,
    sync::{Arc, Mutex, MutexGuard},
};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::{
    data_structures::{
        chain::{Block, ChainTransaction, OutPoint, TxInput, TxOutput},
        denomination::{CoinEpoch, EpochSchedule},
        types::{Address, Amount, BlockHash, Commitment, SerialNumber, COIN},
    },
    errors::{WalletError, WalletResult},
    scanning::chain_source::{ChainMaintenance, ChainSource, ReindexScope, TransactionBroadcaster},
};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MockChainConfig {
    pub block_reward: Amount,
    pub genesis_time: u64,
    /// Seconds between consecutive block timestamps
    pub block_interval: u64,
    pub epoch_schedule: EpochSchedule,
}

impl Default for MockChainConfig {
    fn default() -> Self {
        Self {
            block_reward: 50 * COIN,
            genesis_time: 1_600_000_000,
            block_interval: 150,
            epoch_schedule: EpochSchedule::regtest(),
        }
    }
}

/// UTXO set plus the privacy-coin sets derived from the active chain
#[derive(Debug, Clone, Default)]
struct Chainstate {
    utxos: HashMap<OutPoint, (Address, Amount)>,
    serials: HashSet<SerialNumber>,
    commitments: HashSet<Commitment>,
}

impl Chainstate {
    /// Validate `tx` for inclusion at `height` and apply it; returns the fee.
    /// Leaves the state untouched when the transaction is rejected.
    fn apply(
        &mut self,
        tx: &ChainTransaction,
        height: u64,
        schedule: &EpochSchedule,
    ) -> WalletResult<Amount> {
        let mut staged = self.clone();
        let fee = staged.apply_in_place(tx, height, schedule)?;
        *self = staged;
        Ok(fee)
    }

    fn apply_in_place(
        &mut self,
        tx: &ChainTransaction,
        height: u64,
        schedule: &EpochSchedule,
    ) -> WalletResult<Amount> {
        let invalid = |reason: String| {
            WalletError::InvalidArgument(format!("Transaction {} rejected: {reason}", tx.txid))
        };
        if !tx.has_valid_txid() {
            return Err(invalid("txid does not match body".to_string()));
        }
        if tx.coinbase && !tx.inputs.is_empty() {
            return Err(invalid("coinbase with inputs".to_string()));
        }
        if !tx.coinbase && tx.inputs.is_empty() {
            return Err(invalid("no inputs".to_string()));
        }

        let mut input_total: Amount = 0;
        for input in &tx.inputs {
            match input {
                TxInput::Transparent { prevout } => {
                    let (_, value) = self.utxos.remove(prevout).ok_or_else(|| {
                        invalid(format!("input {}:{} missing or spent", prevout.txid, prevout.index))
                    })?;
                    input_total += value;
                }
                TxInput::CoinSpend {
                    serial,
                    epoch,
                    value,
                } => {
                    CoinEpoch::try_from(*epoch)
                        .and_then(|e| e.denomination_for(*value))
                        .map_err(|e| invalid(e.to_string()))?;
                    if !self.serials.insert(*serial) {
                        return Err(invalid(format!("serial {serial} already spent")));
                    }
                    input_total += value;
                }
            }
        }

        let active_epoch = schedule.active_epoch(height);
        for (index, output) in tx.outputs.iter().enumerate() {
            match output {
                TxOutput::Payment { address, value } => {
                    if *value <= 0 {
                        return Err(invalid(format!("non-positive output {index}")));
                    }
                    self.utxos
                        .insert(tx.outpoint(index as u32), (address.clone(), *value));
                }
                TxOutput::Mint {
                    commitment,
                    epoch,
                    value,
                } => {
                    if *epoch != active_epoch.id() {
                        return Err(invalid(format!(
                            "mint for epoch {epoch} at height {height} where {active_epoch} is active"
                        )));
                    }
                    active_epoch
                        .denomination_for(*value)
                        .map_err(|e| invalid(e.to_string()))?;
                    if !self.commitments.insert(*commitment) {
                        return Err(invalid(format!("duplicate commitment {commitment}")));
                    }
                }
            }
        }

        if tx.coinbase {
            return Ok(0);
        }
        let fee = input_total - tx.output_total();
        if fee < 0 {
            return Err(invalid(format!(
                "outputs {} exceed inputs {input_total}",
                tx.output_total()
            )));
        }
        Ok(fee)
    }
}

#[derive(Debug, Default)]
struct ChainState {
    config: MockChainConfig,
    /// Raw block log in arrival order
    blocks: Vec<Block>,
    index: HashMap<BlockHash, usize>,
    /// Active chain: height -> position in `blocks`
    active: Vec<usize>,
    chainstate: Chainstate,
    mempool: Vec<ChainTransaction>,
    nonce: u64,
}

impl ChainState {
    fn tip_height(&self) -> u64 {
        self.active.len().saturating_sub(1) as u64
    }

    fn tip_hash(&self) -> BlockHash {
        self.active
            .last()
            .map(|&i| self.blocks[i].hash)
            .unwrap_or_default()
    }

    fn block_time(&self, height: u64) -> u64 {
        self.config.genesis_time + height * self.config.block_interval
    }

    /// Chainstate with every mempool transaction applied on top
    fn mempool_view(&self) -> WalletResult<Chainstate> {
        let mut view = self.chainstate.clone();
        let next = self.tip_height() + 1;
        for tx in &self.mempool {
            view.apply(tx, next, &self.config.epoch_schedule)?;
        }
        Ok(view)
    }

    fn connect(&mut self, block: Block) -> WalletResult<()> {
        let mut state = self.chainstate.clone();
        for tx in &block.transactions {
            state.apply(tx, block.height, &self.config.epoch_schedule)?;
        }
        self.chainstate = state;
        self.index.insert(block.hash, self.blocks.len());
        self.active.push(self.blocks.len());
        self.blocks.push(block);
        Ok(())
    }

    fn mine(&mut self, address: &Address) -> WalletResult<BlockHash> {
        let height = self.tip_height() + 1;
        let mut view = self.chainstate.clone();
        let mut included = Vec::new();
        let mut fees: Amount = 0;
        for tx in std::mem::take(&mut self.mempool) {
            match view.apply(&tx, height, &self.config.epoch_schedule) {
                Ok(fee) => {
                    fees += fee;
                    included.push(tx);
                }
                Err(e) => warn!("Dropping mempool transaction {}: {}", tx.txid, e),
            }
        }

        self.nonce += 1;
        let coinbase = ChainTransaction::new(
            true,
            vec![],
            vec![TxOutput::Payment {
                address: address.clone(),
                value: self.config.block_reward + fees,
            }],
            height << 32 | (self.nonce & 0xffff_ffff),
        );
        let mut transactions = vec![coinbase];
        transactions.extend(included);
        let block = Block::new(height, self.tip_hash(), self.block_time(height), transactions);
        let hash = block.hash;
        self.connect(block)?;
        debug!("Mined block {} ({})", height, hash);
        Ok(hash)
    }

    fn rebuild_index(&mut self) -> WalletResult<()> {
        let mut index = HashMap::new();
        let mut children: HashMap<BlockHash, usize> = HashMap::new();
        for (position, block) in self.blocks.iter().enumerate() {
            let expected =
                Block::compute_hash(block.height, &block.prev_hash, block.time, &block.transactions);
            if expected != block.hash {
                return Err(WalletError::ScanningError(format!(
                    "Block {} at height {} fails its hash check",
                    block.hash, block.height
                )));
            }
            index.insert(block.hash, position);
            if block.height > 0 {
                children.insert(block.prev_hash, position);
            }
        }

        let genesis = self
            .blocks
            .iter()
            .position(|b| b.height == 0)
            .ok_or_else(|| WalletError::ScanningError("Block log has no genesis".to_string()))?;
        let mut active = vec![genesis];
        let mut cursor = self.blocks[genesis].hash;
        while let Some(&next) = children.get(&cursor) {
            active.push(next);
            cursor = self.blocks[next].hash;
        }
        self.index = index;
        self.active = active;
        Ok(())
    }

    fn rebuild_chainstate(&mut self) -> WalletResult<()> {
        let mut state = Chainstate::default();
        for &position in &self.active {
            let block = &self.blocks[position];
            for tx in &block.transactions {
                state.apply(tx, block.height, &self.config.epoch_schedule)?;
            }
        }
        self.chainstate = state;

        // Re-accept the mempool against the rebuilt chainstate
        let pending = std::mem::take(&mut self.mempool);
        let mut view = self.chainstate.clone();
        let next = self.tip_height() + 1;
        for tx in pending {
            match view.apply(&tx, next, &self.config.epoch_schedule) {
                Ok(_) => self.mempool.push(tx),
                Err(e) => warn!("Mempool transaction {} no longer valid: {}", tx.txid, e),
            }
        }
        Ok(())
    }
}

#[derive(Serialize, Deserialize)]
struct ChainFile {
    config: MockChainConfig,
    blocks: Vec<Block>,
    mempool: Vec<ChainTransaction>,
}

/// Shared handle to an in-memory chain; clones see the same chain
#[derive(Debug, Clone)]
pub struct MockChain {
    state: Arc<Mutex<ChainState>>,
}

impl Default for MockChain {
    fn default() -> Self {
        Self::new(MockChainConfig::default())
    }
}

impl MockChain {
    /// A chain holding only its genesis block
    pub fn new(config: MockChainConfig) -> Self {
        let genesis = Block::new(0, BlockHash::default(), config.genesis_time, Vec::new());
        let mut state = ChainState {
            config,
            ..Default::default()
        };
        state.index.insert(genesis.hash, 0);
        state.active.push(0);
        state.blocks.push(genesis);
        Self {
            state: Arc::new(Mutex::new(state)),
        }
    }

    fn state(&self) -> WalletResult<MutexGuard<'_, ChainState>> {
        self.state
            .lock()
            .map_err(|_| WalletError::ScanningError("Chain state lock poisoned".to_string()))
    }

    /// Mine `count` blocks paying their coinbase to `address`
    pub fn generate(&self, count: u64, address: &Address) -> WalletResult<Vec<BlockHash>> {
        let mut state = self.state()?;
        (0..count).map(|_| state.mine(address)).collect()
    }

    pub fn height(&self) -> WalletResult<u64> {
        Ok(self.state()?.tip_height())
    }

    pub fn mempool_len(&self) -> WalletResult<usize> {
        Ok(self.state()?.mempool.len())
    }

    pub fn config(&self) -> WalletResult<MockChainConfig> {
        Ok(self.state()?.config.clone())
    }

    /// Persist the raw block log and mempool as JSON
    pub fn save(&self, path: impl AsRef<Path>) -> WalletResult<()> {
        let state = self.state()?;
        let file = ChainFile {
            config: state.config.clone(),
            blocks: state.blocks.clone(),
            mempool: state.mempool.clone(),
        };
        let json = serde_json::to_vec(&file)?;
        std::fs::write(path.as_ref(), json).map_err(|e| {
            WalletError::StorageError(format!(
                "Failed to write chain file {}: {e}",
                path.as_ref().display()
            ))
        })
    }

    /// Load a chain written by [`MockChain::save`], rebuilding both indexes
    pub fn load(path: impl AsRef<Path>) -> WalletResult<Self> {
        let bytes = std::fs::read(path.as_ref()).map_err(|e| {
            WalletError::StorageError(format!(
                "Failed to read chain file {}: {e}",
                path.as_ref().display()
            ))
        })?;
        let file: ChainFile = serde_json::from_slice(&bytes)?;
        let mut state = ChainState {
            config: file.config,
            blocks: file.blocks,
            mempool: file.mempool,
            ..Default::default()
        };
        state.rebuild_index()?;
        state.rebuild_chainstate()?;
        Ok(Self {
            state: Arc::new(Mutex::new(state)),
        })
    }
}

#[async_trait]
impl ChainSource for MockChain {
    async fn tip_height(&self) -> WalletResult<u64> {
        self.height()
    }

    async fn block_at(&self, height: u64) -> WalletResult<Option<Block>> {
        let state = self.state()?;
        Ok(usize::try_from(height)
            .ok()
            .and_then(|h| state.active.get(h))
            .map(|&position| state.blocks[position].clone()))
    }

    async fn mempool(&self) -> WalletResult<Vec<ChainTransaction>> {
        Ok(self.state()?.mempool.clone())
    }
}

#[async_trait]
impl ChainMaintenance for MockChain {
    async fn reindex(&self, scope: ReindexScope) -> WalletResult<()> {
        let mut state = self.state()?;
        info!("Reindexing chain ({:?})", scope);
        if scope == ReindexScope::BlockIndex {
            state.rebuild_index()?;
        }
        state.rebuild_chainstate()?;
        info!("Reindex complete at height {}", state.tip_height());
        Ok(())
    }
}

#[async_trait]
impl TransactionBroadcaster for MockChain {
    async fn submit(&self, transaction: ChainTransaction) -> WalletResult<()> {
        let mut state = self.state()?;
        if transaction.coinbase {
            return Err(WalletError::InvalidArgument(
                "Coinbase transactions cannot be relayed".to_string(),
            ));
        }
        if state.mempool.iter().any(|tx| tx.txid == transaction.txid) {
            return Ok(());
        }
        let next = state.tip_height() + 1;
        let mut view = state.mempool_view()?;
        view.apply(&transaction, next, &state.config.epoch_schedule)?;
        debug!("Accepted {} into mempool", transaction.txid);
        state.mempool.push(transaction);
        Ok(())
    }
}
