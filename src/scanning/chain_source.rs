//! Interfaces to the collaborators the wallet depends on
//!
//! The node supplies blocks and mempool contents, rebuilds its own indexes on
//! request and accepts transactions for relay. A keystore answers ownership
//! questions. None of these are implemented by the wallet itself; see
//! [`super::mock_chain::MockChain`] and [`super::keyring::SimpleKeyring`] for
//! the in-process reference implementations.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::{
    data_structures::{
        chain::{Block, ChainTransaction, TxOutput},
        types::Address,
    },
    errors::WalletResult,
};

/// What a node reindex rebuilds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReindexScope {
    /// Block index and everything derived from it
    BlockIndex,
    /// Only the UTXO and coin-commitment set; the block index is reused
    Chainstate,
}

/// Read-only view of the active chain and mempool
#[async_trait]
pub trait ChainSource: Send + Sync {
    async fn tip_height(&self) -> WalletResult<u64>;

    /// Block at `height` on the active chain, `None` above the tip
    async fn block_at(&self, height: u64) -> WalletResult<Option<Block>>;

    /// Mempool transactions in acceptance order
    async fn mempool(&self) -> WalletResult<Vec<ChainTransaction>>;
}

#[async_trait]
pub trait ChainMaintenance: Send + Sync {
    async fn reindex(&self, scope: ReindexScope) -> WalletResult<()>;
}

#[async_trait]
pub trait TransactionBroadcaster: Send + Sync {
    /// Validate and accept a transaction into the mempool
    async fn submit(&self, transaction: ChainTransaction) -> WalletResult<()>;
}

/// Everything the wallet needs from a node
pub trait ChainBackend: ChainSource + ChainMaintenance + TransactionBroadcaster {}

impl<T: ChainSource + ChainMaintenance + TransactionBroadcaster> ChainBackend for T {}

/// Key-ownership oracle
pub trait KeyOwnership: Send + Sync {
    fn owns_address(&self, address: &Address) -> bool;

    /// Addresses tracked without spending keys
    fn is_watch_only(&self, _address: &Address) -> bool {
        false
    }

    /// Address for incoming payments and coin-spend proceeds
    fn receive_address(&self) -> Address;

    /// Address for change outputs
    fn change_address(&self) -> Address;

    fn owns(&self, output: &TxOutput) -> bool {
        match output {
            TxOutput::Payment { address, .. } => self.owns_address(address),
            // Coin ownership is decided by the ledger's commitment index
            TxOutput::Mint { .. } => false,
        }
    }
}
