//! Core data structures shared across the wallet

pub mod chain;
pub mod coin_records;
pub mod denomination;
pub mod types;
pub mod wallet_transaction;

pub use chain::{Block, ChainTransaction, OutPoint, TxInput, TxOutput};
pub use coin_records::{MintRecord, SpendRecord};
pub use denomination::{CoinEpoch, Denomination, EpochSchedule};
pub use types::{
    format_amount, Address, Amount, BlockHash, Commitment, Randomness, SerialNumber, TxId, COIN,
};
pub use wallet_transaction::{TxCategory, WalletTxRecord};
