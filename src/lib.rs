//! Wallet-side accounting for mint/spend privacy coins
//!
//! This crate keeps a wallet's coin secrets, the linkage between minted coins
//! and the spends that reveal them, and a cache of wallet-relevant
//! transactions, and rebuilds everything derivable from chain data at startup
//! according to a recovery mode.
//!
//! ## Features
//!
//! - `storage` (default): SQLite persistence via `rusqlite`/`tokio-rusqlite`
//! - `cli`: the `wallet_recovery` binary
//!
//! Without the `storage` feature only the in-memory backend is available.

pub mod data_structures;
pub mod errors;
pub mod ledger;
pub mod recovery;
pub mod scanning;
pub mod simulation;
pub mod storage;
pub mod wallet;

pub use data_structures::*;
pub use errors::*;
pub use ledger::{CoinLedger, Conversion, MintMatch};
pub use recovery::{
    verify_history_stable, RecoveryContext, RecoveryController, RecoveryHandle, RecoveryMode,
    RecoveryReport,
};
pub use scanning::*;
pub use storage::*;
pub use wallet::*;
