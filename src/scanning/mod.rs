//! Chain scanning
//!
//! Collaborator interfaces (node, keystore), the scanner that turns chain
//! data into wallet records, and the in-process reference chain and keyring
//! used by tests and the `wallet_recovery` binary.

pub mod chain_scanner;
pub mod chain_source;
pub mod config;
pub mod keyring;
pub mod mock_chain;
pub mod progress;
pub mod scan_results;

pub use chain_scanner::{unix_now, BlockLocation, ChainScanner, TxCandidates};
pub use chain_source::{
    ChainBackend, ChainMaintenance, ChainSource, KeyOwnership, ReindexScope,
    TransactionBroadcaster,
};
pub use config::ScanConfig;
pub use keyring::SimpleKeyring;
pub use mock_chain::{MockChain, MockChainConfig};
pub use progress::ScanProgressHandle;
pub use scan_results::{ScanProgress, ScanReport};
