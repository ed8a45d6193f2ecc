//! Storage abstraction layer for wallet state
//!
//! The `WalletStorage` trait lets the wallet persist its coin secrets and
//! derived caches to different backends. SQLite is provided behind the
//! `storage` feature; the in-memory backend is always available.

pub mod memory;
pub mod owned_output;
#[cfg(feature = "storage")]
pub mod performance_optimizations;
#[cfg(feature = "storage")]
pub mod sqlite;
pub mod storage_trait;
pub mod transaction_store;

pub use memory::MemoryStorage;
pub use owned_output::*;
#[cfg(feature = "storage")]
pub use performance_optimizations::*;
#[cfg(feature = "storage")]
pub use sqlite::*;
pub use storage_trait::*;
pub use transaction_store::*;
