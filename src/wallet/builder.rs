//! Wallet builder providing a fluent API for opening a wallet
//!
//! The builder collects the collaborators a wallet needs (storage, chain
//! backend, key-ownership oracle), loads the persisted state and runs the
//! startup recovery selected by [`RecoveryMode`], either inline or on a
//! background task.
//!
//! # Examples
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use mintspend_wallet::{
//!     recovery::RecoveryMode,
//!     scanning::{MockChain, SimpleKeyring},
//!     storage::MemoryStorage,
//!     wallet::WalletBuilder,
//! };
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let (wallet, report) = WalletBuilder::new()
//!     .with_storage(Arc::new(MemoryStorage::new()))
//!     .with_chain(Arc::new(MockChain::default()))
//!     .with_keys(Arc::new(SimpleKeyring::from_label("demo")))
//!     .with_recovery_mode(RecoveryMode::Rescan)
//!     .open()
//!     .await?;
//! assert_eq!(wallet.get_height().await, report.tip_height);
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;

use tracing::{error, info};

use crate::{
    errors::{WalletError, WalletResult},
    recovery::{RecoveryContext, RecoveryController, RecoveryHandle, RecoveryMode, RecoveryReport},
    scanning::{ChainBackend, ChainScanner, KeyOwnership},
    storage::WalletStorage,
    wallet::{
        params::WalletParams,
        state::{SharedCore, WalletCore},
        Wallet,
    },
};

#[derive(Default)]
pub struct WalletBuilder {
    storage: Option<Arc<dyn WalletStorage>>,
    chain: Option<Arc<dyn ChainBackend>>,
    keys: Option<Arc<dyn KeyOwnership>>,
    params: WalletParams,
    mode: RecoveryMode,
}

impl WalletBuilder {
    /// Regtest parameters, `Normal` recovery, no collaborators yet
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_storage(mut self, storage: Arc<dyn WalletStorage>) -> Self {
        self.storage = Some(storage);
        self
    }

    pub fn with_chain(mut self, chain: Arc<dyn ChainBackend>) -> Self {
        self.chain = Some(chain);
        self
    }

    pub fn with_keys(mut self, keys: Arc<dyn KeyOwnership>) -> Self {
        self.keys = Some(keys);
        self
    }

    pub fn with_params(mut self, params: WalletParams) -> Self {
        self.params = params;
        self
    }

    pub fn with_recovery_mode(mut self, mode: RecoveryMode) -> Self {
        self.mode = mode;
        self
    }

    /// Open the wallet and run recovery before returning
    pub async fn open(self) -> WalletResult<(Wallet, RecoveryReport)> {
        let (wallet, controller) = self.prepare().await?;
        let report = controller.recover().await?;
        Ok((wallet, report))
    }

    /// Open the wallet and run recovery on a background task
    ///
    /// The wallet answers queries immediately; writes wait for recovery.
    pub async fn open_in_background(self) -> WalletResult<(Wallet, RecoveryHandle)> {
        let (wallet, controller) = self.prepare().await?;
        let handle = controller.spawn().await?;
        Ok((wallet, handle))
    }

    async fn prepare(self) -> WalletResult<(Wallet, RecoveryController)> {
        let storage = self.storage.ok_or_else(|| missing("storage backend (call with_storage)"))?;
        let chain = self.chain.ok_or_else(|| missing("chain backend (call with_chain)"))?;
        let keys = self.keys.ok_or_else(|| missing("key ownership oracle (call with_keys)"))?;
        self.params.validate()?;

        storage.initialize().await?;
        let state = storage.load_state().await?;
        let core = WalletCore::from_stored(self.params.epoch_schedule, state).map_err(|e| {
            error!("Refusing to open wallet: {}", e);
            e
        })?;
        info!(
            "Loaded wallet: {} mints, {} transactions, scanned to {:?}",
            core.ledger.len(),
            core.transactions.len(),
            core.scanned_height
        );

        let shared = Arc::new(SharedCore::new(core));
        let scanner = Arc::new(ChainScanner::new(keys.clone(), self.params.scan.clone()));
        let context = RecoveryContext::new(self.mode);
        let controller = RecoveryController::new(
            context.clone(),
            chain.clone(),
            storage.clone(),
            scanner.clone(),
            shared.clone(),
        );
        let wallet = Wallet::new(storage, chain, keys, self.params, scanner, shared, context);
        Ok((wallet, controller))
    }
}

fn missing(what: &str) -> WalletError {
    WalletError::ConfigurationError(format!("Missing required parameter: {what}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        data_structures::types::TxId,
        scanning::{MockChain, SimpleKeyring},
        storage::{MemoryStorage, StorageBatch},
    };

    #[tokio::test]
    async fn test_missing_collaborator_is_a_configuration_error() {
        let result = WalletBuilder::new()
            .with_storage(Arc::new(MemoryStorage::new()))
            .open()
            .await;
        assert!(matches!(result, Err(WalletError::ConfigurationError(_))));
    }

    #[tokio::test]
    async fn test_invalid_params_are_rejected() {
        let mut params = WalletParams::regtest();
        params.mint_confirmations = 0;
        let result = WalletBuilder::new()
            .with_storage(Arc::new(MemoryStorage::new()))
            .with_chain(Arc::new(MockChain::default()))
            .with_keys(Arc::new(SimpleKeyring::from_label("b")))
            .with_params(params)
            .open()
            .await;
        assert!(matches!(result, Err(WalletError::ConfigurationError(_))));
    }

    #[tokio::test]
    async fn test_corrupted_secrets_halt_startup() -> Result<(), Box<dyn std::error::Error>> {
        let storage = MemoryStorage::new();
        let mut ledger = crate::ledger::CoinLedger::new(WalletParams::regtest().epoch_schedule);
        let mut mint = ledger.record_mint(
            crate::data_structures::denomination::Denomination::D1,
            120,
            TxId::new([1u8; 32]),
        )?;
        mint.randomness = crate::data_structures::types::Randomness::new([0u8; 32]);
        storage.commit(StorageBatch::new().with_mints([mint])).await?;

        let result = WalletBuilder::new()
            .with_storage(Arc::new(storage))
            .with_chain(Arc::new(MockChain::default()))
            .with_keys(Arc::new(SimpleKeyring::from_label("b")))
            .open()
            .await;
        assert!(matches!(result, Err(WalletError::SecretsCorrupted(_))));
        Ok(())
    }

    #[tokio::test]
    async fn test_background_open_reports_progress() -> Result<(), Box<dyn std::error::Error>> {
        let chain = MockChain::default();
        let keys = SimpleKeyring::from_label("b");
        chain.generate(30, &keys.receive_address())?;

        let (wallet, handle) = WalletBuilder::new()
            .with_storage(Arc::new(MemoryStorage::new()))
            .with_chain(Arc::new(chain))
            .with_keys(Arc::new(keys))
            .with_recovery_mode(RecoveryMode::Rescan)
            .open_in_background()
            .await?;
        assert_eq!(handle.mode(), RecoveryMode::Rescan);
        assert!(wallet.get_height().await < 30);

        handle.wait(std::time::Duration::from_secs(30)).await?;
        assert_eq!(wallet.get_height().await, 30);
        assert_eq!(wallet.wait_for_height(30, std::time::Duration::from_secs(1)).await?, 30);
        Ok(())
    }
}
