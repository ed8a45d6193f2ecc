//! Startup recovery
//!
//! The controller decides how much of the persisted wallet state to trust,
//! rebuilds the rest from the chain, commits the result and only then swaps
//! it into the published state. It runs exactly once per wallet instance.

pub mod consistency;
pub mod handle;
pub mod mode;

use std::{
    sync::Arc,
    time::{Duration, Instant},
};

use serde::Serialize;
use tokio::sync::OwnedMutexGuard;
use tracing::{error, info, warn};

use crate::{
    errors::{WalletError, WalletResult},
    scanning::{ChainBackend, ChainScanner, ScanProgressHandle, ScanReport},
    storage::{UpsertPolicy, WalletStorage},
    wallet::state::{SharedCore, WalletCore},
};

pub use consistency::verify_history_stable;
pub use handle::RecoveryHandle;
pub use mode::RecoveryMode;

/// Per-instance recovery state, passed in rather than kept globally
#[derive(Debug, Clone, Default)]
pub struct RecoveryContext {
    pub mode: RecoveryMode,
    pub progress: ScanProgressHandle,
}

impl RecoveryContext {
    pub fn new(mode: RecoveryMode) -> Self {
        Self {
            mode,
            progress: ScanProgressHandle::new(),
        }
    }
}

/// What one recovery pass did
#[derive(Debug, Clone, Default, Serialize)]
pub struct RecoveryReport {
    pub mode: RecoveryMode,
    pub tip_height: u64,
    pub scan: ScanReport,
    /// Records dropped from the transaction store before scanning
    pub removed_transactions: usize,
    /// Unconfirmed records put back verbatim by a light zap
    pub restored_unconfirmed: usize,
    pub duration: Duration,
}

impl RecoveryReport {
    /// Conflicting links found while rebuilding are reported, never resolved
    pub fn ensure_consistent(&self) -> WalletResult<()> {
        match self.scan.conflicts.first() {
            Some(conflict) => Err(WalletError::ConsistencyFailure(format!(
                "{} conflicting coin link(s) after {} recovery, first: {}",
                self.scan.conflicts.len(),
                self.mode,
                conflict
            ))),
            None => Ok(()),
        }
    }
}

pub struct RecoveryController {
    context: RecoveryContext,
    chain: Arc<dyn ChainBackend>,
    storage: Arc<dyn WalletStorage>,
    scanner: Arc<ChainScanner>,
    shared: Arc<SharedCore>,
}

impl RecoveryController {
    pub fn new(
        context: RecoveryContext,
        chain: Arc<dyn ChainBackend>,
        storage: Arc<dyn WalletStorage>,
        scanner: Arc<ChainScanner>,
        shared: Arc<SharedCore>,
    ) -> Self {
        Self {
            context,
            chain,
            storage,
            scanner,
            shared,
        }
    }

    pub fn mode(&self) -> RecoveryMode {
        self.context.mode
    }

    pub fn progress(&self) -> &ScanProgressHandle {
        &self.context.progress
    }

    /// Run recovery on the current task
    pub async fn recover(&self) -> WalletResult<RecoveryReport> {
        let gate = self.shared.lock_writer().await;
        self.begin_progress().await?;
        self.run(gate).await
    }

    /// Run recovery on a background task
    ///
    /// The writer gate is taken and progress marked active before this
    /// returns, so no live update can slip in ahead of the scan and pollers
    /// never observe a finished-looking height early.
    pub async fn spawn(self) -> WalletResult<RecoveryHandle> {
        let gate = self.shared.lock_writer().await;
        self.begin_progress().await?;
        let mode = self.context.mode;
        let progress = self.context.progress.clone();
        let task = tokio::spawn(async move { self.run(gate).await });
        Ok(RecoveryHandle::new(mode, progress, task))
    }

    async fn begin_progress(&self) -> WalletResult<()> {
        let scanned = self.shared.read().await.scanned_height;
        let (start, target) = if self.context.mode.scans_from_genesis() {
            (0, self.chain.tip_height().await?)
        } else {
            let height = scanned.unwrap_or(0);
            (height, height)
        };
        self.context.progress.begin(start, target);
        Ok(())
    }

    async fn run(&self, _gate: OwnedMutexGuard<()>) -> WalletResult<RecoveryReport> {
        let result = self.rebuild().await;
        // Published or not, the scan is over; pollers fall back to the
        // published height.
        self.context.progress.finish();
        match &result {
            Ok(report) => info!(
                "Recovery ({}) complete at height {} in {:?}: {} records, {} conflicts",
                report.mode,
                report.tip_height,
                report.duration,
                report.scan.records_found,
                report.scan.conflicts.len()
            ),
            Err(e) => error!("Recovery ({}) failed: {}", self.context.mode, e),
        }
        result
    }

    async fn rebuild(&self) -> WalletResult<RecoveryReport> {
        let started = Instant::now();
        let mode = self.context.mode;
        let progress = &self.context.progress;
        info!("Starting wallet recovery in {} mode", mode);

        if let Some(scope) = mode.reindex_scope() {
            info!("Rebuilding node {:?} before rescanning", scope);
            self.chain.reindex(scope).await?;
        }

        let mut core: WalletCore = self.shared.snapshot().await;
        let mut report = RecoveryReport {
            mode,
            ..Default::default()
        };

        match mode {
            RecoveryMode::Normal => {
                report.tip_height = core.tip_height();
                report.duration = started.elapsed();
                return Ok(report);
            }
            RecoveryMode::ZapLight => {
                let held = core.transactions.remove_unconfirmed();
                report.removed_transactions = held.len();
                info!("Removed {} unconfirmed transactions", held.len());
                report.scan = self
                    .scanner
                    .scan_mempool(self.chain.as_ref(), &mut core, UpsertPolicy::Overwrite)
                    .await?;
                report.restored_unconfirmed = held.len();
                for record in held {
                    core.transactions.upsert_with(record, UpsertPolicy::Overwrite);
                }
                report.tip_height = core.tip_height();
            }
            RecoveryMode::ZapFull
            | RecoveryMode::Rescan
            | RecoveryMode::ReindexFull
            | RecoveryMode::ReindexChainstateOnly => {
                if mode.clears_transactions() {
                    report.removed_transactions = core.transactions.remove_all();
                    info!("Removed all {} wallet transactions", report.removed_transactions);
                }
                core.reset_chain_links();

                let tip = self.chain.tip_height().await?;
                progress.set_target(tip);
                report.tip_height = tip;
                report.scan = self
                    .scanner
                    .scan_range(
                        self.chain.as_ref(),
                        &mut core,
                        0..=tip,
                        UpsertPolicy::Overwrite,
                        Some(progress),
                    )
                    .await?;
                // Always scanned: pending spends lost their links above
                let mempool = self
                    .scanner
                    .scan_mempool(self.chain.as_ref(), &mut core, UpsertPolicy::Overwrite)
                    .await?;
                report.scan.merge(mempool);
                core.scanned_height = Some(tip);
            }
        }

        for conflict in &report.scan.conflicts {
            warn!("Unresolved after recovery: {}", conflict);
        }

        core.transactions.refresh_confirmations(core.tip_height());
        self.storage.commit(core.full_batch()).await?;
        self.shared.publish(core).await;

        report.duration = started.elapsed();
        Ok(report)
    }
}
