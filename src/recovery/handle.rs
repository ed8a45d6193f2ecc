//! Handle to a recovery running on a background task

use std::time::{Duration, Instant};

use tokio::task::JoinHandle;

use crate::{
    errors::{WalletError, WalletResult},
    recovery::{mode::RecoveryMode, RecoveryReport},
    scanning::{ScanProgress, ScanProgressHandle},
};

#[derive(Debug)]
pub struct RecoveryHandle {
    mode: RecoveryMode,
    progress: ScanProgressHandle,
    started: Instant,
    task: JoinHandle<WalletResult<RecoveryReport>>,
}

impl RecoveryHandle {
    pub(crate) fn new(
        mode: RecoveryMode,
        progress: ScanProgressHandle,
        task: JoinHandle<WalletResult<RecoveryReport>>,
    ) -> Self {
        Self {
            mode,
            progress,
            started: Instant::now(),
            task,
        }
    }

    pub fn mode(&self) -> RecoveryMode {
        self.mode
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    pub fn progress_handle(&self) -> &ScanProgressHandle {
        &self.progress
    }

    pub fn progress(&self) -> ScanProgress {
        ScanProgress {
            current_height: self.progress.current_height(),
            target_height: self.progress.target_height(),
            records_found: self.progress.records_found(),
            elapsed: self.started.elapsed(),
        }
    }

    /// Wait for the recovery to finish, at most `timeout`
    ///
    /// On timeout the task keeps running; there is no cancellation path.
    pub async fn wait(self, timeout: Duration) -> WalletResult<RecoveryReport> {
        let progress = self.progress.clone();
        match tokio::time::timeout(timeout, self.task).await {
            Ok(Ok(result)) => result,
            Ok(Err(join_error)) => Err(WalletError::ScanningError(format!(
                "Recovery task failed: {join_error}"
            ))),
            Err(_) => Err(WalletError::RecoveryTimeout {
                waited_secs: timeout.as_secs(),
                height: Some(progress.current_height()),
                target: progress.target_height(),
            }),
        }
    }
}
