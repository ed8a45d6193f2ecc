//! Scan results and progress reporting

use std::time::Duration;

use serde::Serialize;

use crate::errors::WalletError;

/// Snapshot of a running scan
#[derive(Debug, Clone, Serialize)]
pub struct ScanProgress {
    pub current_height: u64,
    pub target_height: u64,
    pub records_found: u64,
    pub elapsed: Duration,
}

/// Counters collected over one scan pass
#[derive(Debug, Clone, Default, Serialize)]
pub struct ScanReport {
    pub from_height: Option<u64>,
    pub to_height: Option<u64>,
    pub blocks_scanned: u64,
    pub mempool_transactions: u64,
    /// Wallet-relevant transactions upserted into the store
    pub records_found: u64,
    pub mints_reconfirmed: u64,
    pub spends_linked: u64,
    /// Serials revealed by spends that belong to other wallets
    pub foreign_serials: u64,
    /// Mint outputs skipped for an unknown epoch or denomination
    pub rejected_mints: u64,
    /// Spends that tried to relink an already linked serial
    #[serde(skip)]
    pub conflicts: Vec<WalletError>,
    pub duration: Duration,
}

impl ScanReport {
    pub fn has_conflicts(&self) -> bool {
        !self.conflicts.is_empty()
    }

    /// Fold a later pass into this one
    pub fn merge(&mut self, other: ScanReport) {
        self.from_height = match (self.from_height, other.from_height) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        };
        self.to_height = self.to_height.max(other.to_height);
        self.blocks_scanned += other.blocks_scanned;
        self.mempool_transactions += other.mempool_transactions;
        self.records_found += other.records_found;
        self.mints_reconfirmed += other.mints_reconfirmed;
        self.spends_linked += other.spends_linked;
        self.foreign_serials += other.foreign_serials;
        self.rejected_mints += other.rejected_mints;
        self.conflicts.extend(other.conflicts);
        self.duration += other.duration;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_merge_accumulates() {
        let mut a = ScanReport {
            from_height: Some(0),
            to_height: Some(10),
            blocks_scanned: 11,
            records_found: 2,
            ..Default::default()
        };
        let b = ScanReport {
            mempool_transactions: 3,
            records_found: 1,
            rejected_mints: 1,
            ..Default::default()
        };
        a.merge(b);
        assert_eq!(a.from_height, Some(0));
        assert_eq!(a.to_height, Some(10));
        assert_eq!(a.records_found, 3);
        assert_eq!(a.rejected_mints, 1);
        assert!(!a.has_conflicts());
    }
}
