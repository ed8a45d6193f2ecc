//! Startup recovery modes

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::{errors::WalletError, scanning::chain_source::ReindexScope};

/// How much cached wallet state to distrust at startup
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "cli", derive(clap::ValueEnum))]
#[serde(rename_all = "kebab-case")]
pub enum RecoveryMode {
    /// Trust the persisted store and ledger
    #[default]
    Normal,
    /// Drop unconfirmed records, rescan the mempool, then restore them verbatim
    ZapLight,
    /// Drop every transaction record and rebuild from genesis
    ZapFull,
    /// Rescan from genesis over the existing block index
    Rescan,
    /// Rebuild the node's block index and chainstate, then rebuild from genesis
    #[cfg_attr(feature = "cli", value(name = "reindex"))]
    #[serde(rename = "reindex")]
    ReindexFull,
    /// Rebuild the node's chainstate only, then rebuild from genesis
    #[cfg_attr(feature = "cli", value(name = "reindex-chainstate"))]
    #[serde(rename = "reindex-chainstate")]
    ReindexChainstateOnly,
}

impl RecoveryMode {
    pub const ALL: [RecoveryMode; 6] = [
        RecoveryMode::Normal,
        RecoveryMode::ZapLight,
        RecoveryMode::ZapFull,
        RecoveryMode::Rescan,
        RecoveryMode::ReindexFull,
        RecoveryMode::ReindexChainstateOnly,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            RecoveryMode::Normal => "normal",
            RecoveryMode::ZapLight => "zap-light",
            RecoveryMode::ZapFull => "zap-full",
            RecoveryMode::Rescan => "rescan",
            RecoveryMode::ReindexFull => "reindex",
            RecoveryMode::ReindexChainstateOnly => "reindex-chainstate",
        }
    }

    /// Whether the mode scans the chain from genesis
    pub fn scans_from_genesis(self) -> bool {
        !matches!(self, RecoveryMode::Normal | RecoveryMode::ZapLight)
    }

    /// Whether the transaction store is emptied before scanning
    pub fn clears_transactions(self) -> bool {
        matches!(
            self,
            RecoveryMode::ZapFull | RecoveryMode::ReindexFull | RecoveryMode::ReindexChainstateOnly
        )
    }

    /// Node-side rebuild required before the wallet scans
    pub fn reindex_scope(self) -> Option<ReindexScope> {
        match self {
            RecoveryMode::ReindexFull => Some(ReindexScope::BlockIndex),
            RecoveryMode::ReindexChainstateOnly => Some(ReindexScope::Chainstate),
            _ => None,
        }
    }

    /// Whether the rebuilt history must match the old one exactly,
    /// `time_received` included
    pub fn preserves_timestamps(self) -> bool {
        matches!(self, RecoveryMode::Normal | RecoveryMode::ZapLight)
    }
}

impl fmt::Display for RecoveryMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RecoveryMode {
    type Err = WalletError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().trim_start_matches('-').to_ascii_lowercase();
        match normalized.as_str() {
            "" | "normal" | "none" => Ok(RecoveryMode::Normal),
            "zapwallettxes=1" | "zap-light" | "zaplight" => Ok(RecoveryMode::ZapLight),
            "zapwallettxes" | "zapwallettxes=2" | "zap-full" | "zapfull" => Ok(RecoveryMode::ZapFull),
            "rescan" => Ok(RecoveryMode::Rescan),
            "reindex" | "reindex-full" => Ok(RecoveryMode::ReindexFull),
            "reindex-chainstate" => Ok(RecoveryMode::ReindexChainstateOnly),
            other => Err(WalletError::ConfigurationError(format!(
                "Unknown recovery mode: {other}"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_flag_spellings() {
        assert_eq!("-zapwallettxes=1".parse::<RecoveryMode>().unwrap(), RecoveryMode::ZapLight);
        assert_eq!("zapwallettxes=2".parse::<RecoveryMode>().unwrap(), RecoveryMode::ZapFull);
        assert_eq!("-rescan".parse::<RecoveryMode>().unwrap(), RecoveryMode::Rescan);
        assert_eq!("-reindex".parse::<RecoveryMode>().unwrap(), RecoveryMode::ReindexFull);
        assert_eq!(
            "-reindex-chainstate".parse::<RecoveryMode>().unwrap(),
            RecoveryMode::ReindexChainstateOnly
        );
        assert!("zapwallettxes=3".parse::<RecoveryMode>().is_err());
    }

    #[test]
    fn test_display_round_trips() {
        for mode in RecoveryMode::ALL {
            assert_eq!(mode.to_string().parse::<RecoveryMode>().unwrap(), mode);
        }
    }

    #[test]
    fn test_mode_properties() {
        assert!(!RecoveryMode::Normal.scans_from_genesis());
        assert!(!RecoveryMode::ZapLight.clears_transactions());
        assert!(!RecoveryMode::Rescan.clears_transactions());
        assert!(RecoveryMode::ReindexChainstateOnly.clears_transactions());
        assert_eq!(
            RecoveryMode::ReindexFull.reindex_scope(),
            Some(ReindexScope::BlockIndex)
        );
        assert!(RecoveryMode::ZapLight.preserves_timestamps());
        assert!(!RecoveryMode::ZapFull.preserves_timestamps());
    }
}
