//! Wallet parameters

use serde::{Deserialize, Serialize};

use crate::{
    data_structures::{
        denomination::EpochSchedule,
        types::{Amount, COIN},
    },
    errors::{WalletError, WalletResult},
    scanning::config::ScanConfig,
};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WalletParams {
    pub epoch_schedule: EpochSchedule,
    /// Confirmations a mint needs before the coin may be spent
    pub mint_confirmations: u64,
    /// Confirmations a coinbase output needs before it may be spent
    pub coinbase_maturity: u64,
    /// Fee paid by transparent sends and mints
    pub transaction_fee: Amount,
    /// Fee paid by epoch 2 multi-output spends
    pub spend_fee: Amount,
    pub scan: ScanConfig,
}

impl Default for WalletParams {
    fn default() -> Self {
        Self::regtest()
    }
}

impl WalletParams {
    pub fn regtest() -> Self {
        Self {
            epoch_schedule: EpochSchedule::regtest(),
            mint_confirmations: 6,
            coinbase_maturity: 100,
            transaction_fee: COIN / 1000,
            spend_fee: COIN / 1000,
            scan: ScanConfig::default(),
        }
    }

    pub fn with_scan_config(mut self, scan: ScanConfig) -> Self {
        self.scan = scan;
        self
    }

    pub fn validate(&self) -> WalletResult<()> {
        if self.transaction_fee < 0 || self.spend_fee < 0 {
            return Err(WalletError::ConfigurationError(
                "Fees must not be negative".to_string(),
            ));
        }
        if self.mint_confirmations == 0 {
            return Err(WalletError::ConfigurationError(
                "mint_confirmations must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_regtest_defaults() {
        let params = WalletParams::default();
        assert_eq!(params.epoch_schedule.sigma_start_height, 400);
        assert_eq!(params.mint_confirmations, 6);
        assert_eq!(params.transaction_fee, 100_000);
        assert!(params.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_negative_fee() {
        let params = WalletParams {
            spend_fee: -1,
            ..WalletParams::regtest()
        };
        assert!(matches!(
            params.validate(),
            Err(WalletError::ConfigurationError(_))
        ));
    }
}
