//! Coin denominations and the epochs that enumerate them
//!
//! Each coin scheme supports a fixed, versioned set of values. Epoch 1 (the
//! original accumulator scheme) allows `{1, 10, 25, 50, 100}`; epoch 2 (the
//! higher-capacity commitment scheme) allows `{0.05, 0.1, 0.5, 1, 10, 25, 100}`.
//! A mint is only valid for the epoch active at its height.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::{
    data_structures::types::{Amount, COIN},
    errors::{WalletError, WalletResult},
};

/// Versioned coin scheme
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum CoinEpoch {
    /// Epoch 1: accumulator coins
    Zerocoin = 1,
    /// Epoch 2: commitment-set coins
    Sigma = 2,
}

impl CoinEpoch {
    /// Denominations accepted by this epoch, largest first
    pub fn denominations(self) -> &'static [Denomination] {
        use Denomination::*;
        match self {
            CoinEpoch::Zerocoin => &[D100, D50, D25, D10, D1],
            CoinEpoch::Sigma => &[D100, D25, D10, D1, D0_5, D0_1, D0_05],
        }
    }

    pub fn id(self) -> u8 {
        self as u8
    }

    pub fn supports(self, denomination: Denomination) -> bool {
        self.denominations().contains(&denomination)
    }

    /// Resolve a raw on-chain value into a denomination of this epoch
    pub fn denomination_for(self, value: Amount) -> WalletResult<Denomination> {
        Denomination::from_value(value)
            .filter(|d| self.supports(*d))
            .ok_or(WalletError::DenominationUnsupported { value, epoch: self })
    }

    /// Split `value` into this epoch's denominations, largest first
    pub fn decompose(self, value: Amount) -> WalletResult<Vec<Denomination>> {
        if value <= 0 {
            return Err(WalletError::InvalidArgument(format!(
                "Cannot decompose non-positive value {value}"
            )));
        }
        let mut remaining = value;
        let mut parts = Vec::new();
        for denomination in self.denominations() {
            while remaining >= denomination.value() {
                remaining -= denomination.value();
                parts.push(*denomination);
            }
        }
        if remaining != 0 {
            return Err(WalletError::DenominationUnsupported {
                value: remaining,
                epoch: self,
            });
        }
        Ok(parts)
    }
}

impl TryFrom<u8> for CoinEpoch {
    type Error = WalletError;

    fn try_from(id: u8) -> Result<Self, Self::Error> {
        match id {
            1 => Ok(CoinEpoch::Zerocoin),
            2 => Ok(CoinEpoch::Sigma),
            other => Err(WalletError::InvalidArgument(format!(
                "Unknown coin epoch {other}"
            ))),
        }
    }
}

impl fmt::Display for CoinEpoch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CoinEpoch::Zerocoin => write!(f, "epoch 1 (zerocoin)"),
            CoinEpoch::Sigma => write!(f, "epoch 2 (sigma)"),
        }
    }
}

/// Every coin value known to any epoch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Denomination {
    #[serde(rename = "0.05")]
    D0_05,
    #[serde(rename = "0.1")]
    D0_1,
    #[serde(rename = "0.5")]
    D0_5,
    #[serde(rename = "1")]
    D1,
    #[serde(rename = "10")]
    D10,
    #[serde(rename = "25")]
    D25,
    #[serde(rename = "50")]
    D50,
    #[serde(rename = "100")]
    D100,
}

impl Denomination {
    pub const ALL: [Denomination; 8] = [
        Denomination::D0_05,
        Denomination::D0_1,
        Denomination::D0_5,
        Denomination::D1,
        Denomination::D10,
        Denomination::D25,
        Denomination::D50,
        Denomination::D100,
    ];

    pub fn value(self) -> Amount {
        match self {
            Denomination::D0_05 => COIN / 20,
            Denomination::D0_1 => COIN / 10,
            Denomination::D0_5 => COIN / 2,
            Denomination::D1 => COIN,
            Denomination::D10 => 10 * COIN,
            Denomination::D25 => 25 * COIN,
            Denomination::D50 => 50 * COIN,
            Denomination::D100 => 100 * COIN,
        }
    }

    pub fn from_value(value: Amount) -> Option<Self> {
        Self::ALL.iter().copied().find(|d| d.value() == value)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Denomination::D0_05 => "0.05",
            Denomination::D0_1 => "0.1",
            Denomination::D0_5 => "0.5",
            Denomination::D1 => "1",
            Denomination::D10 => "10",
            Denomination::D25 => "25",
            Denomination::D50 => "50",
            Denomination::D100 => "100",
        }
    }
}

impl fmt::Display for Denomination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Denomination {
    type Err = WalletError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|d| d.as_str() == s.trim())
            .ok_or_else(|| WalletError::InvalidArgument(format!("Unknown denomination: {s}")))
    }
}

/// Heights at which each coin epoch becomes active
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EpochSchedule {
    /// First height at which epoch 2 mints are accepted and epoch 1 mints are not
    pub sigma_start_height: u64,
}

impl Default for EpochSchedule {
    fn default() -> Self {
        Self::regtest()
    }
}

impl EpochSchedule {
    pub fn regtest() -> Self {
        Self {
            sigma_start_height: 400,
        }
    }

    pub fn active_epoch(&self, height: u64) -> CoinEpoch {
        if height >= self.sigma_start_height {
            CoinEpoch::Sigma
        } else {
            CoinEpoch::Zerocoin
        }
    }

    /// Check that a mint of `denomination` in `epoch` is valid at `height`
    pub fn validate_mint(
        &self,
        epoch: CoinEpoch,
        denomination: Denomination,
        height: u64,
    ) -> WalletResult<()> {
        let active = self.active_epoch(height);
        if epoch != active || !epoch.supports(denomination) {
            return Err(WalletError::DenominationUnsupported {
                value: denomination.value(),
                epoch: active,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_epoch_denomination_sets() {
        assert!(CoinEpoch::Zerocoin.supports(Denomination::D50));
        assert!(!CoinEpoch::Sigma.supports(Denomination::D50));
        assert!(CoinEpoch::Sigma.supports(Denomination::D0_05));
        assert!(!CoinEpoch::Zerocoin.supports(Denomination::D0_5));
    }

    #[test]
    fn test_denomination_for_rejects_unknown_values() {
        assert_eq!(
            CoinEpoch::Sigma.denomination_for(COIN / 10).unwrap(),
            Denomination::D0_1
        );
        assert!(matches!(
            CoinEpoch::Sigma.denomination_for(50 * COIN),
            Err(WalletError::DenominationUnsupported { .. })
        ));
        assert!(CoinEpoch::Zerocoin.denomination_for(3 * COIN).is_err());
    }

    #[test]
    fn test_decompose_greedy() {
        let parts = CoinEpoch::Sigma.decompose(50 * COIN).unwrap();
        assert_eq!(parts, vec![Denomination::D25, Denomination::D25]);

        let parts = CoinEpoch::Sigma.decompose(COIN + COIN / 20).unwrap();
        assert_eq!(parts, vec![Denomination::D1, Denomination::D0_05]);

        assert!(CoinEpoch::Zerocoin.decompose(COIN / 2).is_err());
        assert!(CoinEpoch::Sigma.decompose(0).is_err());
    }

    #[test]
    fn test_parse_and_display() {
        for d in Denomination::ALL {
            assert_eq!(d.to_string().parse::<Denomination>().unwrap(), d);
        }
        assert!("0.25".parse::<Denomination>().is_err());
    }

    #[test]
    fn test_schedule_validation() {
        let schedule = EpochSchedule::regtest();
        assert!(schedule
            .validate_mint(CoinEpoch::Zerocoin, Denomination::D50, 120)
            .is_ok());
        assert!(schedule
            .validate_mint(CoinEpoch::Zerocoin, Denomination::D50, 400)
            .is_err());
        assert!(schedule
            .validate_mint(CoinEpoch::Sigma, Denomination::D0_05, 401)
            .is_ok());
        assert!(schedule
            .validate_mint(CoinEpoch::Sigma, Denomination::D1, 10)
            .is_err());
        assert_eq!(CoinEpoch::try_from(2).unwrap(), CoinEpoch::Sigma);
        assert!(CoinEpoch::try_from(9).is_err());
    }
}
