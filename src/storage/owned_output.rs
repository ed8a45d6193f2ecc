use serde::{Deserialize, Serialize};

use crate::data_structures::{
    chain::OutPoint,
    types::{Address, Amount, TxId},
};

/// Output status enumeration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OutputStatus {
    Unspent = 0,
    Spent = 1,
}

impl From<u32> for OutputStatus {
    fn from(value: u32) -> Self {
        match value {
            1 => OutputStatus::Spent,
            _ => OutputStatus::Unspent,
        }
    }
}

impl From<OutputStatus> for u32 {
    fn from(status: OutputStatus) -> Self {
        status as u32
    }
}

/// A transparent output paying one of the wallet's addresses
///
/// Fully derivable from chain data, so recovery paths drop and rebuild these.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OwnedOutput {
    pub outpoint: OutPoint,
    pub address: Address,
    pub value: Amount,
    /// Block height when mined; `None` while in the mempool
    pub height: Option<u64>,
    pub coinbase: bool,
    pub status: OutputStatus,
    pub spent_in: Option<TxId>,
}

impl OwnedOutput {
    pub fn new(outpoint: OutPoint, address: Address, value: Amount, height: Option<u64>, coinbase: bool) -> Self {
        Self {
            outpoint,
            address,
            value,
            height,
            coinbase,
            status: OutputStatus::Unspent,
            spent_in: None,
        }
    }

    pub fn confirmations(&self, tip_height: u64) -> u64 {
        match self.height {
            Some(h) if h <= tip_height => tip_height - h + 1,
            _ => 0,
        }
    }

    /// Coinbase outputs need `coinbase_maturity` confirmations; other
    /// outputs are spendable as soon as the wallet sees them
    pub fn is_spendable_at(&self, tip_height: u64, coinbase_maturity: u64) -> bool {
        self.status == OutputStatus::Unspent
            && self.spent_in.is_none()
            && (!self.coinbase || self.confirmations(tip_height) >= coinbase_maturity)
    }

    pub fn mark_spent(&mut self, txid: TxId) {
        self.status = OutputStatus::Spent;
        self.spent_in = Some(txid);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_coinbase_maturity() {
        let outpoint = OutPoint::new(TxId::new([1u8; 32]), 0);
        let mut output = OwnedOutput::new(outpoint, Address::from("w"), 50, Some(1), true);

        assert!(!output.is_spendable_at(99, 100));
        assert!(output.is_spendable_at(100, 100));

        output.mark_spent(TxId::new([2u8; 32]));
        assert!(!output.is_spendable_at(200, 100));
        assert_eq!(OutputStatus::from(u32::from(output.status)), OutputStatus::Spent);
    }

    #[test]
    fn test_unconfirmed_change_is_spendable() {
        let outpoint = OutPoint::new(TxId::new([1u8; 32]), 1);
        let output = OwnedOutput::new(outpoint, Address::from("w"), 5, None, false);
        assert_eq!(output.confirmations(10), 0);
        assert!(output.is_spendable_at(10, 100));
    }
}
