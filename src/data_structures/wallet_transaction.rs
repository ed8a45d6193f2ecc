//! Wallet transaction records as listed to users

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::{
    data_structures::types::{Address, Amount, BlockHash, TxId},
    errors::WalletError,
};

/// How a transaction affects the wallet
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TxCategory {
    Mint,
    Spend,
    Send,
    Receive,
    Generate,
}

impl TxCategory {
    pub fn as_str(self) -> &'static str {
        match self {
            TxCategory::Mint => "mint",
            TxCategory::Spend => "spend",
            TxCategory::Send => "send",
            TxCategory::Receive => "receive",
            TxCategory::Generate => "generate",
        }
    }

    /// Privacy categories carry no transparent counterparty
    pub fn is_privacy(self) -> bool {
        matches!(self, TxCategory::Mint | TxCategory::Spend)
    }
}

impl fmt::Display for TxCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TxCategory {
    type Err = WalletError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "mint" => Ok(TxCategory::Mint),
            "spend" => Ok(TxCategory::Spend),
            "send" => Ok(TxCategory::Send),
            "receive" => Ok(TxCategory::Receive),
            "generate" => Ok(TxCategory::Generate),
            other => Err(WalletError::InvalidArgument(format!(
                "Unknown transaction category: {other}"
            ))),
        }
    }
}

/// One wallet-relevant transaction, keyed by txid
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WalletTxRecord {
    pub txid: TxId,
    pub category: TxCategory,
    pub amount: Amount,
    pub address: Option<Address>,
    /// Depth below the tip; refreshed whenever records are listed
    pub confirmations: u64,
    pub block_hash: Option<BlockHash>,
    pub block_height: Option<u64>,
    pub time_received: u64,
    pub involves_watchonly: bool,
}

impl WalletTxRecord {
    pub fn is_confirmed(&self) -> bool {
        self.block_hash.is_some()
    }

    pub fn refresh_confirmations(&mut self, tip_height: u64) {
        self.confirmations = match self.block_height {
            Some(height) if height <= tip_height => tip_height - height + 1,
            _ => 0,
        };
    }

    /// Field-wise equality ignoring `time_received`
    pub fn eq_ignoring_time(&self, other: &WalletTxRecord) -> bool {
        self.txid == other.txid
            && self.category == other.category
            && self.amount == other.amount
            && self.address == other.address
            && self.confirmations == other.confirmations
            && self.block_hash == other.block_hash
            && self.block_height == other.block_height
            && self.involves_watchonly == other.involves_watchonly
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record() -> WalletTxRecord {
        WalletTxRecord {
            txid: TxId::from_body(b"tx"),
            category: TxCategory::Receive,
            amount: 5,
            address: Some(Address::from("addr")),
            confirmations: 0,
            block_hash: Some(BlockHash::new([1u8; 32])),
            block_height: Some(10),
            time_received: 100,
            involves_watchonly: false,
        }
    }

    #[test]
    fn test_refresh_confirmations() {
        let mut r = record();
        r.refresh_confirmations(10);
        assert_eq!(r.confirmations, 1);
        r.refresh_confirmations(15);
        assert_eq!(r.confirmations, 6);

        r.block_height = None;
        r.refresh_confirmations(15);
        assert_eq!(r.confirmations, 0);
    }

    #[test]
    fn test_eq_ignoring_time() {
        let a = record();
        let mut b = record();
        b.time_received = 999;
        assert_ne!(a, b);
        assert!(a.eq_ignoring_time(&b));

        b.amount = 6;
        assert!(!a.eq_ignoring_time(&b));
    }

    #[test]
    fn test_category_round_trip_through_str() {
        for c in [
            TxCategory::Mint,
            TxCategory::Spend,
            TxCategory::Send,
            TxCategory::Receive,
            TxCategory::Generate,
        ] {
            assert_eq!(c.as_str().parse::<TxCategory>().unwrap(), c);
        }
        assert!("remint".parse::<TxCategory>().is_err());
    }
}
