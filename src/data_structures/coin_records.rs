//! Wallet-held coin records: mints (secrets) and the spends linked to them

use serde::{Deserialize, Serialize};

use crate::data_structures::{
    denomination::{CoinEpoch, Denomination},
    types::{Amount, Commitment, Randomness, SerialNumber, TxId},
};

/// A coin minted by this wallet
///
/// `serial_number` and `randomness` are the secrets that make the coin ours;
/// they cannot be recovered from chain data and are never regenerated. Only
/// `spent`, `spend_txid` and `mint_height` are rebuilt by scanning.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MintRecord {
    pub serial_number: SerialNumber,
    pub randomness: Randomness,
    pub commitment: Commitment,
    pub epoch: CoinEpoch,
    pub denomination: Denomination,
    pub mint_txid: TxId,
    pub mint_height: u64,
    pub spent: bool,
    /// Transaction that revealed the serial, when spent
    pub spend_txid: Option<TxId>,
}

impl MintRecord {
    pub fn value(&self) -> Amount {
        self.denomination.value()
    }

    pub fn is_unspent(&self) -> bool {
        !self.spent && self.spend_txid.is_none()
    }

    /// Same coin, same secrets: the fields no recovery path may touch
    pub fn same_secrets(&self, other: &MintRecord) -> bool {
        self.serial_number == other.serial_number
            && self.randomness == other.randomness
            && self.commitment == other.commitment
            && self.epoch == other.epoch
            && self.denomination == other.denomination
    }
}

/// A transaction that consumed one or more of this wallet's coins
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpendRecord {
    pub spend_txid: TxId,
    pub serials_consumed: Vec<SerialNumber>,
    /// Confirmation height; `None` while the spend sits in the mempool
    pub height: Option<u64>,
    pub outputs_created: u32,
}

impl SpendRecord {
    pub fn new(spend_txid: TxId, height: Option<u64>, outputs_created: u32) -> Self {
        Self {
            spend_txid,
            serials_consumed: Vec::new(),
            height,
            outputs_created,
        }
    }

    pub fn consumes(&self, serial: &SerialNumber) -> bool {
        self.serials_consumed.contains(serial)
    }
}
