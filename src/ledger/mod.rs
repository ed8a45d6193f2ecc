//! Coin ledger: the wallet's privacy coins and their spend linkage
//!
//! Mint records live in an arena indexed by serial number and by commitment.
//! Spend records reference mints only through serials, so the two never hold
//! references into each other. The secret fields of a record are written once
//! and never regenerated; rescans only rebuild the `spent` flag, the spend
//! linkage and the confirmed mint height.

pub mod commitment;

use std::collections::{BTreeMap, HashMap, HashSet};

use tracing::{debug, warn};

use crate::{
    data_structures::{
        coin_records::{MintRecord, SpendRecord},
        denomination::{CoinEpoch, Denomination, EpochSchedule},
        types::{Amount, Commitment, SerialNumber, TxId},
    },
    errors::{WalletError, WalletResult},
};

pub use commitment::{compute_commitment, PreparedMint};

/// Outcome of matching an on-chain commitment against the ledger
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MintMatch {
    /// The commitment was not created by this wallet
    NotOurs,
    /// The commitment belongs to a known mint from the same transaction
    Reconfirmed(MintRecord),
    /// The commitment belongs to a known mint recorded under another txid
    TxidMismatch(MintRecord),
}

/// Records touched by a successful conversion
#[derive(Debug, Clone)]
pub struct Conversion {
    pub consumed: Vec<MintRecord>,
    pub created: Vec<MintRecord>,
    pub spend: SpendRecord,
}

#[derive(Debug, Clone, Default)]
pub struct CoinLedger {
    schedule: EpochSchedule,
    mints: Vec<MintRecord>,
    by_serial: HashMap<SerialNumber, usize>,
    by_commitment: HashMap<Commitment, usize>,
    spends: Vec<SpendRecord>,
    spend_index: HashMap<TxId, usize>,
}

impl CoinLedger {
    pub fn new(schedule: EpochSchedule) -> Self {
        Self {
            schedule,
            ..Default::default()
        }
    }

    /// Rebuild a ledger from persisted records
    ///
    /// Every mint is re-verified against its commitment; a record whose
    /// secrets no longer reproduce the commitment is fatal.
    pub fn from_records(
        schedule: EpochSchedule,
        mints: Vec<MintRecord>,
        spends: Vec<SpendRecord>,
    ) -> WalletResult<Self> {
        let mut ledger = Self::new(schedule);
        for mint in mints {
            let expected = compute_commitment(
                &mint.serial_number,
                &mint.randomness,
                mint.epoch,
                mint.denomination,
            );
            if expected != mint.commitment {
                return Err(WalletError::SecretsCorrupted(format!(
                    "mint {} does not reproduce its commitment",
                    mint.serial_number
                )));
            }
            if ledger.by_serial.contains_key(&mint.serial_number) {
                return Err(WalletError::SecretsCorrupted(format!(
                    "duplicate serial {}",
                    mint.serial_number
                )));
            }
            ledger.insert_mint(mint)?;
        }
        for spend in spends {
            let linked = spend.serials_consumed.iter().all(|serial| {
                ledger
                    .find_by_serial(serial)
                    .map(|m| m.spent && m.spend_txid == Some(spend.spend_txid))
                    .unwrap_or(false)
            });
            if !linked {
                warn!(
                    "Spend {} references serials not linked to it; dropping record",
                    spend.spend_txid
                );
                continue;
            }
            ledger.spend_index.insert(spend.spend_txid, ledger.spends.len());
            ledger.spends.push(spend);
        }
        Ok(ledger)
    }

    pub fn schedule(&self) -> &EpochSchedule {
        &self.schedule
    }

    pub fn mints(&self) -> &[MintRecord] {
        &self.mints
    }

    pub fn spends(&self) -> &[SpendRecord] {
        &self.spends
    }

    pub fn len(&self) -> usize {
        self.mints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mints.is_empty()
    }

    pub fn find_by_serial(&self, serial: &SerialNumber) -> Option<&MintRecord> {
        self.by_serial.get(serial).map(|&i| &self.mints[i])
    }

    pub fn find_by_commitment(&self, commitment: &Commitment) -> Option<&MintRecord> {
        self.by_commitment.get(commitment).map(|&i| &self.mints[i])
    }

    pub fn spend_for(&self, txid: &TxId) -> Option<&SpendRecord> {
        self.spend_index.get(txid).map(|&i| &self.spends[i])
    }

    pub fn unspent_mints(&self) -> impl Iterator<Item = &MintRecord> {
        self.mints.iter().filter(|m| m.is_unspent())
    }

    /// Unspent coin counts per epoch and denomination
    pub fn unspent_by_denomination(&self) -> BTreeMap<(CoinEpoch, Denomination), usize> {
        let mut counts = BTreeMap::new();
        for mint in self.unspent_mints() {
            *counts.entry((mint.epoch, mint.denomination)).or_insert(0) += 1;
        }
        counts
    }

    pub fn unspent_value(&self) -> Amount {
        self.unspent_mints().map(MintRecord::value).sum()
    }

    /// Generate fresh secrets for a coin of the epoch active at `height`
    pub fn prepare_mint(&self, denomination: Denomination, height: u64) -> WalletResult<PreparedMint> {
        let epoch = self.schedule.active_epoch(height);
        self.schedule.validate_mint(epoch, denomination, height)?;
        Ok(PreparedMint::generate(epoch, denomination))
    }

    /// Bind prepared secrets to the transaction that publishes them
    pub fn record_prepared(
        &mut self,
        prepared: PreparedMint,
        height: u64,
        txid: TxId,
    ) -> WalletResult<MintRecord> {
        self.schedule
            .validate_mint(prepared.epoch, prepared.denomination, height)?;
        let record = MintRecord {
            serial_number: prepared.serial_number,
            randomness: prepared.randomness.clone(),
            commitment: prepared.commitment,
            epoch: prepared.epoch,
            denomination: prepared.denomination,
            mint_txid: txid,
            mint_height: height,
            spent: false,
            spend_txid: None,
        };
        self.insert_mint(record.clone())?;
        debug!(
            "Recorded mint {} ({} {}) in {}",
            record.commitment, record.denomination, record.epoch, txid
        );
        Ok(record)
    }

    /// Create and record a fresh coin of `denomination` minted by `txid`
    pub fn record_mint(
        &mut self,
        denomination: Denomination,
        height: u64,
        txid: TxId,
    ) -> WalletResult<MintRecord> {
        let prepared = self.prepare_mint(denomination, height)?;
        self.record_prepared(prepared, height, txid)
    }

    /// Match a commitment seen on-chain in `txid` at `height`
    ///
    /// A match from the same transaction is a re-confirmation: the mint height
    /// is updated and no new record is created.
    pub fn reconfirm_mint(
        &mut self,
        commitment: &Commitment,
        txid: &TxId,
        height: Option<u64>,
    ) -> MintMatch {
        let Some(&index) = self.by_commitment.get(commitment) else {
            return MintMatch::NotOurs;
        };
        let mint = &mut self.mints[index];
        if mint.mint_txid != *txid {
            return MintMatch::TxidMismatch(mint.clone());
        }
        if let Some(height) = height {
            mint.mint_height = height;
        }
        MintMatch::Reconfirmed(mint.clone())
    }

    /// Link a revealed serial to the spend that revealed it
    ///
    /// Returns `Ok(None)` for serials this wallet never minted. Relinking to
    /// the same txid is a no-op apart from recording a confirmation height;
    /// relinking to a different txid is a [`WalletError::ConflictingLink`].
    pub fn try_link_spend(
        &mut self,
        revealed_serial: &SerialNumber,
        txid: TxId,
        height: Option<u64>,
    ) -> WalletResult<Option<MintRecord>> {
        let Some(&index) = self.by_serial.get(revealed_serial) else {
            return Ok(None);
        };
        self.check_link(index, txid)?;
        Ok(Some(self.apply_link(index, txid, height, 0)))
    }

    /// Link several serials revealed by one transaction, all or nothing
    ///
    /// Batched form of [`CoinLedger::try_link_spend`] used by the scanner.
    /// Serials unknown to the wallet are skipped. Returns the linked mints.
    pub fn link_spend(
        &mut self,
        txid: TxId,
        height: Option<u64>,
        serials: &[SerialNumber],
        outputs_created: u32,
    ) -> WalletResult<Vec<MintRecord>> {
        let indices: Vec<usize> = serials
            .iter()
            .filter_map(|serial| self.by_serial.get(serial).copied())
            .collect();
        for &index in &indices {
            self.check_link(index, txid)?;
        }
        Ok(indices
            .into_iter()
            .map(|index| self.apply_link(index, txid, height, outputs_created))
            .collect())
    }

    /// Fold coins into freshly minted coins of another denomination set
    ///
    /// Consumed coins are marked spent by `txid` and the prepared outputs are
    /// recorded in the same step. Input value minus `fee` must equal output
    /// value exactly.
    pub fn convert(
        &mut self,
        mint_ids: &[SerialNumber],
        outputs: Vec<PreparedMint>,
        fee: Amount,
        txid: TxId,
        height: u64,
    ) -> WalletResult<Conversion> {
        if mint_ids.is_empty() || outputs.is_empty() {
            return Err(WalletError::InvalidArgument(
                "Conversion needs at least one input and one output".to_string(),
            ));
        }
        let mut indices = Vec::with_capacity(mint_ids.len());
        for serial in mint_ids {
            let index = *self
                .by_serial
                .get(serial)
                .ok_or(WalletError::UnknownSerial(*serial))?;
            if indices.contains(&index) {
                return Err(WalletError::InvalidArgument(format!(
                    "Serial {serial} listed twice"
                )));
            }
            let mint = &self.mints[index];
            if let Some(existing) = mint.spend_txid {
                return Err(WalletError::ConflictingLink {
                    serial: *serial,
                    existing,
                    attempted: txid,
                });
            }
            indices.push(index);
        }

        let inputs: Amount = indices.iter().map(|&i| self.mints[i].value()).sum();
        let created_value: Amount = outputs.iter().map(|p| p.denomination.value()).sum();
        if inputs - fee != created_value {
            return Err(WalletError::ValueMismatch {
                inputs,
                outputs: created_value,
                fee,
            });
        }
        // Every output must be insertable before anything is mutated
        let mut new_serials = HashSet::with_capacity(outputs.len());
        let mut new_commitments = HashSet::with_capacity(outputs.len());
        for prepared in &outputs {
            self.schedule
                .validate_mint(prepared.epoch, prepared.denomination, height)?;
            if self.by_serial.contains_key(&prepared.serial_number)
                || !new_serials.insert(prepared.serial_number)
            {
                return Err(WalletError::InvalidArgument(format!(
                    "Serial {} already recorded",
                    prepared.serial_number
                )));
            }
            if self.by_commitment.contains_key(&prepared.commitment)
                || !new_commitments.insert(prepared.commitment)
            {
                return Err(WalletError::InvalidArgument(format!(
                    "Commitment {} already recorded",
                    prepared.commitment
                )));
            }
        }

        let outputs_created = outputs.len() as u32;
        let consumed: Vec<MintRecord> = indices
            .into_iter()
            .map(|index| self.apply_link(index, txid, None, outputs_created))
            .collect();
        let mut created = Vec::with_capacity(outputs.len());
        for prepared in outputs {
            created.push(self.record_prepared(prepared, height, txid)?);
        }
        let spend = self
            .spend_for(&txid)
            .cloned()
            .ok_or_else(|| WalletError::ResourceNotFound(format!("spend record {txid}")))?;
        Ok(Conversion {
            consumed,
            created,
            spend,
        })
    }

    /// Forget all spend linkage so a scan can rebuild it
    pub fn reset_spend_links(&mut self) {
        for mint in &mut self.mints {
            mint.spent = false;
            mint.spend_txid = None;
        }
        self.spends.clear();
        self.spend_index.clear();
    }

    fn insert_mint(&mut self, record: MintRecord) -> WalletResult<()> {
        if self.by_serial.contains_key(&record.serial_number) {
            return Err(WalletError::InvalidArgument(format!(
                "Serial {} already recorded",
                record.serial_number
            )));
        }
        if self.by_commitment.contains_key(&record.commitment) {
            return Err(WalletError::InvalidArgument(format!(
                "Commitment {} already recorded",
                record.commitment
            )));
        }
        let index = self.mints.len();
        self.by_serial.insert(record.serial_number, index);
        self.by_commitment.insert(record.commitment, index);
        self.mints.push(record);
        Ok(())
    }

    fn check_link(&self, index: usize, txid: TxId) -> WalletResult<()> {
        let mint = &self.mints[index];
        match mint.spend_txid {
            Some(existing) if existing != txid => Err(WalletError::ConflictingLink {
                serial: mint.serial_number,
                existing,
                attempted: txid,
            }),
            _ => Ok(()),
        }
    }

    fn apply_link(
        &mut self,
        index: usize,
        txid: TxId,
        height: Option<u64>,
        outputs_created: u32,
    ) -> MintRecord {
        let serial = self.mints[index].serial_number;
        self.mints[index].spent = true;
        self.mints[index].spend_txid = Some(txid);

        let spend_index = match self.spend_index.get(&txid) {
            Some(&i) => i,
            None => {
                self.spends
                    .push(SpendRecord::new(txid, height, outputs_created));
                self.spend_index.insert(txid, self.spends.len() - 1);
                self.spends.len() - 1
            }
        };
        let spend = &mut self.spends[spend_index];
        if !spend.consumes(&serial) {
            spend.serials_consumed.push(serial);
        }
        if height.is_some() {
            spend.height = height;
        }
        spend.outputs_created = spend.outputs_created.max(outputs_created);
        self.mints[index].clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data_structures::types::COIN;

    fn txid(n: u8) -> TxId {
        TxId::new([n; 32])
    }

    fn ledger() -> CoinLedger {
        CoinLedger::new(EpochSchedule::regtest())
    }

    #[test]
    fn test_record_mint_indexes_by_serial_and_commitment() {
        let mut ledger = ledger();
        let mint = ledger.record_mint(Denomination::D10, 120, txid(1)).unwrap();

        assert_eq!(mint.epoch, CoinEpoch::Zerocoin);
        assert!(!mint.spent);
        assert_eq!(ledger.find_by_serial(&mint.serial_number), Some(&mint));
        assert_eq!(ledger.find_by_commitment(&mint.commitment), Some(&mint));
        assert_eq!(
            mint.commitment,
            compute_commitment(&mint.serial_number, &mint.randomness, mint.epoch, mint.denomination)
        );
    }

    #[test]
    fn test_record_mint_rejects_denomination_outside_epoch() {
        let mut ledger = ledger();
        assert!(matches!(
            ledger.record_mint(Denomination::D0_05, 120, txid(1)),
            Err(WalletError::DenominationUnsupported { .. })
        ));
        assert!(matches!(
            ledger.record_mint(Denomination::D50, 450, txid(1)),
            Err(WalletError::DenominationUnsupported { .. })
        ));
        assert!(ledger.is_empty());
    }

    #[test]
    fn test_try_link_spend_unknown_serial_is_unlinked() {
        let mut ledger = ledger();
        let result = ledger
            .try_link_spend(&SerialNumber::new([9u8; 32]), txid(2), Some(130))
            .unwrap();
        assert!(result.is_none());
        assert!(ledger.spends().is_empty());
    }

    #[test]
    fn test_try_link_spend_is_idempotent_and_detects_conflicts() {
        let mut ledger = ledger();
        let mint = ledger.record_mint(Denomination::D1, 120, txid(1)).unwrap();

        let linked = ledger
            .try_link_spend(&mint.serial_number, txid(2), None)
            .unwrap()
            .unwrap();
        assert!(linked.spent);
        assert_eq!(ledger.spend_for(&txid(2)).unwrap().height, None);

        // Same txid again: no-op apart from confirmation height
        ledger
            .try_link_spend(&mint.serial_number, txid(2), Some(131))
            .unwrap();
        let spend = ledger.spend_for(&txid(2)).unwrap();
        assert_eq!(spend.serials_consumed, vec![mint.serial_number]);
        assert_eq!(spend.height, Some(131));
        assert_eq!(ledger.spends().len(), 1);

        let conflict = ledger.try_link_spend(&mint.serial_number, txid(3), Some(132));
        assert!(matches!(
            conflict,
            Err(WalletError::ConflictingLink { existing, attempted, .. })
                if existing == txid(2) && attempted == txid(3)
        ));
    }

    #[test]
    fn test_link_spend_is_all_or_nothing() {
        let mut ledger = ledger();
        let a = ledger.record_mint(Denomination::D1, 120, txid(1)).unwrap();
        let b = ledger.record_mint(Denomination::D10, 120, txid(1)).unwrap();
        ledger.try_link_spend(&b.serial_number, txid(5), None).unwrap();

        let result = ledger.link_spend(txid(6), None, &[a.serial_number, b.serial_number], 1);
        assert!(result.is_err());
        assert!(ledger.find_by_serial(&a.serial_number).unwrap().is_unspent());
        assert!(ledger.spend_for(&txid(6)).is_none());
    }

    #[test]
    fn test_convert_balances_and_links_atomically() {
        let mut ledger = ledger();
        let fifty = ledger.record_mint(Denomination::D50, 120, txid(1)).unwrap();

        let outputs = vec![
            ledger.prepare_mint(Denomination::D25, 410).unwrap(),
            ledger.prepare_mint(Denomination::D25, 410).unwrap(),
        ];
        let conversion = ledger
            .convert(&[fifty.serial_number], outputs, 0, txid(7), 410)
            .unwrap();

        assert_eq!(conversion.consumed.len(), 1);
        assert!(conversion.consumed[0].spent);
        assert_eq!(conversion.created.len(), 2);
        assert!(conversion.created.iter().all(|m| m.epoch == CoinEpoch::Sigma));
        assert_eq!(conversion.spend.outputs_created, 2);
        assert_eq!(ledger.unspent_value(), 50 * COIN);
    }

    #[test]
    fn test_convert_value_mismatch_leaves_ledger_untouched() {
        let mut ledger = ledger();
        let fifty = ledger.record_mint(Denomination::D50, 120, txid(1)).unwrap();
        let outputs = vec![ledger.prepare_mint(Denomination::D25, 410).unwrap()];

        let result = ledger.convert(&[fifty.serial_number], outputs, 0, txid(7), 410);
        assert!(matches!(result, Err(WalletError::ValueMismatch { .. })));
        assert!(ledger.find_by_serial(&fifty.serial_number).unwrap().is_unspent());
        assert_eq!(ledger.len(), 1);
    }

    #[test]
    fn test_convert_with_repeated_output_leaves_ledger_untouched() {
        let mut ledger = ledger();
        let fifty = ledger.record_mint(Denomination::D50, 120, txid(1)).unwrap();
        let prepared = ledger.prepare_mint(Denomination::D25, 410).unwrap();
        let outputs = vec![prepared.clone(), prepared];

        let result = ledger.convert(&[fifty.serial_number], outputs, 0, txid(7), 410);
        assert!(matches!(result, Err(WalletError::InvalidArgument(_))));
        assert!(ledger.find_by_serial(&fifty.serial_number).unwrap().is_unspent());
        assert_eq!(ledger.len(), 1);
        assert!(ledger.spends().is_empty());
        assert!(ledger.spend_for(&txid(7)).is_none());
    }

    #[test]
    fn test_convert_twice_never_double_credits() {
        let mut ledger = ledger();
        let fifty = ledger.record_mint(Denomination::D50, 120, txid(1)).unwrap();
        let first = vec![
            ledger.prepare_mint(Denomination::D25, 410).unwrap(),
            ledger.prepare_mint(Denomination::D25, 410).unwrap(),
        ];
        ledger
            .convert(&[fifty.serial_number], first, 0, txid(7), 410)
            .unwrap();
        let value_after_first = ledger.unspent_value();

        let second = vec![
            ledger.prepare_mint(Denomination::D25, 411).unwrap(),
            ledger.prepare_mint(Denomination::D25, 411).unwrap(),
        ];
        let result = ledger.convert(&[fifty.serial_number], second, 0, txid(8), 411);
        assert!(matches!(result, Err(WalletError::ConflictingLink { .. })));
        assert_eq!(ledger.unspent_value(), value_after_first);
    }

    #[test]
    fn test_reconfirm_mint() {
        let mut ledger = ledger();
        let mint = ledger.record_mint(Denomination::D25, 120, txid(1)).unwrap();

        match ledger.reconfirm_mint(&mint.commitment, &txid(1), Some(121)) {
            MintMatch::Reconfirmed(m) => assert_eq!(m.mint_height, 121),
            other => panic!("unexpected {other:?}"),
        }
        assert!(matches!(
            ledger.reconfirm_mint(&mint.commitment, &txid(2), Some(121)),
            MintMatch::TxidMismatch(_)
        ));
        assert_eq!(
            ledger.reconfirm_mint(&Commitment::new([0u8; 32]), &txid(1), None),
            MintMatch::NotOurs
        );
        assert_eq!(ledger.len(), 1);
    }

    #[test]
    fn test_reset_spend_links_keeps_secrets() {
        let mut ledger = ledger();
        let mint = ledger.record_mint(Denomination::D25, 120, txid(1)).unwrap();
        ledger.try_link_spend(&mint.serial_number, txid(2), Some(130)).unwrap();

        ledger.reset_spend_links();
        let after = ledger.find_by_serial(&mint.serial_number).unwrap();
        assert!(after.is_unspent());
        assert!(after.same_secrets(&mint));
        assert!(ledger.spends().is_empty());
    }

    #[test]
    fn test_from_records_detects_corrupted_secrets() {
        let mut ledger = ledger();
        let mut mint = ledger.record_mint(Denomination::D25, 120, txid(1)).unwrap();
        mint.randomness = crate::data_structures::types::Randomness::new([0u8; 32]);

        let result = CoinLedger::from_records(EpochSchedule::regtest(), vec![mint], vec![]);
        assert!(matches!(result, Err(WalletError::SecretsCorrupted(_))));
    }

    #[test]
    fn test_from_records_restores_links() {
        let mut ledger = ledger();
        let mint = ledger.record_mint(Denomination::D25, 120, txid(1)).unwrap();
        ledger.try_link_spend(&mint.serial_number, txid(2), Some(130)).unwrap();

        let restored = CoinLedger::from_records(
            EpochSchedule::regtest(),
            ledger.mints().to_vec(),
            ledger.spends().to_vec(),
        )
        .unwrap();
        assert_eq!(restored.spends(), ledger.spends());
        assert!(restored.find_by_serial(&mint.serial_number).unwrap().spent);
    }
}
