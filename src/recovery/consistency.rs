//! History comparison across a recovery

use crate::{
    data_structures::wallet_transaction::WalletTxRecord,
    errors::{WalletError, WalletResult},
};

/// Compare two transaction listings keyed by txid
///
/// `strict` compares every field; otherwise `time_received` is ignored.
/// Listing order does not matter. The error names the first diverging txid.
pub fn verify_history_stable(
    before: &[WalletTxRecord],
    after: &[WalletTxRecord],
    strict: bool,
) -> WalletResult<()> {
    let mut before: Vec<&WalletTxRecord> = before.iter().collect();
    let mut after: Vec<&WalletTxRecord> = after.iter().collect();
    before.sort_by_key(|r| r.txid);
    after.sort_by_key(|r| r.txid);

    for (old, new) in before.iter().zip(after.iter()) {
        if old.txid != new.txid {
            let missing = old.txid.min(new.txid);
            return Err(WalletError::ConsistencyFailure(format!(
                "transaction {missing} present on only one side"
            )));
        }
        let same = if strict {
            old == new
        } else {
            old.eq_ignoring_time(new)
        };
        if !same {
            return Err(WalletError::ConsistencyFailure(format!(
                "transaction {} differs: before {:?}, after {:?}",
                old.txid, old, new
            )));
        }
    }

    if before.len() != after.len() {
        let extra = if before.len() > after.len() {
            before[after.len()].txid
        } else {
            after[before.len()].txid
        };
        return Err(WalletError::ConsistencyFailure(format!(
            "{} transactions before, {} after; first unmatched {extra}",
            before.len(),
            after.len()
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data_structures::{
        types::TxId,
        wallet_transaction::TxCategory,
    };

    fn record(n: u8, time: u64) -> WalletTxRecord {
        WalletTxRecord {
            txid: TxId::new([n; 32]),
            category: TxCategory::Receive,
            amount: 1,
            address: None,
            confirmations: 3,
            block_hash: None,
            block_height: None,
            time_received: time,
            involves_watchonly: false,
        }
    }

    #[test]
    fn test_order_independent() {
        let before = vec![record(1, 10), record(2, 10)];
        let after = vec![record(2, 10), record(1, 10)];
        assert!(verify_history_stable(&before, &after, true).is_ok());
    }

    #[test]
    fn test_timestamp_only_matters_when_strict() {
        let before = vec![record(1, 10)];
        let after = vec![record(1, 99)];
        assert!(verify_history_stable(&before, &after, false).is_ok());
        assert!(matches!(
            verify_history_stable(&before, &after, true),
            Err(WalletError::ConsistencyFailure(_))
        ));
    }

    #[test]
    fn test_missing_record_is_reported() {
        let before = vec![record(1, 10), record(2, 10)];
        let after = vec![record(1, 10)];
        let err = verify_history_stable(&before, &after, false).unwrap_err();
        assert!(err.to_string().contains(&TxId::new([2u8; 32]).to_hex()));
    }
}
