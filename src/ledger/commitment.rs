//! Coin commitment derivation
//!
//! `commitment = H(serial || randomness || epoch || denomination)`. The hash is
//! a stand-in for the scheme's group commitment; the wallet only relies on it
//! being binding and hiding, and on being recomputable from the secrets.

use crate::data_structures::{
    denomination::{CoinEpoch, Denomination},
    types::{hash_parts, Commitment, Randomness, SerialNumber},
};

const COMMITMENT_DOMAIN: &[u8] = b"mintspend.coin.commitment.v1";

pub fn compute_commitment(
    serial: &SerialNumber,
    randomness: &Randomness,
    epoch: CoinEpoch,
    denomination: Denomination,
) -> Commitment {
    Commitment::new(hash_parts(
        COMMITMENT_DOMAIN,
        &[
            serial.as_bytes(),
            randomness.as_bytes(),
            &[epoch.id()],
            &denomination.value().to_le_bytes(),
        ],
    ))
}

/// Fresh coin secrets not yet bound to a transaction
#[derive(Debug, Clone)]
pub struct PreparedMint {
    pub serial_number: SerialNumber,
    pub randomness: Randomness,
    pub commitment: Commitment,
    pub epoch: CoinEpoch,
    pub denomination: Denomination,
}

impl PreparedMint {
    pub fn generate(epoch: CoinEpoch, denomination: Denomination) -> Self {
        let serial_number = SerialNumber::random();
        let randomness = Randomness::random();
        let commitment = compute_commitment(&serial_number, &randomness, epoch, denomination);
        Self {
            serial_number,
            randomness,
            commitment,
            epoch,
            denomination,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_commitment_binds_every_field() {
        let serial = SerialNumber::new([1u8; 32]);
        let r = Randomness::new([2u8; 32]);
        let base = compute_commitment(&serial, &r, CoinEpoch::Sigma, Denomination::D1);

        assert_eq!(
            base,
            compute_commitment(&serial, &r, CoinEpoch::Sigma, Denomination::D1)
        );
        assert_ne!(
            base,
            compute_commitment(&serial, &r, CoinEpoch::Zerocoin, Denomination::D1)
        );
        assert_ne!(
            base,
            compute_commitment(&serial, &r, CoinEpoch::Sigma, Denomination::D10)
        );
        assert_ne!(
            base,
            compute_commitment(&serial, &Randomness::new([3u8; 32]), CoinEpoch::Sigma, Denomination::D1)
        );
    }

    #[test]
    fn test_generated_secrets_are_fresh() {
        let a = PreparedMint::generate(CoinEpoch::Sigma, Denomination::D1);
        let b = PreparedMint::generate(CoinEpoch::Sigma, Denomination::D1);
        assert_ne!(a.serial_number, b.serial_number);
        assert_ne!(a.commitment, b.commitment);
    }
}
