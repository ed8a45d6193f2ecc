//! Chain data as delivered by the block/mempool source
//!
//! This is the minimal view of blocks the wallet needs: transparent inputs
//! and outputs, coin spends (revealed serials) and coin mints (commitments).

use serde::{Deserialize, Serialize};

use crate::data_structures::types::{hash_parts, Address, Amount, BlockHash, Commitment, SerialNumber, TxId};

/// Reference to a transparent output
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct OutPoint {
    pub txid: TxId,
    pub index: u32,
}

impl OutPoint {
    pub fn new(txid: TxId, index: u32) -> Self {
        Self { txid, index }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TxInput {
    /// Spends a transparent output
    Transparent { prevout: OutPoint },
    /// Redeems a coin by revealing its serial; `epoch` is the raw scheme id
    CoinSpend {
        serial: SerialNumber,
        epoch: u8,
        value: Amount,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TxOutput {
    Payment { address: Address, value: Amount },
    /// Publishes a coin commitment; `epoch` is the raw scheme id
    Mint {
        commitment: Commitment,
        epoch: u8,
        value: Amount,
    },
}

impl TxOutput {
    pub fn value(&self) -> Amount {
        match self {
            TxOutput::Payment { value, .. } | TxOutput::Mint { value, .. } => *value,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainTransaction {
    pub txid: TxId,
    pub coinbase: bool,
    pub inputs: Vec<TxInput>,
    pub outputs: Vec<TxOutput>,
    /// Author-chosen entropy so identical bodies get distinct ids
    pub nonce: u64,
}

impl ChainTransaction {
    /// Build a transaction and derive its id from the body
    pub fn new(coinbase: bool, inputs: Vec<TxInput>, outputs: Vec<TxOutput>, nonce: u64) -> Self {
        let txid = Self::compute_txid(coinbase, &inputs, &outputs, nonce);
        Self {
            txid,
            coinbase,
            inputs,
            outputs,
            nonce,
        }
    }

    pub fn compute_txid(
        coinbase: bool,
        inputs: &[TxInput],
        outputs: &[TxOutput],
        nonce: u64,
    ) -> TxId {
        // serde_json over these plain enums cannot fail
        let body = serde_json::to_vec(&(coinbase, inputs, outputs, nonce)).unwrap_or_default();
        TxId::from_body(&body)
    }

    pub fn has_valid_txid(&self) -> bool {
        self.txid == Self::compute_txid(self.coinbase, &self.inputs, &self.outputs, self.nonce)
    }

    pub fn outpoint(&self, index: u32) -> OutPoint {
        OutPoint::new(self.txid, index)
    }

    pub fn revealed_serials(&self) -> impl Iterator<Item = &SerialNumber> {
        self.inputs.iter().filter_map(|input| match input {
            TxInput::CoinSpend { serial, .. } => Some(serial),
            TxInput::Transparent { .. } => None,
        })
    }

    pub fn commitments(&self) -> impl Iterator<Item = &Commitment> {
        self.outputs.iter().filter_map(|output| match output {
            TxOutput::Mint { commitment, .. } => Some(commitment),
            TxOutput::Payment { .. } => None,
        })
    }

    pub fn output_total(&self) -> Amount {
        self.outputs.iter().map(TxOutput::value).sum()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    pub height: u64,
    pub hash: BlockHash,
    pub prev_hash: BlockHash,
    /// Block timestamp in seconds
    pub time: u64,
    pub transactions: Vec<ChainTransaction>,
}

impl Block {
    pub fn new(height: u64, prev_hash: BlockHash, time: u64, transactions: Vec<ChainTransaction>) -> Self {
        let hash = Self::compute_hash(height, &prev_hash, time, &transactions);
        Self {
            height,
            hash,
            prev_hash,
            time,
            transactions,
        }
    }

    pub fn compute_hash(
        height: u64,
        prev_hash: &BlockHash,
        time: u64,
        transactions: &[ChainTransaction],
    ) -> BlockHash {
        let txids: Vec<u8> = transactions
            .iter()
            .flat_map(|tx| tx.txid.as_bytes().to_vec())
            .collect();
        BlockHash::new(hash_parts(
            b"mintspend.block",
            &[
                &height.to_le_bytes(),
                prev_hash.as_bytes(),
                &time.to_le_bytes(),
                &txids,
            ],
        ))
    }
}
