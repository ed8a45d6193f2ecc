//! SQLite storage implementation for wallet state
//!
//! This module provides a SQLite-based storage backend that implements the
//! `WalletStorage` trait. Hex-encoded identifiers are stored as TEXT so the
//! database stays readable with the sqlite3 shell.

#[cfg(feature = "storage")]
use async_trait::async_trait;
#[cfg(feature = "storage")]
use rusqlite::{params, OptionalExtension};
#[cfg(feature = "storage")]
use std::path::Path;
#[cfg(feature = "storage")]
use tokio_rusqlite::Connection;

#[cfg(feature = "storage")]
use crate::{
    data_structures::{
        chain::OutPoint,
        coin_records::{MintRecord, SpendRecord},
        denomination::{CoinEpoch, Denomination},
        types::{Address, BlockHash, Commitment, Randomness, SerialNumber, TxId},
        wallet_transaction::{TxCategory, WalletTxRecord},
    },
    errors::{WalletError, WalletResult},
    storage::{
        owned_output::{OutputStatus, OwnedOutput},
        performance_optimizations::SqlitePerformanceConfig,
        storage_trait::{StorageBatch, StorageStats, WalletStorage},
    },
};

#[cfg(feature = "storage")]
const SCANNED_HEIGHT_KEY: &str = "scanned_height";

#[cfg(feature = "storage")]
type MintRow = (String, String, String, i64, String, String, i64, bool, Option<String>);
#[cfg(feature = "storage")]
type SpendRow = (String, String, Option<i64>, i64);
#[cfg(feature = "storage")]
type TransactionRow = (
    String,
    String,
    i64,
    Option<String>,
    i64,
    Option<String>,
    Option<i64>,
    i64,
    bool,
);
#[cfg(feature = "storage")]
type OutputRow = (String, i64, String, i64, Option<i64>, bool, i64, Option<String>);

/// SQLite storage backend for wallet state
#[cfg(feature = "storage")]
pub struct SqliteStorage {
    connection: Connection,
    performance_config: SqlitePerformanceConfig,
}

#[cfg(feature = "storage")]
impl SqliteStorage {
    /// Open (or create) a database file with production settings
    pub async fn new<P: AsRef<Path>>(database_path: P) -> WalletResult<Self> {
        Self::new_with_config(database_path, SqlitePerformanceConfig::production_optimized()).await
    }

    pub async fn new_with_config<P: AsRef<Path>>(
        database_path: P,
        performance_config: SqlitePerformanceConfig,
    ) -> WalletResult<Self> {
        let connection = Connection::open(database_path).await.map_err(|e| {
            WalletError::StorageError(format!("Failed to open SQLite database: {e}"))
        })?;
        Self::with_connection(connection, performance_config).await
    }

    /// Create an in-memory SQLite storage instance (useful for testing)
    pub async fn new_in_memory() -> WalletResult<Self> {
        let connection = Connection::open_in_memory().await.map_err(|e| {
            WalletError::StorageError(format!("Failed to create in-memory database: {e}"))
        })?;
        Self::with_connection(connection, SqlitePerformanceConfig::ultra_fast()).await
    }

    async fn with_connection(
        connection: Connection,
        performance_config: SqlitePerformanceConfig,
    ) -> WalletResult<Self> {
        let storage = Self {
            connection,
            performance_config,
        };
        storage
            .performance_config
            .apply_to_connection(&storage.connection)
            .await?;
        Ok(storage)
    }

    pub fn performance_config(&self) -> &SqlitePerformanceConfig {
        &self.performance_config
    }

    /// Create the database schema
    async fn create_schema(&self) -> WalletResult<()> {
        let sql = r#"
            -- Coin secrets: never purged by any recovery mode
            CREATE TABLE IF NOT EXISTS mint_secrets (
                serial_hex TEXT PRIMARY KEY,
                randomness_hex TEXT NOT NULL,
                commitment_hex TEXT NOT NULL UNIQUE,
                epoch INTEGER NOT NULL,
                denomination TEXT NOT NULL,
                mint_txid TEXT NOT NULL,
                mint_height INTEGER NOT NULL,
                spent BOOLEAN NOT NULL DEFAULT FALSE,
                spend_txid TEXT,
                created_at DATETIME DEFAULT CURRENT_TIMESTAMP,
                updated_at DATETIME DEFAULT CURRENT_TIMESTAMP
            );

            CREATE TABLE IF NOT EXISTS coin_spends (
                spend_txid TEXT PRIMARY KEY,
                serials_json TEXT NOT NULL,
                height INTEGER,
                outputs_created INTEGER NOT NULL DEFAULT 0
            );

            -- Transaction cache; seq preserves insertion order across upserts
            CREATE TABLE IF NOT EXISTS wallet_transactions (
                seq INTEGER PRIMARY KEY AUTOINCREMENT,
                txid TEXT NOT NULL UNIQUE,
                category TEXT NOT NULL,
                amount INTEGER NOT NULL,
                address TEXT,
                confirmations INTEGER NOT NULL DEFAULT 0,
                block_hash TEXT,
                block_height INTEGER,
                time_received INTEGER NOT NULL,
                involves_watchonly BOOLEAN NOT NULL DEFAULT FALSE
            );

            CREATE TABLE IF NOT EXISTS wallet_outputs (
                txid TEXT NOT NULL,
                output_index INTEGER NOT NULL,
                address TEXT NOT NULL,
                value INTEGER NOT NULL,
                height INTEGER,
                coinbase BOOLEAN NOT NULL DEFAULT FALSE,
                status INTEGER NOT NULL DEFAULT 0,
                spent_in TEXT,
                PRIMARY KEY (txid, output_index)
            );

            CREATE TABLE IF NOT EXISTS wallet_meta (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_mint_secrets_spend_txid ON mint_secrets(spend_txid);
            CREATE INDEX IF NOT EXISTS idx_wallet_transactions_height ON wallet_transactions(block_height);
            CREATE INDEX IF NOT EXISTS idx_wallet_outputs_status ON wallet_outputs(status);

            CREATE TRIGGER IF NOT EXISTS update_mint_secrets_timestamp
                AFTER UPDATE ON mint_secrets
                BEGIN
                    UPDATE mint_secrets SET updated_at = CURRENT_TIMESTAMP WHERE serial_hex = NEW.serial_hex;
                END;
        "#;

        self.connection
            .call(move |conn| {
                conn.execute_batch(sql)?;
                Ok(())
            })
            .await
            .map_err(|e| WalletError::StorageError(format!("Failed to create schema: {e}")))?;

        Ok(())
    }
}

#[cfg(feature = "storage")]
fn decode_mint(row: MintRow) -> WalletResult<MintRecord> {
    let (serial, randomness, commitment, epoch, denomination, mint_txid, mint_height, spent, spend_txid) =
        row;
    let corrupted = |field: &str, e: String| {
        WalletError::SecretsCorrupted(format!("mint {serial}: unreadable {field}: {e}"))
    };
    let epoch_id = u8::try_from(epoch).map_err(|e| corrupted("epoch", e.to_string()))?;
    Ok(MintRecord {
        serial_number: SerialNumber::from_hex(&serial).map_err(|e| corrupted("serial", e))?,
        randomness: Randomness::from_hex(&randomness).map_err(|e| corrupted("randomness", e))?,
        commitment: Commitment::from_hex(&commitment).map_err(|e| corrupted("commitment", e))?,
        epoch: CoinEpoch::try_from(epoch_id).map_err(|e| corrupted("epoch", e.to_string()))?,
        denomination: denomination
            .parse::<Denomination>()
            .map_err(|e| corrupted("denomination", e.to_string()))?,
        mint_txid: TxId::from_hex(&mint_txid).map_err(|e| corrupted("mint txid", e))?,
        mint_height: mint_height as u64,
        spent,
        spend_txid: spend_txid
            .map(|s| TxId::from_hex(&s))
            .transpose()
            .map_err(|e| corrupted("spend txid", e))?,
    })
}

#[cfg(feature = "storage")]
fn decode_spend(row: SpendRow) -> WalletResult<SpendRecord> {
    let (txid, serials_json, height, outputs_created) = row;
    let serials: Vec<SerialNumber> = serde_json::from_str(&serials_json)
        .map_err(|e| WalletError::StorageError(format!("Failed to decode spend {txid}: {e}")))?;
    Ok(SpendRecord {
        spend_txid: TxId::from_hex(&txid).map_err(WalletError::StorageError)?,
        serials_consumed: serials,
        height: height.map(|h| h as u64),
        outputs_created: outputs_created as u32,
    })
}

#[cfg(feature = "storage")]
fn decode_transaction(row: TransactionRow) -> WalletResult<WalletTxRecord> {
    let (txid, category, amount, address, confirmations, block_hash, block_height, time_received, watchonly) =
        row;
    Ok(WalletTxRecord {
        txid: TxId::from_hex(&txid).map_err(WalletError::StorageError)?,
        category: category.parse::<TxCategory>()?,
        amount,
        address: address.map(Address::new),
        confirmations: confirmations as u64,
        block_hash: block_hash
            .map(|h| BlockHash::from_hex(&h))
            .transpose()
            .map_err(WalletError::StorageError)?,
        block_height: block_height.map(|h| h as u64),
        time_received: time_received as u64,
        involves_watchonly: watchonly,
    })
}

#[cfg(feature = "storage")]
fn decode_output(row: OutputRow) -> WalletResult<OwnedOutput> {
    let (txid, index, address, value, height, coinbase, status, spent_in) = row;
    Ok(OwnedOutput {
        outpoint: OutPoint::new(
            TxId::from_hex(&txid).map_err(WalletError::StorageError)?,
            index as u32,
        ),
        address: Address::new(address),
        value,
        height: height.map(|h| h as u64),
        coinbase,
        status: OutputStatus::from(status as u32),
        spent_in: spent_in
            .map(|s| TxId::from_hex(&s))
            .transpose()
            .map_err(WalletError::StorageError)?,
    })
}

#[cfg(feature = "storage")]
#[async_trait]
impl WalletStorage for SqliteStorage {
    async fn initialize(&self) -> WalletResult<()> {
        self.create_schema().await
    }

    async fn load_mints(&self) -> WalletResult<Vec<MintRecord>> {
        let rows: Vec<MintRow> = self
            .connection
            .call(|conn| {
                let mut stmt = conn.prepare(
                    "SELECT serial_hex, randomness_hex, commitment_hex, epoch, denomination,
                            mint_txid, mint_height, spent, spend_txid
                     FROM mint_secrets ORDER BY rowid",
                )?;
                let rows = stmt
                    .query_map([], |row| {
                        Ok((
                            row.get(0)?,
                            row.get(1)?,
                            row.get(2)?,
                            row.get(3)?,
                            row.get(4)?,
                            row.get(5)?,
                            row.get(6)?,
                            row.get(7)?,
                            row.get(8)?,
                        ))
                    })?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(rows)
            })
            .await
            .map_err(|e| WalletError::SecretsCorrupted(format!("Failed to read mint secrets: {e}")))?;

        rows.into_iter().map(decode_mint).collect()
    }

    async fn load_spends(&self) -> WalletResult<Vec<SpendRecord>> {
        let rows: Vec<SpendRow> = self
            .connection
            .call(|conn| {
                let mut stmt = conn.prepare(
                    "SELECT spend_txid, serials_json, height, outputs_created
                     FROM coin_spends ORDER BY rowid",
                )?;
                let rows = stmt
                    .query_map([], |row| {
                        Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?))
                    })?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(rows)
            })
            .await
            .map_err(|e| WalletError::StorageError(format!("Failed to load spends: {e}")))?;

        rows.into_iter().map(decode_spend).collect()
    }

    async fn load_transactions(&self) -> WalletResult<Vec<WalletTxRecord>> {
        let rows: Vec<TransactionRow> = self
            .connection
            .call(|conn| {
                let mut stmt = conn.prepare(
                    "SELECT txid, category, amount, address, confirmations, block_hash,
                            block_height, time_received, involves_watchonly
                     FROM wallet_transactions ORDER BY seq",
                )?;
                let rows = stmt
                    .query_map([], |row| {
                        Ok((
                            row.get(0)?,
                            row.get(1)?,
                            row.get(2)?,
                            row.get(3)?,
                            row.get(4)?,
                            row.get(5)?,
                            row.get(6)?,
                            row.get(7)?,
                            row.get(8)?,
                        ))
                    })?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(rows)
            })
            .await
            .map_err(|e| WalletError::StorageError(format!("Failed to load transactions: {e}")))?;

        rows.into_iter().map(decode_transaction).collect()
    }

    async fn load_outputs(&self) -> WalletResult<Vec<OwnedOutput>> {
        let rows: Vec<OutputRow> = self
            .connection
            .call(|conn| {
                let mut stmt = conn.prepare(
                    "SELECT txid, output_index, address, value, height, coinbase, status, spent_in
                     FROM wallet_outputs ORDER BY txid, output_index",
                )?;
                let rows = stmt
                    .query_map([], |row| {
                        Ok((
                            row.get(0)?,
                            row.get(1)?,
                            row.get(2)?,
                            row.get(3)?,
                            row.get(4)?,
                            row.get(5)?,
                            row.get(6)?,
                            row.get(7)?,
                        ))
                    })?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(rows)
            })
            .await
            .map_err(|e| WalletError::StorageError(format!("Failed to load outputs: {e}")))?;

        rows.into_iter().map(decode_output).collect()
    }

    async fn get_scanned_height(&self) -> WalletResult<Option<u64>> {
        let value: Option<String> = self
            .connection
            .call(|conn| {
                Ok(conn
                    .query_row(
                        "SELECT value FROM wallet_meta WHERE key = ?1",
                        params![SCANNED_HEIGHT_KEY],
                        |row| row.get(0),
                    )
                    .optional()?)
            })
            .await
            .map_err(|e| WalletError::StorageError(format!("Failed to read scanned height: {e}")))?;

        value
            .map(|v| {
                v.parse::<u64>().map_err(|e| {
                    WalletError::StorageError(format!("Invalid scanned height {v}: {e}"))
                })
            })
            .transpose()
    }

    async fn commit(&self, batch: StorageBatch) -> WalletResult<()> {
        if batch.is_empty() {
            return Ok(());
        }
        let mut spend_rows = Vec::with_capacity(batch.spends.len());
        for spend in &batch.spends {
            spend_rows.push((
                spend.spend_txid.to_hex(),
                serde_json::to_string(&spend.serials_consumed)?,
                spend.height.map(|h| h as i64),
                spend.outputs_created as i64,
            ));
        }

        self.connection
            .call(move |conn| {
                let tx = conn.transaction()?;

                if batch.replace_derived {
                    tx.execute_batch(
                        "DELETE FROM coin_spends;
                         DELETE FROM wallet_transactions;
                         DELETE FROM wallet_outputs;",
                    )?;
                }

                {
                    // Secret columns are only ever written on first insert
                    let mut stmt = tx.prepare(
                        "INSERT INTO mint_secrets
                            (serial_hex, randomness_hex, commitment_hex, epoch, denomination,
                             mint_txid, mint_height, spent, spend_txid)
                         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
                         ON CONFLICT(serial_hex) DO UPDATE SET
                             mint_height = excluded.mint_height,
                             spent = excluded.spent,
                             spend_txid = excluded.spend_txid",
                    )?;
                    for mint in &batch.mints {
                        stmt.execute(params![
                            mint.serial_number.to_hex(),
                            mint.randomness.to_hex(),
                            mint.commitment.to_hex(),
                            mint.epoch.id() as i64,
                            mint.denomination.as_str(),
                            mint.mint_txid.to_hex(),
                            mint.mint_height as i64,
                            mint.spent,
                            mint.spend_txid.map(|t| t.to_hex()),
                        ])?;
                    }
                }

                {
                    let mut stmt = tx.prepare(
                        "INSERT INTO coin_spends (spend_txid, serials_json, height, outputs_created)
                         VALUES (?1, ?2, ?3, ?4)
                         ON CONFLICT(spend_txid) DO UPDATE SET
                             serials_json = excluded.serials_json,
                             height = excluded.height,
                             outputs_created = excluded.outputs_created",
                    )?;
                    for (txid, serials, height, outputs_created) in &spend_rows {
                        stmt.execute(params![txid, serials, height, outputs_created])?;
                    }
                }

                {
                    let mut stmt = tx.prepare(
                        "INSERT INTO wallet_transactions
                            (txid, category, amount, address, confirmations, block_hash,
                             block_height, time_received, involves_watchonly)
                         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
                         ON CONFLICT(txid) DO UPDATE SET
                             category = excluded.category,
                             amount = excluded.amount,
                             address = excluded.address,
                             confirmations = excluded.confirmations,
                             block_hash = excluded.block_hash,
                             block_height = excluded.block_height,
                             time_received = excluded.time_received,
                             involves_watchonly = excluded.involves_watchonly",
                    )?;
                    for record in &batch.transactions {
                        stmt.execute(params![
                            record.txid.to_hex(),
                            record.category.as_str(),
                            record.amount,
                            record.address.as_ref().map(|a| a.as_str().to_string()),
                            record.confirmations as i64,
                            record.block_hash.map(|h| h.to_hex()),
                            record.block_height.map(|h| h as i64),
                            record.time_received as i64,
                            record.involves_watchonly,
                        ])?;
                    }
                }

                {
                    let mut stmt = tx.prepare(
                        "INSERT OR REPLACE INTO wallet_outputs
                            (txid, output_index, address, value, height, coinbase, status, spent_in)
                         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                    )?;
                    for output in &batch.outputs {
                        stmt.execute(params![
                            output.outpoint.txid.to_hex(),
                            output.outpoint.index as i64,
                            output.address.as_str(),
                            output.value,
                            output.height.map(|h| h as i64),
                            output.coinbase,
                            u32::from(output.status) as i64,
                            output.spent_in.map(|t| t.to_hex()),
                        ])?;
                    }
                }

                if let Some(height) = batch.scanned_height {
                    tx.execute(
                        "INSERT INTO wallet_meta (key, value) VALUES (?1, ?2)
                         ON CONFLICT(key) DO UPDATE SET value = excluded.value",
                        params![SCANNED_HEIGHT_KEY, height.to_string()],
                    )?;
                }

                tx.commit()?;
                Ok(())
            })
            .await
            .map_err(|e| WalletError::StorageError(format!("Failed to commit batch: {e}")))
    }

    async fn get_statistics(&self) -> WalletResult<StorageStats> {
        let (mints, unspent, spends, transactions, unconfirmed, outputs) = self
            .connection
            .call(|conn| {
                let count = |sql: &str| -> rusqlite::Result<i64> { conn.query_row(sql, [], |row| row.get(0)) };
                Ok((
                    count("SELECT COUNT(*) FROM mint_secrets")?,
                    count("SELECT COUNT(*) FROM mint_secrets WHERE spent = FALSE")?,
                    count("SELECT COUNT(*) FROM coin_spends")?,
                    count("SELECT COUNT(*) FROM wallet_transactions")?,
                    count("SELECT COUNT(*) FROM wallet_transactions WHERE block_hash IS NULL")?,
                    count("SELECT COUNT(*) FROM wallet_outputs")?,
                ))
            })
            .await
            .map_err(|e| WalletError::StorageError(format!("Failed to get statistics: {e}")))?;

        Ok(StorageStats {
            mint_count: mints as usize,
            unspent_mint_count: unspent as usize,
            spend_count: spends as usize,
            transaction_count: transactions as usize,
            unconfirmed_transaction_count: unconfirmed as usize,
            output_count: outputs as usize,
            scanned_height: self.get_scanned_height().await?,
        })
    }

    async fn close(&self) -> WalletResult<()> {
        // tokio-rusqlite closes the connection when the handle drops; flush the WAL first
        self.connection
            .call(|conn| {
                conn.query_row("PRAGMA wal_checkpoint(TRUNCATE)", [], |_| Ok(()))?;
                Ok(())
            })
            .await
            .map_err(|e| WalletError::StorageError(format!("Failed to checkpoint database: {e}")))
    }
}

#[cfg(all(test, feature = "storage"))]
mod tests {
    use super::*;
    use crate::{data_structures::denomination::EpochSchedule, ledger::CoinLedger};

    fn txid(n: u8) -> TxId {
        TxId::new([n; 32])
    }

    fn tx_record(n: u8, height: Option<u64>) -> WalletTxRecord {
        WalletTxRecord {
            txid: txid(n),
            category: TxCategory::Send,
            amount: -(n as i64),
            address: Some(Address::from("foreign")),
            confirmations: 1,
            block_hash: height.map(|_| BlockHash::new([n; 32])),
            block_height: height,
            time_received: 42,
            involves_watchonly: false,
        }
    }

    #[tokio::test]
    async fn test_round_trip_all_tables() -> Result<(), Box<dyn std::error::Error>> {
        let storage = SqliteStorage::new_in_memory().await?;
        storage.initialize().await?;

        let mut ledger = CoinLedger::new(EpochSchedule::regtest());
        let mint = ledger.record_mint(Denomination::D25, 150, txid(1))?;
        ledger.try_link_spend(&mint.serial_number, txid(2), Some(160))?;
        let output = OwnedOutput::new(OutPoint::new(txid(3), 1), Address::from("w"), 77, Some(3), true);

        storage
            .commit(
                StorageBatch::new()
                    .with_mints(ledger.mints().to_vec())
                    .with_spends(ledger.spends().to_vec())
                    .with_transactions([tx_record(9, Some(5)), tx_record(4, None)])
                    .with_outputs([output.clone()])
                    .with_scanned_height(160),
            )
            .await?;

        assert_eq!(storage.load_mints().await?, ledger.mints().to_vec());
        assert_eq!(storage.load_spends().await?, ledger.spends().to_vec());
        assert_eq!(
            storage.load_transactions().await?,
            vec![tx_record(9, Some(5)), tx_record(4, None)]
        );
        assert_eq!(storage.load_outputs().await?, vec![output]);
        assert_eq!(storage.get_scanned_height().await?, Some(160));

        let stats = storage.get_statistics().await?;
        assert_eq!(stats.mint_count, 1);
        assert_eq!(stats.unspent_mint_count, 0);
        assert_eq!(stats.unconfirmed_transaction_count, 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_upsert_keeps_insertion_order() -> Result<(), Box<dyn std::error::Error>> {
        let storage = SqliteStorage::new_in_memory().await?;
        storage.initialize().await?;

        storage
            .commit(StorageBatch::new().with_transactions([tx_record(1, None), tx_record(2, None)]))
            .await?;
        storage
            .commit(StorageBatch::new().with_transactions([tx_record(1, Some(7))]))
            .await?;

        let loaded = storage.load_transactions().await?;
        assert_eq!(loaded[0], tx_record(1, Some(7)));
        assert_eq!(loaded[1].txid, txid(2));
        Ok(())
    }

    #[tokio::test]
    async fn test_replace_derived_keeps_secrets() -> Result<(), Box<dyn std::error::Error>> {
        let storage = SqliteStorage::new_in_memory().await?;
        storage.initialize().await?;

        let mut ledger = CoinLedger::new(EpochSchedule::regtest());
        let mint = ledger.record_mint(Denomination::D1, 150, txid(1))?;
        storage
            .commit(
                StorageBatch::new()
                    .with_mints([mint.clone()])
                    .with_transactions([tx_record(1, Some(150))]),
            )
            .await?;

        storage.commit(StorageBatch::replacing_derived()).await?;

        assert!(storage.load_transactions().await?.is_empty());
        let mints = storage.load_mints().await?;
        assert_eq!(mints.len(), 1);
        assert!(mints[0].same_secrets(&mint));
        Ok(())
    }

    #[tokio::test]
    async fn test_unreadable_secret_row_is_fatal() -> Result<(), Box<dyn std::error::Error>> {
        let storage = SqliteStorage::new_in_memory().await?;
        storage.initialize().await?;
        storage
            .connection
            .call(|conn| {
                conn.execute(
                    "INSERT INTO mint_secrets
                        (serial_hex, randomness_hex, commitment_hex, epoch, denomination, mint_txid, mint_height)
                     VALUES ('zz', 'not-hex', 'c0', 1, '10', 'aa', 3)",
                    [],
                )?;
                Ok(())
            })
            .await?;

        let err = storage.load_mints().await.unwrap_err();
        assert!(err.is_fatal());
        Ok(())
    }
}
