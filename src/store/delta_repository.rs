use super::models::{Delta, SignedAmount};
use alloy_primitives::Address;
use anyhow::Result;
use rusqlite::params;
use std::str::FromStr;

pub struct DeltaRepository<'a> {
    conn: &'a rusqlite::Connection,
}

impl<'a> DeltaRepository<'a> {
    const INSERT_DELTA: &'static str = "INSERT OR IGNORE INTO deltas (
            tx_hash, log_index, address, block_number, amount
        ) VALUES (?1, ?2, ?3, ?4, ?5)";

    const SELECT_AMOUNTS_FOR_ADDRESS: &'static str =
        "SELECT amount FROM deltas WHERE address = ?1";

    pub fn new(conn: &'a rusqlite::Connection) -> Self {
        Self { conn }
    }

    /// Idempotent append: a delta whose (tx_hash, log_index, address) key is
    /// already present is silently skipped, so at-least-once redelivery of a
    /// log never double-counts. Returns how many rows were actually new.
    pub fn insert_batch(&self, deltas: &[Delta]) -> Result<usize> {
        let tx = self.conn.unchecked_transaction()?;
        let mut inserted = 0;

        {
            let mut stmt = tx.prepare(Self::INSERT_DELTA)?;

            for delta in deltas {
                inserted += stmt.execute(params![
                    format!("{:?}", delta.tx_hash),
                    delta.log_index,
                    format!("{:?}", delta.address),
                    delta.block_number,
                    delta.amount.to_string(),
                ])?;
            }
        }

        tx.commit()?;
        Ok(inserted)
    }

    /// Order-independent aggregate over the address's full delta history.
    pub fn sum_for_address(&self, address: &Address) -> Result<SignedAmount> {
        let mut stmt = self.conn.prepare(Self::SELECT_AMOUNTS_FOR_ADDRESS)?;
        let amounts = stmt
            .query_map(params![format!("{address:?}")], |row| {
                row.get::<_, String>(0)
            })?
            .collect::<Result<Vec<_>, _>>()?;

        let mut total = SignedAmount::ZERO;
        for raw in amounts {
            let amount = SignedAmount::from_str(&raw)?;
            total = total
                .checked_add(amount)
                .ok_or_else(|| anyhow::anyhow!("overflow summing deltas for {address:?}"))?;
        }
        Ok(total)
    }

    pub fn count(&self) -> Result<usize> {
        let count: usize = self
            .conn
            .query_row("SELECT COUNT(*) FROM deltas", [], |row| row.get(0))?;
        Ok(count)
    }
}
