use anyhow::Result;
use rusqlite::{OptionalExtension, params};

/// Single-row sync cursor: the last fully-processed block number. Written
/// only by the head tracker, and only forwards.
pub struct CursorRepository<'a> {
    conn: &'a rusqlite::Connection,
}

impl<'a> CursorRepository<'a> {
    const GET_LAST_BLOCK: &'static str = "SELECT last_block FROM sync_state WHERE id = 1";

    const SEED_CURSOR: &'static str =
        "INSERT OR IGNORE INTO sync_state (id, last_block) VALUES (1, 0)";

    const ADVANCE_CURSOR: &'static str =
        "UPDATE sync_state SET last_block = ?1 WHERE id = 1 AND last_block < ?1";

    pub fn new(conn: &'a rusqlite::Connection) -> Self {
        Self { conn }
    }

    /// Read-only lookup; None until a tracker has seeded the row.
    pub fn get(&self) -> Result<Option<u64>> {
        let block = self
            .conn
            .query_row(Self::GET_LAST_BLOCK, [], |row| row.get(0))
            .optional()?;
        Ok(block)
    }

    /// Tracker-side read: a missing row reads as 0 and is seeded so later
    /// advances have a row to hit. Query paths use [`Self::get`] instead.
    pub fn last_block(&self) -> Result<u64> {
        match self.get()? {
            Some(block) => Ok(block),
            None => {
                self.conn.execute(Self::SEED_CURSOR, [])?;
                Ok(0)
            }
        }
    }

    /// Guarded update: the cursor only ever moves forward. Returns whether
    /// the stored value actually changed.
    pub fn advance(&self, block: u64) -> Result<bool> {
        let updated = self.conn.execute(Self::ADVANCE_CURSOR, params![block])?;
        Ok(updated > 0)
    }
}
