use anyhow::{Context, Result};
use rusqlite::Connection;
use std::sync::{Arc, Mutex, MutexGuard};

/// Shared handle to the SQLite database. Connections are not Sync, so all
/// access goes through a mutex; callers on the async runtime wrap statement
/// execution in `spawn_blocking`.
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    pub fn new(db_path: &str) -> Result<Self> {
        let db_path = db_path.strip_prefix("sqlite:").unwrap_or(db_path);
        let conn = Connection::open(db_path).context("Failed to open database")?;

        let db = Database {
            conn: Arc::new(Mutex::new(conn)),
        };
        db.create_tables()?;
        Ok(db)
    }

    pub fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| anyhow::anyhow!("database mutex poisoned"))
    }

    fn create_tables(&self) -> Result<()> {
        let conn = self.lock()?;

        // Single-row sync cursor
        conn.execute(
            "CREATE TABLE IF NOT EXISTS sync_state (
                id INTEGER PRIMARY KEY CHECK (id = 1),
                last_block INTEGER NOT NULL
            )",
            [],
        )?;

        // Append-only signed-delta ledger; the primary key gives
        // duplicate-insert suppression for at-least-once delivery
        conn.execute(
            "CREATE TABLE IF NOT EXISTS deltas (
                tx_hash TEXT NOT NULL,
                log_index INTEGER NOT NULL,
                address TEXT NOT NULL,
                block_number INTEGER NOT NULL,
                amount TEXT NOT NULL,
                PRIMARY KEY (tx_hash, log_index, address)
            )",
            [],
        )?;

        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_deltas_address
             ON deltas(address)",
            [],
        )?;

        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_deltas_block_number
             ON deltas(block_number)",
            [],
        )?;

        // Derived balances; balance is stored zero-padded so text order
        // matches numeric order for the holders listing
        conn.execute(
            "CREATE TABLE IF NOT EXISTS balances (
                address TEXT PRIMARY KEY,
                balance TEXT NOT NULL
            )",
            [],
        )?;

        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_balances_balance
             ON balances(balance DESC, address ASC)",
            [],
        )?;

        Ok(())
    }
}
