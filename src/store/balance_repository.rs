use super::models::SignedAmount;
use alloy_primitives::Address;
use anyhow::Result;
use rusqlite::{OptionalExtension, Row, params};
use std::str::FromStr;
use tracing::warn;

#[derive(Debug, Clone)]
pub struct Holder {
    pub address: Address,
    pub balance: SignedAmount,
}

#[derive(Debug, Clone, Default)]
pub struct HolderPage {
    pub holders: Vec<Holder>,
    pub next_cursor: Option<String>,
}

/// Derived balance table. Never the source of truth: every value in it is
/// replaceable by re-summing the delta ledger.
pub struct BalanceRepository<'a> {
    conn: &'a rusqlite::Connection,
}

impl<'a> BalanceRepository<'a> {
    const UPSERT_BALANCE: &'static str =
        "INSERT OR REPLACE INTO balances (address, balance) VALUES (?1, ?2)";

    const GET_BALANCE: &'static str = "SELECT balance FROM balances WHERE address = ?1";

    const LIST_FIRST_PAGE: &'static str = "SELECT address, balance FROM balances
         ORDER BY balance DESC, address ASC
         LIMIT ?1";

    const LIST_AFTER_CURSOR: &'static str = "SELECT address, balance FROM balances
         WHERE balance < ?1 OR (balance = ?1 AND address > ?2)
         ORDER BY balance DESC, address ASC
         LIMIT ?3";

    pub fn new(conn: &'a rusqlite::Connection) -> Self {
        Self { conn }
    }

    /// Full-replace upsert; the caller always supplies a value freshly
    /// recomputed from the complete delta history.
    pub fn upsert(&self, address: &Address, balance: &SignedAmount) -> Result<()> {
        // a holder can only go negative when the ledger is missing credits;
        // negative text also breaks the padded sort order used for paging
        if balance.is_negative() {
            warn!(
                "Negative balance {} for {:?}, delta ledger is incomplete",
                balance, address
            );
        }
        self.conn.execute(
            Self::UPSERT_BALANCE,
            params![format!("{address:?}"), balance.padded()],
        )?;
        Ok(())
    }

    pub fn get(&self, address: &Address) -> Result<Option<SignedAmount>> {
        let padded: Option<String> = self
            .conn
            .query_row(Self::GET_BALANCE, params![format!("{address:?}")], |row| {
                row.get(0)
            })
            .optional()?;

        match padded {
            Some(padded) => Ok(Some(SignedAmount::from_str(&padded)?)),
            None => Ok(None),
        }
    }

    /// Keyset pagination: the cursor carries the last row's (balance,
    /// address) sort key, so pages stay stable while balances move
    /// underneath. Ordered by balance descending, then address ascending.
    pub fn list_holders(&self, limit: usize, cursor: Option<&str>) -> Result<HolderPage> {
        let holders = match cursor {
            Some(cursor) => {
                let (balance, address) = decode_cursor(cursor)?;
                let mut stmt = self.conn.prepare(Self::LIST_AFTER_CURSOR)?;
                stmt.query_map(params![balance, address, limit], row_to_holder)?
                    .collect::<Result<Vec<_>, _>>()?
            }
            None => {
                let mut stmt = self.conn.prepare(Self::LIST_FIRST_PAGE)?;
                stmt.query_map(params![limit], row_to_holder)?
                    .collect::<Result<Vec<_>, _>>()?
            }
        };

        let next_cursor = if holders.len() == limit {
            holders
                .last()
                .map(|h| encode_cursor(&h.balance, &h.address))
        } else {
            None
        };

        Ok(HolderPage {
            holders,
            next_cursor,
        })
    }
}

pub fn encode_cursor(balance: &SignedAmount, address: &Address) -> String {
    format!("{}|{address:?}", balance.padded())
}

fn decode_cursor(cursor: &str) -> Result<(String, String)> {
    let (balance, address) = cursor
        .split_once('|')
        .ok_or_else(|| anyhow::anyhow!("invalid cursor"))?;
    // validate both halves so a mangled cursor fails loudly instead of
    // silently returning an empty page
    SignedAmount::from_str(balance).map_err(|_| anyhow::anyhow!("invalid cursor"))?;
    let address =
        Address::from_str(address).map_err(|_| anyhow::anyhow!("invalid cursor"))?;
    Ok((balance.to_string(), format!("{address:?}")))
}

fn row_to_holder(row: &Row) -> rusqlite::Result<Holder> {
    let address_str: String = row.get(0)?;
    let padded: String = row.get(1)?;

    let address = Address::from_str(&address_str).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, Box::new(e))
    })?;
    let balance = SignedAmount::from_str(&padded).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(1, rusqlite::types::Type::Text, Box::new(e))
    })?;

    Ok(Holder { address, balance })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::Database;
    use alloy_primitives::U256;

    fn seed(conn: &rusqlite::Connection, entries: &[(u8, u64)]) {
        let repo = BalanceRepository::new(conn);
        for (addr_byte, amount) in entries {
            repo.upsert(
                &Address::repeat_byte(*addr_byte),
                &SignedAmount::credit(U256::from(*amount)),
            )
            .unwrap();
        }
    }

    #[test]
    fn upsert_replaces() {
        let db = Database::new("sqlite::memory:").unwrap();
        let conn = db.lock().unwrap();
        let repo = BalanceRepository::new(&conn);
        let a = Address::repeat_byte(0x01);

        repo.upsert(&a, &SignedAmount::credit(U256::from(10))).unwrap();
        repo.upsert(&a, &SignedAmount::credit(U256::from(3))).unwrap();

        assert_eq!(
            repo.get(&a).unwrap(),
            Some(SignedAmount::credit(U256::from(3)))
        );
    }

    #[test]
    fn negative_balance_is_stored_and_read_back() {
        let db = Database::new("sqlite::memory:").unwrap();
        let conn = db.lock().unwrap();
        let repo = BalanceRepository::new(&conn);
        let a = Address::repeat_byte(0x06);

        // representable so a corrupted ledger is visible instead of masked
        repo.upsert(&a, &SignedAmount::debit(U256::from(9))).unwrap();

        assert_eq!(
            repo.get(&a).unwrap(),
            Some(SignedAmount::debit(U256::from(9)))
        );
    }

    #[test]
    fn holders_are_ordered_and_paginated() {
        let db = Database::new("sqlite::memory:").unwrap();
        let conn = db.lock().unwrap();
        // two holders tie on balance 50 to exercise the address tiebreak
        seed(&conn, &[(0x01, 100), (0x03, 50), (0x02, 50), (0x04, 7)]);

        let repo = BalanceRepository::new(&conn);
        let first = repo.list_holders(2, None).unwrap();
        assert_eq!(first.holders.len(), 2);
        assert_eq!(first.holders[0].address, Address::repeat_byte(0x01));
        assert_eq!(first.holders[1].address, Address::repeat_byte(0x02));
        let cursor = first.next_cursor.expect("full page yields a cursor");

        let second = repo.list_holders(2, Some(&cursor)).unwrap();
        assert_eq!(second.holders.len(), 2);
        assert_eq!(second.holders[0].address, Address::repeat_byte(0x03));
        assert_eq!(second.holders[1].address, Address::repeat_byte(0x04));

        // exactly-full last page: the follow-up cursor returns nothing
        if let Some(cursor) = second.next_cursor {
            let third = repo.list_holders(2, Some(&cursor)).unwrap();
            assert!(third.holders.is_empty());
            assert!(third.next_cursor.is_none());
        }
    }

    #[test]
    fn short_page_has_no_cursor() {
        let db = Database::new("sqlite::memory:").unwrap();
        let conn = db.lock().unwrap();
        seed(&conn, &[(0x01, 1)]);

        let page = BalanceRepository::new(&conn).list_holders(10, None).unwrap();
        assert_eq!(page.holders.len(), 1);
        assert!(page.next_cursor.is_none());
    }

    #[test]
    fn mangled_cursor_is_rejected() {
        let db = Database::new("sqlite::memory:").unwrap();
        let conn = db.lock().unwrap();
        let repo = BalanceRepository::new(&conn);

        assert!(repo.list_holders(10, Some("not a cursor")).is_err());
        assert!(repo.list_holders(10, Some("123|nothex")).is_err());
    }
}
