use crate::query::formatters::{OutputFormat, format_balance, format_holders, format_status};
use crate::store::{BalanceRepository, CursorRepository, Database, SignedAmount};
use alloy_primitives::Address;
use anyhow::Result;
use std::str::FromStr;

pub fn cmd_holders(
    db: &Database,
    limit: usize,
    cursor: Option<&str>,
    format: &OutputFormat,
) -> Result<()> {
    let conn = db.lock()?;
    let page = BalanceRepository::new(&conn).list_holders(limit, cursor)?;
    println!("{}", format_holders(&page, format));
    Ok(())
}

pub fn cmd_balance(db: &Database, address: &str, format: &OutputFormat) -> Result<()> {
    let address = Address::from_str(address)
        .map_err(|_| anyhow::anyhow!("Invalid address format: {}", address))?;

    let conn = db.lock()?;
    let balance = BalanceRepository::new(&conn)
        .get(&address)?
        .unwrap_or(SignedAmount::ZERO);
    println!("{}", format_balance(&address, &balance, format));
    Ok(())
}

pub fn cmd_status(db: &Database, format: &OutputFormat) -> Result<()> {
    let conn = db.lock()?;
    // read-only lookup; an indexer that has never run reports block 0
    let last_block = CursorRepository::new(&conn).get()?.unwrap_or(0);
    println!("{}", format_status(last_block, format));
    Ok(())
}
