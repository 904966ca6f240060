use crate::store::{Holder, HolderPage, SignedAmount};
use alloy_primitives::Address;
use comfy_table::{Cell, Table, modifiers::UTF8_ROUND_CORNERS, presets::UTF8_FULL};
use csv::Writer;
use serde::Serialize;
use serde_json::json;

#[derive(Debug, Clone)]
pub enum OutputFormat {
    Table,
    Json,
    Csv,
}

impl From<&str> for OutputFormat {
    fn from(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "json" => OutputFormat::Json,
            "csv" => OutputFormat::Csv,
            _ => OutputFormat::Table,
        }
    }
}

#[derive(Serialize)]
struct HolderRow {
    address: String,
    balance: String,
}

impl From<&Holder> for HolderRow {
    fn from(holder: &Holder) -> Self {
        HolderRow {
            address: format!("{:?}", holder.address),
            balance: holder.balance.to_string(),
        }
    }
}

pub fn format_holders(page: &HolderPage, format: &OutputFormat) -> String {
    match format {
        OutputFormat::Table => format_holders_table(page),
        OutputFormat::Json => format_holders_json(page),
        OutputFormat::Csv => format_holders_csv(page),
    }
}

fn format_holders_table(page: &HolderPage) -> String {
    if page.holders.is_empty() {
        return "No holders found.".to_string();
    }

    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_header(vec!["#", "Address", "Balance"]);

    for (i, holder) in page.holders.iter().enumerate() {
        table.add_row(vec![
            Cell::new(i + 1),
            Cell::new(format!("{:#}", holder.address)),
            Cell::new(holder.balance.to_string()),
        ]);
    }

    match &page.next_cursor {
        Some(cursor) => format!("{table}\nNext cursor: {cursor}"),
        None => table.to_string(),
    }
}

fn format_holders_json(page: &HolderPage) -> String {
    let items: Vec<HolderRow> = page.holders.iter().map(HolderRow::from).collect();
    serde_json::to_string_pretty(&json!({
        "items": items,
        "next_cursor": page.next_cursor,
    }))
    .unwrap_or_else(|_| "{}".to_string())
}

fn format_holders_csv(page: &HolderPage) -> String {
    let mut wtr = Writer::from_writer(vec![]);

    let _ = wtr.write_record(["address", "balance"]);
    for holder in &page.holders {
        let _ = wtr.write_record([
            &format!("{:?}", holder.address),
            &holder.balance.to_string(),
        ]);
    }

    String::from_utf8(wtr.into_inner().unwrap_or_default()).unwrap_or_default()
}

pub fn format_balance(address: &Address, balance: &SignedAmount, format: &OutputFormat) -> String {
    match format {
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .apply_modifier(UTF8_ROUND_CORNERS)
                .set_header(vec!["Address", "Balance"]);
            table.add_row(vec![
                Cell::new(format!("{address:#}")),
                Cell::new(balance.to_string()),
            ]);
            table.to_string()
        }
        OutputFormat::Json => json!({
            "address": format!("{address:?}"),
            "balance": balance.to_string(),
        })
        .to_string(),
        OutputFormat::Csv => {
            let mut wtr = Writer::from_writer(vec![]);
            let _ = wtr.write_record(["address", "balance"]);
            let _ = wtr.write_record([&format!("{address:?}"), &balance.to_string()]);
            String::from_utf8(wtr.into_inner().unwrap_or_default()).unwrap_or_default()
        }
    }
}

pub fn format_status(last_block: u64, format: &OutputFormat) -> String {
    match format {
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .apply_modifier(UTF8_ROUND_CORNERS)
                .set_header(vec!["Metric", "Value"]);
            table.add_row(vec![Cell::new("last_block"), Cell::new(last_block)]);
            table.to_string()
        }
        OutputFormat::Json => json!({ "last_block": last_block }).to_string(),
        OutputFormat::Csv => format!("metric,value\nlast_block,{last_block}\n"),
    }
}
