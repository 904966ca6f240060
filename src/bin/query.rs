use anyhow::Result;
use clap::{Parser, Subcommand};
use holdings_indexer::config::Config;
use holdings_indexer::query::commands::{cmd_balance, cmd_holders, cmd_status};
use holdings_indexer::query::formatters::OutputFormat;
use holdings_indexer::store::Database;

#[derive(Parser)]
#[command(name = "query")]
#[command(about = "Query materialized token holder balances", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "table")]
    format: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List holders ordered by balance, keyset-paginated
    Holders {
        #[arg(long, default_value = "50")]
        limit: usize,

        /// Opaque cursor from a previous page
        #[arg(long)]
        cursor: Option<String>,
    },
    /// Materialized balance of one address
    Balance { address: String },
    /// Last fully-processed block
    Status,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let format = OutputFormat::from(cli.format.as_str());

    let config = Config::from_env()?;
    let db = Database::new(&config.database_url)?;

    match cli.command {
        Commands::Holders { limit, cursor } => {
            cmd_holders(&db, limit, cursor.as_deref(), &format)?;
        }
        Commands::Balance { address } => {
            cmd_balance(&db, &address, &format)?;
        }
        Commands::Status => {
            cmd_status(&db, &format)?;
        }
    }

    Ok(())
}
