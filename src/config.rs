use alloy_primitives::Address;
use anyhow::{Context, Result};
use std::str::FromStr;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct Config {
    pub json_rpc_urls: Vec<String>,
    pub contract_address: Address,
    pub confirmations: u64,
    pub database_url: String,
    pub log_page_size: usize,
    pub sync_interval: Duration,
    pub worker_count: usize,
    pub task_timeout: Duration,
    pub max_task_attempts: u32,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenv::dotenv().ok();

        let json_rpc_urls: Vec<String> = std::env::var("JSON_RPC_URLS")
            .context("JSON_RPC_URLS must be set in .env")?
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let contract_address_str =
            std::env::var("CONTRACT_ADDRESS").context("CONTRACT_ADDRESS must be set in .env")?;

        let contract_address = Address::from_str(&contract_address_str)
            .context("Invalid CONTRACT_ADDRESS format")?;

        let confirmations: u64 = std::env::var("CONFIRMATIONS")
            .context("CONFIRMATIONS must be set in .env")?
            .parse()
            .context("CONFIRMATIONS must be a non-negative integer")?;

        let database_url = std::env::var("DATABASE_URL")
            .unwrap_or_else(|_| "sqlite:./indexer.db".to_string());

        Ok(Config {
            json_rpc_urls,
            contract_address,
            confirmations,
            database_url,
            log_page_size: env_or("LOG_PAGE_SIZE", 1000)?,
            sync_interval: Duration::from_secs(env_or("SYNC_INTERVAL_SECS", 15)?),
            worker_count: env_or("WORKER_COUNT", 4)?,
            task_timeout: Duration::from_secs(env_or("TASK_TIMEOUT_SECS", 180)?),
            max_task_attempts: env_or("MAX_TASK_ATTEMPTS", 5)?,
        })
    }
}

fn env_or<T: FromStr>(key: &str, default: T) -> Result<T>
where
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match std::env::var(key) {
        Ok(raw) => raw.parse().with_context(|| format!("Invalid {key} value")),
        Err(_) => Ok(default),
    }
}
