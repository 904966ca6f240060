use crate::error::SourceError;
use crate::source::{ChainDataSource, RawLog};
use alloy::providers::fillers::FillProvider;
use alloy::providers::{Provider, ProviderBuilder};
use alloy::rpc::types::{Filter, Log};
use alloy_primitives::{Address, B256};
use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::time::timeout;
use tokio_retry::Retry;
use tokio_retry::strategy::{ExponentialBackoff, jitter};
use tracing::{debug, warn};

type AlloyFullProvider = FillProvider<
    alloy::providers::fillers::JoinFill<
        alloy::providers::Identity,
        alloy::providers::fillers::JoinFill<
            alloy::providers::fillers::GasFiller,
            alloy::providers::fillers::JoinFill<
                alloy::providers::fillers::BlobGasFiller,
                alloy::providers::fillers::JoinFill<
                    alloy::providers::fillers::NonceFiller,
                    alloy::providers::fillers::ChainIdFiller,
                >,
            >,
        >,
    >,
    alloy::providers::RootProvider,
>;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(120); // 2 minutes timeout per request

/// JSON-RPC chain-data source with provider rotation and bounded
/// retry-with-backoff on transient failures.
#[derive(Clone)]
pub struct RpcClient {
    providers: Vec<AlloyFullProvider>,
    urls: Vec<String>,
    current_provider: Arc<AtomicUsize>,
    max_retries: usize,
}

impl RpcClient {
    pub fn new(rpc_urls: &[String]) -> Result<Self> {
        if rpc_urls.is_empty() {
            return Err(anyhow::anyhow!("At least one RPC URL must be provided"));
        }

        let mut providers = Vec::new();
        for url in rpc_urls {
            let parsed_url = url
                .parse()
                .map_err(|_| anyhow::anyhow!("Invalid RPC URL: {}", url))?;
            let provider: AlloyFullProvider = ProviderBuilder::new().connect_http(parsed_url);
            providers.push(provider);
        }

        Ok(RpcClient {
            providers,
            urls: rpc_urls.to_vec(),
            current_provider: Arc::new(AtomicUsize::new(0)),
            max_retries: 5,
        })
    }

    fn get_provider(&self) -> &AlloyFullProvider {
        let index = self.current_provider.load(Ordering::Relaxed) % self.providers.len();
        &self.providers[index]
    }

    pub fn get_current_url(&self) -> &str {
        let index = self.current_provider.load(Ordering::Relaxed) % self.urls.len();
        &self.urls[index]
    }

    pub fn rotate_provider(&self) {
        let current = self.current_provider.load(Ordering::Relaxed);
        let next = (current + 1) % self.providers.len();
        self.current_provider.store(next, Ordering::Relaxed);

        if self.providers.len() > 1 {
            debug!("Rotating to RPC provider #{}", next);
        }
    }

    fn get_retry_strategy(&self) -> impl Iterator<Item = Duration> {
        ExponentialBackoff::from_millis(100)
            .factor(2)
            .max_delay(Duration::from_secs(10))
            .map(jitter)
            .take(self.max_retries)
    }

    fn handle_error(&self, error_str: &str) -> SourceError {
        let current_url = self.get_current_url();
        warn!(
            "RPC error on {}: {}, rotating provider",
            current_url, error_str
        );
        self.rotate_provider();
        SourceError::Remote(error_str.to_string())
    }

    fn handle_timeout(&self) -> SourceError {
        let current_url = self.get_current_url();
        warn!(
            "Request timeout after {} seconds on {}, rotating provider",
            REQUEST_TIMEOUT.as_secs(),
            current_url
        );
        self.rotate_provider();
        SourceError::Timeout(REQUEST_TIMEOUT)
    }

    async fn latest_block(&self) -> Result<u64, SourceError> {
        let client = self.clone();
        Retry::spawn(self.get_retry_strategy(), move || {
            let client = client.clone();
            async move {
                let provider = client.get_provider();
                match timeout(REQUEST_TIMEOUT, provider.get_block_number()).await {
                    Ok(Ok(block_number)) => Ok(block_number),
                    Ok(Err(e)) => Err(client.handle_error(&e.to_string())),
                    Err(_) => Err(client.handle_timeout()),
                }
            }
        })
        .await
    }

    async fn fetch_logs(
        &self,
        contract_address: Address,
        topic0: B256,
        from_block: u64,
        to_block: u64,
    ) -> Result<Vec<Log>, SourceError> {
        let client = self.clone();
        Retry::spawn(self.get_retry_strategy(), move || {
            let client = client.clone();
            async move {
                let provider = client.get_provider();
                let filter = Filter::new()
                    .address(contract_address)
                    .event_signature(topic0)
                    .from_block(from_block)
                    .to_block(to_block);

                match timeout(REQUEST_TIMEOUT, provider.get_logs(&filter)).await {
                    Ok(Ok(logs)) => Ok(logs),
                    Ok(Err(e)) => Err(client.handle_error(&e.to_string())),
                    Err(_) => Err(client.handle_timeout()),
                }
            }
        })
        .await
    }
}

fn to_raw_log(log: Log) -> Option<RawLog> {
    // pending logs lack position fields; a confirmed range should never
    // contain one, so skip it with a warning if it somehow shows up
    let (Some(block_number), Some(tx_hash), Some(log_index)) =
        (log.block_number, log.transaction_hash, log.log_index)
    else {
        warn!("Skipping log without position fields: {:?}", log);
        return None;
    };

    Some(RawLog {
        block_number,
        tx_hash,
        log_index,
        topics: log.topics().to_vec(),
        data: log.data().data.clone(),
    })
}

#[async_trait]
impl ChainDataSource for RpcClient {
    async fn get_head(&self) -> Result<u64, SourceError> {
        self.latest_block().await
    }

    async fn get_transfer_logs(
        &self,
        address: Address,
        topic0: B256,
        from_block: u64,
        to_block: u64,
        page: usize,
        page_size: usize,
    ) -> Result<Vec<RawLog>, SourceError> {
        let logs = self
            .fetch_logs(address, topic0, from_block, to_block)
            .await?;

        let mut raw: Vec<RawLog> = logs.into_iter().filter_map(to_raw_log).collect();
        raw.sort_by_key(|l| (l.block_number, l.log_index));

        // eth_getLogs has no page parameter, so the full result is sliced
        // into the requested bounded page here
        let start = page.saturating_sub(1).saturating_mul(page_size);
        Ok(raw.into_iter().skip(start).take(page_size).collect())
    }
}
