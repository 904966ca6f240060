use crate::error::SourceError;
use alloy_primitives::{Address, B256, Bytes};
use async_trait::async_trait;

/// One undecoded log entry as returned by the chain-data source. Consumed by
/// the decoder and discarded; never persisted.
#[derive(Debug, Clone)]
pub struct RawLog {
    pub block_number: u64,
    pub tx_hash: B256,
    pub log_index: u64,
    pub topics: Vec<B256>,
    pub data: Bytes,
}

/// Chain-data source as seen by the head tracker.
#[async_trait]
pub trait ChainDataSource: Send + Sync {
    /// Current chain head height.
    async fn get_head(&self) -> Result<u64, SourceError>;

    /// One bounded page of logs filtered to `address` and `topic0` within
    /// the inclusive block range, sorted ascending by
    /// (block_number, log_index). Page numbering starts at 1.
    ///
    /// A result of exactly `page_size` entries must be treated as possibly
    /// truncated; the tracker subdivides the range instead of trusting it.
    async fn get_transfer_logs(
        &self,
        address: Address,
        topic0: B256,
        from_block: u64,
        to_block: u64,
        page: usize,
        page_size: usize,
    ) -> Result<Vec<RawLog>, SourceError>;
}
