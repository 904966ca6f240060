use crate::decoder;
use crate::dispatcher::DispatchHandle;
use crate::error::SourceError;
use crate::source::{ChainDataSource, RawLog};
use crate::store::{CursorRepository, Database};
use alloy_primitives::{Address, B256};
use anyhow::Result;
use std::time::{Duration, Instant};
use tokio::time::sleep;
use tracing::{debug, info, warn};

/// Widest block range handed to the source in a single request. Providers
/// commonly refuse unbounded ranges outright, and capping the span also
/// bounds how many logs a pass holds in memory before dispatching them.
const MAX_BLOCK_SPAN: u64 = 1000;

/// Advances the confirmed block cursor and feeds one decode task per log to
/// the worker pool.
///
/// Precondition (not enforced here): at most one tracker instance runs per
/// asset; the periodic trigger must guarantee non-overlapping invocations.
pub struct HeadTracker<S> {
    source: S,
    db: Database,
    dispatch: DispatchHandle,
    contract_address: Address,
    confirmations: u64,
    page_size: usize,
    poll_interval: Duration,
}

impl<S: ChainDataSource> HeadTracker<S> {
    pub fn new(
        source: S,
        db: Database,
        dispatch: DispatchHandle,
        contract_address: Address,
        confirmations: u64,
        page_size: usize,
        poll_interval: Duration,
    ) -> Self {
        HeadTracker {
            source,
            db,
            dispatch,
            contract_address,
            confirmations,
            page_size,
            poll_interval,
        }
    }

    pub async fn run(&self) -> Result<()> {
        loop {
            let pass_start = Instant::now();

            if let Err(e) = self.run_once().await {
                warn!("Sync pass failed, cursor unchanged: {e:#}");
            }

            let elapsed = pass_start.elapsed();
            if elapsed < self.poll_interval {
                sleep(self.poll_interval - elapsed).await;
            }
        }
    }

    /// One sync pass: compute the confirmed tip, enumerate the unprocessed
    /// range completely, dispatch the logs, then advance the cursor. Returns
    /// the cursor value in effect after the pass.
    pub async fn run_once(&self) -> Result<u64> {
        let mut last_block = {
            let conn = self.db.lock()?;
            CursorRepository::new(&conn).last_block()?
        };

        let head = self.source.get_head().await?;
        let tip = head.saturating_sub(self.confirmations);

        if tip <= last_block {
            debug!(
                "No progress possible: cursor at {}, confirmed tip at {}",
                last_block, tip
            );
            return Ok(last_block);
        }

        // One bounded span at a time; each span is dispatched and the
        // cursor advanced before the next is fetched, so a deep backlog
        // never piles up in memory and an interrupted pass resumes from
        // the last finished span.
        let mut from = last_block;
        loop {
            let to = from.saturating_add(MAX_BLOCK_SPAN - 1).min(tip);

            // the boundary block is refetched on purpose; delta dedup
            // absorbs the replay
            let logs = self.collect_range(from, to).await?;
            debug!(
                "Collected {} log(s) for blocks {} to {}",
                logs.len(),
                from,
                to
            );

            // An empty span means every block in it is processed. Otherwise
            // stop at the last block actually observed: blocks past it were
            // enumerated too, but re-scanning them next pass is harmless
            // while over-advancing would not be.
            let new_last = match logs.iter().map(|l| l.block_number).max() {
                None => to,
                Some(max_block) => max_block.min(to),
            };

            for log in logs {
                self.dispatch.decode_and_write(log)?;
            }

            if new_last > last_block {
                let conn = self.db.lock()?;
                if CursorRepository::new(&conn).advance(new_last)? {
                    debug!("Advanced sync cursor to {}", new_last);
                }
                last_block = new_last;
            }

            if to >= tip {
                break;
            }
            from = to + 1;
        }

        info!("Sync pass complete, cursor at {}", last_block);
        Ok(last_block)
    }

    /// Enumerate every Transfer log in the inclusive range, treating a full
    /// page as a truncation signal: multi-block ranges are bisected and
    /// re-queried, a single block is walked page by page. The returned set
    /// is complete and sorted ascending by (block_number, log_index).
    async fn collect_range(&self, from: u64, to: u64) -> Result<Vec<RawLog>, SourceError> {
        let topic0 = decoder::transfer_topic();
        let mut logs = Vec::new();
        let mut pending = vec![(from, to)];

        while let Some((a, b)) = pending.pop() {
            if a == b {
                self.collect_block(a, topic0, &mut logs).await?;
                continue;
            }

            let page = match self
                .source
                .get_transfer_logs(self.contract_address, topic0, a, b, 1, self.page_size)
                .await
            {
                Ok(page) => page,
                // providers that refuse a wide range instead of truncating
                // it; errors persisting down at single-block width still
                // propagate out of collect_block
                Err(e) => {
                    warn!(
                        "Range query for blocks {}-{} failed ({}), subdividing",
                        a, b, e
                    );
                    let mid = a + (b - a) / 2;
                    pending.push((mid + 1, b));
                    pending.push((a, mid));
                    continue;
                }
            };

            if page.len() < self.page_size {
                logs.extend(page);
            } else {
                warn!(
                    "Possible truncation for blocks {}-{} (full page of {}), subdividing",
                    a, b, self.page_size
                );
                let mid = a + (b - a) / 2;
                pending.push((mid + 1, b));
                pending.push((a, mid));
            }
        }

        logs.sort_by_key(|l| (l.block_number, l.log_index));
        Ok(logs)
    }

    async fn collect_block(
        &self,
        block: u64,
        topic0: B256,
        out: &mut Vec<RawLog>,
    ) -> Result<(), SourceError> {
        let mut page = 1;
        loop {
            let batch = self
                .source
                .get_transfer_logs(
                    self.contract_address,
                    topic0,
                    block,
                    block,
                    page,
                    self.page_size,
                )
                .await?;

            let full = batch.len() == self.page_size;
            out.extend(batch);
            if !full {
                return Ok(());
            }
            page += 1;
        }
    }
}
