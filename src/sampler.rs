use crate::{
    error::HealthError,
    rpc::{ChainClient, RpcBlock},
};
use anyhow::{anyhow, bail, Result};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::{debug, info, warn};

/// Utilization above this is treated as a malformed block rather than an overfull one.
pub const MAX_SANE_UTILIZATION: f64 = 1.5;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlockSample {
    pub number: u64,
    pub gas_used: u64,
    pub gas_limit: u64,
    pub utilization: f64,
    pub base_fee_wei: Option<u128>,
    pub timestamp: Option<u64>,
    pub tx_count: usize,
}

impl BlockSample {
    pub fn from_block(block: &RpcBlock) -> Result<Self> {
        if block.gas_limit == 0 {
            bail!("block {} has zero gas limit", block.number);
        }
        let utilization = block.gas_used as f64 / block.gas_limit as f64;
        if utilization > MAX_SANE_UTILIZATION {
            bail!(
                "block {} utilization {:.3} exceeds sanity bound ({} / {})",
                block.number,
                utilization,
                block.gas_used,
                block.gas_limit
            );
        }
        Ok(Self {
            number: block.number,
            gas_used: block.gas_used,
            gas_limit: block.gas_limit,
            utilization,
            base_fee_wei: block.base_fee_per_gas,
            timestamp: block.timestamp,
            tx_count: block.transactions.len(),
        })
    }
}

/// Non-empty, newest-first samples plus what was asked for, so that partial coverage stays
/// visible downstream.
#[derive(Debug, Clone, Serialize)]
pub struct SampleSet {
    head: u64,
    requested: u32,
    attempted: u32,
    samples: Vec<BlockSample>,
}

impl SampleSet {
    pub fn new(
        head: u64,
        requested: u32,
        attempted: u32,
        mut samples: Vec<BlockSample>,
    ) -> Result<Self, HealthError> {
        if samples.is_empty() {
            return Err(HealthError::NoDataAvailable {
                requested,
                attempted,
                head,
            });
        }
        samples.sort_by(|a, b| b.number.cmp(&a.number));
        samples.dedup_by_key(|s| s.number);
        Ok(Self {
            head,
            requested,
            attempted,
            samples,
        })
    }

    pub fn samples(&self) -> &[BlockSample] {
        &self.samples
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Always false: construction rejects empty sets. Paired with `len` for clippy's
    /// `len_without_is_empty`.
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn head(&self) -> u64 {
        self.head
    }

    pub fn requested(&self) -> u32 {
        self.requested
    }

    /// Blocks that were in the window but did not yield a usable sample.
    pub fn skipped(&self) -> u32 {
        self.attempted.saturating_sub(self.samples.len() as u32)
    }
}

pub struct BlockSampler<'a> {
    client: &'a dyn ChainClient,
    max_parallel: usize,
    max_count: u32,
}

impl<'a> BlockSampler<'a> {
    pub fn new(client: &'a dyn ChainClient, max_parallel: usize, max_count: u32) -> Self {
        Self {
            client,
            max_parallel,
            max_count,
        }
    }

    pub fn validate_count(&self, count: i64) -> Result<u32, HealthError> {
        if count <= 0 {
            return Err(HealthError::config(format!(
                "block count must be positive, got {count}"
            )));
        }
        if count > i64::from(self.max_count) {
            return Err(HealthError::config(format!(
                "block count {count} exceeds limits.max_block_count ({})",
                self.max_count
            )));
        }
        u32::try_from(count).map_err(|_| HealthError::config(format!("block count out of range: {count}")))
    }

    pub fn sample(&self, count: i64) -> Result<SampleSet, HealthError> {
        let count = self.validate_count(count)?;

        let head = self
            .client
            .block_number()
            .map_err(|e| HealthError::EndpointUnreachable {
                endpoint: self.client.endpoint().to_string(),
                reason: format!("{e:#}"),
            })?;

        let numbers = block_window(head, count);
        info!(
            "fetching {} blocks ({} to {})",
            numbers.len(),
            numbers.last().copied().unwrap_or(head),
            head
        );

        let outcomes = self.fetch_all(&numbers);

        let mut samples = Vec::with_capacity(numbers.len());
        for (number, outcome) in numbers.iter().zip(outcomes) {
            match outcome {
                Some(Ok(sample)) => samples.push(sample),
                Some(Err(err)) => warn!("skipping block {number}: {err:#}"),
                None => warn!("skipping block {number}: fetch worker did not report"),
            }
        }

        info!(
            "sampled {} of {} blocks (head={head})",
            samples.len(),
            numbers.len()
        );

        SampleSet::new(head, count, numbers.len() as u32, samples)
    }

    /// Fans the fetches out over a bounded set of scoped workers. Each result lands in the
    /// slot matching its index in `numbers`.
    fn fetch_all(&self, numbers: &[u64]) -> Vec<Option<Result<BlockSample>>> {
        let workers = self.max_parallel.clamp(1, numbers.len().max(1));
        let cursor = &AtomicUsize::new(0);
        let mut slots: Vec<Option<Result<BlockSample>>> = numbers.iter().map(|_| None).collect();

        std::thread::scope(|scope| {
            let handles: Vec<_> = (0..workers)
                .map(|_| {
                    scope.spawn(move || {
                        let mut done = Vec::new();
                        loop {
                            let idx = cursor.fetch_add(1, Ordering::Relaxed);
                            let Some(&number) = numbers.get(idx) else {
                                break;
                            };
                            done.push((idx, self.fetch_one(number)));
                        }
                        done
                    })
                })
                .collect();

            for handle in handles {
                match handle.join() {
                    Ok(done) => {
                        for (idx, outcome) in done {
                            slots[idx] = Some(outcome);
                        }
                    }
                    Err(_) => warn!("block fetch worker panicked; its blocks are skipped"),
                }
            }
        });

        slots
    }

    fn fetch_one(&self, number: u64) -> Result<BlockSample> {
        debug!("fetching block {number}");
        let block = self
            .client
            .block_by_number(number)?
            .ok_or_else(|| anyhow!("block {number} not found"))?;
        if block.number != number {
            bail!("requested block {number}, node returned {}", block.number);
        }
        BlockSample::from_block(&block)
    }
}

/// `head` down to `head - count + 1`, clamped at genesis.
pub fn block_window(head: u64, count: u32) -> Vec<u64> {
    let oldest = head.saturating_sub(u64::from(count.max(1)) - 1);
    (oldest..=head).rev().collect()
}
