pub mod http;
pub mod types;

use anyhow::Result;
use std::time::Instant;

pub use http::HttpRpcClient;
pub use types::{DoctorReport, RpcBlock};

/// The chain reads the sampler depends on. Implementations must be shareable across the
/// fetch workers.
pub trait ChainClient: Sync {
    fn endpoint(&self) -> &str;
    fn chain_id(&self) -> Result<u64>;
    fn block_number(&self) -> Result<u64>;
    /// `Ok(None)` when the node does not know the block.
    fn block_by_number(&self, number: u64) -> Result<Option<RpcBlock>>;
}

pub fn doctor(client: &dyn ChainClient) -> DoctorReport {
    let started = Instant::now();
    let outcome = client
        .chain_id()
        .and_then(|id| client.block_number().map(|head| (id, head)));
    let latency_ms = started.elapsed().as_millis() as u64;

    match outcome {
        Ok((chain_id, head)) => DoctorReport {
            endpoint: client.endpoint().to_string(),
            chain_id: Some(chain_id),
            head_block: Some(head),
            latency_ms,
            ok: true,
            error: None,
        },
        Err(err) => DoctorReport {
            endpoint: client.endpoint().to_string(),
            chain_id: None,
            head_block: None,
            latency_ms,
            ok: false,
            error: Some(format!("{err:#}")),
        },
    }
}
