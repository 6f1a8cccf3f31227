use super::{
    types::{decode_response, format_quantity, parse_quantity, RpcBlock, RpcRequest},
    ChainClient,
};
use crate::{error::HealthError, util::is_http_url};
use anyhow::{anyhow, Context, Result};
use reqwest::blocking::Client;
use serde::de::DeserializeOwned;
use serde_json::json;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tracing::debug;

pub struct HttpRpcClient {
    url: String,
    http: Client,
    next_id: AtomicU64,
}

impl HttpRpcClient {
    /// `timeout` bounds each request individually, connect through body read.
    pub fn new(url: &str, timeout: Duration) -> Result<Self, HealthError> {
        let url = url.trim();
        if !is_http_url(url) {
            return Err(HealthError::config(format!(
                "rpc url must start with http:// or https://: {url:?}"
            )));
        }
        if timeout.is_zero() {
            return Err(HealthError::config("rpc timeout must be positive"));
        }
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| HealthError::config(format!("building HTTP client: {e}")))?;
        Ok(Self {
            url: url.to_string(),
            http,
            next_id: AtomicU64::new(1),
        })
    }

    fn call<T: DeserializeOwned>(&self, method: &str, params: serde_json::Value) -> Result<T> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        debug!(method, id, "rpc call");

        let resp = self
            .http
            .post(&self.url)
            .json(&RpcRequest::new(id, method, params))
            .send()
            .with_context(|| format!("{method} request failed"))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(anyhow!("{method}: HTTP {status}"));
        }

        let body: serde_json::Value = resp
            .json()
            .with_context(|| format!("{method}: response is not JSON"))?;
        decode_response(method, body)
    }

    fn call_quantity(&self, method: &str) -> Result<u64> {
        let raw: String = self.call(method, json!([]))?;
        let v = parse_quantity(&raw)?;
        u64::try_from(v).map_err(|_| anyhow!("{method}: quantity does not fit in u64: {raw}"))
    }
}

impl ChainClient for HttpRpcClient {
    fn endpoint(&self) -> &str {
        &self.url
    }

    fn chain_id(&self) -> Result<u64> {
        self.call_quantity("eth_chainId")
    }

    fn block_number(&self) -> Result<u64> {
        self.call_quantity("eth_blockNumber")
    }

    fn block_by_number(&self, number: u64) -> Result<Option<RpcBlock>> {
        self.call(
            "eth_getBlockByNumber",
            json!([format_quantity(number), false]),
        )
    }
}
