use anyhow::{anyhow, Context, Result};
use serde::de::{self, DeserializeOwned, Deserializer};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize)]
pub struct RpcRequest<'a> {
    pub jsonrpc: &'static str,
    pub id: u64,
    pub method: &'a str,
    pub params: serde_json::Value,
}

impl<'a> RpcRequest<'a> {
    pub fn new(id: u64, method: &'a str, params: serde_json::Value) -> Self {
        Self {
            jsonrpc: "2.0",
            id,
            method,
            params,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RpcErrorObject {
    pub code: i64,
    pub message: String,
}

/// The subset of an `eth_getBlockByNumber` result the sampler needs.
#[derive(Debug, Clone, Deserialize)]
pub struct RpcBlock {
    #[serde(deserialize_with = "de_u64")]
    pub number: u64,
    #[serde(rename = "gasUsed", deserialize_with = "de_u64")]
    pub gas_used: u64,
    #[serde(rename = "gasLimit", deserialize_with = "de_u64")]
    pub gas_limit: u64,
    #[serde(rename = "baseFeePerGas", default, deserialize_with = "de_opt_u128")]
    pub base_fee_per_gas: Option<u128>,
    #[serde(default, deserialize_with = "de_opt_u64")]
    pub timestamp: Option<u64>,
    /// Hashes or full objects depending on the request flag; only the count is used.
    #[serde(default)]
    pub transactions: Vec<serde_json::Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DoctorReport {
    pub endpoint: String,
    pub chain_id: Option<u64>,
    pub head_block: Option<u64>,
    pub latency_ms: u64,
    pub ok: bool,
    #[serde(default)]
    pub error: Option<String>,
}

/// Parses an Ethereum JSON-RPC quantity (`0x`-prefixed hex, no padding required).
pub fn parse_quantity(raw: &str) -> Result<u128> {
    let digits = raw
        .strip_prefix("0x")
        .or_else(|| raw.strip_prefix("0X"))
        .ok_or_else(|| anyhow!("quantity is missing 0x prefix: {raw:?}"))?;
    if digits.is_empty() {
        return Err(anyhow!("empty quantity: {raw:?}"));
    }
    u128::from_str_radix(digits, 16).with_context(|| format!("invalid hex quantity: {raw:?}"))
}

pub fn format_quantity(value: u64) -> String {
    format!("0x{value:x}")
}

/// Unwraps a JSON-RPC response body: an `error` member wins, a missing `result` is an
/// error, and a present `result` (including `null`) is decoded into `T`.
pub fn decode_response<T: DeserializeOwned>(method: &str, mut body: serde_json::Value) -> Result<T> {
    if let Some(err) = body.get("error").filter(|e| !e.is_null()) {
        return match serde_json::from_value::<RpcErrorObject>(err.clone()) {
            Ok(e) => Err(anyhow!("{method} rpc error {}: {}", e.code, e.message)),
            Err(_) => Err(anyhow!("{method} rpc error: {err}")),
        };
    }
    let result = body
        .get_mut("result")
        .map(serde_json::Value::take)
        .ok_or_else(|| anyhow!("{method}: response has no result"))?;
    serde_json::from_value(result).with_context(|| format!("{method}: decoding result"))
}

fn de_u64<'de, D: Deserializer<'de>>(d: D) -> std::result::Result<u64, D::Error> {
    let raw = String::deserialize(d)?;
    narrow_u64(&raw).map_err(de::Error::custom)
}

fn de_opt_u64<'de, D: Deserializer<'de>>(d: D) -> std::result::Result<Option<u64>, D::Error> {
    match Option::<String>::deserialize(d)? {
        Some(raw) => narrow_u64(&raw).map(Some).map_err(de::Error::custom),
        None => Ok(None),
    }
}

fn de_opt_u128<'de, D: Deserializer<'de>>(d: D) -> std::result::Result<Option<u128>, D::Error> {
    match Option::<String>::deserialize(d)? {
        Some(raw) => parse_quantity(&raw)
            .map(Some)
            .map_err(|e| de::Error::custom(format!("{e:#}"))),
        None => Ok(None),
    }
}

fn narrow_u64(raw: &str) -> std::result::Result<u64, String> {
    let v = parse_quantity(raw).map_err(|e| format!("{e:#}"))?;
    u64::try_from(v).map_err(|_| format!("quantity does not fit in u64: {raw}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_quantities() {
        assert_eq!(parse_quantity("0x0").unwrap(), 0);
        assert_eq!(parse_quantity("0x1c9c380").unwrap(), 30_000_000);
        assert!(parse_quantity("1234").is_err());
        assert!(parse_quantity("0x").is_err());
        assert!(parse_quantity("0xzz").is_err());
    }

    #[test]
    fn decodes_london_block() {
        let body = json!({
            "jsonrpc": "2.0",
            "id": 1,
            "result": {
                "number": "0x10",
                "gasUsed": "0xe4e1c0",
                "gasLimit": "0x1c9c380",
                "baseFeePerGas": "0x4a817c800",
                "timestamp": "0x6553f100",
                "transactions": ["0xaa", "0xbb"]
            }
        });
        let block: Option<RpcBlock> = decode_response("eth_getBlockByNumber", body).unwrap();
        let block = block.unwrap();
        assert_eq!(block.number, 16);
        assert_eq!(block.gas_used, 15_000_000);
        assert_eq!(block.gas_limit, 30_000_000);
        assert_eq!(block.base_fee_per_gas, Some(20_000_000_000));
        assert_eq!(block.timestamp, Some(0x6553f100));
        assert_eq!(block.transactions.len(), 2);
    }

    #[test]
    fn pre_london_block_has_no_base_fee() {
        let body = json!({
            "result": { "number": "0x1", "gasUsed": "0x0", "gasLimit": "0x1388" }
        });
        let block: Option<RpcBlock> = decode_response("eth_getBlockByNumber", body).unwrap();
        let block = block.unwrap();
        assert_eq!(block.base_fee_per_gas, None);
        assert!(block.transactions.is_empty());
    }

    #[test]
    fn null_result_is_absent_block() {
        let body = json!({ "jsonrpc": "2.0", "id": 3, "result": null });
        let block: Option<RpcBlock> = decode_response("eth_getBlockByNumber", body).unwrap();
        assert!(block.is_none());
    }

    #[test]
    fn missing_gas_field_is_an_error() {
        let body = json!({ "result": { "number": "0x1", "gasLimit": "0x1388" } });
        let res: Result<Option<RpcBlock>> = decode_response("eth_getBlockByNumber", body);
        assert!(res.is_err());
    }

    #[test]
    fn rpc_error_member_wins() {
        let body = json!({ "error": { "code": -32005, "message": "limit exceeded" } });
        let err = decode_response::<String>("eth_blockNumber", body).unwrap_err();
        assert!(err.to_string().contains("-32005"));
        assert!(err.to_string().contains("limit exceeded"));
    }

    #[test]
    fn missing_result_is_an_error() {
        let body = json!({ "jsonrpc": "2.0", "id": 1 });
        assert!(decode_response::<String>("eth_blockNumber", body).is_err());
    }
}
