use clap::Parser;
use gas_health::{
    cli::{self, Args, FATAL_EXIT_CODE},
    error::HealthError,
    rpc::{doctor, ChainClient, HttpRpcClient},
};
use mockito::Matcher;
use serde_json::json;
use std::time::Duration;

fn client(url: &str) -> HttpRpcClient {
    HttpRpcClient::new(url, Duration::from_secs(5)).expect("client")
}

#[test]
fn reads_head_and_block() {
    let mut server = mockito::Server::new();
    let head = server
        .mock("POST", "/")
        .match_body(Matcher::PartialJson(json!({"method": "eth_blockNumber"})))
        .with_header("content-type", "application/json")
        .with_body(r#"{"jsonrpc":"2.0","id":1,"result":"0x12a05f1"}"#)
        .create();
    let block = server
        .mock("POST", "/")
        .match_body(Matcher::PartialJson(json!({
            "method": "eth_getBlockByNumber",
            "params": ["0x12a05f1", false]
        })))
        .with_header("content-type", "application/json")
        .with_body(
            json!({
                "jsonrpc": "2.0",
                "id": 2,
                "result": {
                    "number": "0x12a05f1",
                    "gasUsed": "0x1312d00",
                    "gasLimit": "0x1c9c380",
                    "baseFeePerGas": "0x3b9aca00",
                    "timestamp": "0x65000000",
                    "transactions": ["0x01", "0x02", "0x03"]
                }
            })
            .to_string(),
        )
        .create();

    let c = client(&server.url());
    let number = c.block_number().expect("head");
    assert_eq!(number, 0x12a05f1);

    let b = c.block_by_number(number).expect("block").expect("present");
    assert_eq!(b.gas_used, 20_000_000);
    assert_eq!(b.gas_limit, 30_000_000);
    assert_eq!(b.base_fee_per_gas, Some(1_000_000_000));
    assert_eq!(b.transactions.len(), 3);

    head.assert();
    block.assert();
}

#[test]
fn rpc_error_is_reported() {
    let mut server = mockito::Server::new();
    let _m = server
        .mock("POST", "/")
        .with_header("content-type", "application/json")
        .with_body(r#"{"jsonrpc":"2.0","id":1,"error":{"code":-32601,"message":"method not found"}}"#)
        .create();

    let err = client(&server.url()).block_number().unwrap_err();
    assert!(format!("{err:#}").contains("method not found"));
}

#[test]
fn http_failure_is_reported() {
    let mut server = mockito::Server::new();
    let _m = server.mock("POST", "/").with_status(503).create();

    let err = client(&server.url()).block_by_number(1).unwrap_err();
    assert!(format!("{err:#}").contains("503"));
}

#[test]
fn doctor_reports_chain() {
    let mut server = mockito::Server::new();
    let _id = server
        .mock("POST", "/")
        .match_body(Matcher::PartialJson(json!({"method": "eth_chainId"})))
        .with_body(r#"{"jsonrpc":"2.0","id":1,"result":"0x1"}"#)
        .create();
    let _head = server
        .mock("POST", "/")
        .match_body(Matcher::PartialJson(json!({"method": "eth_blockNumber"})))
        .with_body(r#"{"jsonrpc":"2.0","id":2,"result":"0x64"}"#)
        .create();

    let diag = doctor(&client(&server.url()));
    assert!(diag.ok);
    assert_eq!(diag.chain_id, Some(1));
    assert_eq!(diag.head_block, Some(100));
    assert!(diag.error.is_none());
}

#[test]
fn rejects_non_http_urls_and_zero_timeout() {
    for url in ["ws://localhost:8546", "localhost:8545", ""] {
        let err = HttpRpcClient::new(url, Duration::from_secs(1)).err().expect("rejected");
        assert!(matches!(err, HealthError::Configuration(_)));
    }
    let err = HttpRpcClient::new("http://localhost:8545", Duration::ZERO)
        .err()
        .expect("rejected");
    assert!(matches!(err, HealthError::Configuration(_)));
}

fn check_args(url: &str, count: &str) -> Args {
    Args::try_parse_from([
        "gas-health",
        "--rpc",
        url,
        "--timeout",
        "5",
        "check",
        "--count",
        count,
        "--json",
    ])
    .expect("parse args")
}

fn fatal_kind(err: &anyhow::Error) -> &HealthError {
    err.downcast_ref::<HealthError>().expect("typed fatal error")
}

#[test]
fn dispatch_fails_when_every_block_fetch_fails() {
    let mut server = mockito::Server::new();
    let head = server
        .mock("POST", "/")
        .match_body(Matcher::PartialJson(json!({"method": "eth_blockNumber"})))
        .with_body(r#"{"jsonrpc":"2.0","id":1,"result":"0x64"}"#)
        .expect(1)
        .create();
    let blocks = server
        .mock("POST", "/")
        .match_body(Matcher::PartialJson(json!({"method": "eth_getBlockByNumber"})))
        .with_status(500)
        .expect(3)
        .create();

    let err = cli::dispatch(check_args(&server.url(), "3")).unwrap_err();
    assert!(matches!(
        fatal_kind(&err),
        HealthError::NoDataAvailable {
            requested: 3,
            attempted: 3,
            head: 100
        }
    ));

    head.assert();
    blocks.assert();
}

#[test]
fn dispatch_rejects_zero_count_without_network() {
    let mut server = mockito::Server::new();
    let any = server.mock("POST", "/").expect(0).create();

    let err = cli::dispatch(check_args(&server.url(), "0")).unwrap_err();
    assert!(matches!(fatal_kind(&err), HealthError::Configuration(_)));

    any.assert();
}

#[test]
fn dispatch_returns_verdict_code() {
    let mut server = mockito::Server::new();
    let _head = server
        .mock("POST", "/")
        .match_body(Matcher::PartialJson(json!({"method": "eth_blockNumber"})))
        .with_body(r#"{"jsonrpc":"2.0","id":1,"result":"0x0"}"#)
        .create();
    let _genesis = server
        .mock("POST", "/")
        .match_body(Matcher::PartialJson(json!({"method": "eth_getBlockByNumber"})))
        .with_body(r#"{"jsonrpc":"2.0","id":2,"result":{"number":"0x0","gasUsed":"0x0","gasLimit":"0x1388"}}"#)
        .create();

    let code = cli::dispatch(check_args(&server.url(), "5")).expect("report produced");
    assert_eq!(code, 2);
}

#[test]
fn usage_errors_never_exit_with_the_unstable_code() {
    for argv in [
        vec!["gas-health"],
        vec!["gas-health", "bogus"],
        vec!["gas-health", "check", "--count", "many"],
        vec!["gas-health", "--timeout", "-1", "check"],
    ] {
        let err = Args::try_parse_from(argv).unwrap_err();
        assert_eq!(cli::exit_code_for(&err), FATAL_EXIT_CODE);
    }

    let help = Args::try_parse_from(["gas-health", "--help"]).unwrap_err();
    assert_eq!(cli::exit_code_for(&help), 0);
}
