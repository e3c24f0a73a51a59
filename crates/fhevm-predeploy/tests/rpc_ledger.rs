//! [`RpcLedger`] against a mocked JSON-RPC endpoint.

use alloy_primitives::{address, b256, Address, Bytes};
use fhevm_predeploy::{
    test_utils::hardhat_identities, CapabilityProvisioner, Ledger, LedgerError, PredeployError,
    RetryPolicy, RpcLedger, TxRequest,
};
use serde_json::{json, Value};
use wiremock::{
    matchers::{body_partial_json, method},
    Mock, MockServer, Request, Respond, ResponseTemplate,
};

/// Answers a JSON-RPC call, echoing its id.
struct JsonRpc(Result<Value, (i64, &'static str)>);

impl Respond for JsonRpc {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        let body: Value = serde_json::from_slice(&request.body).unwrap();
        let mut response = json!({"jsonrpc": "2.0", "id": body["id"]});
        match &self.0 {
            Ok(result) => response["result"] = result.clone(),
            Err((code, message)) => {
                response["error"] = json!({"code": code, "message": message});
            }
        }
        ResponseTemplate::new(200).set_body_json(response)
    }
}

async fn answer(server: &MockServer, rpc_method: &str, result: Value) {
    Mock::given(method("POST"))
        .and(body_partial_json(json!({"method": rpc_method})))
        .respond_with(JsonRpc(Ok(result)))
        .mount(server)
        .await;
}

const TARGET: Address = address!("9fE46736679d2D9a65F0992F2272dE9f3c7fa6e0");

#[tokio::test]
async fn reads_nonce_code_and_receipts() {
    let server = MockServer::start().await;
    answer(&server, "eth_getTransactionCount", json!("0x5")).await;
    answer(&server, "eth_getCode", json!("0x6080")).await;
    answer(&server, "eth_getTransactionReceipt", Value::Null).await;
    let ledger = RpcLedger::connect_http(&server.uri()).unwrap();

    assert_eq!(ledger.transaction_count(TARGET).await.unwrap(), 5);
    assert_eq!(ledger.code_at(TARGET).await.unwrap(), Bytes::from_static(&[0x60, 0x80]));
    assert_eq!(ledger.receipt(Default::default()).await.unwrap(), None);
}

#[tokio::test]
async fn node_errors_are_rejections() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(JsonRpc(Err((-32000, "header not found"))))
        .mount(&server)
        .await;
    let ledger = RpcLedger::connect_http(&server.uri()).unwrap();

    let err = ledger.transaction_count(TARGET).await.unwrap_err();
    assert!(matches!(
        err,
        LedgerError::Rejected(ref message) if message.contains("header not found")
    ));
    assert!(!err.is_retryable());
}

#[tokio::test]
async fn unreachable_endpoint_is_a_transport_error() {
    let server = MockServer::start().await;
    let uri = server.uri();
    drop(server);
    let ledger = RpcLedger::connect_http(&uri).unwrap();

    let err = ledger.code_at(TARGET).await.unwrap_err();
    assert!(err.is_retryable(), "{err:?}");
}

#[tokio::test]
async fn submits_signed_creation() {
    let server = MockServer::start().await;
    let tx_hash = b256!("1111111111111111111111111111111111111111111111111111111111111111");
    answer(&server, "eth_chainId", json!("0x7a69")).await;
    answer(&server, "eth_gasPrice", json!("0x3b9aca00")).await;
    answer(&server, "eth_estimateGas", json!("0x30d40")).await;
    Mock::given(method("POST"))
        .and(body_partial_json(json!({"method": "eth_sendRawTransaction"})))
        .respond_with(JsonRpc(Ok(json!(tx_hash))))
        .expect(1)
        .mount(&server)
        .await;
    let ledger = RpcLedger::connect_http(&server.uri()).unwrap();
    let identity = hardhat_identities().get(0).unwrap().clone();

    let sent = ledger
        .send_transaction(&identity, TxRequest::create(Bytes::from_static(&[0x60, 0x01]), 0))
        .await
        .unwrap();
    assert_eq!(sent, tx_hash);
}

#[tokio::test]
async fn grant_on_empty_code_never_submits() {
    let server = MockServer::start().await;
    answer(&server, "eth_getCode", json!("0x")).await;
    Mock::given(method("POST"))
        .and(body_partial_json(json!({"method": "eth_sendRawTransaction"})))
        .respond_with(JsonRpc(Ok(json!("0x00"))))
        .expect(0)
        .mount(&server)
        .await;
    let ledger = RpcLedger::connect_http(&server.uri()).unwrap();
    let identity = hardhat_identities().get(1).unwrap().clone();

    let err = CapabilityProvisioner::new(&ledger, RetryPolicy::default())
        .grant_capability(&identity, TARGET, identity.address())
        .await
        .unwrap_err();
    assert!(matches!(err, PredeployError::NotAContract { address } if address == TARGET));
}

#[test]
fn invalid_url_is_invalid_input() {
    assert!(matches!(RpcLedger::connect_http("not a url"), Err(PredeployError::InvalidInput(_))));
}
