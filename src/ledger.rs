//! Native ledger client
//!
//! The relay reads pending deposits and previously recorded burns from the
//! native ledger, and writes release instructions and burn records back.
//! [`JsonRpcLedger`] speaks JSON-RPC 2.0 to a ledger node.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use eyre::{eyre, Result, WrapErr};
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, info};

use crate::types::{DataEntry, Deposit, ReleaseInstruction};

pub const METHOD_PENDING_DEPOSITS: &str = "pending-deposits";
pub const METHOD_BURN_ENTRIES: &str = "burn-entries";
pub const METHOD_SUBMIT_RELEASE: &str = "submit-release";
pub const METHOD_RECORD_BURN: &str = "record-burn";

/// Native-ledger operations used by the relay
#[async_trait]
pub trait NativeLedger: Send + Sync {
    /// Locks awaiting a mint on the EVM chain
    async fn pending_deposits(&self) -> Result<Vec<Deposit>>;

    /// Burn records written by earlier releases
    async fn burn_entries(&self) -> Result<Vec<DataEntry>>;

    /// Submit a release; returns the ledger transaction id
    async fn submit_release(&self, instruction: &ReleaseInstruction) -> Result<String>;

    /// Record a released burn so it is not released twice
    async fn record_burn(&self, entry: &DataEntry) -> Result<()>;
}

#[derive(Debug, Serialize)]
struct RpcRequest<'a> {
    jsonrpc: &'static str,
    id: u64,
    method: &'a str,
    params: Value,
}

#[derive(Debug, Deserialize)]
struct RpcError {
    code: i64,
    message: String,
}

#[derive(Debug, Deserialize)]
struct RpcResponse {
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<RpcError>,
}

#[derive(Debug, Deserialize)]
struct ReleaseReceipt {
    #[serde(rename = "txId")]
    tx_id: String,
}

/// Extract the `result` of a JSON-RPC response body.
fn parse_response<R: DeserializeOwned>(method: &str, body: &str) -> Result<R> {
    let response: RpcResponse = serde_json::from_str(body)
        .wrap_err_with(|| format!("Invalid JSON-RPC response to {}", method))?;
    if let Some(error) = response.error {
        return Err(eyre!(
            "{} failed with code {}: {}",
            method,
            error.code,
            error.message
        ));
    }
    let result = response.result.unwrap_or(Value::Null);
    serde_json::from_value(result).wrap_err_with(|| format!("Unexpected result for {}", method))
}

/// JSON-RPC 2.0 client for a native-ledger node
pub struct JsonRpcLedger {
    url: String,
    client: Client,
    next_id: AtomicU64,
}

impl JsonRpcLedger {
    pub fn new(url: &str) -> Result<Self> {
        url::Url::parse(url).wrap_err("Invalid ledger RPC URL")?;
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .wrap_err("Failed to create HTTP client")?;
        Ok(Self {
            url: url.to_string(),
            client,
            next_id: AtomicU64::new(1),
        })
    }

    async fn call<R: DeserializeOwned>(&self, method: &str, params: Value) -> Result<R> {
        let request = RpcRequest {
            jsonrpc: "2.0",
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
            method,
            params,
        };
        debug!(method, id = request.id, "Ledger RPC call");

        let body = self
            .client
            .post(&self.url)
            .json(&request)
            .send()
            .await
            .wrap_err_with(|| format!("Failed to send {} request", method))?
            .text()
            .await
            .wrap_err_with(|| format!("Failed to read {} response", method))?;

        parse_response(method, &body)
    }
}

#[async_trait]
impl NativeLedger for JsonRpcLedger {
    async fn pending_deposits(&self) -> Result<Vec<Deposit>> {
        self.call(METHOD_PENDING_DEPOSITS, json!({})).await
    }

    async fn burn_entries(&self) -> Result<Vec<DataEntry>> {
        self.call(METHOD_BURN_ENTRIES, json!({})).await
    }

    async fn submit_release(&self, instruction: &ReleaseInstruction) -> Result<String> {
        let receipt: ReleaseReceipt = self
            .call(METHOD_SUBMIT_RELEASE, serde_json::to_value(instruction)?)
            .await?;
        info!(
            token = %instruction.token_url,
            destination = %instruction.destination,
            amount = %instruction.amount,
            ledger_tx = %receipt.tx_id,
            "Release submitted to native ledger"
        );
        Ok(receipt.tx_id)
    }

    async fn record_burn(&self, entry: &DataEntry) -> Result<()> {
        let _: Value = self
            .call(METHOD_RECORD_BURN, serde_json::to_value(entry)?)
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::primitives::{Address, U256};

    #[test]
    fn test_parse_result() {
        let body = r#"{"jsonrpc":"2.0","id":1,"result":[{"tx_id":"acc://0abc@alice.acme","token_url":"acc://bridge.acme/tokens/wbtc","amount":"0x174876e800","recipient":"0x2222222222222222222222222222222222222222"}]}"#;
        let deposits: Vec<Deposit> = parse_response(METHOD_PENDING_DEPOSITS, body).unwrap();
        assert_eq!(deposits.len(), 1);
        assert_eq!(deposits[0].amount, U256::from(100_000_000_000u64));
        assert_eq!(deposits[0].recipient, Address::repeat_byte(0x22));
    }

    #[test]
    fn test_parse_error_object() {
        let body = r#"{"jsonrpc":"2.0","id":1,"error":{"code":-32601,"message":"method not found"}}"#;
        let err = parse_response::<Value>(METHOD_BURN_ENTRIES, body).unwrap_err();
        let msg = format!("{:#}", err);
        assert!(msg.contains("-32601"), "{}", msg);
        assert!(msg.contains("method not found"), "{}", msg);
    }

    #[test]
    fn test_parse_garbage() {
        assert!(parse_response::<Value>(METHOD_BURN_ENTRIES, "<html>").is_err());
    }

    #[test]
    fn test_parse_release_receipt() {
        let body = r#"{"jsonrpc":"2.0","id":3,"result":{"txId":"acc://beef@bridge.acme"}}"#;
        let receipt: ReleaseReceipt = parse_response(METHOD_SUBMIT_RELEASE, body).unwrap();
        assert_eq!(receipt.tx_id, "acc://beef@bridge.acme");
    }

    #[test]
    fn test_request_envelope() {
        let request = RpcRequest {
            jsonrpc: "2.0",
            id: 9,
            method: METHOD_RECORD_BURN,
            params: json!({"data": ["00"]}),
        };
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["jsonrpc"], "2.0");
        assert_eq!(value["id"], 9);
        assert_eq!(value["method"], "record-burn");
        assert_eq!(value["params"]["data"][0], "00");
    }

    #[test]
    fn test_invalid_url() {
        assert!(JsonRpcLedger::new("::nope").is_err());
    }
}
