//! Safe transaction service client
//!
//! Proposals are posted to
//! `{base}/api/v1/safes/{safe}/multisig-transactions/`. On rejection the
//! service answers with a JSON object of field errors, e.g.
//! `{"nonce": ["Nonce=3 too low"]}`, which is flattened into
//! `"nonce: Nonce=3 too low"` strings.
//!
//! The same endpoint lists queued (not yet executed) transactions, which the
//! relay checks before proposing so a deposit is never proposed twice.

use std::time::Duration;

use std::str::FromStr;

use alloy::primitives::{Address, Bytes, U256};
use async_trait::async_trait;
use eyre::{eyre, Result, WrapErr};
use reqwest::Client;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info, warn};
use url::Url;

use crate::error::BridgeError;
use crate::hash::decode_hex;
use crate::safe_tx::AuthorizationRequest;

/// Accepts signed proposals on behalf of the Safe owners
#[async_trait]
pub trait SafeApi: Send + Sync {
    /// Submit a proposal. `SafeApiRejected` carries the service's field errors.
    async fn propose(&self, request: &AuthorizationRequest) -> Result<(), BridgeError>;

    /// Unexecuted transactions of `safe` with a nonce of at least `from_nonce`
    async fn queued_transactions(
        &self,
        safe: Address,
        from_nonce: U256,
    ) -> Result<Vec<QueuedTransaction>, BridgeError>;
}

/// A proposal waiting in the service queue
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueuedTransaction {
    pub nonce: U256,
    pub to: Address,
    pub data: Bytes,
}

/// Parse one page of the multisig-transactions listing.
///
/// Returns the transactions and the URL of the next page, if any.
pub fn parse_queue_page(body: &str) -> Result<(Vec<QueuedTransaction>, Option<String>)> {
    let value: Value = serde_json::from_str(body).wrap_err("Safe queue is not valid JSON")?;
    let results = value
        .get("results")
        .and_then(Value::as_array)
        .ok_or_else(|| eyre!("Safe queue has no results array"))?;

    let mut queued = Vec::with_capacity(results.len());
    for item in results {
        // the service reports nonces as numbers or decimal strings
        let nonce = match item.get("nonce") {
            Some(Value::Number(n)) => n.as_u64().map(U256::from),
            Some(Value::String(s)) => U256::from_str(s).ok(),
            _ => None,
        }
        .ok_or_else(|| eyre!("Safe queue entry has no valid nonce: {}", item))?;

        let to = item
            .get("to")
            .and_then(Value::as_str)
            .and_then(|s| Address::from_str(s).ok())
            .ok_or_else(|| eyre!("Safe queue entry has no valid target: {}", item))?;

        let data = match item.get("data").and_then(Value::as_str) {
            Some(hex_data) => Bytes::from(
                decode_hex(hex_data).wrap_err("Safe queue entry has invalid call data")?,
            ),
            None => Bytes::new(),
        };

        queued.push(QueuedTransaction { nonce, to, data });
    }

    let next = value
        .get("next")
        .and_then(Value::as_str)
        .map(str::to_string);
    Ok((queued, next))
}

/// Request body of the multisig-transactions endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProposeTransaction {
    pub safe: String,
    pub to: String,
    pub value: String,
    pub data: Option<String>,
    pub operation: u8,
    pub gas_token: String,
    pub safe_tx_gas: String,
    pub base_gas: String,
    pub gas_price: String,
    pub refund_receiver: String,
    pub nonce: String,
    pub contract_transaction_hash: String,
    pub sender: String,
    pub signature: String,
}

impl From<&AuthorizationRequest> for ProposeTransaction {
    fn from(request: &AuthorizationRequest) -> Self {
        let tx = &request.tx;
        Self {
            safe: request.safe.to_checksum(None),
            to: tx.to.to_checksum(None),
            value: tx.value.to_string(),
            data: if tx.data.is_empty() {
                None
            } else {
                Some(format!("0x{}", hex::encode(&tx.data)))
            },
            operation: u8::from(tx.operation),
            gas_token: tx.gas.gas_token.to_checksum(None),
            safe_tx_gas: tx.gas.safe_tx_gas.to_string(),
            base_gas: tx.gas.base_gas.to_string(),
            gas_price: tx.gas.gas_price.to_string(),
            refund_receiver: tx.gas.refund_receiver.to_checksum(None),
            nonce: tx.nonce.to_string(),
            contract_transaction_hash: format!("{:#x}", request.digest),
            sender: request.sender.to_checksum(None),
            signature: format!("0x{}", hex::encode(request.signature)),
        }
    }
}

/// Flatten a rejection body into `"field: message"` strings.
pub fn flatten_errors(body: &str) -> Vec<String> {
    let value: Value = match serde_json::from_str(body) {
        Ok(value) => value,
        Err(_) => {
            let trimmed = body.trim();
            return if trimmed.is_empty() {
                Vec::new()
            } else {
                vec![trimmed.to_string()]
            };
        }
    };

    let mut errors = Vec::new();
    match value {
        Value::Object(fields) => {
            for (field, messages) in fields {
                match messages {
                    Value::Array(items) => {
                        for item in items {
                            errors.push(format!("{}: {}", field, message_text(&item)));
                        }
                    }
                    other => errors.push(format!("{}: {}", field, message_text(&other))),
                }
            }
        }
        Value::Array(items) => errors.extend(items.iter().map(message_text)),
        other => errors.push(message_text(&other)),
    }
    errors
}

fn message_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// HTTP adapter for the Safe transaction service
pub struct SafeServiceClient {
    base_url: Url,
    client: Client,
}

impl SafeServiceClient {
    pub fn new(base_url: &str) -> Result<Self> {
        let base_url = Url::parse(base_url).wrap_err("Invalid Safe API URL")?;
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .wrap_err("Failed to create HTTP client")?;
        Ok(Self { base_url, client })
    }

    /// Proposal endpoint for a Safe
    pub fn endpoint(&self, safe: &Address) -> String {
        format!(
            "{}/api/v1/safes/{}/multisig-transactions/",
            self.base_url.as_str().trim_end_matches('/'),
            safe.to_checksum(None)
        )
    }
}

#[async_trait]
impl SafeApi for SafeServiceClient {
    async fn propose(&self, request: &AuthorizationRequest) -> Result<(), BridgeError> {
        let url = self.endpoint(&request.safe);
        let body = ProposeTransaction::from(request);

        debug!(url = %url, nonce = %body.nonce, "Posting Safe proposal");

        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .wrap_err("Failed to reach Safe transaction service")
            .map_err(BridgeError::transport)?;

        let status = response.status();
        if status.is_success() {
            info!(
                safe = %request.safe,
                nonce = %request.tx.nonce,
                safe_tx_hash = %body.contract_transaction_hash,
                "Safe proposal accepted"
            );
            return Ok(());
        }

        let text = response.text().await.unwrap_or_default();
        let mut errors = flatten_errors(&text);
        if errors.is_empty() {
            errors.push(format!("HTTP {}", status));
        }
        warn!(
            safe = %request.safe,
            status = %status,
            errors = ?errors,
            "Safe proposal rejected"
        );
        Err(BridgeError::SafeApiRejected(errors))
    }

    async fn queued_transactions(
        &self,
        safe: Address,
        from_nonce: U256,
    ) -> Result<Vec<QueuedTransaction>, BridgeError> {
        let mut url = Some(format!(
            "{}?executed=false&nonce__gte={}&ordering=nonce&limit=100",
            self.endpoint(&safe),
            from_nonce
        ));
        let mut queued = Vec::new();

        while let Some(page) = url.take() {
            let response = self
                .client
                .get(&page)
                .send()
                .await
                .wrap_err("Failed to reach Safe transaction service")
                .map_err(BridgeError::transport)?;

            let status = response.status();
            let text = response
                .text()
                .await
                .wrap_err("Failed to read Safe queue")
                .map_err(BridgeError::transport)?;
            if !status.is_success() {
                return Err(BridgeError::Transport(format!(
                    "Safe queue query returned HTTP {}: {}",
                    status,
                    text.trim()
                )));
            }

            let (items, next) = parse_queue_page(&text).map_err(BridgeError::transport)?;
            queued.extend(items);
            url = next;
        }

        debug!(safe = %safe, from_nonce = %from_nonce, queued = queued.len(), "Fetched Safe queue");
        Ok(queued)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::safe_tx::SafeTransaction;
    use alloy::primitives::B256;

    fn request() -> AuthorizationRequest {
        AuthorizationRequest {
            safe: Address::repeat_byte(0x5a),
            tx: SafeTransaction::call(
                Address::repeat_byte(0xbb),
                Bytes::from(vec![0x01, 0x02]),
                U256::from(7u64),
            ),
            digest: B256::repeat_byte(0xdd),
            signature: [0x11; 65],
            sender: Address::repeat_byte(0x0e),
        }
    }

    #[test]
    fn test_request_body_uses_camel_case() {
        let body = serde_json::to_value(ProposeTransaction::from(&request())).unwrap();
        assert_eq!(body["nonce"], "7");
        assert_eq!(body["value"], "0");
        assert_eq!(body["operation"], 0);
        assert_eq!(body["data"], "0x0102");
        assert_eq!(body["safeTxGas"], "0");
        assert_eq!(body["baseGas"], "0");
        assert_eq!(body["gasPrice"], "0");
        assert_eq!(
            body["gasToken"],
            "0x0000000000000000000000000000000000000000"
        );
        assert_eq!(body["contractTransactionHash"], format!("0x{}", "dd".repeat(32)));
        assert_eq!(body["signature"], format!("0x{}", "11".repeat(65)));
        assert!(body.get("refundReceiver").is_some());
        assert!(body.get("sender").is_some());
    }

    #[test]
    fn test_empty_data_is_null() {
        let mut req = request();
        req.tx.data = Bytes::new();
        let body = serde_json::to_value(ProposeTransaction::from(&req)).unwrap();
        assert!(body["data"].is_null());
    }

    #[test]
    fn test_flatten_field_errors() {
        let errors =
            flatten_errors(r#"{"nonce": ["Nonce=3 too low"], "signature": "invalid owner"}"#);
        assert_eq!(
            errors,
            vec![
                "nonce: Nonce=3 too low".to_string(),
                "signature: invalid owner".to_string()
            ]
        );
    }

    #[test]
    fn test_flatten_non_json_body() {
        assert_eq!(flatten_errors("Bad Gateway"), vec!["Bad Gateway".to_string()]);
        assert!(flatten_errors("   ").is_empty());
        assert_eq!(
            flatten_errors(r#"["first", "second"]"#),
            vec!["first".to_string(), "second".to_string()]
        );
    }

    #[test]
    fn test_endpoint_path() {
        let client = SafeServiceClient::new("https://safe-transaction.example.org/").unwrap();
        let safe = Address::repeat_byte(0x5a);
        assert_eq!(
            client.endpoint(&safe),
            format!(
                "https://safe-transaction.example.org/api/v1/safes/{}/multisig-transactions/",
                safe.to_checksum(None)
            )
        );
    }

    #[test]
    fn test_parse_queue_page() {
        let body = r#"{
            "count": 2,
            "next": "https://safe-transaction.example.org/api/v1/safes/x/multisig-transactions/?offset=100",
            "results": [
                {"nonce": 5, "to": "0xbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbb", "data": "0x0102", "isExecuted": false},
                {"nonce": "6", "to": "0xbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbb", "data": null}
            ]
        }"#;
        let (queued, next) = parse_queue_page(body).unwrap();
        assert_eq!(
            queued,
            vec![
                QueuedTransaction {
                    nonce: U256::from(5u64),
                    to: Address::repeat_byte(0xbb),
                    data: Bytes::from(vec![0x01, 0x02]),
                },
                QueuedTransaction {
                    nonce: U256::from(6u64),
                    to: Address::repeat_byte(0xbb),
                    data: Bytes::new(),
                },
            ]
        );
        assert!(next.unwrap().ends_with("offset=100"));
    }

    #[test]
    fn test_parse_queue_page_rejects_bad_entries() {
        assert!(parse_queue_page("not json").is_err());
        assert!(parse_queue_page(r#"{"results": [{"to": "0x00"}]}"#).is_err());
        let (queued, next) = parse_queue_page(r#"{"next": null, "results": []}"#).unwrap();
        assert!(queued.is_empty());
        assert!(next.is_none());
    }

    #[test]
    fn test_invalid_base_url() {
        assert!(SafeServiceClient::new("not a url").is_err());
    }
}
