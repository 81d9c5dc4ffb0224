//! EVM RPC transport
//!
//! The relay core only needs three reads from the chain: filtered logs, the
//! Safe's current nonce and the latest block number. [`EvmRpc`] is the seam
//! tests replace with in-memory mocks; [`AlloyRpc`] is the HTTP adapter.

use alloy::eips::BlockNumberOrTag;
use alloy::primitives::{Address, Bytes, B256, U256};
use alloy::providers::{Provider, ProviderBuilder, RootProvider};
use alloy::rpc::types::{Filter, Log};
use alloy::transports::http::{Client, Http};
use async_trait::async_trait;
use eyre::{Result, WrapErr};
use tracing::debug;

use crate::contracts::ISafe;
use crate::types::BlockRange;

/// A log as returned by `eth_getLogs`, before any decoding
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RawLog {
    pub address: Address,
    pub topics: Vec<B256>,
    pub data: Bytes,
    pub block_number: Option<u64>,
    pub transaction_hash: Option<B256>,
    pub log_index: Option<u64>,
}

impl From<Log> for RawLog {
    fn from(log: Log) -> Self {
        Self {
            address: log.address(),
            topics: log.topics().to_vec(),
            data: log.data().data.clone(),
            block_number: log.block_number,
            transaction_hash: log.transaction_hash,
            log_index: log.log_index,
        }
    }
}

/// Chain reads required by the relay
#[async_trait]
pub trait EvmRpc: Send + Sync {
    /// Logs emitted by `address` with `topic` as topic 0, within `range`
    async fn query_logs(&self, address: Address, topic: B256, range: BlockRange)
        -> Result<Vec<RawLog>>;

    /// Current nonce of a Safe
    async fn safe_nonce(&self, safe: Address) -> Result<U256>;

    /// Latest block number
    async fn latest_block(&self) -> Result<u64>;
}

/// HTTP JSON-RPC adapter backed by an alloy provider
pub struct AlloyRpc {
    provider: RootProvider<Http<Client>>,
}

impl AlloyRpc {
    pub fn new(rpc_url: &str) -> Result<Self> {
        let url = rpc_url.parse().wrap_err("Failed to parse RPC URL")?;
        let provider = ProviderBuilder::new().on_http(url);
        Ok(Self { provider })
    }
}

#[async_trait]
impl EvmRpc for AlloyRpc {
    async fn query_logs(
        &self,
        address: Address,
        topic: B256,
        range: BlockRange,
    ) -> Result<Vec<RawLog>> {
        let to_block = match range.to {
            Some(block) => BlockNumberOrTag::Number(block),
            None => BlockNumberOrTag::Latest,
        };
        let filter = Filter::new()
            .address(address)
            .event_signature(topic)
            .from_block(range.start())
            .to_block(to_block);

        let logs = self
            .provider
            .get_logs(&filter)
            .await
            .wrap_err_with(|| format!("Failed to get logs for blocks {}", range))?;

        debug!(
            contract = %address,
            range = %range,
            count = logs.len(),
            "Fetched logs"
        );

        Ok(logs.into_iter().map(RawLog::from).collect())
    }

    async fn safe_nonce(&self, safe: Address) -> Result<U256> {
        let contract = ISafe::new(safe, &self.provider);
        let nonce = contract
            .nonce()
            .call()
            .await
            .wrap_err_with(|| format!("Failed to query nonce of Safe {}", safe))?;
        Ok(nonce._0)
    }

    async fn latest_block(&self) -> Result<u64> {
        self.provider
            .get_block_number()
            .await
            .wrap_err("Failed to get block number")
    }
}
