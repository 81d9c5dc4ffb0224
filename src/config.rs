//! Relay configuration
//!
//! Read from environment variables, optionally seeded from a `.env` file.

use eyre::{eyre, Result, WrapErr};
use std::env;
use std::fmt::Display;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use alloy::primitives::Address;

use crate::bounded_cache::DEFAULT_TTL_SECS;
use crate::events::logs::DEFAULT_MAX_BLOCK_RANGE;
use crate::redact::Redacted;
use crate::safe_tx::SafeDomain;
use crate::types::{FeeSchedule, BPS_DENOMINATOR};
use crate::watcher::WatcherConfig;

/// Main configuration for the relay
#[derive(Debug, Clone)]
pub struct Config {
    pub evm: EvmConfig,
    pub ledger: LedgerConfig,
    pub fees: FeeSchedule,
    pub relay: RelayConfig,
}

/// EVM chain, bridge and Safe
#[derive(Debug, Clone)]
pub struct EvmConfig {
    pub rpc_url: String,
    pub chain_id: u64,
    pub bridge_address: Address,
    pub safe_address: Address,
    /// Base URL of the Safe transaction service
    pub safe_api_url: String,
    /// Include the chain id in the EIP-712 domain (Safe >= 1.3.0)
    pub chain_bound_domain: bool,
    /// Safe owner key used to sign proposals
    pub private_key: Redacted<String>,
}

/// Native ledger
#[derive(Debug, Clone)]
pub struct LedgerConfig {
    pub rpc_url: String,
    pub token_registry_path: PathBuf,
}

/// Polling loop
#[derive(Debug, Clone)]
pub struct RelayConfig {
    /// First block to scan; defaults to the confirmed head at startup
    pub start_block: Option<u64>,
    pub confirmations: u64,
    pub max_block_range: u64,
    pub poll_interval_ms: u64,
    pub dedupe_cache_size: usize,
}

fn default_confirmations() -> u64 {
    1
}

fn default_poll_interval() -> u64 {
    5000
}

fn default_dedupe_cache_size() -> usize {
    10_000
}

fn default_fee_bps() -> u32 {
    10
}

fn required(name: &str) -> Result<String> {
    env::var(name).map_err(|_| eyre!("{} environment variable is required", name))
}

fn optional<T>(name: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: Display,
{
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|e| eyre!("{} has an invalid value {:?}: {}", name, raw, e)),
        Err(_) => Ok(None),
    }
}

fn parse_address(name: &str) -> Result<Address> {
    let raw = required(name)?;
    Address::from_str(raw.trim()).wrap_err_with(|| format!("{} must be a valid EVM address", name))
}

impl Config {
    /// Load `.env` if present, then read the environment.
    pub fn load() -> Result<Self> {
        Self::load_from_file(".env")
    }

    /// Load from a specific .env file path
    pub fn load_from_file(path: &str) -> Result<Self> {
        if Path::new(path).exists() {
            dotenvy::from_filename(path)
                .wrap_err_with(|| format!("Failed to load .env file from {}", path))?;
        }
        Self::load_from_env()
    }

    /// Load configuration from environment variables
    pub fn load_from_env() -> Result<Self> {
        let evm = EvmConfig {
            rpc_url: required("EVM_RPC_URL")?,
            chain_id: required("EVM_CHAIN_ID")?
                .trim()
                .parse()
                .wrap_err("EVM_CHAIN_ID must be a valid u64")?,
            bridge_address: parse_address("BRIDGE_ADDRESS")?,
            safe_address: parse_address("SAFE_ADDRESS")?,
            safe_api_url: required("SAFE_API_URL")?,
            chain_bound_domain: optional("SAFE_DOMAIN_CHAIN_BINDING")?.unwrap_or(true),
            private_key: Redacted::new(required("EVM_PRIVATE_KEY")?),
        };

        let ledger = LedgerConfig {
            rpc_url: required("LEDGER_RPC_URL")?,
            token_registry_path: PathBuf::from(required("TOKEN_REGISTRY_PATH")?),
        };

        let fees = FeeSchedule {
            mint_fee_bps: optional("MINT_FEE_BPS")?.unwrap_or_else(default_fee_bps),
            burn_fee_bps: optional("BURN_FEE_BPS")?.unwrap_or_else(default_fee_bps),
        };

        let relay = RelayConfig {
            start_block: optional("START_BLOCK")?,
            confirmations: optional("CONFIRMATIONS")?.unwrap_or_else(default_confirmations),
            max_block_range: optional("MAX_BLOCK_RANGE")?.unwrap_or(DEFAULT_MAX_BLOCK_RANGE),
            poll_interval_ms: optional("POLL_INTERVAL_MS")?.unwrap_or_else(default_poll_interval),
            dedupe_cache_size: optional("DEDUPE_CACHE_SIZE")?
                .unwrap_or_else(default_dedupe_cache_size),
        };

        let config = Config {
            evm,
            ledger,
            fees,
            relay,
        };

        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.evm.rpc_url.trim().is_empty() {
            return Err(eyre!("EVM_RPC_URL cannot be empty"));
        }
        if self.evm.chain_id == 0 {
            return Err(eyre!("EVM_CHAIN_ID cannot be 0"));
        }
        if self.evm.safe_api_url.trim().is_empty() {
            return Err(eyre!("SAFE_API_URL cannot be empty"));
        }
        if self.evm.bridge_address == Address::ZERO || self.evm.safe_address == Address::ZERO {
            return Err(eyre!("BRIDGE_ADDRESS and SAFE_ADDRESS cannot be the zero address"));
        }

        let key = self.evm.private_key.expose().trim();
        let hex_part = key.strip_prefix("0x").unwrap_or(key);
        if hex_part.len() != 64 || !hex_part.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(eyre!("EVM_PRIVATE_KEY must be 64 hex chars (optionally 0x-prefixed)"));
        }

        if self.ledger.rpc_url.trim().is_empty() {
            return Err(eyre!("LEDGER_RPC_URL cannot be empty"));
        }

        if self.fees.mint_fee_bps >= BPS_DENOMINATOR || self.fees.burn_fee_bps >= BPS_DENOMINATOR {
            return Err(eyre!("fees must be below {} bps", BPS_DENOMINATOR));
        }

        if self.relay.max_block_range == 0 {
            return Err(eyre!("MAX_BLOCK_RANGE must be at least 1"));
        }
        if self.relay.poll_interval_ms == 0 {
            return Err(eyre!("POLL_INTERVAL_MS must be at least 1"));
        }
        if self.relay.dedupe_cache_size == 0 {
            return Err(eyre!("DEDUPE_CACHE_SIZE must be at least 1"));
        }

        Ok(())
    }

    /// EIP-712 domain the Safe signatures are bound to
    pub fn safe_domain(&self) -> SafeDomain {
        if self.evm.chain_bound_domain {
            SafeDomain::ChainBound {
                chain_id: self.evm.chain_id,
            }
        } else {
            SafeDomain::Legacy
        }
    }

    pub fn watcher_config(&self) -> WatcherConfig {
        WatcherConfig {
            poll_interval: Duration::from_millis(self.relay.poll_interval_ms),
            confirmations: self.relay.confirmations,
            max_block_range: self.relay.max_block_range,
            start_block: self.relay.start_block,
            dedupe_cache_size: self.relay.dedupe_cache_size,
            dedupe_ttl: Duration::from_secs(DEFAULT_TTL_SECS),
        }
    }
}
