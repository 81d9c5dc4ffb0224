//! Token registry
//!
//! Loaded once at startup from a JSON array of tokens, then shared read-only.

use std::collections::HashMap;
use std::path::Path;

use alloy::primitives::Address;
use tracing::info;

use crate::error::BridgeError;
use crate::fees::validate_token;
use crate::types::Token;

#[derive(Debug, Clone, Default)]
pub struct TokenRegistry {
    tokens: Vec<Token>,
    by_url: HashMap<String, usize>,
    by_address: HashMap<Address, usize>,
}

impl TokenRegistry {
    /// Build a registry, rejecting duplicate URLs or EVM addresses.
    pub fn new(tokens: Vec<Token>) -> Result<Self, BridgeError> {
        let mut by_url = HashMap::with_capacity(tokens.len());
        let mut by_address = HashMap::with_capacity(tokens.len());

        for (index, token) in tokens.iter().enumerate() {
            validate_token(token)?;
            if by_url.insert(token.url.to_lowercase(), index).is_some() {
                return Err(BridgeError::InvalidConfiguration(format!(
                    "duplicate token url {}",
                    token.url
                )));
            }
            if by_address.insert(token.evm_address, index).is_some() {
                return Err(BridgeError::InvalidConfiguration(format!(
                    "duplicate token address {}",
                    token.evm_address
                )));
            }
        }

        Ok(Self {
            tokens,
            by_url,
            by_address,
        })
    }

    pub fn from_json(json: &str) -> Result<Self, BridgeError> {
        let tokens: Vec<Token> = serde_json::from_str(json).map_err(|e| {
            BridgeError::InvalidConfiguration(format!("invalid token registry: {}", e))
        })?;
        Self::new(tokens)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, BridgeError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|e| {
            BridgeError::InvalidConfiguration(format!(
                "failed to read token registry {}: {}",
                path.display(),
                e
            ))
        })?;
        let registry = Self::from_json(&json)?;
        info!(
            path = %path.display(),
            tokens = registry.len(),
            "Token registry loaded"
        );
        Ok(registry)
    }

    /// Lookup by native-ledger URL (case-insensitive)
    pub fn by_url(&self, url: &str) -> Result<&Token, BridgeError> {
        self.by_url
            .get(&url.to_lowercase())
            .map(|&i| &self.tokens[i])
            .ok_or_else(|| BridgeError::UnknownToken(url.to_string()))
    }

    /// Lookup by wrapped token contract
    pub fn by_address(&self, address: &Address) -> Result<&Token, BridgeError> {
        self.by_address
            .get(address)
            .map(|&i| &self.tokens[i])
            .ok_or_else(|| BridgeError::UnknownToken(address.to_string()))
    }

    pub fn tokens(&self) -> &[Token] {
        &self.tokens
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }
}
