//! Canonical call encoder for the bridge contract
//!
//! The set of callable methods is closed: an encoder is built for a list of
//! method names and rejects unknown names up front. Arguments are checked
//! against the method's parameter types before encoding, so a mismatch is an
//! error rather than a malformed payload.

use alloy::dyn_abi::{DynSolType, DynSolValue};
use alloy::primitives::{Address, Bytes, U256};
use alloy::sol_types::SolCall;
use std::fmt;
use std::str::FromStr;

use crate::contracts::Bridge;
use crate::error::BridgeError;

/// Bridge contract methods the relay knows how to encode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BridgeMethod {
    Mint,
    Burn,
}

impl BridgeMethod {
    pub const ALL: [BridgeMethod; 2] = [BridgeMethod::Mint, BridgeMethod::Burn];

    pub fn name(&self) -> &'static str {
        match self {
            BridgeMethod::Mint => "mint",
            BridgeMethod::Burn => "burn",
        }
    }

    /// Canonical signature string the selector is derived from
    pub fn signature(&self) -> &'static str {
        match self {
            BridgeMethod::Mint => Bridge::mintCall::SIGNATURE,
            BridgeMethod::Burn => Bridge::burnCall::SIGNATURE,
        }
    }

    pub fn selector(&self) -> [u8; 4] {
        crate::hash::selector(self.signature())
    }

    pub fn param_types(&self) -> Vec<DynSolType> {
        match self {
            BridgeMethod::Mint => vec![
                DynSolType::Address,
                DynSolType::Address,
                DynSolType::Uint(256),
                DynSolType::String,
            ],
            BridgeMethod::Burn => vec![
                DynSolType::Address,
                DynSolType::String,
                DynSolType::Uint(256),
            ],
        }
    }
}

impl fmt::Display for BridgeMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl FromStr for BridgeMethod {
    type Err = BridgeError;

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        BridgeMethod::ALL
            .iter()
            .copied()
            .find(|m| m.name() == name)
            .ok_or_else(|| BridgeError::Encoding(format!("unsupported bridge method '{}'", name)))
    }
}

/// Encodes calls for a fixed set of bridge methods
#[derive(Debug, Clone)]
pub struct CallEncoder {
    methods: Vec<BridgeMethod>,
}

impl CallEncoder {
    /// Build an encoder for the named methods, rejecting any unknown name.
    pub fn new<S: AsRef<str>>(method_names: &[S]) -> Result<Self, BridgeError> {
        let mut methods = Vec::with_capacity(method_names.len());
        for name in method_names {
            let method: BridgeMethod = name.as_ref().parse()?;
            if !methods.contains(&method) {
                methods.push(method);
            }
        }
        if methods.is_empty() {
            return Err(BridgeError::Encoding(
                "call encoder needs at least one method".to_string(),
            ));
        }
        Ok(Self { methods })
    }

    /// Encoder for the methods the relay submits through the Safe
    pub fn relay() -> Self {
        Self {
            methods: vec![BridgeMethod::Mint],
        }
    }

    pub fn supports(&self, method: BridgeMethod) -> bool {
        self.methods.contains(&method)
    }

    /// Selector followed by the ABI-encoded arguments.
    pub fn encode(&self, method: BridgeMethod, args: &[DynSolValue]) -> Result<Bytes, BridgeError> {
        if !self.supports(method) {
            return Err(BridgeError::Encoding(format!(
                "method '{}' is not enabled on this encoder",
                method
            )));
        }

        let params = method.param_types();
        if params.len() != args.len() {
            return Err(BridgeError::Encoding(format!(
                "{} expects {} arguments, got {}",
                method.signature(),
                params.len(),
                args.len()
            )));
        }
        for (index, (ty, value)) in params.iter().zip(args).enumerate() {
            if !ty.matches(value) {
                return Err(BridgeError::Encoding(format!(
                    "{} argument {} must be {}, got {:?}",
                    method.signature(),
                    index,
                    ty,
                    value
                )));
            }
        }

        let encoded = DynSolValue::Tuple(args.to_vec()).abi_encode_params();
        let mut data = Vec::with_capacity(4 + encoded.len());
        data.extend_from_slice(&method.selector());
        data.extend_from_slice(&encoded);
        Ok(Bytes::from(data))
    }

    /// Encode `mint(token, recipient, amount, depositTxId)`.
    pub fn encode_mint(
        &self,
        token: Address,
        recipient: Address,
        amount: U256,
        deposit_tx_id: &str,
    ) -> Result<Bytes, BridgeError> {
        self.encode(
            BridgeMethod::Mint,
            &[
                DynSolValue::Address(token),
                DynSolValue::Address(recipient),
                DynSolValue::Uint(amount, 256),
                DynSolValue::String(deposit_tx_id.to_string()),
            ],
        )
    }
}
