//! Mint and release flows
//!
//! Mint: registry -> fees -> call encoding -> (per-Safe lock) nonce and queue
//! check -> digest -> signature -> proposal. Release: registry -> fees -> ledger release ->
//! burn record.
//!
//! Any stage failure aborts the operation; nothing is proposed unless every
//! earlier stage succeeded.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use alloy::primitives::{Address, U256};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use tracing::{debug, info, warn};

use crate::encoder::CallEncoder;
use crate::error::BridgeError;
use crate::events::to_entry;
use crate::fees;
use crate::metrics;
use crate::ledger::NativeLedger;
use crate::registry::TokenRegistry;
use crate::safe_api::SafeApi;
use crate::safe_tx::{build_digest, AuthorizationRequest, SafeDomain, SafeTransaction};
use crate::signer::SafeSigner;
use crate::transport::EvmRpc;
use crate::types::{BurnEvent, Deposit, FeeSchedule, Operation, ReleaseInstruction};

/// Highest nonce proposed through this process, per Safe
pub type NonceCursor = Option<U256>;

/// One async lock per Safe address
///
/// Holding the guard serializes nonce selection and submission for that
/// Safe. The guarded value remembers the last nonce proposed, since the
/// on-chain nonce only advances once a proposal is executed.
#[derive(Debug, Default)]
pub struct SafeLocks {
    locks: Mutex<HashMap<Address, Arc<AsyncMutex<NonceCursor>>>>,
}

impl SafeLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn acquire(&self, safe: Address) -> OwnedMutexGuard<NonceCursor> {
        let lock = {
            let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
            locks.entry(safe).or_default().clone()
        };
        lock.lock_owned().await
    }
}

/// Next nonce to propose given the on-chain nonce and the last proposal
pub fn next_nonce(onchain: U256, last_proposed: NonceCursor) -> U256 {
    match last_proposed {
        Some(last) if last >= onchain => last + U256::from(1u64),
        _ => onchain,
    }
}

/// Static parameters of a relay deployment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RelaySettings {
    /// Bridge contract the Safe calls
    pub bridge: Address,
    /// Safe that owns the bridge
    pub safe: Address,
    pub domain: SafeDomain,
    pub fees: FeeSchedule,
}

/// Drives mints and releases against the configured collaborators
pub struct Relay {
    settings: RelaySettings,
    registry: Arc<TokenRegistry>,
    encoder: CallEncoder,
    signer: SafeSigner,
    rpc: Arc<dyn EvmRpc>,
    safe_api: Arc<dyn SafeApi>,
    ledger: Arc<dyn NativeLedger>,
    locks: SafeLocks,
}

impl Relay {
    pub fn new(
        settings: RelaySettings,
        registry: Arc<TokenRegistry>,
        signer: SafeSigner,
        rpc: Arc<dyn EvmRpc>,
        safe_api: Arc<dyn SafeApi>,
        ledger: Arc<dyn NativeLedger>,
    ) -> Result<Self, BridgeError> {
        fees::validate_schedule(&settings.fees)?;
        Ok(Self {
            settings,
            registry,
            encoder: CallEncoder::relay(),
            signer,
            rpc,
            safe_api,
            ledger,
            locks: SafeLocks::new(),
        })
    }

    pub fn settings(&self) -> &RelaySettings {
        &self.settings
    }

    pub fn registry(&self) -> &TokenRegistry {
        &self.registry
    }

    pub fn rpc(&self) -> Arc<dyn EvmRpc> {
        self.rpc.clone()
    }

    pub fn ledger(&self) -> Arc<dyn NativeLedger> {
        self.ledger.clone()
    }

    /// Propose a Safe transaction minting wrapped tokens for `deposit`.
    pub async fn mint(&self, deposit: &Deposit) -> Result<AuthorizationRequest, BridgeError> {
        let token = self.registry.by_url(&deposit.token_url)?.clone();
        let op = fees::apply(Operation::mint(token, deposit.amount), &self.settings.fees)?;

        debug!(
            deposit = %deposit.tx_id,
            input = %op.input,
            output = %op.output,
            "Mint amount computed"
        );

        let data = self.encoder.encode_mint(
            op.token.evm_address,
            deposit.recipient,
            op.output,
            &deposit.tx_id,
        )?;

        let safe = self.settings.safe;
        let mut cursor = self.locks.acquire(safe).await;

        let onchain = self
            .rpc
            .safe_nonce(safe)
            .await
            .map_err(BridgeError::transport)?;

        let queued = self.safe_api.queued_transactions(safe, onchain).await?;
        if let Some(existing) = queued
            .iter()
            .find(|q| q.to == self.settings.bridge && q.data == data)
        {
            metrics::record_proposal("duplicate");
            info!(
                safe = %safe,
                nonce = %existing.nonce,
                deposit = %deposit.tx_id,
                "Mint already queued"
            );
            return Err(BridgeError::AlreadyProposed {
                deposit: deposit.tx_id.clone(),
                nonce: existing.nonce,
            });
        }

        let highest_queued = queued.iter().map(|q| q.nonce).max();
        let nonce = next_nonce(onchain, (*cursor).max(highest_queued));

        let tx = SafeTransaction::call(self.settings.bridge, data, nonce);
        let digest = build_digest(&safe, &tx, self.settings.domain);
        let signature = self.signer.sign(&digest)?;

        let request = AuthorizationRequest {
            safe,
            tx,
            digest,
            signature,
            sender: self.signer.address(),
        };

        if let Err(e) = self.safe_api.propose(&request).await {
            metrics::record_proposal("rejected");
            return Err(e);
        }
        *cursor = Some(nonce);
        metrics::record_proposal("submitted");

        info!(
            safe = %safe,
            nonce = %nonce,
            deposit = %deposit.tx_id,
            token = %op.token.symbol,
            recipient = %deposit.recipient,
            amount = %op.output,
            safe_tx_hash = %request.digest,
            "Mint proposed"
        );

        Ok(request)
    }

    /// Release native tokens for `burn` and record it on the ledger.
    ///
    /// Once the release is submitted, a failure to record it is reported as
    /// `ReleaseUnrecorded`: the caller must retry [`Relay::record_burn`] only.
    pub async fn release(&self, burn: &BurnEvent) -> Result<ReleaseInstruction, BridgeError> {
        let token = self.registry.by_address(&burn.token)?.clone();
        let op = fees::apply(Operation::release(token, burn.amount), &self.settings.fees)?;

        let instruction = ReleaseInstruction {
            token_url: op.token.url.clone(),
            destination: burn.destination.clone(),
            amount: op.output,
            burn_tx_hash: burn.tx_hash,
        };
        let entry = to_entry(burn)?;

        let ledger_tx = self
            .ledger
            .submit_release(&instruction)
            .await
            .map_err(BridgeError::transport)?;
        if let Err(e) = self.ledger.record_burn(&entry).await {
            warn!(
                burn = %burn.tx_id,
                ledger_tx = %ledger_tx,
                error = %e,
                "Release submitted but burn not recorded"
            );
            return Err(BridgeError::ReleaseUnrecorded {
                burn: burn.tx_id.clone(),
                ledger_tx,
                reason: format!("{:#}", e),
            });
        }

        info!(
            burn = %burn.tx_id,
            block = burn.block_height,
            token = %op.token.symbol,
            destination = %instruction.destination,
            amount = %instruction.amount,
            ledger_tx = %ledger_tx,
            "Release submitted"
        );

        Ok(instruction)
    }

    /// Record an already released burn on the ledger.
    pub async fn record_burn(&self, burn: &BurnEvent) -> Result<(), BridgeError> {
        let entry = to_entry(burn)?;
        self.ledger
            .record_burn(&entry)
            .await
            .map_err(BridgeError::transport)?;
        info!(burn = %burn.tx_id, "Burn recorded");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_next_nonce_follows_chain() {
        assert_eq!(next_nonce(U256::from(5u64), None), U256::from(5u64));
        // proposals already executed
        assert_eq!(
            next_nonce(U256::from(5u64), Some(U256::from(3u64))),
            U256::from(5u64)
        );
    }

    #[test]
    fn test_next_nonce_skips_pending_proposal() {
        assert_eq!(
            next_nonce(U256::from(5u64), Some(U256::from(5u64))),
            U256::from(6u64)
        );
        assert_eq!(
            next_nonce(U256::from(5u64), Some(U256::from(7u64))),
            U256::from(8u64)
        );
    }

    #[tokio::test]
    async fn test_safe_locks_serialize_per_address() {
        let locks = Arc::new(SafeLocks::new());
        let safe = Address::repeat_byte(0x5a);

        let mut guard = locks.acquire(safe).await;
        *guard = Some(U256::from(1u64));

        // a different Safe is not blocked
        let other = locks.acquire(Address::repeat_byte(0x5b)).await;
        assert!(other.is_none());
        drop(other);

        let waiter = {
            let locks = locks.clone();
            tokio::spawn(async move { *locks.acquire(safe).await })
        };
        tokio::task::yield_now().await;
        assert!(!waiter.is_finished());

        drop(guard);
        assert_eq!(waiter.await.unwrap(), Some(U256::from(1u64)));
    }
}
