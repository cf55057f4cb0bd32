use std::collections::HashMap;

use parking_lot::Mutex;
use sha2::{Digest, Sha256};

use crate::connector::{ChainConnector, ChainEvent, ExtrinsicOutcome, OnchainVoucher, VoucherCall};
use crate::errors::{VoucherError, VoucherResult};
use crate::identity::SigningIdentity;
use crate::types::{AccountId, ProgramId, VoucherId};

use async_trait::async_trait;

/// Deterministic in-memory chain stand-in. Backs the binary in local mode
/// and the integration tests; it models the parts of node behavior the
/// lifecycle manager depends on: per-account nonces, balance transfers
/// between the issuer and keyless voucher accounts, and inclusion events
/// for every submitted call.
#[derive(Default)]
pub struct LocalConnector {
    state: Mutex<LocalState>,
}

#[derive(Default)]
struct LocalState {
    height: u64,
    nonces: HashMap<AccountId, u64>,
    balances: HashMap<AccountId, u128>,
    vouchers: HashMap<VoucherId, LocalVoucher>,
}

struct LocalVoucher {
    spender: AccountId,
    programs: Vec<ProgramId>,
    expiry_block: u64,
}

impl LocalConnector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Credits `address` out of thin air. Local mode only.
    pub fn fund(&self, address: &AccountId, amount: u128) {
        let mut state = self.state.lock();
        *state.balances.entry(*address).or_default() += amount;
    }

    fn derive_voucher_id(issuer: &AccountId, nonce: u64) -> VoucherId {
        let mut hasher = Sha256::new();
        hasher.update(issuer.as_bytes());
        hasher.update(nonce.to_le_bytes());
        VoucherId(hasher.finalize().into())
    }

    fn apply(state: &mut LocalState, call: VoucherCall, issuer: &AccountId) -> Vec<ChainEvent> {
        match call {
            VoucherCall::Issue {
                spender,
                programs,
                balance,
                duration_blocks,
            } => {
                let issuer_balance = state.balances.entry(*issuer).or_default();
                if *issuer_balance < balance {
                    return vec![ChainEvent::ExtrinsicFailed {
                        reason: "issuer balance too low".to_string(),
                    }];
                }
                *issuer_balance -= balance;
                let nonce = state.nonces.get(issuer).copied().unwrap_or_default();
                let voucher_id = Self::derive_voucher_id(issuer, nonce);
                state.balances.insert(voucher_id.as_address(), balance);
                state.vouchers.insert(
                    voucher_id,
                    LocalVoucher {
                        spender,
                        programs,
                        expiry_block: state.height + u64::from(duration_blocks),
                    },
                );
                vec![ChainEvent::VoucherIssued { voucher_id }]
            }
            VoucherCall::Update {
                voucher_id,
                balance_top_up,
                prolong_duration,
                ..
            } => {
                if !state.vouchers.contains_key(&voucher_id) {
                    return vec![ChainEvent::ExtrinsicFailed {
                        reason: "voucher does not exist".to_string(),
                    }];
                }
                if let Some(top_up) = balance_top_up {
                    let issuer_balance = state.balances.entry(*issuer).or_default();
                    if *issuer_balance < top_up {
                        return vec![ChainEvent::ExtrinsicFailed {
                            reason: "issuer balance too low".to_string(),
                        }];
                    }
                    *issuer_balance -= top_up;
                    *state.balances.entry(voucher_id.as_address()).or_default() += top_up;
                }
                if let Some(blocks) = prolong_duration {
                    if let Some(voucher) = state.vouchers.get_mut(&voucher_id) {
                        voucher.expiry_block += u64::from(blocks);
                    }
                }
                vec![ChainEvent::VoucherUpdated { voucher_id }]
            }
            VoucherCall::Revoke { voucher_id, .. } => {
                if state.vouchers.remove(&voucher_id).is_none() {
                    return vec![ChainEvent::ExtrinsicFailed {
                        reason: "voucher does not exist".to_string(),
                    }];
                }
                let remaining = state
                    .balances
                    .remove(&voucher_id.as_address())
                    .unwrap_or_default();
                *state.balances.entry(*issuer).or_default() += remaining;
                vec![ChainEvent::VoucherRevoked { voucher_id }]
            }
        }
    }
}

#[async_trait]
impl ChainConnector for LocalConnector {
    async fn is_ready(&self) -> VoucherResult<()> {
        Ok(())
    }

    async fn query_balance(&self, address: &AccountId) -> VoucherResult<u128> {
        self.state
            .lock()
            .balances
            .get(address)
            .copied()
            .ok_or_else(|| VoucherError::NotFound(format!("no balance entry for {address}")))
    }

    async fn query_vouchers_for_account(
        &self,
        account: &AccountId,
    ) -> VoucherResult<Vec<OnchainVoucher>> {
        let state = self.state.lock();
        let mut vouchers: Vec<OnchainVoucher> = state
            .vouchers
            .iter()
            .filter(|(_, voucher)| voucher.spender == *account)
            .map(|(voucher_id, voucher)| OnchainVoucher {
                voucher_id: *voucher_id,
                programs: voucher.programs.clone(),
                expiry_block: voucher.expiry_block,
            })
            .collect();
        vouchers.sort_by_key(|voucher| voucher.expiry_block);
        Ok(vouchers)
    }

    async fn next_sequence_number(&self, address: &AccountId) -> VoucherResult<u64> {
        Ok(self
            .state
            .lock()
            .nonces
            .get(address)
            .copied()
            .unwrap_or_default())
    }

    async fn submit(
        &self,
        call: VoucherCall,
        signer: &SigningIdentity,
        nonce: u64,
    ) -> VoucherResult<ExtrinsicOutcome> {
        let payload = call.encode()?;
        let signature = signer.sign(&payload);
        signer.verify(&payload, &signature)?;

        let mut state = self.state.lock();
        let issuer = *signer.address();
        let expected = state.nonces.get(&issuer).copied().unwrap_or_default();
        if nonce != expected {
            return Err(VoucherError::ChainRejection(format!(
                "invalid transaction sequence number: got {nonce}, expected {expected}"
            )));
        }

        let events = Self::apply(&mut state, call, &issuer);
        state.nonces.insert(issuer, expected + 1);
        state.height += 1;
        Ok(ExtrinsicOutcome {
            block_hash: format!("0x{:064x}", state.height),
            events,
        })
    }
}
