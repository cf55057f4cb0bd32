#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::time;

use voucher_service::connector::{
    ChainConnector, ChainEvent, ExtrinsicOutcome, OnchainVoucher, VoucherCall,
};
use voucher_service::errors::{VoucherError, VoucherResult};
use voucher_service::identity::SigningIdentity;
use voucher_service::manager::VoucherManager;
use voucher_service::types::{AccountId, ProgramId, VoucherId};

pub const TEST_SEED: &str = "1111111111111111111111111111111111111111111111111111111111111111";

pub fn test_identity() -> SigningIdentity {
    SigningIdentity::from_seed_hex(TEST_SEED).expect("test seed")
}

pub fn account(byte: u8) -> AccountId {
    AccountId([byte; 32])
}

pub fn program(byte: u8) -> ProgramId {
    ProgramId([byte; 32])
}

pub fn voucher(byte: u8) -> VoucherId {
    VoucherId([byte; 32])
}

pub fn manager_with(connector: Arc<MockConnector>) -> Arc<VoucherManager> {
    manager_with_timeout(connector, Duration::from_secs(5))
}

pub fn manager_with_timeout(
    connector: Arc<MockConnector>,
    inclusion_timeout: Duration,
) -> Arc<VoucherManager> {
    Arc::new(VoucherManager::new(
        connector,
        test_identity(),
        program(0xbb),
        inclusion_timeout,
    ))
}

/// Scripted chain connector: submissions pop pre-queued outcomes and are
/// recorded for inspection. Issued and revoked vouchers are mirrored into
/// the balance/voucher tables so follow-up queries behave like a node.
#[derive(Default)]
pub struct MockConnector {
    balances: Mutex<HashMap<AccountId, u128>>,
    vouchers: Mutex<HashMap<AccountId, Vec<OnchainVoucher>>>,
    outcomes: Mutex<VecDeque<VoucherResult<ExtrinsicOutcome>>>,
    submitted: Mutex<Vec<VoucherCall>>,
    nonce: AtomicU64,
    hang_submissions: AtomicBool,
}

impl MockConnector {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn set_balance(&self, address: AccountId, raw: u128) {
        self.balances.lock().insert(address, raw);
    }

    pub fn clear_balance(&self, address: &AccountId) {
        self.balances.lock().remove(address);
    }

    pub fn add_voucher(&self, owner: AccountId, record: OnchainVoucher) {
        self.vouchers.lock().entry(owner).or_default().push(record);
    }

    pub fn push_events(&self, events: Vec<ChainEvent>) {
        self.outcomes.lock().push_back(Ok(ExtrinsicOutcome {
            block_hash: "0xfeed".to_string(),
            events,
        }));
    }

    pub fn push_error(&self, err: VoucherError) {
        self.outcomes.lock().push_back(Err(err));
    }

    pub fn hang_submissions(&self) {
        self.hang_submissions.store(true, Ordering::SeqCst);
    }

    pub fn submitted(&self) -> Vec<VoucherCall> {
        self.submitted.lock().clone()
    }

    fn mirror(&self, call: &VoucherCall, events: &[ChainEvent]) {
        for event in events {
            match event {
                ChainEvent::VoucherIssued { voucher_id } => {
                    if let VoucherCall::Issue {
                        spender,
                        programs,
                        balance,
                        duration_blocks,
                    } = call
                    {
                        self.add_voucher(
                            *spender,
                            OnchainVoucher {
                                voucher_id: *voucher_id,
                                programs: programs.clone(),
                                expiry_block: u64::from(*duration_blocks),
                            },
                        );
                        self.set_balance(voucher_id.as_address(), *balance);
                    }
                }
                ChainEvent::VoucherRevoked { voucher_id } => {
                    self.clear_balance(&voucher_id.as_address());
                    for records in self.vouchers.lock().values_mut() {
                        records.retain(|record| record.voucher_id != *voucher_id);
                    }
                }
                _ => {}
            }
        }
    }
}

#[async_trait]
impl ChainConnector for MockConnector {
    async fn is_ready(&self) -> VoucherResult<()> {
        Ok(())
    }

    async fn query_balance(&self, address: &AccountId) -> VoucherResult<u128> {
        self.balances
            .lock()
            .get(address)
            .copied()
            .ok_or_else(|| VoucherError::NotFound(format!("no balance entry for {address}")))
    }

    async fn query_vouchers_for_account(
        &self,
        account: &AccountId,
    ) -> VoucherResult<Vec<OnchainVoucher>> {
        Ok(self
            .vouchers
            .lock()
            .get(account)
            .cloned()
            .unwrap_or_default())
    }

    async fn next_sequence_number(&self, _address: &AccountId) -> VoucherResult<u64> {
        Ok(self.nonce.load(Ordering::SeqCst))
    }

    async fn submit(
        &self,
        call: VoucherCall,
        _signer: &SigningIdentity,
        _nonce: u64,
    ) -> VoucherResult<ExtrinsicOutcome> {
        if self.hang_submissions.load(Ordering::SeqCst) {
            time::sleep(Duration::from_secs(3600)).await;
        }
        self.submitted.lock().push(call.clone());
        self.nonce.fetch_add(1, Ordering::SeqCst);
        let outcome = self
            .outcomes
            .lock()
            .pop_front()
            .unwrap_or_else(|| Err(VoucherError::Connectivity("no scripted outcome".to_string())));
        if let Ok(outcome) = &outcome {
            self.mirror(&call, &outcome.events);
        }
        outcome
    }
}
