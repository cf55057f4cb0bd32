//! Seam between the lifecycle manager and the chain node.
//!
//! The node itself is an external collaborator: this module only defines
//! the calls the service signs, the inclusion events it interprets, and
//! the [`ChainConnector`] trait a node client must implement. The crate
//! ships one implementation, [`local::LocalConnector`], an in-memory
//! stand-in for local development and tests; production deployments back
//! the trait with the client library of the target network.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::errors::VoucherResult;
use crate::identity::SigningIdentity;
use crate::types::{AccountId, ProgramId, VoucherId};

pub mod local;

/// A voucher-management call, signed and submitted as one extrinsic.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum VoucherCall {
    /// Issue a fresh voucher for `spender`, scoped to `programs`.
    /// Vouchers are non-renewable; no renewal flag is exposed.
    Issue {
        spender: AccountId,
        programs: Vec<ProgramId>,
        balance: u128,
        duration_blocks: u32,
    },
    /// Top up and/or extend an existing voucher. Fields set to `None`
    /// are omitted from the submitted extrinsic.
    Update {
        spender: AccountId,
        voucher_id: VoucherId,
        balance_top_up: Option<u128>,
        prolong_duration: Option<u32>,
    },
    Revoke {
        spender: AccountId,
        voucher_id: VoucherId,
    },
}

impl VoucherCall {
    /// Canonical byte encoding signed by the voucher account.
    pub fn encode(&self) -> VoucherResult<Vec<u8>> {
        Ok(bincode::serialize(self)?)
    }
}

/// Domain events observed in the block that included a submitted extrinsic.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ChainEvent {
    VoucherIssued { voucher_id: VoucherId },
    VoucherUpdated { voucher_id: VoucherId },
    VoucherRevoked { voucher_id: VoucherId },
    /// The extrinsic was included but failed; carries the decoded reason.
    ExtrinsicFailed { reason: String },
    /// Unrelated event emitted in the same block.
    Other,
}

/// Terminal result of a submission: resolves only once the extrinsic is
/// included in a block, carrying every event it emitted.
#[derive(Clone, Debug)]
pub struct ExtrinsicOutcome {
    pub block_hash: String,
    pub events: Vec<ChainEvent>,
}

/// On-chain view of a voucher as reported by account enumeration.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OnchainVoucher {
    pub voucher_id: VoucherId,
    pub programs: Vec<ProgramId>,
    pub expiry_block: u64,
}

#[async_trait]
pub trait ChainConnector: Send + Sync {
    /// Resolves once the connector holds a live session with the node.
    async fn is_ready(&self) -> VoucherResult<()>;

    /// Raw balance held at `address`; fails when the address is unknown.
    async fn query_balance(&self, address: &AccountId) -> VoucherResult<u128>;

    /// All vouchers the node currently associates with `account`.
    async fn query_vouchers_for_account(
        &self,
        account: &AccountId,
    ) -> VoucherResult<Vec<OnchainVoucher>>;

    /// Transaction-ordering nonce for the next submission from `address`.
    async fn next_sequence_number(&self, address: &AccountId) -> VoucherResult<u64>;

    /// Signs `call` with `signer`, submits it, and waits for inclusion.
    async fn submit(
        &self,
        call: VoucherCall,
        signer: &SigningIdentity,
        nonce: u64,
    ) -> VoucherResult<ExtrinsicOutcome>;
}
