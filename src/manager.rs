use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::time;
use tracing::{error, info, warn};

use crate::connector::{ChainConnector, ChainEvent, ExtrinsicOutcome, VoucherCall};
use crate::errors::{VoucherError, VoucherResult};
use crate::identity::SigningIdentity;
use crate::store::MetadataStore;
use crate::types::{
    duration_to_blocks, normalize_balance, AccountId, ProgramId, VoucherDetails, VoucherId,
    VoucherIntent, VoucherStatus, DEFAULT_VOUCHER_DURATION_SECS, UNITS_PER_VARA,
};

/// Orchestrates the voucher lifecycle against the chain: issuance, status
/// lookup, duration/balance prolongation, and revocation, reconciling the
/// in-memory issuing intent with on-chain truth.
///
/// Every signed submission runs under a single async lock so the node only
/// ever sees monotonically increasing sequence numbers from the voucher
/// account. Mutating operations on one voucher additionally serialize
/// through a per-identifier lock.
pub struct VoucherManager {
    connector: Arc<dyn ChainConnector>,
    identity: SigningIdentity,
    program: ProgramId,
    inclusion_timeout: Duration,
    store: MetadataStore,
    submission: tokio::sync::Mutex<()>,
    op_locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl VoucherManager {
    pub fn new(
        connector: Arc<dyn ChainConnector>,
        identity: SigningIdentity,
        program: ProgramId,
        inclusion_timeout: Duration,
    ) -> Self {
        Self {
            connector,
            identity,
            program,
            inclusion_timeout,
            store: MetadataStore::new(),
            submission: tokio::sync::Mutex::new(()),
            op_locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn identity(&self) -> &SigningIdentity {
        &self.identity
    }

    pub fn program(&self) -> ProgramId {
        self.program
    }

    /// Issues a fresh voucher and blocks until the extrinsic is included.
    /// Always creates a new voucher; deduplication is [`Self::issue_if_needed`].
    pub async fn issue(
        &self,
        spender: AccountId,
        program: ProgramId,
        amount: u128,
        duration_secs: u32,
    ) -> VoucherResult<VoucherId> {
        if amount == 0 {
            return Err(VoucherError::Validation(
                "voucher amount must be positive".to_string(),
            ));
        }
        if duration_secs == 0 {
            return Err(VoucherError::Validation(
                "voucher duration must be positive".to_string(),
            ));
        }

        let call = VoucherCall::Issue {
            spender,
            programs: vec![program],
            balance: amount,
            duration_blocks: duration_to_blocks(duration_secs),
        };
        let outcome = self.submit_and_wait(call).await?;

        for event in &outcome.events {
            if let ChainEvent::VoucherIssued { voucher_id } = event {
                self.store.record(
                    *voucher_id,
                    VoucherIntent {
                        duration_secs,
                        amount,
                    },
                );
                info!(%voucher_id, %spender, amount, duration_secs, "voucher issued");
                return Ok(*voucher_id);
            }
        }
        if let Some(reason) = failure_reason(&outcome.events) {
            return Err(VoucherError::ChainRejection(reason));
        }
        error!(block_hash = %outcome.block_hash, "voucher issued event not observed");
        Err(VoucherError::ProtocolViolation(
            "voucher issued event not observed".to_string(),
        ))
    }

    /// Returns the spender's existing voucher for `program` when one
    /// exists, otherwise issues a new one. At most one voucher per
    /// `(account, program)` pair within this process; the check-then-act
    /// window is closed by a per-pair lock.
    pub async fn issue_if_needed(
        &self,
        spender: AccountId,
        program: ProgramId,
        amount: u128,
        duration_secs: u32,
    ) -> VoucherResult<VoucherId> {
        let lock = self.key_lock(format!("issue:{spender}:{program}"));
        let _guard = lock.lock().await;

        let vouchers = self.connector.query_vouchers_for_account(&spender).await?;
        if let Some(existing) = vouchers
            .iter()
            .find(|voucher| voucher.programs.contains(&program))
        {
            info!(voucher_id = %existing.voucher_id, %spender, "reusing existing voucher");
            return Ok(existing.voucher_id);
        }
        self.issue(spender, program, amount, duration_secs).await
    }

    /// Infallible status lookup: a failed balance query means the voucher
    /// does not exist (or the node cannot see it), never an error.
    pub async fn voucher_status(&self, voucher_id: VoucherId) -> VoucherStatus {
        match self.connector.query_balance(&voucher_id.as_address()).await {
            Ok(raw_balance) => VoucherStatus::active(raw_balance),
            Err(err) => {
                warn!(%voucher_id, %err, "voucher balance lookup failed");
                VoucherStatus::missing()
            }
        }
    }

    /// The intent behind an issued voucher. Exact for vouchers issued
    /// during this process run; for anything else the amount is the
    /// observed balance and the duration a fixed default (the original
    /// request is not recoverable from chain state).
    pub async fn voucher_info(&self, voucher_id: VoucherId) -> VoucherResult<VoucherIntent> {
        if let Some(intent) = self.store.get(&voucher_id) {
            return Ok(intent);
        }
        let amount = self.connector.query_balance(&voucher_id.as_address()).await?;
        Ok(VoucherIntent {
            duration_secs: DEFAULT_VOUCHER_DURATION_SECS,
            amount,
        })
    }

    /// First voucher of `account` scoped to `program`, with its intent.
    /// Linear scan; accounts hold a small, policy-bounded number of
    /// vouchers.
    pub async fn voucher_details_for_program(
        &self,
        account: AccountId,
        program: ProgramId,
    ) -> VoucherResult<VoucherDetails> {
        let vouchers = self.connector.query_vouchers_for_account(&account).await?;
        let Some(matching) = vouchers
            .iter()
            .find(|voucher| voucher.programs.contains(&program))
        else {
            return Err(VoucherError::NotFound(
                "no voucher found for this account and program".to_string(),
            ));
        };

        let status = self.voucher_status(matching.voucher_id).await;
        if !status.exists {
            return Err(VoucherError::NotFound(
                "voucher exists but is not valid".to_string(),
            ));
        }
        let intent = self.voucher_info(matching.voucher_id).await?;
        Ok(VoucherDetails {
            voucher_id: matching.voucher_id,
            vara_to_issue: intent.amount,
            duration: intent.duration_secs,
        })
    }

    /// Tops the voucher up to `balance_vara` whole tokens and/or extends
    /// its lifetime. A requested balance at or below the current one
    /// produces no top-up; a zero duration produces no extension. The
    /// update extrinsic is submitted either way and must emit its event.
    pub async fn prolong(
        &self,
        voucher_id: VoucherId,
        account: AccountId,
        balance_vara: u128,
        duration_secs: u32,
    ) -> VoucherResult<()> {
        let lock = self.key_lock(format!("voucher:{voucher_id}"));
        let _guard = lock.lock().await;

        let raw = self.connector.query_balance(&voucher_id.as_address()).await?;
        let current_vara = normalize_balance(raw);
        let balance_top_up = balance_vara
            .checked_sub(current_vara)
            .filter(|top_up| *top_up > 0)
            .map(|top_up| {
                top_up.checked_mul(UNITS_PER_VARA).ok_or_else(|| {
                    VoucherError::Validation(format!(
                        "requested balance of {balance_vara} tokens is not representable on chain"
                    ))
                })
            })
            .transpose()?;
        let prolong_duration = (duration_secs > 0).then(|| duration_to_blocks(duration_secs));

        let outcome = self
            .submit_and_wait(VoucherCall::Update {
                spender: account,
                voucher_id,
                balance_top_up,
                prolong_duration,
            })
            .await?;
        self.confirm(&outcome, "voucher updated", |event| {
            matches!(event, ChainEvent::VoucherUpdated { voucher_id: id } if *id == voucher_id)
        })?;
        info!(%voucher_id, ?balance_top_up, ?prolong_duration, "voucher prolonged");
        Ok(())
    }

    /// Revokes the voucher and forgets its cached intent.
    pub async fn revoke(&self, voucher_id: VoucherId, account: AccountId) -> VoucherResult<()> {
        let lock = self.key_lock(format!("voucher:{voucher_id}"));
        let _guard = lock.lock().await;

        let outcome = self
            .submit_and_wait(VoucherCall::Revoke {
                spender: account,
                voucher_id,
            })
            .await?;
        self.confirm(&outcome, "voucher revoked", |event| {
            matches!(event, ChainEvent::VoucherRevoked { voucher_id: id } if *id == voucher_id)
        })?;
        self.store.remove(&voucher_id);
        info!(%voucher_id, %account, "voucher revoked");
        Ok(())
    }

    /// Signs and submits one call, holding the submission lock from nonce
    /// fetch through inclusion so concurrent requests cannot reorder the
    /// voucher account's sequence numbers. The inclusion wait is bounded
    /// by the configured timeout.
    async fn submit_and_wait(&self, call: VoucherCall) -> VoucherResult<ExtrinsicOutcome> {
        let _guard = self.submission.lock().await;
        self.connector.is_ready().await?;
        let nonce = self
            .connector
            .next_sequence_number(self.identity.address())
            .await?;
        time::timeout(
            self.inclusion_timeout,
            self.connector.submit(call, &self.identity, nonce),
        )
        .await
        .map_err(|_| VoucherError::Timeout(self.inclusion_timeout))?
    }

    fn confirm(
        &self,
        outcome: &ExtrinsicOutcome,
        expected: &str,
        matcher: impl Fn(&ChainEvent) -> bool,
    ) -> VoucherResult<()> {
        if outcome.events.iter().any(matcher) {
            return Ok(());
        }
        if let Some(reason) = failure_reason(&outcome.events) {
            return Err(VoucherError::ChainRejection(reason));
        }
        error!(block_hash = %outcome.block_hash, event = expected, "expected inclusion event not observed");
        Err(VoucherError::ProtocolViolation(format!(
            "{expected} event not observed"
        )))
    }

    fn key_lock(&self, key: String) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self.op_locks.lock();
        // A strong count of 1 means no operation holds the entry anymore;
        // sweeping here keeps the registry bounded by in-flight work.
        locks.retain(|_, lock| Arc::strong_count(lock) > 1);
        Arc::clone(
            locks
                .entry(key)
                .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(()))),
        )
    }

    #[cfg(test)]
    fn op_lock_len(&self) -> usize {
        self.op_locks.lock().len()
    }
}

fn failure_reason(events: &[ChainEvent]) -> Option<String> {
    events.iter().find_map(|event| match event {
        ChainEvent::ExtrinsicFailed { reason } => Some(reason.clone()),
        _ => None,
    })
}
