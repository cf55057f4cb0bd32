use std::collections::HashMap;

use parking_lot::RwLock;

use crate::types::{VoucherId, VoucherIntent};

/// In-memory map from voucher identifier to the issuing intent.
///
/// Best-effort bookkeeping, not authoritative: entries exist only for
/// vouchers issued by this process during its current run and are lost on
/// restart. Chain state remains the source of truth for balances.
#[derive(Default)]
pub struct MetadataStore {
    entries: RwLock<HashMap<VoucherId, VoucherIntent>>,
}

impl MetadataStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, voucher_id: VoucherId, intent: VoucherIntent) {
        self.entries.write().insert(voucher_id, intent);
    }

    pub fn get(&self, voucher_id: &VoucherId) -> Option<VoucherIntent> {
        self.entries.read().get(voucher_id).copied()
    }

    pub fn remove(&self, voucher_id: &VoucherId) -> Option<VoucherIntent> {
        self.entries.write().remove(voucher_id)
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}
